//! Page rasterisation: PDF bytes → one PNG per page in the vault.
//!
//! ## Threading
//!
//! The PDF engine is blocking and its documents cannot leave the thread that
//! opened them, so a single dedicated worker thread owns the document for the
//! whole run. The async side asks for one page at a time over a channel and
//! waits for the answer, which keeps rendering strictly sequential while
//! letting the async side enforce the per-page timeout.
//!
//! The worker is a plain OS thread that is never joined, so a render that
//! never returns cannot hold up runtime shutdown.
//!
//! ## Timeouts
//!
//! Each page gets one deadline, starting when it is requested. A page that
//! overruns is recorded as skipped and its request is cancelled, so the worker
//! drops it if it has not started it yet. A render still running past its
//! deadline holds up the pages behind it; each of those runs out its own
//! deadline and is skipped too, so a hung render costs at most one timeout per
//! remaining page. Late results are discarded, so nothing is written for a
//! skipped page.

use crate::config::ConversionConfig;
use crate::engine::{EngineError, PageSize, PdfEngine, PdfPages};
use crate::error::{Pdf2NoteError, SkipReason};
use crate::output::{ConversionLog, PageImage, PageStatus};
use crate::pipeline::encode::encode_png;
use crate::vault::{join, Vault, VaultFile};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// What [`rasterize`] hands back.
#[derive(Debug, Clone)]
pub struct Rasterized {
    /// One record per source page, in page order.
    pub pages: Vec<PageImage>,
    /// The files actually written, in page order.
    pub written: Vec<VaultFile>,
}

/// File name of the image for page `page_number`.
pub fn page_file_name(page_number: usize) -> String {
    format!("page-{page_number}.png")
}

/// Pixel size of a page rendered at `scale`. Never smaller than 1×1.
pub fn viewport(size: PageSize, scale: f32) -> (u32, u32) {
    let px = |v: f32| (v * scale).round().max(1.0) as u32;
    (px(size.width), px(size.height))
}

/// Rasterise every page of `source_path` into `destination_folder`.
///
/// The destination folder is created once the document has been parsed, so
/// an unreadable or corrupt source leaves nothing behind. Fails when the
/// source cannot be read or parsed, when the folder cannot be created
/// (including when it already exists), or when a rendered image cannot be
/// written; per-page render problems become [`PageStatus::Skipped`] entries.
pub async fn rasterize(
    vault: &dyn Vault,
    engine: Arc<dyn PdfEngine>,
    source_path: &str,
    destination_folder: &str,
    config: &ConversionConfig,
    log: &mut ConversionLog,
) -> Result<Rasterized, Pdf2NoteError> {
    log.info(format!("Reading PDF from: {source_path}"));
    let bytes = vault
        .read_binary(source_path)
        .await
        .map_err(|source| Pdf2NoteError::SourceUnreadable {
            path: source_path.to_string(),
            source,
        })?;

    let (cmd_tx, cmd_rx) = mpsc::channel::<RenderCommand>();
    let (evt_tx, mut evt_rx) = unbounded_channel::<RenderEvent>();

    // Never joined: an abandoned render may outlive this function.
    std::thread::Builder::new()
        .name("pdf2note-render".into())
        .spawn(move || render_worker(engine.as_ref(), bytes, cmd_rx, evt_tx))
        .map_err(|e| Pdf2NoteError::Internal(format!("Failed to start render worker: {e}")))?;

    let page_count = match evt_rx.recv().await {
        Some(RenderEvent::Opened { page_count }) => page_count,
        Some(RenderEvent::OpenFailed(EngineError::Bind(detail))) => {
            return Err(Pdf2NoteError::PdfiumBindingFailed(detail));
        }
        Some(RenderEvent::OpenFailed(e)) => {
            return Err(Pdf2NoteError::CorruptPdf {
                path: source_path.to_string(),
                detail: e.to_string(),
            });
        }
        _ => {
            return Err(Pdf2NoteError::Internal(
                "render worker exited before opening the document".into(),
            ));
        }
    };
    log.info(format!("PDF loaded, total pages: {page_count}"));

    vault
        .create_folder(destination_folder)
        .await
        .map_err(|source| Pdf2NoteError::FolderCreateFailed {
            path: destination_folder.to_string(),
            source,
        })?;
    log.info(format!("Created folder: {destination_folder}"));

    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_conversion_start(page_count);
    }

    let scale = config.scale();
    let mut pages = Vec::with_capacity(page_count);
    let mut written = Vec::with_capacity(page_count);
    let mut worker_alive = true;

    for page_number in 1..=page_count {
        let file_path = join(destination_folder, &page_file_name(page_number));
        if let Some(cb) = cb {
            cb.on_page_start(page_number, page_count);
        }

        let outcome = if worker_alive {
            request_page(
                &cmd_tx,
                &mut evt_rx,
                page_number,
                scale,
                config.render_timeout,
            )
            .await
        } else {
            Err(SkipReason::WorkerGone)
        };

        match outcome {
            Ok(rendered) => {
                log.info(format!(
                    "Saving page {page_number} ({}x{} px) to: {file_path}",
                    rendered.width, rendered.height
                ));
                let file = vault
                    .write_binary(&file_path, &rendered.png)
                    .await
                    .map_err(|source| Pdf2NoteError::ImageWriteFailed {
                        path: file_path.clone(),
                        source,
                    })?;
                if let Some(cb) = cb {
                    cb.on_page_complete(page_number, page_count, rendered.png.len());
                }
                written.push(file);
                pages.push(PageImage {
                    page_number,
                    file_path,
                    status: PageStatus::Rendered,
                });
            }
            Err(reason) => {
                if reason == SkipReason::WorkerGone {
                    worker_alive = false;
                }
                log.warn(format!("Skipping page {page_number}: {reason}"));
                if let Some(cb) = cb {
                    cb.on_page_skipped(page_number, page_count, &reason.to_string());
                }
                pages.push(PageImage {
                    page_number,
                    file_path,
                    status: PageStatus::Skipped(reason),
                });
            }
        }
    }

    drop(cmd_tx);

    let skipped = page_count - written.len();
    if skipped == 0 {
        log.info("All pages rendered and saved.");
    } else {
        log.warn(format!(
            "Rendered {}/{} pages; {} skipped",
            written.len(),
            page_count,
            skipped
        ));
    }
    if let Some(cb) = cb {
        cb.on_conversion_complete(page_count, written.len());
    }

    Ok(Rasterized { pages, written })
}

// ── Worker protocol ──────────────────────────────────────────────────────────

struct RenderCommand {
    page_number: usize,
    scale: f32,
    /// Set once the requester has given up on this page.
    cancelled: Arc<AtomicBool>,
}

struct RenderedPage {
    width: u32,
    height: u32,
    png: Vec<u8>,
}

enum RenderEvent {
    Opened {
        page_count: usize,
    },
    OpenFailed(EngineError),
    Finished {
        page_number: usize,
        outcome: Result<RenderedPage, SkipReason>,
    },
}

/// Ask the worker for one page and wait for it, bounded by `timeout`.
///
/// The deadline covers the whole request, including any time the worker
/// spends finishing an earlier, abandoned page.
async fn request_page(
    commands: &mpsc::Sender<RenderCommand>,
    events: &mut UnboundedReceiver<RenderEvent>,
    page_number: usize,
    scale: f32,
    timeout: Duration,
) -> Result<RenderedPage, SkipReason> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let command = RenderCommand {
        page_number,
        scale,
        cancelled: Arc::clone(&cancelled),
    };
    if commands.send(command).is_err() {
        return Err(SkipReason::WorkerGone);
    }

    // Late results for earlier, abandoned pages may arrive first; drop them.
    let finished = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Some(RenderEvent::Finished {
                    page_number: n,
                    outcome,
                }) if n == page_number => return Some(outcome),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await;

    match finished {
        Ok(Some(outcome)) => outcome,
        Ok(None) => Err(SkipReason::WorkerGone),
        Err(_) => {
            cancelled.store(true, Ordering::Release);
            Err(SkipReason::Timeout {
                millis: timeout.as_millis() as u64,
            })
        }
    }
}

/// Blocking side: owns the open document and serves page requests in order.
fn render_worker(
    engine: &dyn PdfEngine,
    bytes: Vec<u8>,
    commands: mpsc::Receiver<RenderCommand>,
    events: UnboundedSender<RenderEvent>,
) {
    let opened = engine.open(bytes, &mut |pages: &mut dyn PdfPages| {
        let page_count = pages.page_count();
        if events.send(RenderEvent::Opened { page_count }).is_err() {
            return;
        }

        while let Ok(cmd) = commands.recv() {
            if cmd.cancelled.load(Ordering::Acquire) {
                debug!("render worker: page {} abandoned, skipping", cmd.page_number);
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                render_one(pages, cmd.page_number, cmd.scale)
            }))
            .unwrap_or_else(|_| {
                Err(SkipReason::RenderFailed {
                    detail: "renderer panicked".into(),
                })
            });
            if events
                .send(RenderEvent::Finished {
                    page_number: cmd.page_number,
                    outcome,
                })
                .is_err()
            {
                break;
            }
        }
        debug!("render worker: command channel closed");
    });

    if let Err(e) = opened {
        let _ = events.send(RenderEvent::OpenFailed(e));
    }
}

fn render_one(
    pages: &mut dyn PdfPages,
    page_number: usize,
    scale: f32,
) -> Result<RenderedPage, SkipReason> {
    let size = pages
        .page_size(page_number)
        .map_err(|e| SkipReason::LoadFailed {
            detail: e.to_string(),
        })?;

    let (width, height) = viewport(size, scale);
    debug!(
        "Rendering page {} at {:.3}x → {}x{} px",
        page_number, scale, width, height
    );

    let image = pages
        .render(page_number, width, height)
        .map_err(|e| match e {
            EngineError::PageLoad { .. } => SkipReason::LoadFailed {
                detail: e.to_string(),
            },
            other => SkipReason::RenderFailed {
                detail: other.to_string(),
            },
        })?;

    let png = encode_png(&image).map_err(|e| SkipReason::EncodeFailed {
        detail: e.to_string(),
    })?;

    Ok(RenderedPage {
        width: image.width(),
        height: image.height(),
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_at_96_dpi_is_native() {
        let size = PageSize {
            width: 612.0,
            height: 792.0,
        };
        assert_eq!(viewport(size, 1.0), (612, 792));
    }

    #[test]
    fn viewport_at_150_dpi() {
        let size = PageSize {
            width: 612.0,
            height: 792.0,
        };
        // 612 × 1.5625 = 956.25, 792 × 1.5625 = 1237.5
        assert_eq!(viewport(size, 150.0 / 96.0), (956, 1238));
    }

    #[test]
    fn viewport_never_collapses_to_zero() {
        let size = PageSize {
            width: 0.1,
            height: 0.0,
        };
        assert_eq!(viewport(size, 1.0), (1, 1));
    }

    #[test]
    fn page_file_names() {
        assert_eq!(page_file_name(1), "page-1.png");
        assert_eq!(page_file_name(12), "page-12.png");
    }
}
