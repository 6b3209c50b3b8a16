//! PDF engine: the library boundary that parses and rasterises documents.
//!
//! The rasteriser only needs three things from a PDF library: how many pages
//! there are, how big each page is in native units, and a bitmap of a page at
//! a given pixel size. [`PdfEngine`] exposes exactly that, which lets tests
//! drive the pipeline with a scripted engine and keeps pdfium's lifetimes out
//! of the async code.
//!
//! pdfium documents borrow the bound library, so an engine hands the opened
//! document to a visitor instead of returning it. The visitor runs on the
//! blocking render thread for the whole session.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Failures reported by a [`PdfEngine`].
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The PDF library itself could not be loaded.
    #[error("{0}")]
    Bind(String),

    /// The bytes are not a parseable PDF.
    #[error("{0}")]
    Parse(String),

    /// A page object could not be obtained.
    #[error("page {page}: {detail}")]
    PageLoad { page: usize, detail: String },

    /// The page was loaded but rendering failed.
    #[error("page {page}: {detail}")]
    Render { page: usize, detail: String },
}

/// Native page size in the renderer's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// An opened document. Page numbers are 1-based.
pub trait PdfPages {
    fn page_count(&self) -> usize;

    /// Load page `page_number` and report its native size.
    fn page_size(&mut self, page_number: usize) -> Result<PageSize, EngineError>;

    /// Render page `page_number` into a `width × height` pixel bitmap.
    fn render(
        &mut self,
        page_number: usize,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, EngineError>;
}

/// A PDF library capable of opening documents from bytes.
pub trait PdfEngine: Send + Sync {
    /// Parse `bytes` and run `visit` against the open document.
    ///
    /// Returns `Err` only when the document could not be opened; page-level
    /// failures are reported through [`PdfPages`] inside the visitor.
    fn open(
        &self,
        bytes: Vec<u8>,
        visit: &mut dyn FnMut(&mut dyn PdfPages),
    ) -> Result<(), EngineError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────────

/// [`PdfEngine`] backed by pdfium through `pdfium-render`.
///
/// Library resolution order (first match wins):
/// 1. the explicit `library_path`
/// 2. `PDFIUM_LIB_PATH`
/// 3. a platform library in the working directory
/// 4. the system library search path
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(&path).map_err(|e| {
                EngineError::Bind(format!("{}: {:?}", path.display(), e))
            })?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| EngineError::Bind(format!("{:?}", e)))?,
        };

        Ok(Pdfium::new(bindings))
    }
}

impl PdfEngine for PdfiumEngine {
    fn open(
        &self,
        bytes: Vec<u8>,
        visit: &mut dyn FnMut(&mut dyn PdfPages),
    ) -> Result<(), EngineError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| EngineError::Parse(format!("{:?}", e)))?;

        let mut pages = PdfiumPages {
            document: &document,
        };
        debug!("pdfium opened document: {} pages", pages.page_count());
        visit(&mut pages);
        Ok(())
    }
}

struct PdfiumPages<'d, 'p> {
    document: &'d PdfDocument<'p>,
}

impl<'p> PdfiumPages<'_, 'p> {
    fn page(&self, page_number: usize) -> Result<PdfPage<'p>, EngineError> {
        let index = page_number
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| EngineError::PageLoad {
                page: page_number,
                detail: "page index out of range".into(),
            })?;

        self.document
            .pages()
            .get(index)
            .map_err(|e| EngineError::PageLoad {
                page: page_number,
                detail: format!("{:?}", e),
            })
    }
}

impl PdfPages for PdfiumPages<'_, '_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&mut self, page_number: usize) -> Result<PageSize, EngineError> {
        let page = self.page(page_number)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn render(
        &mut self,
        page_number: usize,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, EngineError> {
        let page = self.page(page_number)?;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| EngineError::Render {
                page: page_number,
                detail: format!("{:?}", e),
            })?;

        Ok(bitmap.as_image())
    }
}
