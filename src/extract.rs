//! Text extraction from page images.
//!
//! The assembler only ever talks to the [`TextExtractor`] trait, and may be
//! handed none at all; that case is the "extractor not installed" path and
//! yields a sentinel string in the note.
//!
//! [`VisionTextExtractor`] is the bundled implementation: it sends each image
//! to a vision LLM through `edgequake-llm` and cleans up the reply.
//!
//! ## Retry Strategy
//!
//! One attempt per image by default. When `max_retries` is raised, waits
//! follow `retry_backoff_ms * 2^attempt`: with 500 ms base and 3 retries the
//! sequence is 500 ms → 1 s → 2 s.

use crate::error::Pdf2NoteError;
use crate::pipeline::encode::{image_payload, mime_for_extension};
use crate::pipeline::postprocess::clean_extracted_text;
use crate::prompts::DEFAULT_OCR_PROMPT;
use crate::vault::{Vault, VaultError, VaultFile};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Image extensions a vision model accepts.
const EXTRACTABLE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Why a single extraction failed.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("'{path}' is not an image this extractor can read")]
    Unsupported { path: String },

    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: VaultError,
    },

    #[error("vision model failed after {attempts} attempt(s): {detail}")]
    Provider { attempts: u32, detail: String },
}

/// An OCR-like capability that turns an image file into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Text found in `file`. An empty string means no text was found.
    async fn extract_text(&self, file: &VaultFile) -> Result<String, ExtractError>;

    /// Whether `path` is a file type this extractor handles.
    fn can_file_be_extracted(&self, path: &str) -> bool;

    /// Whether a result for `file` is already cached.
    async fn is_in_cache(&self, file: &VaultFile) -> bool;
}

/// Whether `path` has an extension a vision model can read.
pub fn is_extractable_image(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            EXTRACTABLE_EXTENSIONS
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

// ── Vision extractor ─────────────────────────────────────────────────────────

/// Settings for [`VisionTextExtractor`].
#[derive(Clone)]
pub struct VisionExtractorConfig {
    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Provider name, e.g. "openai", "anthropic", "ollama".
    pub provider_name: Option<String>,

    /// Model identifier. Default: `gpt-4.1-nano` when a provider is named.
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per image. Default: 4096.
    pub max_tokens: usize,

    /// Extra attempts after a failed call. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses [`DEFAULT_OCR_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for VisionExtractorConfig {
    fn default() -> Self {
        Self {
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for VisionExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionExtractorConfig")
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

/// A [`TextExtractor`] backed by a vision LLM.
///
/// Results are cached per vault path for the lifetime of the extractor.
pub struct VisionTextExtractor {
    provider: Arc<dyn LLMProvider>,
    vault: Arc<dyn Vault>,
    config: VisionExtractorConfig,
    cache: Mutex<HashMap<String, String>>,
}

impl VisionTextExtractor {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        vault: Arc<dyn Vault>,
        config: VisionExtractorConfig,
    ) -> Self {
        Self {
            provider,
            vault,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a provider from `config` and build the extractor.
    pub async fn from_config(
        vault: Arc<dyn Vault>,
        config: VisionExtractorConfig,
    ) -> Result<Self, Pdf2NoteError> {
        let provider = resolve_provider(&config).await?;
        Ok(Self::new(provider, vault, config))
    }

    fn cached(&self, path: &str) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(path)
            .cloned()
    }

    fn remember(&self, path: &str, text: &str) {
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(path.to_string(), text.to_string());
    }
}

#[async_trait]
impl TextExtractor for VisionTextExtractor {
    async fn extract_text(&self, file: &VaultFile) -> Result<String, ExtractError> {
        if let Some(text) = self.cached(&file.path) {
            debug!("{}: using cached text", file.path);
            return Ok(text);
        }
        if !self.can_file_be_extracted(&file.path) {
            return Err(ExtractError::Unsupported {
                path: file.path.clone(),
            });
        }

        let bytes = self
            .vault
            .read_binary(&file.path)
            .await
            .map_err(|source| ExtractError::Read {
                path: file.path.clone(),
                source,
            })?;

        let prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_OCR_PROMPT);
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images(
                "",
                vec![image_payload(&bytes, mime_for_extension(&file.extension))],
            ),
        ];
        let options = build_options(&self.config);

        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = self.config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    file.path, attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        file.path,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let text = clean_extracted_text(&response.content);
                    self.remember(&file.path, &text);
                    return Ok(text);
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    warn!("{}: attempt {} failed: {}", file.path, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(ExtractError::Provider {
            attempts: self.config.max_retries + 1,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    fn can_file_be_extracted(&self, path: &str) -> bool {
        is_extractable_image(path)
    }

    async fn is_in_cache(&self, file: &VaultFile) -> bool {
        self.cached(&file.path).is_some()
    }
}

fn build_options(config: &VisionExtractorConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2NoteError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2NoteError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Environment variable naming the vision provider.
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";

/// Environment variable naming the vision model.
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. A pre-built provider in `config.provider`.
/// 2. `config.provider_name` plus `config.model` (or the default model).
/// 3. `EDGEQUAKE_LLM_PROVIDER` and `EDGEQUAKE_MODEL`, when both are set.
/// 4. OpenAI, when `OPENAI_API_KEY` is set.
/// 5. Whatever [`ProviderFactory::from_env`] detects.
pub async fn resolve_provider(
    config: &VisionExtractorConfig,
) -> Result<Arc<dyn LLMProvider>, Pdf2NoteError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var(PROVIDER_ENV),
        std::env::var(MODEL_ENV),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2NoteError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&VisionExtractorConfig::default());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn one_attempt_by_default() {
        assert_eq!(VisionExtractorConfig::default().max_retries, 0);
    }

    #[test]
    fn extractable_images() {
        assert!(is_extractable_image("deck/page-1.png"));
        assert!(is_extractable_image("scan.JPEG"));
        assert!(!is_extractable_image("diagram.svg"));
        assert!(!is_extractable_image("notes.md"));
        assert!(!is_extractable_image("README"));
    }

    #[test]
    fn config_debug_hides_provider() {
        let dbg = format!("{:?}", VisionExtractorConfig::default());
        assert!(dbg.contains("max_retries: 0"));
        assert!(dbg.contains("provider: None"));
    }

    #[test]
    fn extract_error_messages() {
        let e = ExtractError::Provider {
            attempts: 2,
            detail: "429".into(),
        };
        assert_eq!(e.to_string(), "vision model failed after 2 attempt(s): 429");
    }
}
