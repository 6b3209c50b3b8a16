//! Configuration types for PDF-to-note conversion.
//!
//! Per-run knobs live in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. Vault-wide defaults that persist between runs
//! (where image folders and notes go) live in [`crate::settings::Settings`]
//! instead, and per-invocation input in
//! [`crate::pipeline::collect::ConversionRequest`].

use crate::error::Pdf2NoteError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::time::Duration;

/// Units per inch of the renderer's native page space.
///
/// DPI is converted to a render scale as `dpi / NATIVE_UNITS_PER_INCH`, so a
/// 96-DPI render reproduces the native size exactly.
pub const NATIVE_UNITS_PER_INCH: f32 = 96.0;

pub const DEFAULT_DPI: u32 = 150;
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for a conversion run.
///
/// # Example
/// ```rust
/// use pdf2note::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .render_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI. Range: 72–600. Default: 150.
    pub dpi: u32,

    /// Wall-clock budget for rendering one page. Default: 15 s.
    ///
    /// A page that overruns is skipped; the rest of the document continues.
    pub render_timeout: Duration,

    /// Optional progress callback for per-page events and notices.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("render_timeout", &self.render_timeout)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Render scale for the configured DPI.
    pub fn scale(&self) -> f32 {
        dpi_to_scale(self.dpi)
    }
}

/// Scale factor that turns native page units into pixels at `dpi`.
pub fn dpi_to_scale(dpi: u32) -> f32 {
    dpi as f32 / NATIVE_UNITS_PER_INCH
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    pub fn render_timeout_secs(self, secs: u64) -> Self {
        self.render_timeout(Duration::from_secs(secs))
    }

    /// Attach a progress callback that receives per-page events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2NoteError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(Pdf2NoteError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.render_timeout.is_zero() {
            return Err(Pdf2NoteError::InvalidConfig(
                "Render timeout must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.dpi, 150);
        assert_eq!(c.render_timeout, Duration::from_secs(15));
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn scale_follows_dpi() {
        assert_eq!(dpi_to_scale(96), 1.0);
        assert!((dpi_to_scale(150) - 150.0 / 96.0).abs() < f32::EPSILON);
        assert_eq!(dpi_to_scale(192), 2.0);
    }

    #[test]
    fn builder_rejects_out_of_range_dpi() {
        assert!(ConversionConfig::builder().dpi(50).build().is_err());
        assert!(ConversionConfig::builder().dpi(601).build().is_err());
        assert!(ConversionConfig::builder().dpi(96).build().is_ok());
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ConversionConfig::builder()
            .render_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
