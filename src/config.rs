//! Configuration types for page processing.
//!
//! All processing behaviour is controlled through [`ProcessingConfig`], built
//! via its [`ProcessingConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across worker tasks, log them, and diff two
//! runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A many-field constructor breaks on every new field. The builder lets
//! callers set only what they care about and rely on documented defaults for
//! the rest.

use crate::error::Scan2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for processing scanned-page markdown into figure-linked
/// markdown.
///
/// Built via [`ProcessingConfig::builder()`] or using
/// [`ProcessingConfig::default()`].
///
/// # Example
/// ```rust
/// use scan2md::{ProcessingConfig, ScaleMode};
///
/// let config = ProcessingConfig::builder()
///     .scale_mode(ScaleMode::PerAxis)
///     .annotate(true)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// How normalized 0–1000 coordinates are mapped to pixels. Default: [`ScaleMode::PerAxis`].
    ///
    /// Per-axis scaling is geometrically correct for non-square pages and is
    /// the canonical mode. [`ScaleMode::Uniform`] reproduces the legacy
    /// single-factor convention and exists only for reprocessing archives
    /// produced under it — it is never selected implicitly.
    pub scale_mode: ScaleMode,

    /// Also write a `_bbox` copy of each page with the crop rectangle drawn
    /// on it. Default: false.
    ///
    /// A debugging aid for eyeballing where the upstream model placed its
    /// boxes. Doubles the output file count and is consumed by nothing
    /// downstream, so it stays off unless explicitly requested.
    pub annotate: bool,

    /// Number of pages processed concurrently. Default: 4.
    ///
    /// Pages are independent units of work; output filenames are namespaced
    /// by page number, so concurrent pages never write the same file. Within
    /// a page, boxes are always processed sequentially because placeholder
    /// substitution is order-dependent.
    pub concurrency: usize,

    /// Path prefix used in the markdown image references. Default: `../markdown_images`.
    ///
    /// Relative to where the processed markdown lives, pointing into the
    /// figures directory. The default matches the standard folder layout
    /// (`processed_markdown/` and `markdown_images/` as siblings).
    pub figures_rel_path: String,

    /// Extensions probed (in order) when locating `Page_{NN}.<ext>`.
    /// Default: `jpeg`, `jpg`, `png`.
    pub page_image_extensions: Vec<String>,

    /// Progress callback driven per page. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            scale_mode: ScaleMode::default(),
            annotate: false,
            concurrency: 4,
            figures_rel_path: "../markdown_images".to_string(),
            page_image_extensions: vec!["jpeg".into(), "jpg".into(), "png".into()],
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("scale_mode", &self.scale_mode)
            .field("annotate", &self.annotate)
            .field("concurrency", &self.concurrency)
            .field("figures_rel_path", &self.figures_rel_path)
            .field("page_image_extensions", &self.page_image_extensions)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn scale_mode(mut self, mode: ScaleMode) -> Self {
        self.config.scale_mode = mode;
        self
    }

    pub fn annotate(mut self, v: bool) -> Self {
        self.config.annotate = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn figures_rel_path(mut self, prefix: impl Into<String>) -> Self {
        self.config.figures_rel_path = prefix.into();
        self
    }

    pub fn page_image_extensions(mut self, exts: Vec<String>) -> Self {
        self.config.page_image_extensions = exts;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, Scan2MdError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Scan2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.page_image_extensions.is_empty() {
            return Err(Scan2MdError::InvalidConfig(
                "At least one page image extension is required".into(),
            ));
        }
        if c.figures_rel_path.is_empty() {
            return Err(Scan2MdError::InvalidConfig(
                "figures_rel_path must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a normalized 0–1000 coordinate is converted to pixels.
///
/// Two conventions exist historically and they disagree for non-square
/// images, so the choice is always explicit — the resolver never switches
/// between them silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    /// Row axes scale by `height / 1000`, column axes by `width / 1000`.
    /// Geometrically correct for any aspect ratio. (default)
    #[default]
    PerAxis,
    /// All four coordinates scale by `max(width, height) / 1000`.
    /// Legacy convention; only correct when the longest edge carried the
    /// normalisation upstream.
    Uniform,
}
