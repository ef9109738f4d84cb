//! # scan2md
//!
//! Turn scanned-page Markdown with figure bounding boxes into Markdown with
//! extracted figure images.
//!
//! ## Why this crate?
//!
//! Vision models transcribe a scanned page into Markdown well, but they
//! cannot *emit* the figures — they emit placeholder tags plus bounding
//! boxes in a normalized 0–1000 space. Someone still has to crop each figure
//! out of the page raster, save it, and splice a working image link back
//! into the text. That splice is where documents silently rot: inverted
//! coordinates, boxes hanging off the page edge, more tags than boxes,
//! duplicate tags. This crate does exactly that step, deterministically,
//! with strict validation and per-anomaly reporting.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page_001.md + Page_01.jpeg
//!  │
//!  ├─ 1. Placeholder  parse <bbox>…</bbox> tags or <image_here> + sidecar
//!  ├─ 2. Coords       scale 0–1000 → pixels, repair order, clamp, reject
//!  ├─ 3. Extract      crop figure, save image_page01_001.png
//!  └─ 4. Reconcile    replace each tag with ![Image 1_1](…) in order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2md::{process_folder, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // <root> contains markdown/ and images/ from the upstream steps.
//!     let config = ProcessingConfig::default();
//!     let output = process_folder("my_document", None, &config).await?;
//!     eprintln!(
//!         "{} figures from {} pages ({} pages with warnings)",
//!         output.stats.figures_extracted,
//!         output.stats.processed_pages,
//!         output.stats.pages_with_warnings,
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! * The Nth placeholder tag on a page consumes the Nth bounding box —
//!   strictly positional, never content or spatial matching.
//! * A rejected box leaves its tag untouched; nothing ever guesses a crop.
//! * Figure filenames (`image_page{pp}_{iii}.png`) are deterministic and
//!   collision-free across pages, so concurrent page processing is safe.
//! * A run succeeds even when individual pages or tags fail; every anomaly
//!   is reported as a structured [`PageWarning`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2md` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scan2md = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessingConfig, ProcessingConfigBuilder, ScaleMode};
pub use error::{PageWarning, Scan2MdError};
pub use output::{PageReport, RunOutput, RunStats};
pub use pipeline::coords::{resolve, NormalizedBox, PixelRect};
pub use pipeline::extract::{extract, ExtractedFigure};
pub use pipeline::placeholder::{PlaceholderSource, MARKER_TAG};
pub use pipeline::reconcile::{reconcile, ReconcileContext, Reconciled};
pub use process::{process_folder, process_folder_sync, process_page, Page};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
pub use stream::{process_stream, PageReportStream};
