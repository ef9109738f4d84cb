//! Error types for the scan2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Scan2MdError`] — **Fatal**: the run cannot proceed at all (missing
//!   input directory, unparseable page filename, invalid configuration).
//!   Returned as `Err(Scan2MdError)` from the top-level `process*` functions.
//!
//! * [`PageWarning`] — **Non-fatal**: one tag or one page went wrong (missing
//!   page image, degenerate bounding box, count mismatch) but every other tag
//!   and page is fine. Collected inside [`crate::output::PageReport`] so
//!   callers can inspect partial success instead of losing a whole document
//!   to one bad box.
//!
//! The separation encodes the propagation policy: a failure is local to the
//! smallest unit that can fail — one tag, one page — and never aborts
//! sibling units. Nothing in this crate is retried.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scan2md library.
///
/// Tag- and page-level anomalies use [`PageWarning`] and are stored in
/// [`crate::output::PageReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Scan2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required input directory does not exist.
    #[error("Required directory not found: '{path}'\nExpected the upstream step to have produced it.")]
    DirectoryMissing { path: PathBuf },

    /// A page markdown filename did not follow the `page_{NNN}.md` convention.
    #[error("Cannot parse page number from '{path}'\nExpected a name like page_001.md.")]
    InvalidPageFilename { path: PathBuf },

    /// A page markdown file could not be read.
    #[error("Failed to read markdown file '{path}': {source}")]
    MarkdownReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sidecar coordinate file exists but could not be read or parsed.
    #[error("Failed to load coordinate sidecar '{path}': {detail}")]
    SidecarInvalid { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create an output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal anomaly scoped to a single tag or a single page.
///
/// Collected in [`crate::output::PageReport::warnings`]. The page's markdown
/// is still written (best-effort per tag, never all-or-nothing), and the run
/// continues; no anomaly silently produces a wrong-but-plausible result — a
/// rejected box always leaves its tag untouched rather than guessing a
/// rectangle.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageWarning {
    /// The page image file is missing or could not be decoded; the page's
    /// markdown is passed through unmodified.
    #[error("Page {page}: image unreadable at '{path}' — markdown passed through unmodified")]
    ImageUnreadable { page: usize, path: String },

    /// An embedded coordinate payload was not four numbers.
    #[error("Page {page}, tag {index}: malformed coordinate payload '{payload}'")]
    MalformedCoordinates {
        page: usize,
        index: usize,
        payload: String,
    },

    /// A bounding box was degenerate or fully out of bounds after
    /// order-repair and clamping; its tag is left untouched.
    #[error("Page {page}, tag {index}: degenerate bounding box ({y_min}, {x_min}, {y_max}, {x_max})")]
    DegenerateBox {
        page: usize,
        index: usize,
        y_min: f64,
        x_min: f64,
        y_max: f64,
        x_max: f64,
    },

    /// More placeholder tags than supplied bounding boxes; the excess tags
    /// remain in the output.
    #[error("Page {page}: {count} placeholder tag(s) had no bounding box")]
    UnmatchedPlaceholders { page: usize, count: usize },

    /// More supplied bounding boxes than placeholder tags; the excess boxes
    /// are ignored.
    #[error("Page {page}: {count} bounding box(es) had no placeholder tag")]
    UnusedCoordinates { page: usize, count: usize },

    /// Cropping or encoding a figure failed; its tag is left untouched.
    #[error("Page {page}, tag {index}: figure extraction failed: {detail}")]
    ExtractionFailed {
        page: usize,
        index: usize,
        detail: String,
    },

    /// A figure or annotated image could not be persisted.
    #[error("Page {page}: failed to write '{path}': {detail}")]
    WriteFailure {
        page: usize,
        path: String,
        detail: String,
    },
}
