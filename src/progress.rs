//! Progress-callback trait for per-page processing events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`] to receive
//! real-time events as each page is processed.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so it works correctly when pages
//! are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use scan2md::{ProcessingProgressCallback, ProcessingConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ProcessingProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, figures: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} figure(s)", page_num, total_pages, figures);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(counter as Arc<dyn ProcessingProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the processing pipeline as it works through a document's pages.
///
/// Implementations must be `Send + Sync` (pages can be processed
/// concurrently). All methods have default no-op implementations so callers
/// only override what they care about.
///
/// # Thread safety
///
/// `on_page_start`, `on_page_complete`, and `on_page_warning` may be called
/// concurrently from different worker tasks. Implementations must protect
/// shared mutable state with appropriate synchronisation primitives
/// (e.g. `Mutex`, `AtomicUsize`).
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called once before any page is processed.
    ///
    /// # Arguments
    /// * `total_pages` — number of page files that will be processed
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's image is loaded.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page finishes (its output markdown was written).
    ///
    /// # Arguments
    /// * `figures` — how many figures were extracted for this page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, figures: usize) {
        let _ = (page_num, total_pages, figures);
    }

    /// Called for each non-fatal anomaly on a page (the page still completes).
    fn on_page_warning(&self, page_num: usize, total_pages: usize, warning: &str) {
        let _ = (page_num, total_pages, warning);
    }

    /// Called once after all pages have been attempted.
    ///
    /// # Arguments
    /// * `figures_total` — figures extracted across the whole run
    fn on_run_complete(&self, total_pages: usize, figures_total: usize) {
        let _ = (total_pages, figures_total);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessingConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;
