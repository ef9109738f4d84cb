//! Streaming processing API: emit page reports as they complete.
//!
//! ## Why stream?
//!
//! Large documents take a while. A stream-based API lets callers display
//! partial results immediately, wire up progress bars, or forward reports
//! incrementally instead of buffering the entire run in memory.
//!
//! Unlike the eager [`crate::process::process_folder`] which returns only
//! after all pages finish, [`process_stream`] yields a [`PageReport`] as
//! each page completes. Pages are processed concurrently, so reports arrive
//! in completion order — sort by `page_num` if order matters.

use crate::config::ProcessingConfig;
use crate::error::Scan2MdError;
use crate::output::PageReport;
use crate::process::{self, process_page};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page reports.
///
/// Items are `Err` only when a page worker task panicked; every ordinary
/// anomaly is carried inside the report's warnings.
pub type PageReportStream = Pin<Box<dyn Stream<Item = Result<PageReport, Scan2MdError>> + Send>>;

/// Process a document folder, streaming page reports as they are ready.
///
/// Takes the same inputs as [`crate::process::process_folder`]; setup errors
/// (missing directories, unreadable markdown, corrupt sidecars) are returned
/// eagerly before the stream is built.
pub async fn process_stream(
    root: impl AsRef<Path>,
    boxes_dir: Option<&Path>,
    config: &ProcessingConfig,
) -> Result<PageReportStream, Scan2MdError> {
    let plan = process::prepare_run(root.as_ref(), boxes_dir)?;
    info!(
        root = %root.as_ref().display(),
        pages = plan.pages.len(),
        "starting streaming run"
    );

    let images_dir = plan.images_dir;
    let figures_dir = plan.figures_dir;
    let output_dir = plan.output_dir;
    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(plan.pages.into_iter().map(move |page| {
        let images_dir = images_dir.clone();
        let figures_dir = figures_dir.clone();
        let output_dir = output_dir.clone();
        let config = config.clone();
        async move {
            tokio::task::spawn_blocking(move || {
                process_page(&page, &images_dir, &figures_dir, &output_dir, &config)
            })
            .await
            .map_err(|e| Scan2MdError::Internal(format!("page task panicked: {e}")))
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
