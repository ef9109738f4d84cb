//! Markdown reconciliation: substitute placeholder tags with figure links.
//!
//! The single substitution rule for both dialects: walk the placeholders in
//! occurrence order, and for each successfully extracted figure replace **the
//! first remaining literal occurrence of that exact tag text**. Duplicate
//! identical tags are therefore replaced one at a time, each consuming
//! exactly one bounding box. Because of that "first remaining occurrence"
//! semantics, boxes within a page must be processed sequentially.
//!
//! Substitution is best-effort per tag, never all-or-nothing: a rejected box
//! or failed extraction leaves its tag untouched, records a warning, and the
//! scan moves on. The rewritten text is always returned.

use crate::config::ScaleMode;
use crate::error::PageWarning;
use crate::pipeline::coords;
use crate::pipeline::extract::{self, ExtractError};
use crate::pipeline::placeholder::{self, PlaceholderSource};
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, warn};

/// Per-page inputs the reconciler needs besides the text itself.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub page_number: usize,
    pub figures_dir: &'a Path,
    pub figures_rel_path: &'a str,
    pub scale_mode: ScaleMode,
    pub annotate: bool,
}

/// Result of reconciling one page.
#[derive(Debug)]
pub struct Reconciled {
    /// The rewritten markdown (always produced, even on partial failure).
    pub text: String,
    /// Filenames of the figures that were extracted, in tag order.
    pub figures: Vec<String>,
    /// Every anomaly encountered, in the order it occurred.
    pub warnings: Vec<PageWarning>,
}

/// Substitute placeholder tags in `text` with references to extracted figures.
pub fn reconcile(
    text: &str,
    source: &PlaceholderSource,
    page_image: &DynamicImage,
    ctx: &ReconcileContext<'_>,
) -> Reconciled {
    let parsed = placeholder::parse(text, source, ctx.page_number);
    let mut out = Reconciled {
        text: text.to_string(),
        figures: Vec::with_capacity(parsed.placeholders.len()),
        warnings: parsed.warnings,
    };

    let (width, height) = (page_image.width(), page_image.height());

    for ph in &parsed.placeholders {
        let Some(rect) = coords::resolve(&ph.bbox, width, height, ctx.scale_mode) else {
            warn!(
                page = ctx.page_number,
                index = ph.index,
                bbox = ?ph.bbox,
                "bounding box rejected; tag left untouched"
            );
            out.warnings.push(PageWarning::DegenerateBox {
                page: ctx.page_number,
                index: ph.index,
                y_min: ph.bbox.y_min,
                x_min: ph.bbox.x_min,
                y_max: ph.bbox.y_max,
                x_max: ph.bbox.x_max,
            });
            continue;
        };

        match extract::extract(
            page_image,
            rect,
            ctx.page_number,
            ph.index,
            ctx.figures_dir,
            ctx.figures_rel_path,
            ctx.annotate,
        ) {
            Ok(figure) => {
                debug!(
                    page = ctx.page_number,
                    index = ph.index,
                    filename = %figure.filename,
                    "substituting placeholder"
                );
                // First remaining occurrence of the exact literal tag text.
                out.text = out.text.replacen(&ph.literal, &figure.reference, 1);
                out.figures.push(figure.filename);
            }
            Err(ExtractError::Write { path, source }) => {
                out.warnings.push(PageWarning::WriteFailure {
                    page: ctx.page_number,
                    path: path.display().to_string(),
                    detail: source.to_string(),
                });
            }
            Err(e @ ExtractError::BadRect { .. }) => {
                out.warnings.push(PageWarning::ExtractionFailed {
                    page: ctx.page_number,
                    index: ph.index,
                    detail: e.to_string(),
                });
            }
        }
    }

    out
}
