//! Figure extraction: crop a pixel rect from the page image and persist it.
//!
//! Filenames are deterministic — `image_page{pp}_{iii}.png`, zero-padded to
//! 2-digit page and 3-digit figure numbers so lexicographic order equals
//! numeric order and no two figures can collide across up to 99 pages × 999
//! figures. A corpus larger than that needs wider padding and a new
//! documented bound.
//!
//! The crop is always taken from the unannotated source buffer; when
//! annotation is requested, the rectangle outline is drawn on a *copy* of the
//! page and saved under the distinct `_bbox` suffix first. The annotated
//! image is a debugging aid only — nothing downstream reads it.

use crate::pipeline::coords::PixelRect;
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Outline colour for annotated debug images (opaque green).
const OUTLINE: Rgba<u8> = Rgba([0, 255, 0, 255]);
const OUTLINE_THICKNESS: u32 = 2;

/// A successfully extracted figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFigure {
    /// Bare filename of the persisted crop, e.g. `image_page03_002.png`.
    pub filename: String,
    /// Markdown image reference that replaces the placeholder tag,
    /// e.g. `![Image 3_2](../markdown_images/image_page03_002.png)`.
    pub reference: String,
}

/// Failure extracting one figure. Scoped to a single tag; the caller
/// converts it into a [`crate::error::PageWarning`] and moves on.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The rect does not fit the image (re-checked defensively even though
    /// the resolver already validated against the same dimensions).
    #[error("crop rectangle {rect:?} does not fit a {width}x{height} image")]
    BadRect {
        rect: PixelRect,
        width: u32,
        height: u32,
    },

    /// The cropped figure could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Deterministic figure filename for `(page, index)`.
pub fn figure_filename(page_number: usize, figure_index: usize) -> String {
    format!("image_page{page_number:02}_{figure_index:03}.png")
}

/// Filename of the annotated debug copy for `(page, index)`.
pub fn annotated_filename(page_number: usize, figure_index: usize) -> String {
    format!("image_page{page_number:02}_{figure_index:03}_bbox.png")
}

/// Crop `rect` from `page_image` and persist it in `figures_dir`.
///
/// When `annotate` is set, an outlined copy of the full page is saved first
/// under the `_bbox` name. A failure writing the debug copy is logged and
/// does not fail the figure — only the crop itself matters downstream.
///
/// The returned reference uses `figures_rel_path` as the path prefix, so the
/// link resolves from wherever the processed markdown is written.
pub fn extract(
    page_image: &DynamicImage,
    rect: PixelRect,
    page_number: usize,
    figure_index: usize,
    figures_dir: &Path,
    figures_rel_path: &str,
    annotate: bool,
) -> Result<ExtractedFigure, ExtractError> {
    let (width, height) = (page_image.width(), page_image.height());
    if rect.x_max > width || rect.y_max > height || rect.width() == 0 || rect.height() == 0 {
        return Err(ExtractError::BadRect {
            rect,
            width,
            height,
        });
    }

    if annotate {
        let mut annotated = page_image.to_rgba8();
        draw_outline(&mut annotated, rect);
        let path = figures_dir.join(annotated_filename(page_number, figure_index));
        if let Err(e) = annotated.save(&path) {
            warn!(path = %path.display(), error = %e, "failed to write annotated page copy");
        } else {
            debug!(path = %path.display(), "annotated page copy written");
        }
    }

    let crop = page_image.crop_imm(rect.x_min, rect.y_min, rect.width(), rect.height());
    let filename = figure_filename(page_number, figure_index);
    let path = figures_dir.join(&filename);
    crop.save(&path).map_err(|source| ExtractError::Write {
        path: path.clone(),
        source,
    })?;

    debug!(
        path = %path.display(),
        width = rect.width(),
        height = rect.height(),
        "figure crop written"
    );

    let rel = figures_rel_path.trim_end_matches('/');
    let reference = format!(
        "![Image {page_number}_{figure_index}]({rel}/{filename})"
    );

    Ok(ExtractedFigure {
        filename,
        reference,
    })
}

/// Draw a rectangle outline on the annotated copy, clamped to the image.
fn draw_outline(img: &mut RgbaImage, rect: PixelRect) {
    let (width, height) = img.dimensions();
    for t in 0..OUTLINE_THICKNESS {
        for x in rect.x_min..rect.x_max.min(width) {
            let top = rect.y_min + t;
            if top < height {
                img.put_pixel(x, top, OUTLINE);
            }
            let bottom = rect.y_max.saturating_sub(1 + t);
            if bottom >= rect.y_min && bottom < height {
                img.put_pixel(x, bottom, OUTLINE);
            }
        }
        for y in rect.y_min..rect.y_max.min(height) {
            let left = rect.x_min + t;
            if left < width {
                img.put_pixel(left, y, OUTLINE);
            }
            let right = rect.x_max.saturating_sub(1 + t);
            if right >= rect.x_min && right < width {
                img.put_pixel(right, y, OUTLINE);
            }
        }
    }
}
