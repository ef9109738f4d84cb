//! Coordinate resolution: normalized bounding box → validated pixel rect.
//!
//! Upstream bounding boxes are untrusted: the vision model emits coordinates
//! in a nominal 0–1000 space but routinely inverts min/max (pages recorded in
//! an inverted coordinate convention) and occasionally wanders out of range.
//! This stage repairs ordering, clamps against the real image bounds, and
//! rejects anything degenerate — it never guesses a rectangle. Everything
//! here is pure; no I/O, no logging side effects beyond `debug!`.
//!
//! ## Scaling conventions
//!
//! Two conventions exist historically and disagree for non-square images:
//! per-axis (`y` by `height/1000`, `x` by `width/1000`) and a legacy uniform
//! factor (`max(width, height)/1000` on all four values). Per-axis is the
//! canonical mode; uniform is only reachable through an explicit
//! [`ScaleMode::Uniform`] in the config.

use crate::config::ScaleMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A raw bounding box in the upstream model's normalized 0–1000 space.
///
/// Field order follows the upstream payload: `(y_min, x_min, y_max, x_max)`.
/// Values are not guaranteed ordered or in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub y_min: f64,
    pub x_min: f64,
    pub y_max: f64,
    pub x_max: f64,
}

impl NormalizedBox {
    pub fn new(y_min: f64, x_min: f64, y_max: f64, x_max: f64) -> Self {
        Self {
            y_min,
            x_min,
            y_max,
            x_max,
        }
    }

    /// Build a box from an upstream 4-element coordinate list.
    ///
    /// Returns `None` unless exactly four finite numbers are supplied.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        match coords {
            [y_min, x_min, y_max, x_max]
                if coords.iter().all(|c| c.is_finite()) =>
            {
                Some(Self::new(*y_min, *x_min, *y_max, *x_max))
            }
            _ => None,
        }
    }
}

/// A validated crop rectangle in pixel coordinates, right/bottom-exclusive.
///
/// Only constructed by [`resolve`], which guarantees
/// `x_min < x_max <= image_width` and `y_min < y_max <= image_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl PixelRect {
    /// Crop width in pixels. Always > 0.
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    /// Crop height in pixels. Always > 0.
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }
}

/// Convert a normalized box into a pixel rect for an image of the given size.
///
/// Steps, in order:
/// 1. scale each coordinate to pixel space per `mode` (fractions truncate
///    toward zero, matching the historical integer conversion)
/// 2. order repair: swap `y_min`/`y_max` and `x_min`/`x_max` when inverted
/// 3. clamp x into `[0, image_width]`, y into `[0, image_height]`
/// 4. reject the rect if it is empty after clamping
///
/// Returns `None` for a degenerate or fully-out-of-bounds box; the caller
/// leaves the corresponding tag untouched and reports the rejection.
pub fn resolve(
    bbox: &NormalizedBox,
    image_width: u32,
    image_height: u32,
    mode: ScaleMode,
) -> Option<PixelRect> {
    if image_width == 0 || image_height == 0 {
        return None;
    }

    let (scale_x, scale_y) = match mode {
        ScaleMode::PerAxis => (
            f64::from(image_width) / 1000.0,
            f64::from(image_height) / 1000.0,
        ),
        ScaleMode::Uniform => {
            let s = f64::from(image_width.max(image_height)) / 1000.0;
            (s, s)
        }
    };

    let mut y_min = (bbox.y_min * scale_y).trunc();
    let mut x_min = (bbox.x_min * scale_x).trunc();
    let mut y_max = (bbox.y_max * scale_y).trunc();
    let mut x_max = (bbox.x_max * scale_x).trunc();

    // Order repair: upstream min/max ordering is not trustworthy.
    if y_max < y_min {
        std::mem::swap(&mut y_min, &mut y_max);
    }
    if x_max < x_min {
        std::mem::swap(&mut x_min, &mut x_max);
    }

    let clamp_x = |v: f64| v.clamp(0.0, f64::from(image_width)) as u32;
    let clamp_y = |v: f64| v.clamp(0.0, f64::from(image_height)) as u32;

    let rect = PixelRect {
        x_min: clamp_x(x_min),
        y_min: clamp_y(y_min),
        x_max: clamp_x(x_max),
        y_max: clamp_y(y_max),
    };

    if rect.x_max <= rect.x_min || rect.y_max <= rect.y_min {
        debug!(?bbox, ?rect, "rejected degenerate bounding box");
        return None;
    }

    Some(rect)
}
