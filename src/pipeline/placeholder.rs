//! Placeholder parsing: both tag dialects → one ordered placeholder list.
//!
//! Page markdown arrives in one of two dialects, depending on which upstream
//! step produced it:
//!
//! * **Embedded** — the coordinates live inside the tag itself:
//!   `<bbox>y_min,x_min,y_max,x_max</bbox>` (numbers, optionally decimal,
//!   arbitrary whitespace around the commas).
//! * **External** — the text carries bare `<image_here>` markers and the
//!   coordinates arrive separately as an ordered list (typically a JSON
//!   sidecar in the model's output shape).
//!
//! Both dialects collapse into the same [`Placeholder`] list here, so the
//! reconciler has a single substitution rule: the Nth placeholder consumes
//! the Nth box, and it is the *literal tag text* (payload included) that gets
//! searched and replaced downstream. Pairing is strictly positional — never
//! content or spatial matching.

use crate::error::PageWarning;
use crate::pipeline::coords::NormalizedBox;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

/// The bare marker used by the pre-extraction dialect.
pub const MARKER_TAG: &str = "<image_here>";

static RE_BBOX_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<bbox>([\d.,\s]+)</bbox>").unwrap());

/// Where a page's coordinates come from.
#[derive(Debug, Clone)]
pub enum PlaceholderSource {
    /// Coordinates are embedded in `<bbox>` tags in the markdown itself.
    Embedded,
    /// Bare `<image_here>` markers, matched positionally against this
    /// ordered list.
    External(Vec<NormalizedBox>),
}

/// One placeholder occurrence, ordered by text position.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// 1-based occurrence position among all tags on the page. Used for the
    /// figure filename, so a malformed earlier tag leaves a numbering gap
    /// rather than shifting later figures.
    pub index: usize,
    /// The exact tag text to search for and replace, including its original
    /// coordinate payload in the embedded dialect.
    pub literal: String,
    /// The box this occurrence consumes.
    pub bbox: NormalizedBox,
}

/// The parsed placeholder list plus any parse-stage warnings.
#[derive(Debug, Default)]
pub struct ParsedPlaceholders {
    pub placeholders: Vec<Placeholder>,
    pub warnings: Vec<PageWarning>,
}

/// Scan `text` for placeholder occurrences and pair each with a box.
///
/// Occurrences are ordered by text position, first occurrence first. Count
/// mismatches in the external dialect produce `UnmatchedPlaceholders` /
/// `UnusedCoordinates` warnings; malformed embedded payloads produce
/// `MalformedCoordinates` and consume no box.
pub fn parse(text: &str, source: &PlaceholderSource, page: usize) -> ParsedPlaceholders {
    match source {
        PlaceholderSource::Embedded => parse_embedded(text, page),
        PlaceholderSource::External(boxes) => parse_external(text, boxes, page),
    }
}

fn parse_embedded(text: &str, page: usize) -> ParsedPlaceholders {
    let mut out = ParsedPlaceholders::default();

    for (i, caps) in RE_BBOX_TAG.captures_iter(text).enumerate() {
        let index = i + 1;
        let payload = &caps[1];
        let coords: Vec<f64> = payload
            .split(',')
            .filter_map(|c| c.trim().parse::<f64>().ok())
            .collect();

        match NormalizedBox::from_slice(&coords) {
            Some(bbox) => out.placeholders.push(Placeholder {
                index,
                literal: caps[0].to_string(),
                bbox,
            }),
            None => {
                warn!(page, index, payload, "malformed coordinate payload");
                out.warnings.push(PageWarning::MalformedCoordinates {
                    page,
                    index,
                    payload: payload.to_string(),
                });
            }
        }
    }

    out
}

fn parse_external(text: &str, boxes: &[NormalizedBox], page: usize) -> ParsedPlaceholders {
    let mut out = ParsedPlaceholders::default();
    let marker_count = text.matches(MARKER_TAG).count();
    let paired = marker_count.min(boxes.len());

    for (i, bbox) in boxes.iter().take(paired).enumerate() {
        out.placeholders.push(Placeholder {
            index: i + 1,
            literal: MARKER_TAG.to_string(),
            bbox: *bbox,
        });
    }

    if marker_count > boxes.len() {
        let count = marker_count - boxes.len();
        warn!(page, count, "placeholder tags without bounding boxes");
        out.warnings
            .push(PageWarning::UnmatchedPlaceholders { page, count });
    } else if boxes.len() > marker_count {
        let count = boxes.len() - marker_count;
        warn!(page, count, "bounding boxes without placeholder tags");
        out.warnings
            .push(PageWarning::UnusedCoordinates { page, count });
    }

    out
}

// ── Sidecar parsing ──────────────────────────────────────────────────────

/// One entry of a coordinate sidecar.
///
/// The upstream model emits `[{"figure": "name", "bbox": [y,x,y,x]}, …]`;
/// hand-written sidecars often use a plain nested array. Both are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SidecarEntry {
    Tagged {
        #[serde(default)]
        #[allow(dead_code)]
        figure: Option<String>,
        bbox: [f64; 4],
    },
    Plain([f64; 4]),
}

impl SidecarEntry {
    fn into_box(self) -> NormalizedBox {
        let [y_min, x_min, y_max, x_max] = match self {
            SidecarEntry::Tagged { bbox, .. } => bbox,
            SidecarEntry::Plain(bbox) => bbox,
        };
        NormalizedBox::new(y_min, x_min, y_max, x_max)
    }
}

/// Parse a JSON sidecar into an ordered box list.
pub fn parse_sidecar(json: &str) -> Result<Vec<NormalizedBox>, serde_json::Error> {
    let entries: Vec<SidecarEntry> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(SidecarEntry::into_box).collect())
}
