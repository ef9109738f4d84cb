//! Pipeline stages for figure extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. change the placeholder grammar) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! placeholder ──▶ coords ──▶ extract ──▶ reconcile
//! (tag grammar)  (box→rect)  (crop+save)  (substitute)
//! ```
//!
//! 1. [`placeholder`] — parse both tag dialects (coordinate-in-tag and bare
//!    marker + sidecar list) into one ordered placeholder list
//! 2. [`coords`]      — pure conversion of a normalized 0–1000 box into a
//!    validated pixel rectangle (scale, order-repair, clamp, reject)
//! 3. [`extract`]     — crop the rectangle from the page image and persist
//!    it under the deterministic `image_page{pp}_{iii}.png` name
//! 4. [`reconcile`]   — substitute each tag, in occurrence order, with its
//!    figure reference; collect warnings for every anomaly

pub mod coords;
pub mod extract;
pub mod placeholder;
pub mod reconcile;
