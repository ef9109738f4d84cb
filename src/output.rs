//! Output types: per-page reports and run-level statistics.
//!
//! A run returns [`RunOutput`] even when individual pages or tags fail; the
//! caller inspects [`RunStats::pages_with_warnings`] and each
//! [`PageReport::warnings`] to decide whether partial success is acceptable.
//! Everything here derives serde so `--json` output and downstream tooling
//! get a stable machine-readable shape.

use crate::error::PageWarning;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The outcome of processing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number, parsed from the markdown filename.
    pub page_num: usize,
    /// Where the rewritten markdown was written.
    pub output_path: PathBuf,
    /// Filenames of the figures extracted for this page, in tag order.
    pub figures: Vec<String>,
    /// Non-fatal anomalies encountered on this page.
    pub warnings: Vec<PageWarning>,
    /// Wall-clock processing time for this page.
    pub duration_ms: u64,
}

impl PageReport {
    /// True when the page completed without any anomaly.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Aggregate statistics for a processing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Page markdown files found in the input directory.
    pub total_pages: usize,
    /// Pages whose output markdown was written.
    pub processed_pages: usize,
    /// Pages that emitted at least one warning.
    pub pages_with_warnings: usize,
    /// Figures extracted across all pages.
    pub figures_extracted: usize,
    /// Total wall-clock duration of the run.
    pub total_duration_ms: u64,
}

/// Full result of a folder-level processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// Per-page reports, sorted by page number.
    pub reports: Vec<PageReport>,
    /// Aggregate statistics.
    pub stats: RunStats,
}

impl RunOutput {
    /// Assemble stats from a set of reports.
    pub(crate) fn from_reports(mut reports: Vec<PageReport>, total_duration_ms: u64) -> Self {
        reports.sort_by_key(|r| r.page_num);
        let stats = RunStats {
            total_pages: reports.len(),
            processed_pages: reports.len(),
            pages_with_warnings: reports.iter().filter(|r| !r.is_clean()).count(),
            figures_extracted: reports.iter().map(|r| r.figures.len()).sum(),
            total_duration_ms,
        };
        Self { reports, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(page_num: usize, figures: usize, warnings: usize) -> PageReport {
        PageReport {
            page_num,
            output_path: PathBuf::from(format!("processed_markdown/page_{page_num:03}.md")),
            figures: (1..=figures)
                .map(|i| format!("image_page{page_num:02}_{i:03}.png"))
                .collect(),
            warnings: (0..warnings)
                .map(|_| PageWarning::UnusedCoordinates {
                    page: page_num,
                    count: 1,
                })
                .collect(),
            duration_ms: 5,
        }
    }

    #[test]
    fn stats_aggregate_and_sort() {
        let out = RunOutput::from_reports(vec![report(3, 2, 1), report(1, 0, 0)], 42);
        assert_eq!(out.reports[0].page_num, 1);
        assert_eq!(out.stats.total_pages, 2);
        assert_eq!(out.stats.figures_extracted, 2);
        assert_eq!(out.stats.pages_with_warnings, 1);
        assert_eq!(out.stats.total_duration_ms, 42);
    }

    #[test]
    fn clean_report() {
        assert!(report(1, 1, 0).is_clean());
        assert!(!report(1, 1, 2).is_clean());
    }

    #[test]
    fn report_serialises() {
        let r = report(2, 1, 0);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("image_page02_001.png"));
    }
}
