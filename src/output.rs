//! Result types produced by a segmentation run.
//!
//! Everything here is `Serialize` so the CLI can emit it as JSON. The report
//! is diagnostic: downstream consumers depend on the output files, not on
//! the exact shape of these structs.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Outcome of comparing one page against one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// 0-based index into the filtered document.
    pub page_index: usize,
    /// Index into the (name-sorted) marker set.
    pub marker_index: usize,
    /// `match_count > match_threshold`.
    pub is_match: bool,
    /// Correspondences that passed the ratio test.
    pub match_count: usize,
}

/// A filtered-document page on which at least one marker was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryPage {
    /// 0-based index into the filtered document.
    pub page_index: usize,
    /// The first marker (in set order) that matched.
    pub marker_index: usize,
    /// File name of that marker.
    pub marker_name: String,
    /// Its accepted-correspondence count.
    pub match_count: usize,
}

/// A contiguous, inclusive page range of the filtered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Number of pages in the range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; ranges hold at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// One written output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDocument {
    /// 1-based sequence number, as used in the file name.
    pub number: usize,
    /// Pages of the filtered document this file holds.
    pub range: PageRange,
    /// Page count of the file.
    pub pages: usize,
    /// Where it was written.
    pub path: PathBuf,
}

/// Wall-clock timings for the heavy stages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentationStats {
    /// Worker pool size used for detection.
    pub workers: usize,
    pub filter_duration_ms: u64,
    pub detect_duration_ms: u64,
    pub split_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a run decided, for logging and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationReport {
    pub source: PathBuf,
    pub original_page_count: usize,
    pub filtered_page_count: usize,
    /// 1-based page numbers of the source that were dropped as blank.
    pub removed_pages: Vec<usize>,
    /// Sorted by `page_index`.
    pub boundaries: Vec<BoundaryPage>,
    /// Inclusive end index of each output except a trailing remainder.
    pub split_points: Vec<usize>,
    pub outputs: Vec<OutputDocument>,
    pub stats: SegmentationStats,
}

impl SegmentationReport {
    /// Boundary table: 1-based page, match count, and which output the page
    /// closes out of how many.
    pub fn summary_table(&self) -> String {
        let total = self.outputs.len();
        let mut out = String::new();
        let _ = writeln!(out, "{:<10}{:<10}{:<16}{}", "Page", "Matches", "Marker", "Output");
        let _ = writeln!(out, "{}", "-".repeat(50));
        for (i, b) in self.boundaries.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<10}{:<10}{:<16}{}/{}",
                b.page_index + 1,
                b.match_count,
                truncate(&b.marker_name, 15),
                i + 1,
                total
            );
        }
        out
    }

    /// Removed page numbers grouped five per line.
    pub fn removed_pages_lines(&self) -> Vec<String> {
        self.removed_pages
            .chunks(5)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}
