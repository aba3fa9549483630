//! Split-point resolution: boundary pages → contiguous output ranges.
//!
//! A boundary page is the *last* page of the document it closes. Boundaries
//! are used literally: two markers on adjacent pages produce a one-page
//! document between them rather than being merged.

use crate::output::PageRange;

/// Split points from boundary page indices: sorted, deduplicated, and
/// restricted to `[0, page_count)`.
pub fn split_points(boundaries: &[usize], page_count: usize) -> Vec<usize> {
    let mut points: Vec<usize> = boundaries
        .iter()
        .copied()
        .filter(|&b| b < page_count)
        .collect();
    points.sort_unstable();
    points.dedup();
    points
}

/// Partition `[0, page_count)` at the given split points.
///
/// Each split point closes one range; pages after the last split point form
/// one trailing range. No boundaries yields a single range covering the
/// whole document, and a zero-page document yields no ranges at all.
pub fn partition(split_points: &[usize], page_count: usize) -> Vec<PageRange> {
    let mut ranges = Vec::with_capacity(split_points.len() + 1);
    let mut start = 0usize;
    for &end in split_points {
        if end < start || end >= page_count {
            continue;
        }
        ranges.push(PageRange { start, end });
        start = end + 1;
    }
    if start < page_count {
        ranges.push(PageRange {
            start,
            end: page_count - 1,
        });
    }
    ranges
}

/// Boundary indices straight to ranges.
pub fn resolve(boundaries: &[usize], page_count: usize) -> (Vec<usize>, Vec<PageRange>) {
    let points = split_points(boundaries, page_count);
    let ranges = partition(&points, page_count);
    (points, ranges)
}
