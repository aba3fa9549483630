//! Error types for the sealsplit library.
//!
//! Every failure in the segmentation pipeline is fatal: a run either
//! produces the complete set of split documents or stops at the first
//! stage that went wrong. There is no per-page "soft" error
//! type. A page that cannot be compared would silently change where the
//! document boundaries fall, so it aborts the whole detection batch.
//!
//! Each variant maps to the [`Stage`] that raised it via
//! [`SegmentError::stage`], so callers can report *where* a run failed
//! without parsing messages.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage, used to attribute errors and progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Configuration validation and file loading.
    Configure,
    /// Source validation and PDFium binding.
    Load,
    /// Marker image discovery and feature extraction.
    LoadMarkers,
    /// Blank page removal.
    FilterBlanks,
    /// Parallel marker detection over the filtered pages.
    DetectBoundaries,
    /// Boundary pages → output ranges.
    ResolveSplits,
    /// Writing output documents.
    Split,
    /// Removal of intermediate artifacts.
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Load => "load",
            Stage::LoadMarkers => "load markers",
            Stage::FilterBlanks => "filter blank pages",
            Stage::DetectBoundaries => "detect boundaries",
            Stage::ResolveSplits => "resolve split points",
            Stage::Split => "split",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// All errors returned by the sealsplit library.
#[derive(Debug, Error)]
pub enum SegmentError {
    // ── Source document ───────────────────────────────────────────────────
    /// The source PDF is missing, unreadable, not a PDF, or corrupt.
    #[error("Cannot load PDF '{path}': {detail}")]
    DocumentLoad { path: PathBuf, detail: String },

    /// Every page was classified blank; nothing is left to split.
    #[error("No pages left after blank-page removal ({removed} of {original} pages were blank)")]
    EmptyDocument { original: usize, removed: usize },

    /// pdfium could not rasterise a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Markers ───────────────────────────────────────────────────────────
    /// A marker image exists but cannot be decoded.
    #[error("Cannot load marker image '{path}': {detail}")]
    MarkerLoad { path: PathBuf, detail: String },

    /// The marker directory holds no supported image file.
    #[error("No marker images (jpg, jpeg, png, bmp) found in '{dir}'")]
    NoMarkers { dir: PathBuf },

    // ── Detection ─────────────────────────────────────────────────────────
    /// One per-page comparison unit failed; the whole batch was abandoned.
    #[error("Boundary detection failed on page {page}: {source}")]
    WorkerTask {
        page: usize,
        #[source]
        source: Box<SegmentError>,
    },

    // ── Output ────────────────────────────────────────────────────────────
    /// Writing one output range failed. Earlier outputs are left on disk.
    #[error(
        "Failed to write output #{number} (pages {}–{}) to '{path}': {detail}",
        .start + 1,
        .end + 1
    )]
    SplitWrite {
        number: usize,
        /// First page, 0-based.
        start: usize,
        /// Last page, 0-based and inclusive.
        end: usize,
        path: PathBuf,
        detail: String,
    },

    /// The output directory already holds files and clearing was not requested.
    #[error("Output directory '{path}' is not empty ({entries} entries)\nPass --clean-output to clear it first.")]
    OutputDirNotEmpty { path: PathBuf, entries: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file exists but cannot be read or parsed.
    #[error("Cannot load configuration '{path}': {detail}")]
    ConfigLoad { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the \
executable, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (temp workspace, thread pool, task panic).
    #[error("Internal error during {stage}: {detail}")]
    Internal { stage: Stage, detail: String },
}

impl SegmentError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            SegmentError::DocumentLoad { .. }
            | SegmentError::PdfiumBindingFailed(_)
            | SegmentError::OutputDirNotEmpty { .. } => Stage::Load,
            SegmentError::EmptyDocument { .. } => Stage::FilterBlanks,
            SegmentError::RasterisationFailed { .. } => Stage::FilterBlanks,
            SegmentError::MarkerLoad { .. } | SegmentError::NoMarkers { .. } => {
                Stage::LoadMarkers
            }
            SegmentError::WorkerTask { .. } => Stage::DetectBoundaries,
            SegmentError::SplitWrite { .. } => Stage::Split,
            SegmentError::InvalidConfig(_) | SegmentError::ConfigLoad { .. } => Stage::Configure,
            SegmentError::Internal { stage, .. } => *stage,
        }
    }
}
