//! # sealsplit
//!
//! Split one scanned PDF that concatenates several official documents into
//! one file per document, using the seal (or any other stamp) that closes
//! each document as the boundary marker.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Load     validate the path, bind pdfium
//!  ├─ 2. Filter   drop textless, near-white pages into a filtered copy
//!  ├─ 3. Detect   match every page against the marker images (worker pool)
//!  ├─ 4. Resolve  each marker page closes a document; the rest is a tail
//!  ├─ 5. Split    write split_1.pdf, split_2.pdf, … page-for-page
//!  └─ 6. Cleanup  remove the filtered copy
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sealsplit::{segment, SegmentationConfig, WorkerCount};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SegmentationConfig::builder()
//!         .match_threshold(20)
//!         .workers(WorkerCount::Auto)
//!         .build()?;
//!     let report = segment("bundle.pdf", "footer_images", "split_pdf", &config)?;
//!     eprintln!("{} documents, {} blank pages removed",
//!         report.outputs.len(), report.removed_pages.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sealsplit` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## PDFium
//!
//! Rendering and page copying go through a dynamically loaded pdfium
//! library. Point `PDFIUM_LIB_PATH` at it, put it next to the executable, or
//! install it system-wide.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod segment;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SegmentationConfig, SegmentationConfigBuilder, WorkerCount};
pub use error::{SegmentError, Stage};
pub use output::{
    BoundaryPage, MatchResult, OutputDocument, PageRange, SegmentationReport, SegmentationStats,
};
pub use pipeline::features::{FeatureMatcher, MatchOutcome};
pub use pipeline::markers::MarkerSet;
pub use progress::{NoopProgressCallback, ProgressCallback, SegmentationProgressCallback};
pub use segment::{segment, segment_with_markers};
