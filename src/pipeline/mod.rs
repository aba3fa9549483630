//! Pipeline stages for PDF segmentation.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the orchestrator in [`crate::segment`] only sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ blank ──▶ detect ──▶ resolve ──▶ split
//! (path)   (filter)  (parallel)  (ranges)   (files)
//!             │          │
//!           render    features ◀── markers
//! ```
//!
//! 1. [`input`]    — validate the source path before pdfium sees it
//! 2. [`engine`]   — bind pdfium; open one document handle per caller
//! 3. [`render`]   — rasterise one page at the configured DPI
//! 4. [`blank`]    — drop textless, near-white pages into a filtered copy
//! 5. [`markers`]  — load the reference images and their features
//! 6. [`features`] — keypoints, descriptors and the ratio-tested match count
//! 7. [`detect`]   — fan the per-page comparisons out over a worker pool
//! 8. [`resolve`]  — turn boundary pages into a partition of the document
//! 9. [`split`]    — write each range as its own PDF

pub mod blank;
pub mod detect;
pub mod engine;
pub mod features;
pub mod input;
pub mod markers;
pub mod render;
pub mod resolve;
pub mod split;
