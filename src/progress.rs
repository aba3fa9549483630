//! Progress-callback trait for segmentation events.
//!
//! Inject an [`Arc<dyn SegmentationProgressCallback>`] via
//! [`crate::config::SegmentationConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use sealsplit::{SegmentationConfig, SegmentationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     scanned: AtomicUsize,
//! }
//!
//! impl SegmentationProgressCallback for CountingCallback {
//!     fn on_page_scanned(&self, _page_index: usize, _matched: bool) {
//!         self.scanned.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { scanned: AtomicUsize::new(0) });
//!
//! let config = SegmentationConfig::builder()
//!     .progress_callback(counter as Arc<dyn SegmentationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use crate::output::{OutputDocument, SegmentationReport};
use std::sync::Arc;

/// Called by the pipeline as it runs.
///
/// Implementations must be `Send + Sync`: detection runs on a worker pool.
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_page_scanned` is called from detection workers, concurrently and in
/// no particular page order. Every other method is called from the thread
/// that started the run.
pub trait SegmentationProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once before the detection batch is submitted.
    ///
    /// # Arguments
    /// * `total_pages` — pages of the filtered document
    /// * `workers`     — size of the worker pool
    fn on_detection_start(&self, total_pages: usize, workers: usize) {
        let _ = (total_pages, workers);
    }

    /// Called when one page has been compared against the marker set.
    ///
    /// # Arguments
    /// * `page_index` — 0-based index into the filtered document
    /// * `matched`    — whether any marker matched
    fn on_page_scanned(&self, page_index: usize, matched: bool) {
        let _ = (page_index, matched);
    }

    /// Called after each output file is written.
    fn on_document_written(&self, document: &OutputDocument) {
        let _ = document;
    }

    /// Called once after a successful run.
    fn on_complete(&self, report: &SegmentationReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SegmentationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SegmentationConfig`].
pub type ProgressCallback = Arc<dyn SegmentationProgressCallback>;
