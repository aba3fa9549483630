//! Boundary detection: find the pages that carry a marker.
//!
//! Every page of the filtered document is one unit of work. Units are
//! spread over a dedicated rayon pool of `workers` threads and the caller
//! blocks until the whole batch is done; nothing downstream sees a partial
//! result. A failing (or panicking) unit fails the batch.
//!
//! Units share nothing mutable. Each opens its own document handle through
//! its [`PageRenderer`], renders its page, and compares it to the read-only
//! marker set.

use crate::error::{SegmentError, Stage};
use crate::output::{BoundaryPage, MatchResult};
use crate::pipeline::engine;
use crate::pipeline::features::{FeatureMatcher, Features};
use crate::pipeline::markers::MarkerSet;
use crate::pipeline::render::{self, RenderSettings};
use crate::progress::SegmentationProgressCallback;
use image::DynamicImage;
use pdfium_render::prelude::*;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Produces the raster of one page. Called concurrently from workers.
pub trait PageRenderer: Sync {
    fn render_page(&self, index: usize) -> Result<DynamicImage, SegmentError>;
}

/// Renders pages of a PDF file, opening a fresh document handle per call.
pub struct PdfPageRenderer<'a> {
    pdfium: &'a Pdfium,
    path: PathBuf,
    password: Option<String>,
    settings: RenderSettings,
}

impl<'a> PdfPageRenderer<'a> {
    pub fn new(
        pdfium: &'a Pdfium,
        path: &Path,
        password: Option<&str>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            pdfium,
            path: path.to_path_buf(),
            password: password.map(str::to_string),
            settings,
        }
    }
}

impl PageRenderer for PdfPageRenderer<'_> {
    fn render_page(&self, index: usize) -> Result<DynamicImage, SegmentError> {
        let document = engine::open_document(self.pdfium, &self.path, self.password.as_deref())?;
        render::render_page(&document, index, self.settings)
    }
}

/// Compare one page's features against the marker set, in marker order.
///
/// With `short_circuit` the scan stops at the first match. That is only a
/// shortcut: the page is a boundary iff some marker matches, and the first
/// matching marker is the same either way.
pub fn match_page(
    page_index: usize,
    page: &Features,
    markers: &MarkerSet,
    matcher: &FeatureMatcher,
    short_circuit: bool,
) -> Vec<MatchResult> {
    let mut results = Vec::with_capacity(markers.len());
    for (marker_index, marker) in markers.iter().enumerate() {
        let outcome = matcher.compare(&marker.features, page);
        debug!(
            "page {} × marker '{}': {} matches{}",
            page_index + 1,
            marker.name,
            outcome.match_count,
            if outcome.is_match { " (hit)" } else { "" }
        );
        results.push(MatchResult {
            page_index,
            marker_index,
            is_match: outcome.is_match,
            match_count: outcome.match_count,
        });
        if outcome.is_match && short_circuit {
            break;
        }
    }
    results
}

/// The boundary a page forms, if any, from its match results.
pub fn boundary_from_results(results: &[MatchResult], markers: &MarkerSet) -> Option<BoundaryPage> {
    results.iter().find(|r| r.is_match).map(|r| BoundaryPage {
        page_index: r.page_index,
        marker_index: r.marker_index,
        marker_name: markers
            .get(r.marker_index)
            .map(|m| m.name.clone())
            .unwrap_or_default(),
        match_count: r.match_count,
    })
}

/// One unit of work: render, extract, compare.
fn evaluate_page<R: PageRenderer>(
    renderer: &R,
    index: usize,
    markers: &MarkerSet,
    matcher: &FeatureMatcher,
) -> Result<Option<BoundaryPage>, SegmentError> {
    let image = renderer.render_page(index)?;
    let features = matcher.extract(&image);
    let results = match_page(index, &features, markers, matcher, true);
    Ok(boundary_from_results(&results, markers))
}

/// Run [`evaluate_page`], turning both errors and panics into `WorkerTask`.
fn run_unit<R: PageRenderer>(
    renderer: &R,
    index: usize,
    markers: &MarkerSet,
    matcher: &FeatureMatcher,
    progress: Option<&dyn SegmentationProgressCallback>,
) -> Result<Option<BoundaryPage>, SegmentError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        evaluate_page(renderer, index, markers, matcher)
    }));
    let result = match outcome {
        Ok(Ok(boundary)) => boundary,
        Ok(Err(e)) => {
            return Err(SegmentError::WorkerTask {
                page: index + 1,
                source: Box::new(e),
            })
        }
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(SegmentError::WorkerTask {
                page: index + 1,
                source: Box::new(SegmentError::Internal {
                    stage: Stage::DetectBoundaries,
                    detail: format!("worker panicked: {detail}"),
                }),
            });
        }
    };
    if let Some(cb) = progress {
        cb.on_page_scanned(index, result.is_some());
    }
    Ok(result)
}

/// Detect boundary pages over `page_count` pages using `workers` threads.
///
/// Returns boundaries sorted by page index. The result does not depend on
/// the pool size or on the order in which units finish.
pub fn detect_boundaries<R: PageRenderer>(
    renderer: &R,
    page_count: usize,
    markers: &MarkerSet,
    matcher: &FeatureMatcher,
    workers: usize,
    progress: Option<&dyn SegmentationProgressCallback>,
) -> Result<Vec<BoundaryPage>, SegmentError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("sealsplit-detect-{i}"))
        .build()
        .map_err(|e| SegmentError::Internal {
            stage: Stage::DetectBoundaries,
            detail: format!("cannot start worker pool: {e}"),
        })?;

    info!(
        "Comparing {} pages against {} markers on {} workers",
        page_count,
        markers.len(),
        workers.max(1)
    );

    // Barrier: `collect` returns only once every unit has finished or the
    // first failure has cancelled the rest.
    let per_page: Vec<Option<BoundaryPage>> = pool.install(|| {
        (0..page_count)
            .into_par_iter()
            .map(|index| run_unit(renderer, index, markers, matcher, progress))
            .collect::<Result<Vec<_>, SegmentError>>()
    })?;

    let mut boundaries: Vec<BoundaryPage> = per_page.into_iter().flatten().collect();
    boundaries.sort_by_key(|b| b.page_index);
    boundaries.dedup_by_key(|b| b.page_index);

    info!(
        "Found {} boundary pages: {:?}",
        boundaries.len(),
        boundaries.iter().map(|b| b.page_index + 1).collect::<Vec<_>>()
    );
    Ok(boundaries)
}
