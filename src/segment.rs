//! Pipeline orchestration: load → filter blanks → detect → resolve → split.
//!
//! Stages run one after another on the calling thread; only boundary
//! detection fans out to a worker pool, and the orchestrator waits for that
//! whole batch before resolving anything. The first failing stage stops the
//! run and its error is returned unchanged.
//!
//! Intermediate artifacts (the blank-filtered copy of the source) live in a
//! private temporary directory. Its removal is attempted on every exit path:
//! explicitly after the stages finish, and by `TempDir`'s destructor if the
//! thread unwinds.

use crate::config::SegmentationConfig;
use crate::error::{SegmentError, Stage};
use crate::output::{SegmentationReport, SegmentationStats};
use crate::pipeline::detect::{self, PdfPageRenderer};
use crate::pipeline::features::FeatureMatcher;
use crate::pipeline::markers::MarkerSet;
use crate::pipeline::render::RenderSettings;
use crate::pipeline::{blank, engine, input, resolve, split};
use crate::progress::SegmentationProgressCallback;
use pdfium_render::prelude::Pdfium;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

const FILTERED_FILE_NAME: &str = "filtered.pdf";

/// Split the PDF at `input` into `output_dir`, using the marker images in
/// `marker_dir`.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Any [`SegmentError`]; see [`SegmentError::stage`] for where it arose.
///
/// # Example
/// ```rust,no_run
/// use sealsplit::{segment, SegmentationConfig};
///
/// let config = SegmentationConfig::default();
/// let report = segment("bundle.pdf", "footer_images", "split_pdf", &config)?;
/// for doc in &report.outputs {
///     println!("{} ← pages {}–{}", doc.path.display(), doc.range.start + 1, doc.range.end + 1);
/// }
/// # Ok::<(), sealsplit::SegmentError>(())
/// ```
pub fn segment(
    input: impl AsRef<Path>,
    marker_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &SegmentationConfig,
) -> Result<SegmentationReport, SegmentError> {
    notify_stage(config, Stage::LoadMarkers);
    let matcher = matcher_for(config);
    let markers = MarkerSet::load_dir(marker_dir, &matcher).inspect_err(log_failure)?;
    segment_with_markers(input, &markers, output_dir, config)
}

/// Like [`segment`], with a marker set the caller already loaded.
pub fn segment_with_markers(
    input: impl AsRef<Path>,
    markers: &MarkerSet,
    output_dir: impl AsRef<Path>,
    config: &SegmentationConfig,
) -> Result<SegmentationReport, SegmentError> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();
    info!("Starting segmentation: {}", input.display());

    notify_stage(config, Stage::Load);
    let prepared = input::resolve_source(input).and_then(|source| {
        if markers.is_empty() {
            return Err(SegmentError::NoMarkers {
                dir: Path::new("<in-memory>").to_path_buf(),
            });
        }
        split::prepare_output_dir(output_dir, config.clear_output_dir)?;
        let pdfium = engine::bind_pdfium()?;
        let workspace = tempfile::Builder::new()
            .prefix("sealsplit-")
            .tempdir()
            .map_err(|e| SegmentError::Internal {
                stage: Stage::Load,
                detail: format!("cannot create temporary workspace: {e}"),
            })?;
        Ok((source, pdfium, workspace))
    });
    let (source, pdfium, workspace) = prepared.inspect_err(log_failure)?;

    let result = run_stages(
        &pdfium,
        &source,
        markers,
        output_dir,
        workspace.path(),
        config,
    );

    notify_stage(config, Stage::Cleanup);
    let workspace_path = workspace.path().to_path_buf();
    if let Err(e) = workspace.close() {
        warn!(
            "Failed to remove temporary workspace '{}': {}",
            workspace_path.display(),
            e
        );
    }

    let report = result.inspect_err(log_failure)?;
    if let Some(cb) = progress(config) {
        cb.on_complete(&report);
    }
    Ok(report)
}

fn run_stages(
    pdfium: &Pdfium,
    source: &Path,
    markers: &MarkerSet,
    output_dir: &Path,
    workspace: &Path,
    config: &SegmentationConfig,
) -> Result<SegmentationReport, SegmentError> {
    let total_start = Instant::now();
    let settings = RenderSettings {
        dpi: config.dpi,
        max_rendered_pixels: config.max_rendered_pixels,
    };
    let filtered_path = workspace.join(FILTERED_FILE_NAME);

    // ── Step 1: Remove blank pages ───────────────────────────────────────
    notify_stage(config, Stage::FilterBlanks);
    let filter_start = Instant::now();
    let filtered = blank::filter_blank_pages(
        pdfium,
        source,
        &filtered_path,
        config.password.as_deref(),
        config.blank_threshold,
        settings,
    )?;
    let filter_duration_ms = filter_start.elapsed().as_millis() as u64;
    if filtered.kept_page_count == 0 {
        return Err(SegmentError::EmptyDocument {
            original: filtered.original_page_count,
            removed: filtered.removed_pages.len(),
        });
    }
    let page_count = filtered.kept_page_count;

    // ── Step 2: Detect boundary pages (parallel) ─────────────────────────
    notify_stage(config, Stage::DetectBoundaries);
    let workers = config.workers.resolve();
    if let Some(cb) = progress(config) {
        cb.on_detection_start(page_count, workers);
    }
    let detect_start = Instant::now();
    // The filtered copy is written unencrypted.
    let renderer = PdfPageRenderer::new(pdfium, &filtered_path, None, settings);
    let boundaries = detect::detect_boundaries(
        &renderer,
        page_count,
        markers,
        &matcher_for(config),
        workers,
        progress(config),
    )?;
    let detect_duration_ms = detect_start.elapsed().as_millis() as u64;

    // ── Step 3: Resolve split points ─────────────────────────────────────
    notify_stage(config, Stage::ResolveSplits);
    let indices: Vec<usize> = boundaries.iter().map(|b| b.page_index).collect();
    let (split_points, ranges) = resolve::resolve(&indices, page_count);
    info!(
        "{} boundary pages → {} output documents",
        boundaries.len(),
        ranges.len()
    );

    // ── Step 4: Write outputs ────────────────────────────────────────────
    notify_stage(config, Stage::Split);
    let split_start = Instant::now();
    let outputs = split::write_splits(
        pdfium,
        &filtered_path,
        None,
        &ranges,
        output_dir,
        &config.output_prefix,
        progress(config),
    )?;
    let split_duration_ms = split_start.elapsed().as_millis() as u64;

    let stats = SegmentationStats {
        workers,
        filter_duration_ms,
        detect_duration_ms,
        split_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Segmentation complete: {} pages → {} documents, {}ms total",
        page_count,
        outputs.len(),
        stats.total_duration_ms
    );

    Ok(SegmentationReport {
        source: source.to_path_buf(),
        original_page_count: filtered.original_page_count,
        filtered_page_count: page_count,
        removed_pages: filtered.removed_pages,
        boundaries,
        split_points,
        outputs,
        stats,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn matcher_for(config: &SegmentationConfig) -> FeatureMatcher {
    FeatureMatcher::new(config.ratio, config.match_threshold)
}

fn progress(config: &SegmentationConfig) -> Option<&dyn SegmentationProgressCallback> {
    config.progress_callback.as_deref()
}

fn notify_stage(config: &SegmentationConfig, stage: Stage) {
    if let Some(cb) = progress(config) {
        cb.on_stage_start(stage);
    }
}

fn log_failure(e: &SegmentError) {
    error!("Segmentation failed during {}: {}", e.stage(), e);
}
