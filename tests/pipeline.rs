//! End-to-end tests for the segmentation pipeline.
//!
//! Source PDFs are generated on the fly (see `common`). Tests that render or
//! write PDFs need the native pdfium library; they print `SKIP` and pass when
//! it cannot be bound. Run them with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test pipeline -- --nocapture

#[macro_use]
mod common;

use common::{page_image_bytes, stamp, write_markers, write_pdf, PageSpec};
use pdfium_render::prelude::*;
use sealsplit::pipeline::{engine::bind_pdfium, split::write_splits};
use sealsplit::{
    segment, OutputDocument, PageRange, SegmentError, SegmentationConfig,
    SegmentationProgressCallback, SegmentationReport, Stage, WorkerCount,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Workspace {
    _root: tempfile::TempDir,
    input: PathBuf,
    markers: PathBuf,
    output: PathBuf,
}

fn workspace(pages: &[PageSpec], markers: &[(&str, &image::GrayImage)]) -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("bundle.pdf");
    let marker_dir = root.path().join("footer_images");
    let output = root.path().join("split_pdf");
    write_pdf(&input, pages);
    write_markers(&marker_dir, markers);
    Workspace {
        input,
        markers: marker_dir,
        output,
        _root: root,
    }
}

fn config() -> SegmentationConfig {
    SegmentationConfig::builder()
        .match_threshold(10)
        .workers(WorkerCount::Fixed(3))
        .build()
        .unwrap()
}

/// Page count and per-page text of a written PDF.
fn read_pages(path: &Path) -> Vec<String> {
    let pdfium = bind_pdfium().unwrap();
    let document = pdfium.load_pdf_from_file(path, None).unwrap();
    document
        .pages()
        .iter()
        .map(|page| page.text().map(|t| t.all().trim().to_string()).unwrap_or_default())
        .collect()
}

fn labels(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("Page {i}")).collect()
}

fn spans(report: &SegmentationReport) -> Vec<(usize, usize)> {
    report
        .outputs
        .iter()
        .map(|d| (d.range.start, d.range.end))
        .collect()
}

// ── Happy paths ──────────────────────────────────────────────────────────────

#[test]
fn test_two_seals_split_eight_pages_into_three() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages: Vec<PageSpec> = (1..=8)
        .map(|i| {
            if i == 3 || i == 6 {
                PageSpec::stamped(format!("Page {i}"), &seal)
            } else {
                PageSpec::text(format!("Page {i}"))
            }
        })
        .collect();
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();

    assert_eq!(report.original_page_count, 8);
    assert_eq!(report.filtered_page_count, 8);
    assert!(report.removed_pages.is_empty());
    assert_eq!(report.split_points, vec![2, 5]);
    assert_eq!(spans(&report), vec![(0, 2), (3, 5), (6, 7)]);

    let names: Vec<String> = report
        .outputs
        .iter()
        .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["split_1.pdf", "split_2.pdf", "split_3.pdf"]);

    assert_eq!(read_pages(&ws.output.join("split_1.pdf")), labels(1..=3));
    assert_eq!(read_pages(&ws.output.join("split_2.pdf")), labels(4..=6));
    assert_eq!(read_pages(&ws.output.join("split_3.pdf")), labels(7..=8));
}

#[test]
fn test_no_seal_writes_single_document() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages: Vec<PageSpec> = (1..=5).map(|i| PageSpec::text(format!("Page {i}"))).collect();
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();

    assert!(report.boundaries.is_empty());
    assert_eq!(spans(&report), vec![(0, 4)]);
    assert_eq!(read_pages(&report.outputs[0].path), labels(1..=5));
}

#[test]
fn test_seal_on_last_page_leaves_no_tail() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![
        PageSpec::text("Page 1"),
        PageSpec::stamped("Page 2", &seal),
        PageSpec::text("Page 3"),
        PageSpec::stamped("Page 4", &seal),
    ];
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();

    assert_eq!(spans(&report), vec![(0, 1), (2, 3)]);
    assert_eq!(std::fs::read_dir(&ws.output).unwrap().count(), 2);
}

#[test]
fn test_blank_pages_are_removed_before_detection() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![
        PageSpec::text("Page 1"),
        PageSpec::Blank,
        PageSpec::stamped("Page 2", &seal),
        PageSpec::Blank,
        PageSpec::text("Page 3"),
        PageSpec::text("Page 4"),
    ];
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();

    assert_eq!(report.original_page_count, 6);
    assert_eq!(report.filtered_page_count, 4);
    assert_eq!(report.removed_pages, vec![2, 4]);
    // Indices refer to the filtered document.
    assert_eq!(report.split_points, vec![1]);
    assert_eq!(read_pages(&report.outputs[0].path), labels(1..=2));
    assert_eq!(read_pages(&report.outputs[1].path), labels(3..=4));
}

#[test]
fn test_textless_stamp_page_is_kept_and_detected() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![
        PageSpec::text("Page 1"),
        PageSpec::StampOnly(seal.clone()),
        PageSpec::text("Page 3"),
    ];
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();

    assert!(report.removed_pages.is_empty());
    assert_eq!(spans(&report), vec![(0, 1), (2, 2)]);
}

#[test]
fn test_first_matching_marker_is_reported() {
    let _guard = skip_without_pdfium!();
    let round = stamp(11);
    let square = stamp(29);
    let pages = vec![
        PageSpec::stamped("Page 1", &square),
        PageSpec::text("Page 2"),
        PageSpec::stamped("Page 3", &round),
    ];
    let ws = workspace(&pages, &[("a_round.png", &round), ("b_square.png", &square)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();

    let found: Vec<(usize, &str)> = report
        .boundaries
        .iter()
        .map(|b| (b.page_index, b.marker_name.as_str()))
        .collect();
    assert_eq!(found, vec![(0, "b_square.png"), (2, "a_round.png")]);
    assert_eq!(report.boundaries[0].marker_index, 1);
    assert_eq!(report.boundaries[1].marker_index, 0);
}

#[test]
fn test_result_does_not_depend_on_worker_count() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages: Vec<PageSpec> = (1..=6)
        .map(|i| {
            if i % 2 == 0 {
                PageSpec::stamped(format!("Page {i}"), &seal)
            } else {
                PageSpec::text(format!("Page {i}"))
            }
        })
        .collect();
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let mut reference = None;
    for workers in [1, 2, 6] {
        let config = SegmentationConfig::builder()
            .match_threshold(10)
            .workers(WorkerCount::Fixed(workers))
            .clear_output_dir(true)
            .build()
            .unwrap();
        let report = segment(&ws.input, &ws.markers, &ws.output, &config).unwrap();
        assert_eq!(report.stats.workers, workers);
        let decided = (report.boundaries.clone(), spans(&report));
        match &reference {
            None => reference = Some(decided),
            Some(r) => assert_eq!(&decided, r, "workers = {workers}"),
        }
    }
}

#[test]
fn test_clean_output_replaces_previous_run() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![PageSpec::text("Page 1"), PageSpec::text("Page 2")];
    let ws = workspace(&pages, &[("seal.png", &seal)]);
    std::fs::create_dir_all(&ws.output).unwrap();
    std::fs::write(ws.output.join("split_7.pdf"), b"stale").unwrap();

    let config = SegmentationConfig::builder()
        .clear_output_dir(true)
        .output_prefix("case")
        .build()
        .unwrap();
    segment(&ws.input, &ws.markers, &ws.output, &config).unwrap();

    let mut entries: Vec<String> = std::fs::read_dir(&ws.output)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["case_1.pdf"]);
}

#[test]
fn test_report_serialises_to_json() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![PageSpec::stamped("Page 1", &seal), PageSpec::text("Page 2")];
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["filtered_page_count"], 2);
    assert_eq!(json["outputs"].as_array().unwrap().len(), 2);
    assert_eq!(json["outputs"][0]["pages"], 1);
    assert_eq!(json["outputs"][1]["pages"], 1);
    assert_eq!(json["boundaries"][0]["marker_name"], "seal.png");
}

#[test]
fn test_pages_are_copied_without_re_encoding() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![
        PageSpec::StampOnly(stamp(21)),
        PageSpec::Blank,
        PageSpec::stamped("Page 2", &seal),
        PageSpec::text("Page 3"),
        PageSpec::StampOnly(stamp(22)),
    ];
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let report = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap();
    assert_eq!(report.removed_pages, vec![2]);

    let mut expected = page_image_bytes(&ws.input);
    expected.remove(1);
    let written: Vec<Option<Vec<u8>>> = report
        .outputs
        .iter()
        .flat_map(|doc| page_image_bytes(&doc.path))
        .collect();
    assert_eq!(written.len(), 4);
    assert!(written[0].is_some() && written[3].is_some());
    assert_eq!(written, expected);
    assert_eq!(report.outputs.iter().map(|d| d.pages).sum::<usize>(), 4);
}

// ── Write failures ───────────────────────────────────────────────────────────

#[test]
fn test_failed_write_stops_remaining_outputs() {
    let _guard = skip_without_pdfium!();
    let pages: Vec<PageSpec> = (1..=6).map(|i| PageSpec::text(format!("Page {i}"))).collect();
    let ws = workspace(&pages, &[]);
    std::fs::create_dir_all(ws.output.join("split_2.pdf")).unwrap();
    let ranges = [
        PageRange { start: 0, end: 1 },
        PageRange { start: 2, end: 3 },
        PageRange { start: 4, end: 5 },
    ];

    let pdfium = bind_pdfium().unwrap();
    let err = write_splits(&pdfium, &ws.input, None, &ranges, &ws.output, "split", None)
        .unwrap_err();
    drop(pdfium);

    assert!(
        matches!(err, SegmentError::SplitWrite { number: 2, start: 2, end: 3, .. }),
        "{err:?}"
    );
    assert_eq!(err.stage(), Stage::Split);
    assert!(err.to_string().contains("pages 3–4"), "{err}");
    assert_eq!(read_pages(&ws.output.join("split_1.pdf")), labels(1..=2));
    assert!(!ws.output.join("split_3.pdf").exists());
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<Stage>>,
    total: AtomicUsize,
    scanned: AtomicUsize,
    written: AtomicUsize,
    completed: AtomicUsize,
}

impl SegmentationProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
    fn on_detection_start(&self, total_pages: usize, _workers: usize) {
        self.total.store(total_pages, Ordering::SeqCst);
    }
    fn on_page_scanned(&self, _page_index: usize, _matched: bool) {
        self.scanned.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_written(&self, _document: &OutputDocument) {
        self.written.fetch_add(1, Ordering::SeqCst);
    }
    fn on_complete(&self, _report: &SegmentationReport) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_progress_events_follow_the_run() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![
        PageSpec::text("Page 1"),
        PageSpec::Blank,
        PageSpec::stamped("Page 2", &seal),
        PageSpec::text("Page 3"),
    ];
    let ws = workspace(&pages, &[("seal.png", &seal)]);
    let recorder = Arc::new(Recorder::default());
    let config = SegmentationConfig::builder()
        .match_threshold(10)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let report = segment(&ws.input, &ws.markers, &ws.output, &config).unwrap();

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![
            Stage::LoadMarkers,
            Stage::Load,
            Stage::FilterBlanks,
            Stage::DetectBoundaries,
            Stage::ResolveSplits,
            Stage::Split,
            Stage::Cleanup,
        ]
    );
    assert_eq!(recorder.total.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.scanned.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.written.load(Ordering::SeqCst), report.outputs.len());
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 1);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn test_all_blank_document_is_rejected() {
    let _guard = skip_without_pdfium!();
    let seal = stamp(11);
    let pages = vec![PageSpec::Blank, PageSpec::Blank, PageSpec::Blank];
    let ws = workspace(&pages, &[("seal.png", &seal)]);

    let err = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap_err();

    assert!(
        matches!(err, SegmentError::EmptyDocument { original: 3, removed: 3 }),
        "{err:?}"
    );
    assert_eq!(err.stage(), Stage::FilterBlanks);
    assert_eq!(std::fs::read_dir(&ws.output).unwrap().count(), 0);
}

#[test]
fn test_missing_input_fails_at_load() {
    let seal = stamp(11);
    let ws = workspace(&[PageSpec::text("Page 1")], &[("seal.png", &seal)]);
    let missing = ws.input.with_file_name("nope.pdf");

    let err = segment(&missing, &ws.markers, &ws.output, &config()).unwrap_err();

    assert!(matches!(err, SegmentError::DocumentLoad { .. }), "{err:?}");
    assert_eq!(err.stage(), Stage::Load);
    assert!(!ws.output.exists());
}

#[test]
fn test_non_pdf_input_fails_at_load() {
    let seal = stamp(11);
    let ws = workspace(&[PageSpec::text("Page 1")], &[("seal.png", &seal)]);
    std::fs::write(&ws.input, b"GIF89a not a pdf").unwrap();

    let err = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap_err();

    assert!(matches!(err, SegmentError::DocumentLoad { .. }), "{err:?}");
}

#[test]
fn test_empty_marker_directory_fails() {
    let ws = workspace(&[PageSpec::text("Page 1")], &[]);
    std::fs::write(ws.markers.join("notes.txt"), b"not an image").unwrap();

    let err = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap_err();

    assert!(matches!(err, SegmentError::NoMarkers { .. }), "{err:?}");
    assert_eq!(err.stage(), Stage::LoadMarkers);
}

#[test]
fn test_corrupt_marker_image_fails() {
    let seal = stamp(11);
    let ws = workspace(&[PageSpec::text("Page 1")], &[("seal.png", &seal)]);
    std::fs::write(ws.markers.join("broken.png"), b"\x89PNG truncated").unwrap();

    let err = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap_err();

    assert!(matches!(err, SegmentError::MarkerLoad { .. }), "{err:?}");
}

#[test]
fn test_non_empty_output_directory_is_refused() {
    let seal = stamp(11);
    let ws = workspace(&[PageSpec::text("Page 1")], &[("seal.png", &seal)]);
    std::fs::create_dir_all(&ws.output).unwrap();
    std::fs::write(ws.output.join("split_1.pdf"), b"%PDF-previous").unwrap();

    let err = segment(&ws.input, &ws.markers, &ws.output, &config()).unwrap_err();

    assert!(
        matches!(err, SegmentError::OutputDirNotEmpty { entries: 1, .. }),
        "{err:?}"
    );
    assert_eq!(err.stage(), Stage::Load);
    assert_eq!(
        std::fs::read(ws.output.join("split_1.pdf")).unwrap(),
        b"%PDF-previous"
    );
}
