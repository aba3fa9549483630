//! Writing output documents.
//!
//! Pages are imported into each new document with pdfium's page import,
//! which clones the page objects (content streams, images, fonts) instead of
//! re-rendering them, so output pages are the input pages.
//!
//! Writing is not transactional. When one range fails, the remaining ones
//! are skipped and files already written stay on disk; rerunning from the
//! source into an empty directory is the recovery path.

use crate::error::{SegmentError, Stage};
use crate::output::{OutputDocument, PageRange};
use crate::pipeline::engine;
use crate::progress::SegmentationProgressCallback;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of output number `number` (1-based).
pub fn output_file_name(prefix: &str, number: usize) -> String {
    format!("{prefix}_{number}.pdf")
}

/// Make sure `dir` exists and is empty.
///
/// With `clear`, existing entries are removed first; otherwise a non-empty
/// directory is an error.
pub fn prepare_output_dir(dir: &Path, clear: bool) -> Result<(), SegmentError> {
    let io_err = |detail: String| SegmentError::Internal {
        stage: Stage::Load,
        detail,
    };

    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|e| io_err(format!("cannot create '{}': {e}", dir.display())))?;
        return Ok(());
    }

    let entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(format!("cannot read '{}': {e}", dir.display())))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    if entries.is_empty() {
        return Ok(());
    }
    if !clear {
        return Err(SegmentError::OutputDirNotEmpty {
            path: dir.to_path_buf(),
            entries: entries.len(),
        });
    }

    for entry in &entries {
        let removed = if entry.is_dir() {
            std::fs::remove_dir_all(entry)
        } else {
            std::fs::remove_file(entry)
        };
        removed.map_err(|e| io_err(format!("cannot remove '{}': {e}", entry.display())))?;
    }
    info!("Cleared {} entries from {}", entries.len(), dir.display());
    Ok(())
}

/// Write each range of `source` to `{dir}/{prefix}_{n}.pdf`, n from 1.
pub fn write_splits(
    pdfium: &Pdfium,
    source: &Path,
    password: Option<&str>,
    ranges: &[PageRange],
    dir: &Path,
    prefix: &str,
    progress: Option<&dyn SegmentationProgressCallback>,
) -> Result<Vec<OutputDocument>, SegmentError> {
    let document = engine::open_document(pdfium, source, password)?;
    let total = engine::page_count(&document);

    let mut written = Vec::with_capacity(ranges.len());
    for (i, range) in ranges.iter().enumerate() {
        let number = i + 1;
        let path = dir.join(output_file_name(prefix, number));
        let fail = |detail: String| SegmentError::SplitWrite {
            number,
            start: range.start,
            end: range.end,
            path: path.clone(),
            detail,
        };

        if range.end >= total || range.start > range.end {
            return Err(fail(format!("range outside document of {total} pages")));
        }

        let mut out = pdfium
            .create_new_pdf()
            .map_err(|e| fail(format!("cannot create document: {:?}", e)))?;
        out.pages_mut()
            .copy_page_range_from_document(
                &document,
                range.start as PdfPageIndex..=range.end as PdfPageIndex,
                0,
            )
            .map_err(|e| fail(format!("cannot copy pages: {:?}", e)))?;
        out.save_to_file(&path)
            .map_err(|e| fail(format!("cannot save: {:?}", e)))?;

        debug!(
            "Wrote {} (pages {}–{})",
            path.display(),
            range.start + 1,
            range.end + 1
        );
        let doc = OutputDocument {
            number,
            range: *range,
            pages: range.len(),
            path,
        };
        if let Some(cb) = progress {
            cb.on_document_written(&doc);
        }
        written.push(doc);
    }

    info!("Wrote {} documents to {}", written.len(), dir.display());
    Ok(written)
}
