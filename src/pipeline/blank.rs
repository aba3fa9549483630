//! Blank page removal.
//!
//! Scanned bundles are full of separator sheets and empty backs of
//! single-sided originals. They carry no marker and would otherwise end up
//! as stray pages in the output documents.
//!
//! A page is kept without rendering as soon as its text layer is non-empty,
//! which skips the raster path for most born-digital pages. Otherwise it is
//! rendered and classified blank when the share of maximum-brightness
//! samples reaches the threshold.

use crate::error::SegmentError;
use crate::pipeline::engine;
use crate::pipeline::render::{self, RenderSettings};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Result of filtering one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankFilterOutcome {
    /// Page count of the source.
    pub original_page_count: usize,
    /// Page count of the filtered document.
    pub kept_page_count: usize,
    /// 1-based source page numbers that were removed, ascending.
    pub removed_pages: Vec<usize>,
}

/// Share of samples at maximum brightness.
///
/// Counted over the RGB samples of the image (three per pixel), so a pure
/// white pixel contributes three hits and a white-on-colour tint fewer.
pub fn white_fraction(image: &DynamicImage) -> f32 {
    let rgb = image.to_rgb8();
    let samples = rgb.as_raw();
    if samples.is_empty() {
        return 1.0;
    }
    let white = samples.iter().filter(|&&s| s == u8::MAX).count();
    white as f32 / samples.len() as f32
}

/// Raster half of the blank test.
pub fn is_blank_raster(image: &DynamicImage, threshold: f32) -> bool {
    white_fraction(image) >= threshold
}

/// Classify one page: text first, raster only if there is no text.
pub fn is_blank_page(
    page: &PdfPage<'_>,
    index: usize,
    threshold: f32,
    settings: RenderSettings,
) -> Result<bool, SegmentError> {
    let has_text = page
        .text()
        .map(|t| !t.all().trim().is_empty())
        .unwrap_or(false);
    if has_text {
        return Ok(false);
    }
    let image = render::render_loaded_page(page, index, settings)?;
    Ok(is_blank_raster(&image, threshold))
}

/// Copy every non-blank page of `source` into a new PDF at `destination`.
///
/// Pages keep their original relative order. An all-blank source produces a
/// zero-page destination; deciding whether that is fatal is up to the
/// caller.
pub fn filter_blank_pages(
    pdfium: &Pdfium,
    source: &Path,
    destination: &Path,
    password: Option<&str>,
    threshold: f32,
    settings: RenderSettings,
) -> Result<BlankFilterOutcome, SegmentError> {
    let document = engine::open_document(pdfium, source, password)?;
    let total = engine::page_count(&document);

    let mut kept: Vec<usize> = Vec::with_capacity(total);
    let mut removed_pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        if is_blank_page(&page, index, threshold, settings)? {
            debug!("Page {} is blank", index + 1);
            removed_pages.push(index + 1);
        } else {
            kept.push(index);
        }
    }

    let mut filtered = pdfium
        .create_new_pdf()
        .map_err(|e| SegmentError::Internal {
            stage: crate::error::Stage::FilterBlanks,
            detail: format!("cannot create filtered document: {:?}", e),
        })?;
    for (dest_index, &src_index) in kept.iter().enumerate() {
        filtered
            .pages_mut()
            .copy_page_from_document(
                &document,
                src_index as PdfPageIndex,
                dest_index as PdfPageIndex,
            )
            .map_err(|e| SegmentError::Internal {
                stage: crate::error::Stage::FilterBlanks,
                detail: format!("cannot copy page {}: {:?}", src_index + 1, e),
            })?;
    }
    filtered
        .save_to_file(destination)
        .map_err(|e| SegmentError::Internal {
            stage: crate::error::Stage::FilterBlanks,
            detail: format!(
                "cannot save filtered document to '{}': {:?}",
                destination.display(),
                e
            ),
        })?;

    info!(
        "Removed {} blank pages; {} / {} pages remain",
        removed_pages.len(),
        kept.len(),
        total
    );

    Ok(BlankFilterOutcome {
        original_page_count: total,
        kept_page_count: kept.len(),
        removed_pages,
    })
}
