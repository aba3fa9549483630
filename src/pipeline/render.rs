//! PDF rasterisation: render one page to a `DynamicImage` via pdfium.
//!
//! Rendering is resolution-driven: a page is scaled by `dpi / 72` so one
//! PDF point becomes `dpi / 72` pixels. Marker images are cropped from
//! renders at a known DPI, so a fixed scale keeps the page and the marker
//! comparable. `max_rendered_pixels` still caps the longest edge so an
//! oversized page cannot exhaust a worker's memory.
//!
//! The functions here take a document handle owned by the caller and keep no
//! state of their own, so any number of callers may render concurrently as
//! long as each uses its own handle.

use crate::error::SegmentError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Resolution settings for a render.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
}

impl RenderSettings {
    fn to_pdfium(self) -> PdfRenderConfig {
        PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32)
    }
}

/// Render page `index` (0-based) of `document`.
pub fn render_page(
    document: &PdfDocument<'_>,
    index: usize,
    settings: RenderSettings,
) -> Result<DynamicImage, SegmentError> {
    let page = document
        .pages()
        .get(index as PdfPageIndex)
        .map_err(|e| SegmentError::RasterisationFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        })?;
    render_loaded_page(&page, index, settings)
}

/// Render an already-loaded page. `index` is only used for diagnostics.
pub fn render_loaded_page(
    page: &PdfPage<'_>,
    index: usize,
    settings: RenderSettings,
) -> Result<DynamicImage, SegmentError> {
    let bitmap = page
        .render_with_config(&settings.to_pdfium())
        .map_err(|e| SegmentError::RasterisationFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        index + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}
