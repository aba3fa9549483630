//! PDFium binding and per-caller document handles.
//!
//! The bound [`Pdfium`] library is shared by the whole run. pdfium-render's
//! `thread_safe` feature serialises calls into the C library and its `sync`
//! feature lets detection workers hold `&Pdfium`. A [`PdfDocument`] is never shared: every caller, including
//! every detection unit, opens its own handle with [`open_document`] and
//! drops it when done.

use crate::error::SegmentError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bind to a pdfium library.
///
/// Search order:
/// 1. `PDFIUM_LIB_PATH` (a library file or the directory holding it)
/// 2. the directory of the running executable
/// 3. the current directory
/// 4. system library paths
pub fn bind_pdfium() -> Result<Pdfium, SegmentError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(p);
        if p.is_dir() {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(&p));
        } else {
            candidates.push(p);
        }
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    let mut last_error = String::new();
    for candidate in &candidates {
        if !candidate.exists() {
            continue;
        }
        match Pdfium::bind_to_library(candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => last_error = format!("{}: {:?}", candidate.display(), e),
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        SegmentError::PdfiumBindingFailed(if last_error.is_empty() {
            format!("{:?}", e)
        } else {
            format!("{last_error}; system library: {:?}", e)
        })
    })?;
    debug!("Bound system pdfium library");
    Ok(Pdfium::new(bindings))
}

/// Open an independent handle to a PDF file.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, SegmentError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                "wrong password".to_string()
            } else {
                "document is encrypted; a password is required".to_string()
            }
        } else {
            err_str
        };
        SegmentError::DocumentLoad {
            path: path.to_path_buf(),
            detail,
        }
    })
}

/// Page count of an open document.
pub fn page_count(document: &PdfDocument<'_>) -> usize {
    document.pages().len() as usize
}
