//! Input validation: make sure the source path is a readable PDF before any
//! pdfium work starts.
//!
//! pdfium reports a missing file, a permission problem and a truncated
//! download with the same opaque "format error". Checking existence,
//! readability and the `%PDF` magic bytes up front turns those into
//! distinct, actionable messages.

use crate::error::SegmentError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local source path and return it as an owned `PathBuf`.
pub fn resolve_source(path: impl AsRef<Path>) -> Result<PathBuf, SegmentError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(SegmentError::DocumentLoad {
            detail: "file not found".into(),
            path,
        });
    }
    if path.is_dir() {
        return Err(SegmentError::DocumentLoad {
            detail: "path is a directory".into(),
            path,
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() {
                return Err(SegmentError::DocumentLoad {
                    detail: "file is shorter than a PDF header".into(),
                    path,
                });
            }
            if &magic != b"%PDF" {
                return Err(SegmentError::DocumentLoad {
                    detail: format!("not a PDF (first bytes: {magic:?})"),
                    path,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SegmentError::DocumentLoad {
                detail: "permission denied".into(),
                path,
            });
        }
        Err(e) => {
            return Err(SegmentError::DocumentLoad {
                detail: e.to_string(),
                path,
            });
        }
    }

    debug!("Resolved source PDF: {}", path.display());
    Ok(path)
}
