//! Marker set: the reference images whose presence ends a document.
//!
//! The set is loaded once per run, in file-name order, and its features are
//! extracted up front. Workers only ever read it.

use crate::error::SegmentError;
use crate::pipeline::features::{FeatureMatcher, Features};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MARKER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// One reference image and its precomputed features.
#[derive(Debug, Clone)]
pub struct Marker {
    pub name: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub features: Features,
}

/// The fixed, ordered marker set of a run.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    /// Load every supported image in `dir`, sorted by file name.
    ///
    /// Any unreadable image aborts the load: a silently shrunken marker set
    /// would move document boundaries without anyone noticing.
    pub fn load_dir(dir: impl AsRef<Path>, matcher: &FeatureMatcher) -> Result<Self, SegmentError> {
        let dir = dir.as_ref();
        let paths = list_marker_files(dir)?;
        if paths.is_empty() {
            return Err(SegmentError::NoMarkers {
                dir: dir.to_path_buf(),
            });
        }

        let mut set = MarkerSet::default();
        for path in paths {
            let image = image::open(&path).map_err(|e| SegmentError::MarkerLoad {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            set.push(name, path, &image, matcher);
        }

        info!("Loaded {} marker images from {}", set.len(), dir.display());
        Ok(set)
    }

    /// Build a set from in-memory images, in the given order.
    pub fn from_images(
        images: impl IntoIterator<Item = (String, DynamicImage)>,
        matcher: &FeatureMatcher,
    ) -> Self {
        let mut set = MarkerSet::default();
        for (name, image) in images {
            let path = PathBuf::from(&name);
            set.push(name, path, &image, matcher);
        }
        set
    }

    fn push(&mut self, name: String, path: PathBuf, image: &DynamicImage, matcher: &FeatureMatcher) {
        let features = matcher.extract(image);
        debug!(
            "Marker '{}' ({}x{}): {} keypoints",
            name,
            image.width(),
            image.height(),
            features.len()
        );
        self.markers.push(Marker {
            name,
            path,
            width: image.width(),
            height: image.height(),
            features,
        });
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Marker> {
        self.markers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }
}

/// Supported image files directly inside `dir`, sorted by file name.
fn list_marker_files(dir: &Path) -> Result<Vec<PathBuf>, SegmentError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SegmentError::MarkerLoad {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SegmentError::MarkerLoad {
            path: dir.to_path_buf(),
            detail: e.to_string(),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MARKER_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}
