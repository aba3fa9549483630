//! Configuration types for PDF segmentation.
//!
//! All pipeline behaviour is controlled through [`SegmentationConfig`], built
//! via its [`SegmentationConfigBuilder`] or read from a JSON file. The value
//! is constructed once and handed to every stage; no stage reads process-wide
//! state for its thresholds.
//!
//! # Sensitivity knobs
//! `blank_threshold`, `ratio` and `match_threshold` have no principled
//! default. They trade false positives against false negatives and should be
//! tuned on a sample of real scans:
//!
//! | Knob | Raise it to… | Lower it to… |
//! |------|--------------|--------------|
//! | `blank_threshold` | keep faint pages | drop noisy near-blank scans |
//! | `ratio` | accept more (ambiguous) correspondences | accept only distinctive ones |
//! | `match_threshold` | reject weak marker hits | catch faint or partial stamps |

use crate::error::SegmentError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Configuration for one segmentation run.
///
/// # Example
/// ```rust
/// use sealsplit::{SegmentationConfig, WorkerCount};
///
/// let config = SegmentationConfig::builder()
///     .blank_threshold(0.97)
///     .match_threshold(15)
///     .workers(WorkerCount::Fixed(4))
///     .build()
///     .unwrap();
/// assert_eq!(config.workers.resolve(), 4);
/// ```
#[derive(Clone)]
pub struct SegmentationConfig {
    /// Fraction of maximum-brightness samples at or above which a page with
    /// no text layer is considered blank. Range: (0, 1]. Default: 0.95.
    pub blank_threshold: f32,

    /// Accepted-correspondence count a page must *exceed* to count as a
    /// marker hit. Default: 20.
    pub match_threshold: usize,

    /// Nearest / second-nearest descriptor distance ratio for accepting a
    /// correspondence. Range: (0, 1). Default: 0.75.
    pub ratio: f32,

    /// Size of the detection worker pool. Default: [`WorkerCount::Auto`].
    pub workers: WorkerCount,

    /// Rendering DPI for blank checks and marker matching. Range: 72–600.
    /// Default: 72, i.e. one pixel per PDF point.
    ///
    /// Marker images must be cropped from pages rendered at roughly this
    /// resolution. Feature matching is scale-tolerant, but not across
    /// arbitrary factors.
    pub dpi: u32,

    /// Maximum rendered image dimension in pixels. Default: 2000.
    ///
    /// A safety cap independent of DPI so an oversized page cannot exhaust
    /// memory inside a worker.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted sources.
    pub password: Option<String>,

    /// File name prefix for outputs: `{prefix}_{n}.pdf`. Default: "split".
    pub output_prefix: String,

    /// Remove existing entries in the output directory before writing.
    /// Default: false (a non-empty directory is an error).
    pub clear_output_dir: bool,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            blank_threshold: 0.95,
            match_threshold: 20,
            ratio: 0.75,
            workers: WorkerCount::Auto,
            dpi: 72,
            max_rendered_pixels: 2000,
            password: None,
            output_prefix: "split".to_string(),
            clear_output_dir: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SegmentationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationConfig")
            .field("blank_threshold", &self.blank_threshold)
            .field("match_threshold", &self.match_threshold)
            .field("ratio", &self.ratio)
            .field("workers", &self.workers)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("output_prefix", &self.output_prefix)
            .field("clear_output_dir", &self.clear_output_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SegmentationProgressCallback>"),
            )
            .finish()
    }
}

impl SegmentationConfig {
    /// Create a new builder for `SegmentationConfig`.
    pub fn builder() -> SegmentationConfigBuilder {
        SegmentationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Turn an existing configuration back into a builder, e.g. to layer
    /// command-line overrides over a file.
    pub fn into_builder(self) -> SegmentationConfigBuilder {
        SegmentationConfigBuilder { config: self }
    }

    /// Read a JSON configuration file on top of the defaults.
    ///
    /// Keys are optional; `blank_page_threshold` and `sift_threshold` are
    /// accepted as aliases for `blank_threshold` and `match_threshold`.
    /// Unknown keys are ignored.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SegmentError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SegmentError::ConfigLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let file: ConfigFile =
            serde_json::from_str(&text).map_err(|e| SegmentError::ConfigLoad {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        debug!("Loaded configuration from {}", path.display());
        file.apply(Self::builder())?.build()
    }

    /// Like [`from_json_file`](Self::from_json_file), but a missing file
    /// yields the defaults. A file that exists but is malformed is still an
    /// error; silently replacing a mistyped threshold would move boundaries.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SegmentError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Configuration file '{}' not found; using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::from_json_file(path)
    }
}

/// Builder for [`SegmentationConfig`].
#[derive(Debug)]
pub struct SegmentationConfigBuilder {
    config: SegmentationConfig,
}

impl SegmentationConfigBuilder {
    pub fn blank_threshold(mut self, t: f32) -> Self {
        self.config.blank_threshold = t;
        self
    }

    pub fn match_threshold(mut self, n: usize) -> Self {
        self.config.match_threshold = n;
        self
    }

    pub fn ratio(mut self, r: f32) -> Self {
        self.config.ratio = r;
        self
    }

    pub fn workers(mut self, w: WorkerCount) -> Self {
        self.config.workers = w;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    pub fn clear_output_dir(mut self, v: bool) -> Self {
        self.config.clear_output_dir = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SegmentationConfig, SegmentError> {
        let c = &self.config;
        if !(c.blank_threshold > 0.0 && c.blank_threshold <= 1.0) {
            return Err(SegmentError::InvalidConfig(format!(
                "blank threshold must be in (0, 1], got {}",
                c.blank_threshold
            )));
        }
        if !(c.ratio > 0.0 && c.ratio < 1.0) {
            return Err(SegmentError::InvalidConfig(format!(
                "ratio must be in (0, 1), got {}",
                c.ratio
            )));
        }
        if c.dpi < 72 || c.dpi > 600 {
            return Err(SegmentError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if let WorkerCount::Fixed(0) = c.workers {
            return Err(SegmentError::InvalidConfig("workers must be ≥ 1".into()));
        }
        if c.output_prefix.is_empty()
            || c.output_prefix.contains(['/', '\\'])
            || c.output_prefix == "."
            || c.output_prefix == ".."
        {
            return Err(SegmentError::InvalidConfig(format!(
                "output prefix must be a plain file name, got {:?}",
                c.output_prefix
            )));
        }
        Ok(self.config)
    }
}

// ── Worker count ─────────────────────────────────────────────────────────

/// Size of the boundary-detection worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WorkerCount {
    /// Detected CPU count minus one, at least one.
    #[default]
    Auto,
    /// Exactly this many workers.
    Fixed(usize),
}

impl WorkerCount {
    /// The concrete pool size.
    pub fn resolve(self) -> usize {
        match self {
            WorkerCount::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .saturating_sub(1)
                .max(1),
            WorkerCount::Fixed(n) => n.max(1),
        }
    }
}

impl FromStr for WorkerCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(WorkerCount::Auto);
        }
        match s.parse::<usize>() {
            Ok(0) => Err("worker count must be ≥ 1".to_string()),
            Ok(n) => Ok(WorkerCount::Fixed(n)),
            Err(_) => Err(format!("expected 'auto' or a positive integer, got '{s}'")),
        }
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerCount::Auto => f.write_str("auto"),
            WorkerCount::Fixed(n) => write!(f, "{n}"),
        }
    }
}

// ── JSON file layout ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(alias = "blank_page_threshold")]
    blank_threshold: Option<f32>,
    #[serde(alias = "sift_threshold")]
    match_threshold: Option<usize>,
    ratio: Option<f32>,
    workers: Option<RawWorkers>,
    dpi: Option<u32>,
    max_rendered_pixels: Option<u32>,
    output_prefix: Option<String>,
    clear_output_dir: Option<bool>,
    marker_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWorkers {
    Count(usize),
    Named(String),
}

impl ConfigFile {
    fn apply(self, mut b: SegmentationConfigBuilder) -> Result<SegmentationConfigBuilder, SegmentError> {
        if let Some(v) = self.blank_threshold {
            b = b.blank_threshold(v);
        }
        if let Some(v) = self.match_threshold {
            b = b.match_threshold(v);
        }
        if let Some(v) = self.ratio {
            b = b.ratio(v);
        }
        if let Some(w) = self.workers {
            let parsed = match w {
                RawWorkers::Count(n) => WorkerCount::Fixed(n),
                RawWorkers::Named(s) => s
                    .parse::<WorkerCount>()
                    .map_err(|e: String| SegmentError::InvalidConfig(format!("workers: {e}")))?,
            };
            b = b.workers(parsed);
        }
        if let Some(v) = self.dpi {
            b = b.dpi(v);
        }
        if let Some(v) = self.max_rendered_pixels {
            b = b.max_rendered_pixels(v);
        }
        if let Some(v) = self.output_prefix {
            b = b.output_prefix(v);
        }
        if let Some(v) = self.clear_output_dir {
            b = b.clear_output_dir(v);
        }
        if let Some(dir) = self.marker_dir {
            debug!("config marker_dir = {} (used by the CLI)", dir.display());
        }
        Ok(b)
    }
}

/// Read only the `marker_dir` key of a configuration file, if present.
///
/// The marker directory is an input of a run rather than a tuning knob, so it
/// is not part of [`SegmentationConfig`]; the CLI uses this to honour it.
pub fn marker_dir_from_file(path: impl AsRef<Path>) -> Option<PathBuf> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<ConfigFile>(&text).ok()?.marker_dir
}
