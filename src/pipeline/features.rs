//! Scale- and rotation-invariant keypoint matching.
//!
//! Seals are stamped by hand: the same seal shows up at a slightly
//! different size, angle and ink density on every page. Pixel comparison
//! does not survive that, so pages are compared through local features:
//!
//! 1. a Gaussian scale space is built per octave and differenced (DoG);
//! 2. local DoG extrema with enough contrast and no edge response become
//!    keypoints;
//! 3. each keypoint gets a dominant gradient orientation (extra keypoints
//!    for strong secondary peaks);
//! 4. a 4×4×8 gradient-histogram descriptor is sampled on a grid rotated to
//!    that orientation, normalised and clipped;
//! 5. descriptors are matched by brute-force nearest neighbour and kept
//!    only when the nearest is clearly closer than the runner-up (the ratio
//!    test).
//!
//! Everything is deterministic: the same inputs always produce the same
//! keypoints in the same order.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Luma};
use imageproc::filter::{gaussian_blur_f32, horizontal_filter, vertical_filter};
use std::f32::consts::PI;

/// Length of one descriptor.
pub const DESCRIPTOR_LEN: usize = DESC_WIDTH * DESC_WIDTH * DESC_BINS;

const DESC_WIDTH: usize = 4;
const DESC_BINS: usize = 8;
const ORI_BINS: usize = 36;
const ORI_PEAK_RATIO: f32 = 0.8;
const ORI_SIGMA_FACTOR: f32 = 1.5;
const DESC_SCALE_FACTOR: f32 = 3.0;
const DESC_MAG_CLAMP: f32 = 0.2;
const ASSUMED_INPUT_BLUR: f32 = 0.5;
const BORDER: usize = 2;
const EXACT_MATCH_SQ: f32 = 1e-6;
const CENTRAL_DIFFERENCE: [f32; 3] = [-1.0, 0.0, 1.0];

/// Detector parameters. The defaults follow the usual SIFT choices.
#[derive(Debug, Clone, Copy)]
pub struct DetectorParams {
    /// Scales sampled per octave.
    pub intervals: usize,
    /// Blur of the first level of every octave.
    pub sigma: f32,
    /// Minimum |DoG| at an extremum, before division by `intervals`.
    pub contrast_threshold: f32,
    /// Maximum principal-curvature ratio; larger values keep more edge-like points.
    pub edge_threshold: f32,
    /// Octaves stop once the shorter side drops below this.
    pub min_octave_size: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            intervals: 3,
            sigma: 1.6,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            min_octave_size: 16,
        }
    }
}

/// A detected keypoint in the coordinates of the input image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Absolute blur scale.
    pub scale: f32,
    /// Dominant gradient direction in radians, `[0, 2π)`.
    pub orientation: f32,
    pub octave: usize,
}

/// Keypoints of one image with their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<[f32; DESCRIPTOR_LEN]>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Outcome of comparing two feature sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub is_match: bool,
    pub match_count: usize,
}

/// Decides whether two images share a visual feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMatcher {
    /// Ratio-test bound: nearest < `ratio` × second-nearest.
    pub ratio: f32,
    /// `is_match` requires strictly more accepted correspondences than this.
    pub threshold: usize,
    pub params: DetectorParams,
}

impl FeatureMatcher {
    pub fn new(ratio: f32, threshold: usize) -> Self {
        Self {
            ratio,
            threshold,
            params: DetectorParams::default(),
        }
    }

    /// Extract features from an image.
    pub fn extract(&self, image: &DynamicImage) -> Features {
        detect_and_describe(image, &self.params)
    }

    /// Compare precomputed feature sets: correspondences are searched from
    /// `a` into `b`.
    pub fn compare(&self, a: &Features, b: &Features) -> MatchOutcome {
        let match_count = count_good_matches(a, b, self.ratio);
        MatchOutcome {
            is_match: match_count > self.threshold,
            match_count,
        }
    }

    /// Extract and compare in one step.
    pub fn compare_images(&self, a: &DynamicImage, b: &DynamicImage) -> MatchOutcome {
        self.compare(&self.extract(a), &self.extract(b))
    }
}

/// Count descriptors of `a` whose nearest neighbour in `b` passes the ratio test.
///
/// With a single descriptor in `b` there is no runner-up to compare
/// against; the nearest is then accepted only when it is an exact match.
/// Either side being empty yields zero.
pub fn count_good_matches(a: &Features, b: &Features, ratio: f32) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let ratio_sq = ratio * ratio;
    a.descriptors
        .iter()
        .filter(|da| {
            let mut best = f32::INFINITY;
            let mut second = f32::INFINITY;
            for db in &b.descriptors {
                let d = distance_sq(da, db);
                if d < best {
                    second = best;
                    best = d;
                } else if d < second {
                    second = d;
                }
            }
            if second.is_infinite() {
                return best <= EXACT_MATCH_SQ;
            }
            // Squared distances: d1 < r·d2  ⇔  d1² < r²·d2².
            best < ratio_sq * second
        })
        .count()
}

fn distance_sq(a: &[f32; DESCRIPTOR_LEN], b: &[f32; DESCRIPTOR_LEN]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

// ── Scale-space levels ───────────────────────────────────────────────────

/// Single-channel f32 image in `[0, 1]`.
type Level = ImageBuffer<Luma<f32>, Vec<f32>>;

fn to_level(image: &DynamicImage) -> Level {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();
    Level::from_fn(w, h, |x, y| Luma([gray.get_pixel(x, y)[0] as f32 / 255.0]))
}

#[inline]
fn at(level: &Level, x: usize, y: usize) -> f32 {
    level.get_pixel(x as u32, y as u32)[0]
}

/// Gaussian blur; `gaussian_blur_f32` panics on a non-positive sigma.
fn blur(level: &Level, sigma: f32) -> Level {
    if sigma <= 0.0 {
        return level.clone();
    }
    gaussian_blur_f32(level, sigma)
}

/// Halve both dimensions by nearest-neighbour sampling.
fn downsample(level: &Level) -> Level {
    let (w, h) = level.dimensions();
    imageops::resize(level, w.div_ceil(2), h.div_ceil(2), FilterType::Nearest)
}

fn difference(upper: &Level, lower: &Level) -> Level {
    let (w, h) = upper.dimensions();
    Level::from_fn(w, h, |x, y| {
        Luma([upper.get_pixel(x, y)[0] - lower.get_pixel(x, y)[0]])
    })
}

/// Central-difference derivatives of one smoothed level.
struct Gradients {
    dx: Level,
    dy: Level,
}

impl Gradients {
    fn of(level: &Level) -> Self {
        Self {
            dx: horizontal_filter(level, &CENTRAL_DIFFERENCE),
            dy: vertical_filter(level, &CENTRAL_DIFFERENCE),
        }
    }

    fn width(&self) -> usize {
        self.dx.width() as usize
    }

    fn height(&self) -> usize {
        self.dx.height() as usize
    }

    /// Gradient as (magnitude, angle); `None` on the border.
    #[inline]
    fn at(&self, x: isize, y: isize) -> Option<(f32, f32)> {
        if x < 1 || y < 1 || x >= self.width() as isize - 1 || y >= self.height() as isize - 1 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        let dx = at(&self.dx, x, y);
        let dy = at(&self.dy, x, y);
        Some(((dx * dx + dy * dy).sqrt(), dy.atan2(dx)))
    }
}

// ── Detection ────────────────────────────────────────────────────────────

/// Detect keypoints and compute their descriptors.
pub fn detect_and_describe(image: &DynamicImage, params: &DetectorParams) -> Features {
    let mut features = Features::default();
    let min_size = params.min_octave_size.max(2 * BORDER + 3);
    if (image.width() as usize) < min_size || (image.height() as usize) < min_size {
        return features;
    }

    let s = params.intervals.max(1);
    let k = 2f32.powf(1.0 / s as f32);
    let contrast = params.contrast_threshold / s as f32;

    let initial = (params.sigma * params.sigma - ASSUMED_INPUT_BLUR * ASSUMED_INPUT_BLUR)
        .max(0.01)
        .sqrt();
    let mut base = blur(&to_level(image), initial);

    // Incremental blur from level i-1 to level i.
    let steps: Vec<f32> = (1..s + 3)
        .map(|i| {
            let prev = params.sigma * k.powi(i as i32 - 1);
            let total = prev * k;
            (total * total - prev * prev).sqrt()
        })
        .collect();

    let mut octave = 0usize;
    while base.width() as usize >= min_size && base.height() as usize >= min_size {
        let mut gaussians = Vec::with_capacity(s + 3);
        gaussians.push(base);
        for step in &steps {
            let next = blur(&gaussians[gaussians.len() - 1], *step);
            gaussians.push(next);
        }
        let dogs: Vec<Level> = gaussians
            .windows(2)
            .map(|pair| difference(&pair[1], &pair[0]))
            .collect();

        let factor = (1usize << octave) as f32;
        for layer in 1..=s {
            let extrema = find_extrema(&dogs, layer, contrast, params.edge_threshold);
            if extrema.is_empty() {
                continue;
            }
            let octave_sigma = params.sigma * k.powi(layer as i32);
            let gradients = Gradients::of(&gaussians[layer]);
            for (x, y) in extrema {
                for orientation in dominant_orientations(&gradients, x, y, octave_sigma) {
                    let descriptor = describe(&gradients, x, y, octave_sigma, orientation);
                    features.keypoints.push(Keypoint {
                        x: x as f32 * factor,
                        y: y as f32 * factor,
                        scale: octave_sigma * factor,
                        orientation,
                        octave,
                    });
                    features.descriptors.push(descriptor);
                }
            }
        }

        base = downsample(&gaussians[s]);
        octave += 1;
    }

    features
}

/// Local DoG extrema of `dogs[layer]` passing contrast and edge tests.
fn find_extrema(
    dogs: &[Level],
    layer: usize,
    contrast: f32,
    edge_threshold: f32,
) -> Vec<(usize, usize)> {
    let (below, current, above) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
    let (w, h) = (current.width() as usize, current.height() as usize);
    let edge_limit = (edge_threshold + 1.0) * (edge_threshold + 1.0) / edge_threshold;
    let mut found = Vec::new();

    for y in BORDER..h - BORDER {
        for x in BORDER..w - BORDER {
            let v = at(current, x, y);
            if v.abs() < contrast {
                continue;
            }
            let mut is_max = v > 0.0;
            let mut is_min = v < 0.0;
            'scan: for plane in [below, current, above] {
                for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        if std::ptr::eq(plane, current) && nx == x && ny == y {
                            continue;
                        }
                        let n = at(plane, nx, ny);
                        if n > v {
                            is_max = false;
                        }
                        if n < v {
                            is_min = false;
                        }
                        if !is_max && !is_min {
                            break 'scan;
                        }
                    }
                }
            }
            if !is_max && !is_min {
                continue;
            }

            let p = |px: usize, py: usize| at(current, px, py);
            let dxx = p(x + 1, y) + p(x - 1, y) - 2.0 * v;
            let dyy = p(x, y + 1) + p(x, y - 1) - 2.0 * v;
            let dxy = (p(x + 1, y + 1) - p(x - 1, y + 1) - p(x + 1, y - 1) + p(x - 1, y - 1)) / 4.0;
            let trace = dxx + dyy;
            let det = dxx * dyy - dxy * dxy;
            if det <= 0.0 || trace * trace / det >= edge_limit {
                continue;
            }
            found.push((x, y));
        }
    }
    found
}

/// Orientation histogram peaks around a keypoint, in `[0, 2π)`.
fn dominant_orientations(gradients: &Gradients, x: usize, y: usize, sigma: f32) -> Vec<f32> {
    let ori_sigma = ORI_SIGMA_FACTOR * sigma;
    let radius = (3.0 * ori_sigma).round() as isize;
    let denom = 2.0 * ori_sigma * ori_sigma;
    let mut hist = [0.0f32; ORI_BINS];

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let Some((mag, angle)) = gradients.at(x as isize + dx, y as isize + dy) else {
                continue;
            };
            let weight = (-((dx * dx + dy * dy) as f32) / denom).exp();
            let bin = ((angle + 2.0 * PI) / (2.0 * PI) * ORI_BINS as f32).round() as usize % ORI_BINS;
            hist[bin] += weight * mag;
        }
    }

    // Circular [1 4 6 4 1] smoothing.
    let mut smooth = [0.0f32; ORI_BINS];
    for i in 0..ORI_BINS {
        let at = |o: isize| hist[(i as isize + o).rem_euclid(ORI_BINS as isize) as usize];
        smooth[i] = (at(-2) + at(2)) / 16.0 + (at(-1) + at(1)) * 4.0 / 16.0 + at(0) * 6.0 / 16.0;
    }

    let max = smooth.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut orientations = Vec::new();
    for i in 0..ORI_BINS {
        let left = smooth[(i + ORI_BINS - 1) % ORI_BINS];
        let right = smooth[(i + 1) % ORI_BINS];
        let v = smooth[i];
        if v > left && v > right && v >= ORI_PEAK_RATIO * max {
            let offset = 0.5 * (left - right) / (left - 2.0 * v + right);
            let bin = i as f32 + offset;
            let angle = (bin / ORI_BINS as f32 * 2.0 * PI).rem_euclid(2.0 * PI);
            orientations.push(angle);
        }
    }
    orientations
}

/// 4×4 spatial × 8 orientation gradient histogram on a rotated grid.
fn describe(gradients: &Gradients, x: usize, y: usize, sigma: f32, orientation: f32) -> [f32; DESCRIPTOR_LEN] {
    let d = DESC_WIDTH as f32;
    let hist_width = DESC_SCALE_FACTOR * sigma;
    let (w, h) = (gradients.width(), gradients.height());
    let max_radius = ((w * w + h * h) as f32).sqrt();
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d + 1.0) * 0.5)
        .round()
        .min(max_radius) as isize;
    let (cos_t, sin_t) = (orientation.cos(), orientation.sin());
    let bins_per_rad = DESC_BINS as f32 / (2.0 * PI);
    let weight_denom = 0.5 * d * d;

    let mut hist = [0.0f32; DESCRIPTOR_LEN];
    for i in -radius..=radius {
        for j in -radius..=radius {
            // Offset expressed in the keypoint's rotated frame, in bin units.
            let c_rot = (j as f32 * cos_t + i as f32 * sin_t) / hist_width;
            let r_rot = (-(j as f32) * sin_t + i as f32 * cos_t) / hist_width;
            let rbin = r_rot + d / 2.0 - 0.5;
            let cbin = c_rot + d / 2.0 - 0.5;
            if rbin <= -1.0 || rbin >= d || cbin <= -1.0 || cbin >= d {
                continue;
            }
            let Some((mag, angle)) = gradients.at(x as isize + j, y as isize + i) else {
                continue;
            };
            let weight = (-(c_rot * c_rot + r_rot * r_rot) / weight_denom).exp();
            let obin = (angle - orientation).rem_euclid(2.0 * PI) * bins_per_rad;
            accumulate(&mut hist, rbin, cbin, obin, mag * weight);
        }
    }

    normalize(&mut hist);
    for v in hist.iter_mut() {
        *v = v.min(DESC_MAG_CLAMP);
    }
    normalize(&mut hist);
    hist
}

/// Trilinear distribution of one sample into the descriptor histogram.
fn accumulate(hist: &mut [f32; DESCRIPTOR_LEN], rbin: f32, cbin: f32, obin: f32, value: f32) {
    let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
    let (dr, dc, dob) = (rbin - r0, cbin - c0, obin - o0);
    let (r0, c0, o0) = (r0 as isize, c0 as isize, o0 as isize);

    for (ri, rw) in [(r0, 1.0 - dr), (r0 + 1, dr)] {
        if ri < 0 || ri >= DESC_WIDTH as isize {
            continue;
        }
        for (ci, cw) in [(c0, 1.0 - dc), (c0 + 1, dc)] {
            if ci < 0 || ci >= DESC_WIDTH as isize {
                continue;
            }
            for (oi, ow) in [(o0, 1.0 - dob), (o0 + 1, dob)] {
                let oi = oi.rem_euclid(DESC_BINS as isize) as usize;
                let idx = (ri as usize * DESC_WIDTH + ci as usize) * DESC_BINS + oi;
                hist[idx] += value * rw * cw * ow;
            }
        }
    }
}

fn normalize(v: &mut [f32; DESCRIPTOR_LEN]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
