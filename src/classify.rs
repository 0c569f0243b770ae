//! Image type classifier.
//!
//! Measures five cheap signals (aspect ratio, colour variance, white
//! ratio, Canny edge density, edge projection variance), buckets them,
//! and lets every label profile turn the buckets into a score. The
//! best-scoring label wins only if it clears an absolute floor and beats
//! the runner-up; otherwise the image is treated as a document.

use crate::kind::ImageKind;
use crate::profiles;
use image::DynamicImage;
use imageproc::edges::canny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Tunable thresholds for classification and the certificate check.
///
/// Defaults are the historical values; none of them were calibrated, so
/// they are exposed here rather than baked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Winning score must be strictly above this.
    pub score_floor: i32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// A pixel is "white" when every channel is above this.
    pub white_level: u8,
    pub wide_aspect: f64,
    pub portrait_aspect: f64,
    pub landscape_aspect: f64,
    /// Images smaller than this (both sides) count as a single line.
    pub small_size: (u32, u32),
    pub color_variance_split: f64,
    pub mostly_white: f64,
    pub partly_white: f64,
    pub busy_edges: (f64, f64),
    pub moderate_edges: (f64, f64),
    pub sparse_edges: (f64, f64),
    pub faint_edges: f64,
    pub structured_projection: f64,
    pub flat_projection: f64,
    pub certificate_min_white: f64,
    /// Inclusive edge-ratio band for the certificate check.
    pub certificate_edges: (f64, f64),
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            score_floor: 12,
            canny_low: 50.0,
            canny_high: 150.0,
            white_level: 200,
            wide_aspect: 3.0,
            portrait_aspect: 0.9,
            landscape_aspect: 1.2,
            small_size: (300, 100),
            color_variance_split: 2500.0,
            mostly_white: 0.7,
            partly_white: 0.5,
            busy_edges: (0.05, 0.2),
            moderate_edges: (0.02, 0.05),
            sparse_edges: (0.01, 0.03),
            faint_edges: 0.01,
            structured_projection: 0.01,
            flat_projection: 0.005,
            certificate_min_white: 0.6,
            certificate_edges: (0.02, 0.08),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AspectBucket {
    /// Very wide, or tiny in both dimensions.
    LineLike,
    Portrait,
    Landscape,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorBucket {
    Vivid,
    Muted,
    /// Single-channel source; the colour signal is skipped.
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhiteBucket {
    Mostly,
    Partly,
    Little,
}

/// First matching edge-density band. The bands overlap; order decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeBucket {
    Busy,
    Moderate,
    Sparse,
    Faint,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionBucket {
    Structured,
    Flat,
    Mixed,
}

/// Raw measurements plus their buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSignals {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub color_variance: Option<f64>,
    pub white_ratio: f64,
    pub edge_ratio: f64,
    pub projection_variance: (f64, f64),
    pub aspect: AspectBucket,
    pub color: ColorBucket,
    pub white: WhiteBucket,
    pub edges: EdgeBucket,
    pub projection: ProjectionBucket,
    pub certificate_like: bool,
}

/// Classifier output: the label and the per-label scores behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ImageKind,
    pub scores: BTreeMap<ImageKind, i32>,
    pub certificate_like: bool,
    pub signals: Option<ImageSignals>,
}

impl Classification {
    /// The catch-all result used when measuring fails.
    pub fn fallback() -> Self {
        Self {
            kind: ImageKind::Document,
            scores: ImageKind::ALL.iter().map(|k| (*k, 0)).collect(),
            certificate_like: false,
            signals: None,
        }
    }
}

/// Classify an image. Never fails: any measurement problem yields `Document`.
pub fn classify(image: &DynamicImage, thresholds: &ClassifierThresholds) -> Classification {
    let start = Instant::now();
    let signals = match measure(image, thresholds) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("[CLASSIFY] Measurement failed, defaulting to document: {}", e);
            return Classification::fallback();
        }
    };
    let result = classify_signals(signals, thresholds);
    log::info!(
        "[CLASSIFY] {} in {}ms (scores: {:?})",
        result.kind,
        start.elapsed().as_millis(),
        result.scores
    );
    result
}

/// Score already-measured signals. Split out so buckets can be tested directly.
pub fn classify_signals(signals: ImageSignals, thresholds: &ClassifierThresholds) -> Classification {
    let ordered: Vec<(ImageKind, i32)> = ImageKind::ALL
        .iter()
        .map(|kind| (*kind, profiles::profile(*kind).classify_score(&signals)))
        .collect();
    let kind = pick_label(&ordered, thresholds.score_floor);
    Classification {
        kind,
        scores: ordered.into_iter().collect(),
        certificate_like: signals.certificate_like,
        signals: Some(signals),
    }
}

/// Argmax with first-seen tie-breaking, gated by the floor and the margin.
fn pick_label(ordered: &[(ImageKind, i32)], floor: i32) -> ImageKind {
    let mut best: Option<(usize, ImageKind, i32)> = None;
    for (i, (kind, score)) in ordered.iter().enumerate() {
        if best.map_or(true, |(_, _, s)| *score > s) {
            best = Some((i, *kind, *score));
        }
    }
    let Some((best_idx, best_kind, best_score)) = best else {
        return ImageKind::Document;
    };
    let runner_up = ordered
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best_idx)
        .map(|(_, (_, s))| *s)
        .max()
        .unwrap_or(i32::MIN);

    if best_score > floor && best_score > runner_up {
        best_kind
    } else {
        ImageKind::Document
    }
}

/// The white-background-plus-border test shared with the configurator.
pub fn is_certificate_like(white_ratio: f64, edge_ratio: f64, t: &ClassifierThresholds) -> bool {
    white_ratio > t.certificate_min_white
        && edge_ratio >= t.certificate_edges.0
        && edge_ratio <= t.certificate_edges.1
}

/// Compute raw signals and their buckets.
pub fn measure(image: &DynamicImage, t: &ClassifierThresholds) -> Result<ImageSignals, String> {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return Err(format!("empty image {}x{}", w, h));
    }
    let total = w as f64 * h as f64;
    let gray = image.to_luma8();
    let is_color = image.color().has_color();

    let aspect_ratio = w as f64 / h as f64;
    let aspect = if aspect_ratio > t.wide_aspect || (w < t.small_size.0 && h < t.small_size.1) {
        AspectBucket::LineLike
    } else if aspect_ratio < t.portrait_aspect {
        AspectBucket::Portrait
    } else if aspect_ratio > t.landscape_aspect {
        AspectBucket::Landscape
    } else {
        AspectBucket::Square
    };

    let (color_variance, white_count) = if is_color {
        let rgb = image.to_rgb8();
        let mut sums = [0f64; 3];
        let mut sq = [0f64; 3];
        let mut white = 0u64;
        for p in rgb.pixels() {
            for c in 0..3 {
                let v = p.0[c] as f64;
                sums[c] += v;
                sq[c] += v * v;
            }
            if p.0.iter().all(|v| *v > t.white_level) {
                white += 1;
            }
        }
        let var: f64 = (0..3)
            .map(|c| {
                let mean = sums[c] / total;
                sq[c] / total - mean * mean
            })
            .sum::<f64>()
            / 3.0;
        (Some(var), white)
    } else {
        let white = gray.pixels().filter(|p| p.0[0] > t.white_level).count() as u64;
        (None, white)
    };
    let white_ratio = white_count as f64 / total;

    let color = match color_variance {
        Some(v) if v > t.color_variance_split => ColorBucket::Vivid,
        Some(_) => ColorBucket::Muted,
        None => ColorBucket::Gray,
    };
    let white = if white_ratio > t.mostly_white {
        WhiteBucket::Mostly
    } else if white_ratio > t.partly_white {
        WhiteBucket::Partly
    } else {
        WhiteBucket::Little
    };

    let edge_map = canny(&gray, t.canny_low, t.canny_high);
    let mut row_sums = vec![0f64; h as usize];
    let mut col_sums = vec![0f64; w as usize];
    let mut edge_count = 0u64;
    for (x, y, p) in edge_map.enumerate_pixels() {
        let v = p.0[0] as f64;
        if v > 0.0 {
            edge_count += 1;
            row_sums[y as usize] += v;
            col_sums[x as usize] += v;
        }
    }
    let edge_ratio = edge_count as f64 / total;
    let edges = bucket_edges(edge_ratio, t);

    let hist_y: Vec<f64> = row_sums.iter().map(|s| s / w as f64).collect();
    let hist_x: Vec<f64> = col_sums.iter().map(|s| s / h as f64).collect();
    let var_y = variance(&hist_y);
    let var_x = variance(&hist_x);
    let projection = if var_y > t.structured_projection && var_x > t.structured_projection {
        ProjectionBucket::Structured
    } else if var_y < t.flat_projection && var_x < t.flat_projection {
        ProjectionBucket::Flat
    } else {
        ProjectionBucket::Mixed
    };

    Ok(ImageSignals {
        width: w,
        height: h,
        aspect_ratio,
        color_variance,
        white_ratio,
        edge_ratio,
        projection_variance: (var_y, var_x),
        aspect,
        color,
        white,
        edges,
        projection,
        certificate_like: is_certificate_like(white_ratio, edge_ratio, t),
    })
}

fn bucket_edges(ratio: f64, t: &ClassifierThresholds) -> EdgeBucket {
    let inside = |band: (f64, f64)| ratio > band.0 && ratio < band.1;
    if inside(t.busy_edges) {
        EdgeBucket::Busy
    } else if inside(t.moderate_edges) {
        EdgeBucket::Moderate
    } else if inside(t.sparse_edges) {
        EdgeBucket::Sparse
    } else if ratio < t.faint_edges {
        EdgeBucket::Faint
    } else {
        EdgeBucket::Other
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}
