//! Screen captures: crisp digital text, UI chrome, short labels.

use super::{variant_passes, KindProfile};
use crate::classify::{AspectBucket, ColorBucket, EdgeBucket, ImageSignals, ProjectionBucket, WhiteBucket};
use crate::engine::{EngineMode, OcrConfig, SegmentationMode};
use crate::error::PreprocessError;
use crate::kind::ImageKind;
use crate::orchestrator::{regions, PassPlan};
use crate::preprocess::{filters, ImageVariant, PipelineContext, Recipe};
use crate::select::{char_ratio, line_count};
use image::{DynamicImage, GrayImage};

const LANDSCAPE: i32 = 5;
const VIVID_COLOR: i32 = 8;
const LITTLE_WHITE: i32 = 3;
const BUSY_EDGES: i32 = 6;
const MIXED_PROJECTION: i32 = 4;

const UI_KEYWORDS: &[&str] = &[
    "menu", "file", "edit", "view", "window", "help", "options", "tools", "settings",
    "preferences", "button", "click", "select", "save", "cancel", "ok", "yes", "no",
    "submit", "login", "sign",
];

pub struct ScreenshotProfile;

impl KindProfile for ScreenshotProfile {
    fn kind(&self) -> ImageKind {
        ImageKind::Screenshot
    }

    fn classify_score(&self, s: &ImageSignals) -> i32 {
        let mut score = 0;
        if s.aspect == AspectBucket::Landscape {
            score += LANDSCAPE;
        }
        if s.color == ColorBucket::Vivid {
            score += VIVID_COLOR;
        }
        if s.white == WhiteBucket::Little {
            score += LITTLE_WHITE;
        }
        if s.edges == EdgeBucket::Busy {
            score += BUSY_EDGES;
        }
        if s.projection == ProjectionBucket::Mixed {
            score += MIXED_PROJECTION;
        }
        score
    }

    fn variants(&self, gray: &GrayImage) -> Result<Vec<ImageVariant>, PreprocessError> {
        let sharpened = filters::sharpen(gray);
        Ok(vec![
            ImageVariant::gray(Recipe::Otsu, filters::otsu(gray)),
            ImageVariant::gray(Recipe::SharpenedOtsu, filters::otsu(&sharpened)),
            ImageVariant::gray(Recipe::Adaptive, filters::adaptive_gaussian(gray, 11, 2)),
        ])
    }

    fn base_config(&self, language: &str) -> OcrConfig {
        OcrConfig::new(language, EngineMode::Neural, SegmentationMode::SingleBlock)
            .with_option("preserve_interword_spaces", "1")
            .with_option("textord_space_size_is_variable", "0")
    }

    fn plan(&self, ctx: &PipelineContext, base: &OcrConfig) -> Vec<PassPlan> {
        // Scattered UI text: sparse layout first, then as one block.
        let mut plans = variant_passes(ctx, base, |_, _, base| {
            vec![
                base.with_segmentation(SegmentationMode::Sparse),
                base.with_segmentation(SegmentationMode::SingleBlock),
            ]
        });

        let binary = filters::otsu(&ctx.primary().image.to_luma8());
        let elements = regions::ui_elements(&binary);
        if !elements.is_empty() {
            log::info!("[OCR] {} UI elements", elements.len());
            let rects: Vec<_> = elements
                .into_iter()
                .map(|r| {
                    let segmentation = if r.2 > r.3 * 3 {
                        SegmentationMode::SingleLine
                    } else {
                        SegmentationMode::SingleBlock
                    };
                    (r, base.with_segmentation(segmentation))
                })
                .collect();
            let binary = DynamicImage::ImageLuma8(binary);
            plans.extend(PassPlan::regions("ui-elements", &binary, &rects, "\n"));
        }
        plans
    }

    fn score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let keywords = UI_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
        let words: Vec<&str> = text.split_whitespace().collect();
        let avg_word_len =
            words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len().max(1) as f64;
        let punct = char_ratio(text, |c| ",.;:!?".contains(c));

        let mut score = line_count(text).min(30) as f64 * 3.0 + keywords as f64 * 8.0;
        if avg_word_len < 6.0 {
            score += 20.0;
        }
        score - punct * 40.0
    }
}
