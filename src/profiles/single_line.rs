//! Buttons, labels, one-line snippets.

use super::{variant_passes, KindProfile};
use crate::classify::{AspectBucket, EdgeBucket, ImageSignals, ProjectionBucket};
use crate::engine::{EngineMode, OcrConfig, SegmentationMode};
use crate::error::PreprocessError;
use crate::kind::ImageKind;
use crate::orchestrator::PassPlan;
use crate::preprocess::{filters, ImageVariant, PipelineContext, Recipe};
use image::{DynamicImage, GrayImage};

const LINE_ASPECT: i32 = 10;
const FAINT_EDGES: i32 = 8;
const FLAT_PROJECTION: i32 = 6;

/// Images whose longer side is below this are upscaled first.
const UPSCALE_BELOW: u32 = 100;
const UPSCALE_FACTOR: u32 = 3;

pub struct SingleLineProfile;

impl KindProfile for SingleLineProfile {
    fn kind(&self) -> ImageKind {
        ImageKind::SingleLine
    }

    fn classify_score(&self, s: &ImageSignals) -> i32 {
        let mut score = 0;
        if s.aspect == AspectBucket::LineLike {
            score += LINE_ASPECT;
        }
        if s.edges == EdgeBucket::Faint {
            score += FAINT_EDGES;
        }
        if s.projection == ProjectionBucket::Flat {
            score += FLAT_PROJECTION;
        }
        score
    }

    fn variants(&self, gray: &GrayImage) -> Result<Vec<ImageVariant>, PreprocessError> {
        let base = if gray.width().max(gray.height()) < UPSCALE_BELOW {
            filters::upscale(gray, UPSCALE_FACTOR)
        } else {
            gray.clone()
        };
        let clahe = filters::clahe(&base, 2.5, (4, 4));
        let binary = filters::otsu(&clahe);
        let sharpened = filters::sharpen(&clahe);
        let thickened = filters::thicken_strokes(&binary);
        Ok(vec![
            ImageVariant::gray(Recipe::Otsu, binary),
            ImageVariant::gray(Recipe::Clahe, clahe),
            ImageVariant::gray(Recipe::Sharpened, sharpened),
            ImageVariant::gray(Recipe::Thickened, thickened),
        ])
    }

    fn base_config(&self, language: &str) -> OcrConfig {
        OcrConfig::new(language, EngineMode::Legacy, SegmentationMode::SingleLine)
            .with_option("tessedit_do_invert", "0")
    }

    fn plan(&self, ctx: &PipelineContext, base: &OcrConfig) -> Vec<PassPlan> {
        let mut plans = variant_passes(ctx, base, |position, _, base| {
            let segmentation = if position % 2 == 0 {
                SegmentationMode::SingleLine
            } else {
                SegmentationMode::SingleWord
            };
            vec![base.with_segmentation(segmentation)]
        });

        let binary = DynamicImage::ImageLuma8(filters::otsu(&ctx.primary().image.to_luma8()));
        let line = base.with_segmentation(SegmentationMode::SingleLine);
        plans.push(PassPlan::single(
            "otsu-spacing",
            binary.clone(),
            line.clone().with_option("preserve_interword_spaces", "1"),
        ));
        plans.push(PassPlan::single(
            "otsu-fixed-spacing",
            binary,
            line.with_option("textord_space_size_is_variable", "0"),
        ));
        plans
    }

    /// Length in characters; selection takes the longest anyway.
    fn score(&self, text: &str) -> f64 {
        text.trim().chars().count() as f64
    }

    fn finish(&self, text: String) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
