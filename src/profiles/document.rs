//! Scanned pages, books, letters.

use super::{variant_passes, KindProfile};
use crate::classify::{AspectBucket, ColorBucket, EdgeBucket, ImageSignals, ProjectionBucket, WhiteBucket};
use crate::engine::{EngineMode, OcrConfig, SegmentationMode};
use crate::error::PreprocessError;
use crate::kind::ImageKind;
use crate::orchestrator::{regions, PassPlan};
use crate::preprocess::{filters, ImageVariant, PipelineContext, Recipe};
use crate::select::capped_generic_score;
use image::GrayImage;

const PORTRAIT: i32 = 5;
const MUTED_COLOR: i32 = 5;
const MOSTLY_WHITE: i32 = 7;
const PARTLY_WHITE: i32 = 3;
const MODERATE_EDGES: i32 = 6;
const STRUCTURED_PROJECTION: i32 = 7;

const WORD_CAP: usize = 100;
const PARAGRAPH_BONUS: f64 = 5.0;
const PARAGRAPH_CAP: usize = 10;

pub struct DocumentProfile;

impl KindProfile for DocumentProfile {
    fn kind(&self) -> ImageKind {
        ImageKind::Document
    }

    fn classify_score(&self, s: &ImageSignals) -> i32 {
        let mut score = 0;
        if s.aspect == AspectBucket::Portrait {
            score += PORTRAIT;
        }
        if s.color == ColorBucket::Muted {
            score += MUTED_COLOR;
        }
        score += match s.white {
            WhiteBucket::Mostly => MOSTLY_WHITE,
            WhiteBucket::Partly => PARTLY_WHITE,
            WhiteBucket::Little => 0,
        };
        if s.edges == EdgeBucket::Moderate {
            score += MODERATE_EDGES;
        }
        if s.projection == ProjectionBucket::Structured {
            score += STRUCTURED_PROJECTION;
        }
        score
    }

    fn variants(&self, gray: &GrayImage) -> Result<Vec<ImageVariant>, PreprocessError> {
        let clahe = filters::clahe(gray, 2.0, (8, 8));
        let adaptive = filters::adaptive_gaussian(&clahe, 11, 2);
        let otsu = filters::otsu(&clahe);
        let closed = filters::close(&otsu);
        Ok(vec![
            ImageVariant::gray(Recipe::AdaptiveClahe, adaptive),
            ImageVariant::gray(Recipe::Denoised, filters::denoise(gray)),
            ImageVariant::gray(Recipe::OtsuClahe, otsu),
            ImageVariant::gray(Recipe::Closed, closed),
            ImageVariant::gray(Recipe::Clahe, clahe),
        ])
    }

    fn base_config(&self, language: &str) -> OcrConfig {
        OcrConfig::new(language, EngineMode::Combined, SegmentationMode::SingleColumn)
            .with_option("preserve_interword_spaces", "1")
            .with_option("textord_heavy_nr", "1")
            .with_option("textord_min_linesize", "2.5")
    }

    fn plan(&self, ctx: &PipelineContext, base: &OcrConfig) -> Vec<PassPlan> {
        let mut plans = variant_passes(ctx, base, |_, recipe, base| match recipe {
            // Clean binary output reads well with the legacy recognizer.
            Recipe::OtsuClahe => vec![base.with_engine(EngineMode::Legacy)],
            Recipe::Denoised => vec![base.alternate()],
            _ => vec![base.clone()],
        });

        let primary = &ctx.primary().image;
        let columns = regions::detect_columns(&primary.to_luma8());
        if !columns.is_empty() {
            log::info!("[OCR] Multi-column layout: {} columns", columns.len());
            let column_config = base.with_segmentation(SegmentationMode::SingleColumn);
            let rects: Vec<_> = columns.into_iter().map(|r| (r, column_config.clone())).collect();
            plans.extend(PassPlan::regions("columns", primary, &rects, "\n\n"));
        }
        plans
    }

    fn score(&self, text: &str) -> f64 {
        let paragraphs = text.split("\n\n").filter(|p| !p.trim().is_empty()).count();
        capped_generic_score(text, WORD_CAP) + PARAGRAPH_BONUS * paragraphs.min(PARAGRAPH_CAP) as f64
    }
}
