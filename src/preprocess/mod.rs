//! Preprocessing: turn one source image into an ordered list of variants.
//!
//! Each label profile owns a fixed recipe chain; when no label applies,
//! the generic recipe (light denoise or an enhancement preset, plus the
//! optional multi-approach set) is used instead. Element 0 of the list
//! is the primary variant. Any failure collapses the list to the
//! untouched source, so the list is never empty.

pub mod filters;

use crate::error::PreprocessError;
use crate::kind::ImageKind;
use crate::profiles;
use crate::settings::ScanSettings;
use crate::source::SourceImage;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Longer-side limit applied before the multi-approach enhancement set.
const ENHANCE_MAX_SIDE: u32 = 2000;

/// Identifies how a variant was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recipe {
    Source,
    Denoised,
    Clahe,
    Adaptive,
    AdaptiveClahe,
    Otsu,
    OtsuClahe,
    Sharpened,
    SharpenedOtsu,
    Closed,
    Thickened,
    ContrastPreset,
    SharpenPreset,
    GrayscalePreset,
    EnhanceAdaptive,
    EnhanceClaheOtsu,
    EnhanceDenoiseSharpen,
}

impl Recipe {
    pub fn id(self) -> &'static str {
        match self {
            Recipe::Source => "source",
            Recipe::Denoised => "denoised",
            Recipe::Clahe => "clahe",
            Recipe::Adaptive => "adaptive",
            Recipe::AdaptiveClahe => "adaptive-clahe",
            Recipe::Otsu => "otsu",
            Recipe::OtsuClahe => "otsu-clahe",
            Recipe::Sharpened => "sharpened",
            Recipe::SharpenedOtsu => "sharpened-otsu",
            Recipe::Closed => "closed",
            Recipe::Thickened => "thickened",
            Recipe::ContrastPreset => "contrast-preset",
            Recipe::SharpenPreset => "sharpen-preset",
            Recipe::GrayscalePreset => "grayscale-preset",
            Recipe::EnhanceAdaptive => "enhance-adaptive",
            Recipe::EnhanceClaheOtsu => "enhance-clahe-otsu",
            Recipe::EnhanceDenoiseSharpen => "enhance-denoise-sharpen",
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One processed copy of the source, tagged with its recipe.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub recipe: Recipe,
    pub image: DynamicImage,
}

impl ImageVariant {
    pub fn new(recipe: Recipe, image: DynamicImage) -> Self {
        Self { recipe, image }
    }

    pub fn gray(recipe: Recipe, image: GrayImage) -> Self {
        Self::new(recipe, DynamicImage::ImageLuma8(image))
    }
}

/// User-selectable preset for the generic recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enhancement {
    #[default]
    None,
    Contrast,
    Sharpen,
    Grayscale,
}

impl FromStr for Enhancement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Enhancement::None),
            "contrast" => Ok(Enhancement::Contrast),
            "sharpen" => Ok(Enhancement::Sharpen),
            "grayscale" | "greyscale" => Ok(Enhancement::Grayscale),
            other => Err(format!("Unknown enhancement preset: {}", other)),
        }
    }
}

/// State threaded from preprocessing into orchestration.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub source: SourceImage,
    /// Label that drove the recipe; `None` for the generic recipe.
    pub kind: Option<ImageKind>,
    /// Never empty; element 0 is the primary variant.
    pub variants: Vec<ImageVariant>,
    /// True when preprocessing failed and the source stands in.
    pub fell_back: bool,
}

impl PipelineContext {
    pub(crate) fn fallback(source: &SourceImage, kind: Option<ImageKind>) -> Self {
        Self {
            source: source.clone(),
            kind,
            variants: vec![ImageVariant::new(Recipe::Source, source.image().clone())],
            fell_back: true,
        }
    }

    pub fn primary(&self) -> &ImageVariant {
        // The constructor paths all push at least one variant.
        &self.variants[0]
    }

    /// Variants after the primary.
    pub fn alternates(&self) -> &[ImageVariant] {
        &self.variants[1..]
    }

    /// Downscale the primary variant so it fits in `max_pixels`.
    pub fn cap_primary(&mut self, max_pixels: u64) {
        let Some(primary) = self.variants.first_mut() else {
            return;
        };
        if let Some(capped) = filters::cap_pixels(&primary.image, max_pixels) {
            log::info!(
                "[PREPROCESS] Resized primary for OCR: {}x{} -> {}x{}",
                primary.image.width(),
                primary.image.height(),
                capped.width(),
                capped.height()
            );
            primary.image = capped;
        }
    }
}

/// Build the variant list for `kind` (or the generic recipe for `None`).
///
/// Never fails: on error the source image is the single variant.
pub fn preprocess(source: &SourceImage, kind: Option<ImageKind>, settings: &ScanSettings) -> PipelineContext {
    let start = Instant::now();
    let result = match kind {
        Some(k) => recipe_variants(source, |gray| profiles::profile(k).variants(gray)),
        None => recipe_variants(source, |gray| {
            generic_variants(source, gray, settings.enhancement, settings.ai_enhance)
        }),
    };

    match result {
        Ok(variants) => {
            log::info!(
                "[PREPROCESS] {} variants for {} in {}ms: {:?}",
                variants.len(),
                kind.map(|k| k.as_str()).unwrap_or("generic"),
                start.elapsed().as_millis(),
                variants.iter().map(|v| v.recipe.id()).collect::<Vec<_>>()
            );
            PipelineContext {
                source: source.clone(),
                kind,
                variants,
                fell_back: false,
            }
        }
        Err(e) => {
            log::warn!("[PREPROCESS] Falling back to source image: {}", e);
            PipelineContext::fallback(source, kind)
        }
    }
}

fn recipe_variants<F>(source: &SourceImage, build: F) -> Result<Vec<ImageVariant>, PreprocessError>
where
    F: FnOnce(&GrayImage) -> Result<Vec<ImageVariant>, PreprocessError>,
{
    if source.width() == 0 || source.height() == 0 {
        return Err(PreprocessError::EmptyImage {
            width: source.width(),
            height: source.height(),
        });
    }
    let gray = source.to_gray();
    let variants = build(&gray)?;
    validate(&variants)?;
    Ok(variants)
}

fn validate(variants: &[ImageVariant]) -> Result<(), PreprocessError> {
    if variants.is_empty() {
        return Err(PreprocessError::InvalidOutput {
            recipe: "all",
            reason: "no variants produced".to_string(),
        });
    }
    for v in variants {
        if v.image.width() == 0 || v.image.height() == 0 {
            return Err(PreprocessError::InvalidOutput {
                recipe: v.recipe.id(),
                reason: format!("{}x{} output", v.image.width(), v.image.height()),
            });
        }
    }
    Ok(())
}

/// The recipe used when no label applies.
///
/// With no preset and no enhancement flag, colour sources get a light
/// median denoise and grayscale sources pass through. With the flag, the
/// multi-approach set leads the list (first one is primary).
pub fn generic_variants(
    source: &SourceImage,
    gray: &GrayImage,
    enhancement: Enhancement,
    ai_enhance: bool,
) -> Result<Vec<ImageVariant>, PreprocessError> {
    let preset = match enhancement {
        Enhancement::None if source.is_color() => {
            Some(ImageVariant::gray(Recipe::Denoised, filters::denoise(gray)))
        }
        Enhancement::None if !ai_enhance => Some(ImageVariant::new(Recipe::Source, source.image().clone())),
        Enhancement::None => None,
        Enhancement::Contrast => {
            let contrast = filters::clahe(gray, 3.0, (8, 8));
            Some(ImageVariant::gray(Recipe::ContrastPreset, filters::denoise(&contrast)))
        }
        Enhancement::Sharpen => {
            let sharp = filters::unsharp(gray, 3.0);
            Some(ImageVariant::gray(Recipe::SharpenPreset, filters::clahe(&sharp, 2.0, (8, 8))))
        }
        Enhancement::Grayscale => {
            let contrast = filters::clahe(gray, 2.0, (8, 8));
            Some(ImageVariant::gray(Recipe::GrayscalePreset, filters::adaptive_gaussian(&contrast, 11, 2)))
        }
    };

    let mut variants = Vec::new();
    if ai_enhance {
        let base = match &preset {
            Some(v) => v.image.to_luma8(),
            None => gray.clone(),
        };
        variants.extend(enhancement_set(&base));
    }
    variants.extend(preset);
    Ok(variants)
}

/// Adaptive, CLAHE + Otsu, and denoise + sharpen + fixed threshold.
fn enhancement_set(gray: &GrayImage) -> Vec<ImageVariant> {
    let gray = filters::limit_longest_side(gray, ENHANCE_MAX_SIDE);
    let clahe = filters::clahe(&gray, 2.0, (8, 8));
    let sharp = filters::sharpen(&filters::denoise(&gray));
    vec![
        ImageVariant::gray(Recipe::EnhanceAdaptive, filters::adaptive_gaussian(&gray, 11, 2)),
        ImageVariant::gray(Recipe::EnhanceClaheOtsu, filters::otsu(&clahe)),
        ImageVariant::gray(Recipe::EnhanceDenoiseSharpen, filters::binarize(&sharp, 150)),
    ]
}
