//! Certificates, awards and other formal one-page layouts.

use super::{variant_passes, KindProfile};
use crate::classify::{AspectBucket, EdgeBucket, ImageSignals, WhiteBucket};
use crate::engine::configure::certificate_override;
use crate::engine::{EngineMode, OcrConfig, SegmentationMode};
use crate::error::PreprocessError;
use crate::kind::ImageKind;
use crate::normalize;
use crate::orchestrator::{regions, PassPlan, Region};
use crate::preprocess::{filters, ImageVariant, PipelineContext, Recipe};
use crate::select::{char_ratio, line_count};
use crate::source::crop_clamped;
use image::{DynamicImage, GrayImage};
use regex::Regex;
use std::sync::OnceLock;

const PORTRAIT: i32 = 5;
const MOSTLY_WHITE: i32 = 5;
const SPARSE_EDGES: i32 = 8;
const BORDERED_PAGE: i32 = 15;

const HEADING_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ ";

const KEYWORDS: &[&str] = &[
    "certificate", "certify", "award", "recognition", "presented", "completion",
    "achievement", "hereby", "issued", "granted", "honored", "date", "signature",
    "authorized", "official",
];

static DATE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

/// Numeric dates, "12 March 2020" and "June 5, 2021".
fn date_pattern() -> Option<&'static Regex> {
    DATE_REGEX
        .get_or_init(|| {
            let months = "(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*";
            Regex::new(&format!(
                r"(?i)\d{{1,2}}[/-]\d{{1,2}}[/-]\d{{2,4}}|\d{{1,2}}\s+{m}\s+\d{{2,4}}|{m}\s+\d{{1,2}},?\s+\d{{2,4}}",
                m = months
            ))
            .ok()
        })
        .as_ref()
}

pub struct CertificateProfile;

impl CertificateProfile {
    fn heading_config(base: &OcrConfig) -> OcrConfig {
        base.clone().with_option("tessedit_char_whitelist", HEADING_WHITELIST)
    }

    /// Header / body / footer passes, plus a variant with the body re-thresholded.
    fn section_passes(primary: &DynamicImage, base: &OcrConfig) -> Vec<PassPlan> {
        let [top, middle, bottom] = regions::thirds(primary.width(), primary.height());
        let title = Self::heading_config(&base.with_segmentation(SegmentationMode::SingleLine));
        let body = base.with_segmentation(SegmentationMode::SingleBlock);
        let footer = base.with_segmentation(SegmentationMode::Sparse);

        let mut plans = Vec::new();
        plans.extend(PassPlan::regions(
            "sections",
            primary,
            &[(top, title.clone()), (middle, body.clone()), (bottom, footer.clone())],
            "\n\n",
        ));

        let crops = [top, middle, bottom].map(|(x, y, w, h)| crop_clamped(primary, x, y, w, h));
        if let [Some(head), Some(mid), Some(foot)] = crops {
            let rethresholded = filters::adaptive_gaussian(&mid.to_luma8(), 11, 2);
            plans.push(PassPlan::Regions {
                label: "sections-rethresholded".to_string(),
                regions: vec![
                    Region { image: head, config: title },
                    Region {
                        image: DynamicImage::ImageLuma8(rethresholded),
                        config: body,
                    },
                    Region { image: foot, config: footer },
                ],
                separator: "\n\n",
            });
        }
        plans
    }
}

impl KindProfile for CertificateProfile {
    fn kind(&self) -> ImageKind {
        ImageKind::Certificate
    }

    fn classify_score(&self, s: &ImageSignals) -> i32 {
        let mut score = 0;
        if s.aspect == AspectBucket::Portrait {
            score += PORTRAIT;
        }
        if s.white == WhiteBucket::Mostly {
            score += MOSTLY_WHITE;
        }
        if s.edges == EdgeBucket::Sparse {
            score += SPARSE_EDGES;
        }
        if s.certificate_like {
            score += BORDERED_PAGE;
        }
        score
    }

    fn variants(&self, gray: &GrayImage) -> Result<Vec<ImageVariant>, PreprocessError> {
        let clahe = filters::clahe(gray, 2.0, (8, 8));
        let binary = filters::otsu(&clahe);
        let adaptive = filters::adaptive_gaussian(&clahe, 11, 2);
        let denoised = filters::denoise(&clahe);
        let sharpened = filters::sharpen(&clahe);
        let closed = filters::close(&binary);
        Ok(vec![
            ImageVariant::gray(Recipe::AdaptiveClahe, adaptive),
            ImageVariant::gray(Recipe::Clahe, clahe),
            ImageVariant::gray(Recipe::OtsuClahe, binary),
            ImageVariant::gray(Recipe::Denoised, denoised),
            ImageVariant::gray(Recipe::Sharpened, sharpened),
            ImageVariant::gray(Recipe::Closed, closed),
        ])
    }

    fn base_config(&self, language: &str) -> OcrConfig {
        certificate_override(language)
    }

    fn plan(&self, ctx: &PipelineContext, base: &OcrConfig) -> Vec<PassPlan> {
        let mut plans = variant_passes(ctx, base, |_, recipe, base| match recipe {
            Recipe::Clahe => vec![base.clone()],
            Recipe::OtsuClahe => vec![base.with_engine(EngineMode::Legacy)],
            _ => vec![base.alternate()],
        });

        let primary = &ctx.primary().image;
        plans.extend(Self::section_passes(primary, base));

        // Big title lettering: hard threshold, fattened strokes, capitals only.
        let heading = filters::thicken_strokes(&filters::otsu(&primary.to_luma8()));
        plans.push(PassPlan::single(
            "heading",
            DynamicImage::ImageLuma8(heading),
            Self::heading_config(base),
        ));
        plans
    }

    fn score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let keywords = KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
        let mut score = keywords as f64 * 10.0
            + line_count(text).min(10) as f64 * 5.0
            + char_ratio(text, char::is_alphanumeric) * 50.0;
        if date_pattern().is_some_and(|re| re.is_match(text)) {
            score += 30.0;
        }
        score
    }

    fn finish(&self, text: String) -> String {
        normalize::normalize_certificate(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_and_date_outscore_plain_text() {
        let p = CertificateProfile;
        let cert = "certificate 05/12/2023";
        let plain = "abcdefghijklmnopqrstuv";
        assert_eq!(cert.len(), plain.len());
        assert!(p.score(cert) > p.score(plain));
    }

    #[test]
    fn recognises_date_styles() {
        let re = date_pattern().unwrap();
        assert!(re.is_match("Issued June 5, 2021"));
        assert!(re.is_match("on 12 March 2020"));
        assert!(re.is_match("05-12-23"));
        assert!(!re.is_match("no date here"));
    }

    #[test]
    fn plan_includes_sections_and_heading() {
        use crate::settings::ScanSettings;
        use crate::source::SourceImage;

        let source = SourceImage::new(DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 90, image::Luma([240]))));
        let ctx = crate::preprocess::preprocess(&source, Some(ImageKind::Certificate), &ScanSettings::default());
        let base = certificate_override("eng");
        let plans = CertificateProfile.plan(&ctx, &base);
        let labels: Vec<String> = plans
            .iter()
            .map(|p| match p {
                PassPlan::Single { label, .. } | PassPlan::Regions { label, .. } => label.clone(),
            })
            .collect();
        assert_eq!(labels[0], "adaptive-clahe");
        assert!(labels.contains(&"sections".to_string()));
        assert!(labels.contains(&"sections-rethresholded".to_string()));
        assert_eq!(labels.last().map(String::as_str), Some("heading"));
    }
}
