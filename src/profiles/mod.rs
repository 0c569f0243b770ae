//! Per-label behaviour behind one trait.
//!
//! Every label contributes the same five things: its share of the
//! classifier score, its preprocessing recipe, its base engine config,
//! the passes it wants the orchestrator to run and how it scores text.
//! The rest of the pipeline only ever dispatches through `profile()`.

mod certificate;
mod document;
mod screenshot;
mod single_line;

pub use certificate::CertificateProfile;
pub use document::DocumentProfile;
pub use screenshot::ScreenshotProfile;
pub use single_line::SingleLineProfile;

use crate::classify::ImageSignals;
use crate::engine::OcrConfig;
use crate::error::PreprocessError;
use crate::kind::ImageKind;
use crate::orchestrator::PassPlan;
use crate::preprocess::{ImageVariant, PipelineContext, Recipe};
use image::GrayImage;

pub trait KindProfile: Send + Sync {
    fn kind(&self) -> ImageKind;

    /// This label's score from the classifier signals.
    fn classify_score(&self, signals: &ImageSignals) -> i32;

    /// Ordered variants from the grayscale source; element 0 is primary.
    fn variants(&self, gray: &GrayImage) -> Result<Vec<ImageVariant>, PreprocessError>;

    fn base_config(&self, language: &str) -> OcrConfig;

    /// Recognition passes for a preprocessed context.
    fn plan(&self, ctx: &PipelineContext, base: &OcrConfig) -> Vec<PassPlan>;

    /// Quality score of a candidate text; higher is better.
    fn score(&self, text: &str) -> f64;

    /// Label-specific layout applied after normalization.
    fn finish(&self, text: String) -> String {
        text
    }
}

static DOCUMENT: DocumentProfile = DocumentProfile;
static SCREENSHOT: ScreenshotProfile = ScreenshotProfile;
static CERTIFICATE: CertificateProfile = CertificateProfile;
static SINGLE_LINE: SingleLineProfile = SingleLineProfile;

/// The implementation for a label.
pub fn profile(kind: ImageKind) -> &'static dyn KindProfile {
    match kind {
        ImageKind::Document => &DOCUMENT,
        ImageKind::Screenshot => &SCREENSHOT,
        ImageKind::Certificate => &CERTIFICATE,
        ImageKind::SingleLine => &SINGLE_LINE,
    }
}

/// Primary variant with the base config, then every alternate variant
/// with whatever configs `alternates` assigns to it (by list position).
pub(crate) fn variant_passes<F>(ctx: &PipelineContext, base: &OcrConfig, alternates: F) -> Vec<PassPlan>
where
    F: Fn(usize, Recipe, &OcrConfig) -> Vec<OcrConfig>,
{
    let primary = ctx.primary();
    let mut plans = vec![PassPlan::single(primary.recipe.id(), primary.image.clone(), base.clone())];
    for (offset, variant) in ctx.alternates().iter().enumerate() {
        for config in alternates(offset + 1, variant.recipe, base) {
            plans.push(PassPlan::single(variant.recipe.id(), variant.image.clone(), config));
        }
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_matches_kind() {
        for kind in ImageKind::ALL {
            assert_eq!(profile(kind).kind(), kind);
        }
    }
}
