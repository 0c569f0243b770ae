//! The scan entry point.
//!
//! probe → classify → preprocess → configure → extract → select → normalize
//!
//! A scan is one async unit of work. CPU-heavy stages run on tokio's
//! blocking pool so a caller on an interactive runtime stays responsive;
//! the banded orchestrator path is the only place calls run in parallel.

use crate::classify::{classify, Classification};
use crate::engine::{configure, EngineMode, OcrConfig, RecognitionEngine, SegmentationMode, TesseractEngine};
use crate::error::{EngineError, ScanError};
use crate::kind::ImageKind;
use crate::normalize::{self, is_placeholder_only, CorrectionTables};
use crate::orchestrator::{Orchestrator, PassPlan, Strategy};
use crate::preprocess::{filters, preprocess, PipelineContext};
use crate::profiles;
use crate::select::{generic_score, select, OcrCandidate, ScanStatus, ScoredCandidate};
use crate::settings::{default_debug_dir, ScanSettings};
use crate::source::{png_data_uri, SourceImage};
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

const DEBUG_ARTIFACT_NAME: &str = "last_processed.png";

/// Milliseconds spent per stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub classify_ms: u128,
    pub preprocess_ms: u128,
    pub ocr_ms: u128,
    pub normalize_ms: u128,
    pub total_ms: u128,
}

/// Everything a caller may want to show about one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Label that drove recipes and scoring; `None` in generic mode.
    pub kind: Option<ImageKind>,
    /// What the classifier said, whatever the mode.
    pub detected: ImageKind,
    pub classification: Classification,
    /// Final normalized text; empty when `status` is `NoUsableText`.
    pub text: String,
    pub status: ScanStatus,
    /// `None` when no recognition ran (blank image).
    pub strategy: Option<Strategy>,
    pub candidates: Vec<ScoredCandidate>,
    pub timings: StageTimings,
    /// Primary processed image, for optional inspection.
    #[serde(skip)]
    pub primary_image: DynamicImage,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.status == ScanStatus::NoUsableText
    }

    /// The primary processed image as a `data:image/png;base64,` URI.
    pub fn primary_png_data_uri(&self) -> Result<String, image::ImageError> {
        png_data_uri(&self.primary_image)
    }
}

/// Runs scans against one engine with one set of settings.
#[derive(Clone)]
pub struct Scanner {
    engine: Arc<dyn RecognitionEngine>,
    settings: ScanSettings,
    tables: Arc<CorrectionTables>,
}

impl Scanner {
    pub fn new(engine: Arc<dyn RecognitionEngine>, settings: ScanSettings) -> Self {
        let tables = match &settings.extra_corrections {
            Some(path) => CorrectionTables::with_extra_file(path).unwrap_or_else(|e| {
                log::warn!("[NORMALIZE] Using built-in corrections only: {}", e);
                CorrectionTables::builtin().clone()
            }),
            None => CorrectionTables::builtin().clone(),
        };
        Self {
            engine,
            settings,
            tables: Arc::new(tables),
        }
    }

    /// Scanner over the Tesseract CLI named in the settings.
    pub fn with_tesseract(settings: ScanSettings) -> Self {
        let engine = Arc::new(TesseractEngine::new(&settings.tesseract_cmd));
        Self::new(engine, settings)
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run a scan as its own task. Dropping the handle discards the result;
    /// engine calls already in flight still run to completion.
    pub fn spawn_scan(&self, source: SourceImage) -> JoinHandle<Result<ScanReport, ScanError>> {
        let scanner = self.clone();
        tokio::spawn(async move { scanner.scan(&source).await })
    }

    pub async fn scan(&self, source: &SourceImage) -> Result<ScanReport, ScanError> {
        let scan_start = Instant::now();
        let mut timings = StageTimings::default();
        log::info!(
            "[PIPELINE] Scan {}x{} (mode: {}, lang: {})",
            source.width(),
            source.height(),
            self.settings.mode,
            self.settings.language
        );

        self.probe().await?;

        // Stage 1: classify
        let stage = Instant::now();
        let classification = self.classify(source).await;
        timings.classify_ms = stage.elapsed().as_millis();
        let detected = classification.kind;
        let kind = self.settings.mode.resolve(detected);
        log::info!(
            "[PIPELINE] Detected {}, scanning as {}",
            detected,
            kind.map(|k| k.as_str()).unwrap_or("generic")
        );

        let blank = {
            let gray = source.clone();
            tokio::task::spawn_blocking(move || filters::is_blank(&gray.to_gray()))
                .await
                .unwrap_or(false)
        };
        if blank {
            log::info!("[PIPELINE] Blank image, skipping recognition");
            timings.total_ms = scan_start.elapsed().as_millis();
            return Ok(ScanReport {
                kind,
                detected,
                classification,
                text: String::new(),
                status: ScanStatus::NoUsableText,
                strategy: None,
                candidates: Vec::new(),
                timings,
                primary_image: source.image().clone(),
            });
        }

        // Stage 2: preprocess
        let stage = Instant::now();
        let ctx = {
            let owned = source.clone();
            let settings = self.settings.clone();
            preprocess_off_thread(source, kind, self.settings.max_ocr_pixels, move || {
                let mut ctx = preprocess(&owned, kind, &settings);
                ctx.cap_primary(settings.max_ocr_pixels);
                ctx
            })
            .await
        };
        timings.preprocess_ms = stage.elapsed().as_millis();

        // Stage 3: configure + extract
        let stage = Instant::now();
        let config = configure(kind, &self.settings.language, classification.certificate_like);
        let orchestrator = Orchestrator::new(Arc::clone(&self.engine), self.settings.banding.clone());
        let extraction = orchestrator.extract(&ctx, &config).await?;
        timings.ocr_ms = stage.elapsed().as_millis();

        // Stage 4: select + normalize
        let scoring_kind = match extraction.strategy {
            Strategy::Specialized => ctx.kind,
            Strategy::Generic | Strategy::Banded => None,
        };
        let selection = select(scoring_kind, &extraction.candidates);
        let stage = Instant::now();
        let mut text = self.finish(kind, &selection.text);
        let mut candidates = selection.scored;
        timings.normalize_ms = stage.elapsed().as_millis();

        if is_placeholder_only(&text) {
            let rescue_start = Instant::now();
            let (rescued, attempts) = self
                .rescue(&orchestrator, &ctx.primary().image, source.image(), kind)
                .await?;
            candidates.extend(attempts);
            text = rescued;
            timings.ocr_ms += rescue_start.elapsed().as_millis();
        }

        let status = if is_placeholder_only(&text) {
            text.clear();
            ScanStatus::NoUsableText
        } else {
            ScanStatus::Ok
        };

        let primary_image = ctx.primary().image.clone();
        if self.settings.debug_artifact {
            self.write_debug_artifact(&primary_image).await;
        }

        timings.total_ms = scan_start.elapsed().as_millis();
        log::info!(
            "[PIPELINE] {} chars ({:?}) in {}ms (classify={} + preprocess={} + ocr={} + normalize={})",
            text.chars().count(),
            status,
            timings.total_ms,
            timings.classify_ms,
            timings.preprocess_ms,
            timings.ocr_ms,
            timings.normalize_ms
        );

        Ok(ScanReport {
            kind,
            detected,
            classification,
            text,
            status,
            strategy: Some(extraction.strategy),
            candidates,
            timings,
            primary_image,
        })
    }

    async fn probe(&self) -> Result<(), ScanError> {
        let engine = Arc::clone(&self.engine);
        let language = self.settings.language.clone();
        match tokio::task::spawn_blocking(move || engine.probe(&language)).await? {
            Ok(()) => Ok(()),
            Err(EngineError::Unavailable(msg)) | Err(EngineError::CallFailed(msg)) => {
                log::error!("[ENGINE] Unavailable: {}", msg);
                Err(ScanError::EngineUnavailable(msg))
            }
        }
    }

    async fn classify(&self, source: &SourceImage) -> Classification {
        let source = source.clone();
        let thresholds = self.settings.classifier.clone();
        tokio::task::spawn_blocking(move || classify(source.image(), &thresholds))
            .await
            .unwrap_or_else(|e| {
                log::warn!("[CLASSIFY] Task aborted, defaulting to document: {}", e);
                Classification::fallback()
            })
    }

    /// Normalize, then apply the label's own layout.
    fn finish(&self, kind: Option<ImageKind>, raw: &str) -> String {
        let text = normalize::normalize_with(raw, &self.tables);
        match kind {
            Some(k) => profiles::profile(k).finish(text),
            None => text,
        }
    }

    /// Two last-chance passes: the primary variant as one block, then the
    /// untouched source with automatic segmentation. First usable text wins.
    async fn rescue(
        &self,
        orchestrator: &Orchestrator,
        primary: &DynamicImage,
        source: &DynamicImage,
        kind: Option<ImageKind>,
    ) -> Result<(String, Vec<ScoredCandidate>), ScanError> {
        let language = &self.settings.language;
        let plans = [
            PassPlan::single(
                "rescue-primary",
                primary.clone(),
                OcrConfig::new(language, EngineMode::Combined, SegmentationMode::SingleBlock),
            ),
            PassPlan::single(
                "rescue-source",
                source.clone(),
                OcrConfig::new(language, EngineMode::Combined, SegmentationMode::Auto),
            ),
        ];

        let mut attempts = Vec::new();
        for plan in plans {
            let candidate: OcrCandidate = orchestrator.execute(plan).await?;
            log::info!("[PIPELINE] Rescue pass '{}'", candidate.variant);
            let text = if candidate.is_usable() {
                self.finish(kind, &candidate.text)
            } else {
                String::new()
            };
            attempts.push(ScoredCandidate {
                score: generic_score(&candidate.text),
                candidate,
            });
            if !is_placeholder_only(&text) {
                return Ok((text, attempts));
            }
        }
        Ok((String::new(), attempts))
    }

    async fn write_debug_artifact(&self, image: &DynamicImage) {
        let dir = self.settings.debug_dir.clone().unwrap_or_else(default_debug_dir);
        let image = image.clone();
        let written = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| format!("create {}: {}", dir.display(), e))?;
            let path = dir.join(DEBUG_ARTIFACT_NAME);
            image
                .save(&path)
                .map_err(|e| format!("write {}: {}", path.display(), e))?;
            Ok::<_, String>(path)
        })
        .await;

        match written {
            Ok(Ok(path)) => log::info!("[PIPELINE] Saved processed image to {}", path.display()),
            Ok(Err(e)) => log::warn!("[PIPELINE] Debug artifact not saved: {}", e),
            Err(e) => log::warn!("[PIPELINE] Debug artifact task aborted: {}", e),
        }
    }
}

/// Run preprocessing on the blocking pool. A panicking recipe leaves the
/// scan with the source image as its only variant.
async fn preprocess_off_thread<F>(
    source: &SourceImage,
    kind: Option<ImageKind>,
    max_pixels: u64,
    work: F,
) -> PipelineContext
where
    F: FnOnce() -> PipelineContext + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(ctx) => ctx,
        Err(e) => {
            log::warn!("[PREPROCESS] Task aborted, using source image: {}", e);
            let mut ctx = PipelineContext::fallback(source, kind);
            ctx.cap_primary(max_pixels);
            ctx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns empty text for every pass until the rescue configs show up.
    struct Reluctant {
        calls: AtomicUsize,
    }

    impl RecognitionEngine for Reluctant {
        fn probe(&self, _language: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn recognize(&self, _png: &[u8], config: &OcrConfig) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if config.engine == EngineMode::Combined && config.segmentation == SegmentationMode::Auto {
                Ok("found it".to_string())
            } else {
                Ok("---".to_string())
            }
        }
    }

    fn striped() -> SourceImage {
        SourceImage::new(DynamicImage::ImageLuma8(GrayImage::from_fn(200, 120, |_, y| {
            Luma([if (y / 6) % 2 == 0 { 30 } else { 220 }])
        })))
    }

    #[tokio::test]
    async fn rescue_passes_run_when_nothing_usable() {
        let engine = Arc::new(Reluctant { calls: AtomicUsize::new(0) });
        let scanner = Scanner::new(engine.clone(), ScanSettings::default());
        let report = scanner.scan(&striped()).await.unwrap();

        assert_eq!(report.status, ScanStatus::Ok);
        assert_eq!(report.text, "found it");
        let last = report.candidates.last().unwrap();
        assert_eq!(last.candidate.variant, "rescue-source");
        assert!(engine.calls.load(Ordering::SeqCst) > 2);
    }

    #[tokio::test]
    async fn debug_artifact_written_to_configured_dir() {
        let dir = std::env::temp_dir().join(format!("adaptive-ocr-debug-{}", std::process::id()));
        let settings = ScanSettings {
            debug_artifact: true,
            debug_dir: Some(dir.clone()),
            ..ScanSettings::default()
        };
        let scanner = Scanner::new(Arc::new(Reluctant { calls: AtomicUsize::new(0) }), settings);
        scanner.scan(&striped()).await.unwrap();
        assert!(dir.join(DEBUG_ARTIFACT_NAME).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn panicking_preprocessing_falls_back_to_source() {
        let source = striped();
        let ctx = preprocess_off_thread(&source, Some(ImageKind::Document), 1_000_000, || {
            panic!("filter blew up on a degenerate buffer")
        })
        .await;

        assert!(ctx.fell_back);
        assert_eq!(ctx.kind, Some(ImageKind::Document));
        assert_eq!(ctx.variants.len(), 1);
        assert_eq!(ctx.primary().recipe, crate::preprocess::Recipe::Source);
        assert_eq!(ctx.primary().image.width(), 200);
    }

    #[tokio::test]
    async fn fallback_primary_still_respects_pixel_cap() {
        let source = striped();
        let ctx = preprocess_off_thread(&source, None, 6_000, || panic!("boom")).await;
        let primary = &ctx.primary().image;
        assert!(primary.width() as u64 * primary.height() as u64 <= 6_000);
    }
}
