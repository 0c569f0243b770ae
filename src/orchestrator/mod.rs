//! Multi-pass recognition.
//!
//! A label profile turns the pipeline context into a list of passes
//! (whole-image calls and region sweeps) that run one after another.
//! When there is no label, or none of those passes produced text, the
//! generic strategy takes over: three passes for small images, or a
//! banded sweep where each band gets two calls on a bounded pool.
//!
//! Every engine call runs on tokio's blocking pool. A failed call
//! becomes a failed candidate; an unavailable engine aborts the scan.

pub mod regions;

use crate::engine::configure::default_config;
use crate::engine::{OcrConfig, RecognitionEngine};
use crate::error::{EngineError, ScanError};
use crate::preprocess::{filters, PipelineContext};
use crate::profiles;
use crate::select::{generic_score, OcrCandidate};
use crate::source::{crop_clamped, encode_png};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Size limits for the generic strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandingSettings {
    /// Images with at least this many pixels are split into bands.
    pub area_threshold: u64,
    /// Nominal band height used to pick the band count.
    pub band_height: u32,
    pub min_bands: u32,
    pub max_bands: u32,
}

impl Default for BandingSettings {
    fn default() -> Self {
        Self {
            area_threshold: 500_000,
            band_height: 500,
            min_bands: 2,
            max_bands: 4,
        }
    }
}

/// A crop of the pass image plus the config to read it with.
#[derive(Debug, Clone)]
pub struct Region {
    pub image: DynamicImage,
    pub config: OcrConfig,
}

/// One planned recognition attempt; each produces exactly one candidate.
#[derive(Debug, Clone)]
pub enum PassPlan {
    Single {
        label: String,
        image: DynamicImage,
        config: OcrConfig,
    },
    /// Read each region separately and join the non-empty texts in order.
    Regions {
        label: String,
        regions: Vec<Region>,
        separator: &'static str,
    },
}

impl PassPlan {
    pub fn single(label: impl Into<String>, image: DynamicImage, config: OcrConfig) -> Self {
        PassPlan::Single {
            label: label.into(),
            image,
            config,
        }
    }

    /// Regions cropped from `image`; empty crops are skipped.
    pub fn regions(
        label: impl Into<String>,
        image: &DynamicImage,
        rects: &[(regions::Rect, OcrConfig)],
        separator: &'static str,
    ) -> Option<Self> {
        let regions: Vec<Region> = rects
            .iter()
            .filter_map(|((x, y, w, h), config)| {
                crop_clamped(image, *x, *y, *w, *h).map(|image| Region {
                    image,
                    config: config.clone(),
                })
            })
            .collect();
        if regions.is_empty() {
            return None;
        }
        Some(PassPlan::Regions {
            label: label.into(),
            regions,
            separator,
        })
    }
}

/// How the candidates were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Specialized,
    Generic,
    Banded,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub strategy: Strategy,
    pub candidates: Vec<OcrCandidate>,
}

/// Drives a recognition engine across variants, regions and bands.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn RecognitionEngine>,
    banding: BandingSettings,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn RecognitionEngine>, banding: BandingSettings) -> Self {
        Self { engine, banding }
    }

    /// Run the specialised passes for the context's label, falling back
    /// to the generic strategy when they yield nothing usable.
    pub async fn extract(&self, ctx: &PipelineContext, config: &OcrConfig) -> Result<Extraction, ScanError> {
        let start = Instant::now();
        let mut specialized = Vec::new();

        if let Some(kind) = ctx.kind {
            let plans = profiles::profile(kind).plan(ctx, config);
            log::info!("[OCR] {} specialised passes for {}", plans.len(), kind);
            for plan in plans {
                specialized.push(self.execute(plan).await?);
            }
            if specialized.iter().any(OcrCandidate::is_usable) {
                log::info!(
                    "[OCR] Specialised extraction: {} candidates in {}ms",
                    specialized.len(),
                    start.elapsed().as_millis()
                );
                return Ok(Extraction {
                    strategy: Strategy::Specialized,
                    candidates: specialized,
                });
            }
            log::warn!("[OCR] Specialised passes produced no text, using generic strategy");
        }

        let mut extraction = self.generic(&ctx.primary().image, config).await?;
        log::info!(
            "[OCR] {:?} extraction: {} candidates in {}ms",
            extraction.strategy,
            extraction.candidates.len(),
            start.elapsed().as_millis()
        );
        // Keep the failed specialised attempts visible in the report.
        specialized.append(&mut extraction.candidates);
        extraction.candidates = specialized;
        Ok(extraction)
    }

    /// Generic strategy over one image.
    pub async fn generic(&self, image: &DynamicImage, config: &OcrConfig) -> Result<Extraction, ScanError> {
        let area = image.width() as u64 * image.height() as u64;
        if area < self.banding.area_threshold {
            let thresholded = DynamicImage::ImageLuma8(filters::adaptive_gaussian(&image.to_luma8(), 11, 2));
            let plans = vec![
                PassPlan::single("generic", image.clone(), config.clone()),
                PassPlan::single("generic-alternate", image.clone(), config.alternate()),
                PassPlan::single("generic-adaptive", thresholded, config.clone()),
            ];
            let mut candidates = Vec::with_capacity(plans.len());
            for plan in plans {
                candidates.push(self.execute(plan).await?);
            }
            return Ok(Extraction {
                strategy: Strategy::Generic,
                candidates,
            });
        }

        let text = self.banded(image, config).await?;
        Ok(Extraction {
            strategy: Strategy::Banded,
            candidates: vec![OcrCandidate::new(text, "banded", config.clone())],
        })
    }

    /// Split into horizontal bands, read each twice in parallel, keep the
    /// better text per band and join in band order.
    async fn banded(&self, image: &DynamicImage, config: &OcrConfig) -> Result<String, ScanError> {
        let count = regions::band_count(
            image.height(),
            self.banding.band_height,
            self.banding.min_bands,
            self.banding.max_bands,
        );
        let bands = regions::bands(image.width(), image.height(), count);
        log::info!("[OCR] Banded recognition: {} bands over {}x{}", bands.len(), image.width(), image.height());

        let pool = Arc::new(Semaphore::new(bands.len().max(1)));
        let alternate = config.alternate();
        let mut handles = Vec::with_capacity(bands.len());
        for (x, y, w, h) in &bands {
            let band = image.crop_imm(*x, *y, *w, *h);
            let pair = [config.clone(), alternate.clone()].map(|cfg| {
                let engine = Arc::clone(&self.engine);
                let pool = Arc::clone(&pool);
                let band = band.clone();
                tokio::spawn(async move {
                    let _permit = pool.acquire_owned().await.ok();
                    recognize(engine, band, cfg).await
                })
            });
            handles.push(pair);
        }

        let mut chosen = Vec::with_capacity(handles.len());
        for index in 0..handles.len() {
            let mut best: Option<(f64, String)> = None;
            for slot in 0..2 {
                let joined = (&mut handles[index][slot]).await;
                let text = match joined {
                    Ok(Ok(text)) => text,
                    Ok(Err(e)) => {
                        // Engine gone: stop the bands still queued on the pool.
                        handles.iter().flatten().for_each(JoinHandle::abort);
                        return Err(e);
                    }
                    Err(e) => {
                        log::warn!("[OCR] Band {} task aborted: {}", index, e);
                        None
                    }
                };
                let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
                    continue;
                };
                let score = generic_score(&text);
                if best.as_ref().map_or(true, |(b, _)| score > *b) {
                    best = Some((score, text));
                }
            }
            if let Some((_, text)) = best {
                chosen.push(text);
            }
        }
        Ok(chosen.join("\n"))
    }

    /// Run one plan to a candidate.
    pub async fn execute(&self, plan: PassPlan) -> Result<OcrCandidate, ScanError> {
        match plan {
            PassPlan::Single { label, image, config } => {
                match recognize(Arc::clone(&self.engine), image, config.clone()).await? {
                    Some(text) => Ok(OcrCandidate::new(text, label, config)),
                    None => Ok(OcrCandidate::failed(label, config)),
                }
            }
            PassPlan::Regions {
                label,
                regions,
                separator,
            } => {
                let representative = match regions.first() {
                    Some(region) => region.config.clone(),
                    None => return Ok(OcrCandidate::failed(label, default_config("eng"))),
                };
                let mut texts = Vec::new();
                let mut any_ok = false;
                for region in regions {
                    if let Some(text) = recognize(Arc::clone(&self.engine), region.image, region.config).await? {
                        any_ok = true;
                        if !text.is_empty() {
                            texts.push(text);
                        }
                    }
                }
                if any_ok {
                    Ok(OcrCandidate::new(texts.join(separator), label, representative))
                } else {
                    Ok(OcrCandidate::failed(label, representative))
                }
            }
        }
    }
}

/// One engine call on the blocking pool.
///
/// `Ok(None)` means this call failed and should be dropped;
/// `Err` means the engine is gone and the scan must stop.
async fn recognize(
    engine: Arc<dyn RecognitionEngine>,
    image: DynamicImage,
    config: OcrConfig,
) -> Result<Option<String>, ScanError> {
    let joined = tokio::task::spawn_blocking(move || {
        let png = encode_png(&image).map_err(|e| EngineError::CallFailed(format!("PNG encode failed: {}", e)))?;
        engine.recognize(&png, &config)
    })
    .await;

    match joined {
        Ok(Ok(text)) => Ok(Some(text.trim().to_string())),
        Ok(Err(EngineError::Unavailable(msg))) => Err(ScanError::EngineUnavailable(msg)),
        Ok(Err(EngineError::CallFailed(msg))) => {
            log::warn!("[OCR] Pass failed: {}", msg);
            Ok(None)
        }
        Err(e) => {
            log::warn!("[OCR] Recognition task aborted: {}", e);
            Ok(None)
        }
    }
}
