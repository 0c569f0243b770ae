//! End-to-end scans against a scripted engine.
//!
//! No Tesseract install needed: the engine double decodes the PNG it is
//! handed and answers from the pixels or a fixed script.

use adaptive_ocr::engine::{EngineMode, OcrConfig, RecognitionEngine};
use adaptive_ocr::orchestrator::Strategy;
use adaptive_ocr::select::{select, OcrCandidate};
use adaptive_ocr::{EngineError, ImageKind, ScanError, ScanMode, ScanSettings, ScanStatus, Scanner, SourceImage};
use image::{DynamicImage, GrayImage, Luma};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reports the mean brightness of whatever it is asked to read.
struct Brightness {
    calls: AtomicUsize,
}

impl RecognitionEngine for Brightness {
    fn probe(&self, _language: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn recognize(&self, png: &[u8], _config: &OcrConfig) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let image = image::load_from_memory(png).map_err(|e| EngineError::CallFailed(e.to_string()))?;
        let gray = image.to_luma8();
        let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
        let mean = sum / (gray.width() as u64 * gray.height() as u64).max(1);
        Ok(format!("level {}", mean))
    }
}

/// Answers every pass with the same text.
struct Scripted(&'static str);

impl RecognitionEngine for Scripted {
    fn probe(&self, _language: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn recognize(&self, _png: &[u8], _config: &OcrConfig) -> Result<String, EngineError> {
        Ok(self.0.to_string())
    }
}

/// No binary, no language data.
struct Missing;

impl RecognitionEngine for Missing {
    fn probe(&self, _language: &str) -> Result<(), EngineError> {
        Err(EngineError::Unavailable("tesseract not found in PATH".to_string()))
    }

    fn recognize(&self, _png: &[u8], _config: &OcrConfig) -> Result<String, EngineError> {
        Err(EngineError::Unavailable("tesseract not found in PATH".to_string()))
    }
}

/// Probe passes but every call finds the binary gone.
struct VanishesMidScan;

impl RecognitionEngine for VanishesMidScan {
    fn probe(&self, _language: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn recognize(&self, _png: &[u8], _config: &OcrConfig) -> Result<String, EngineError> {
        Err(EngineError::Unavailable("tesseract exited: no such file".to_string()))
    }
}

/// Installed without legacy models: every `--oem 0` pass fails.
struct NeuralOnly;

impl RecognitionEngine for NeuralOnly {
    fn probe(&self, _language: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn recognize(&self, _png: &[u8], config: &OcrConfig) -> Result<String, EngineError> {
        if config.engine == EngineMode::Legacy {
            return Err(EngineError::CallFailed(
                "legacy engine requested, but components are not present in tessdata/eng.traineddata".to_string(),
            ));
        }
        Ok("Quarterly revenue grew in every region".to_string())
    }
}

/// Answers by the width of the image it is handed.
struct ByWidth(Vec<(u32, &'static str)>);

impl RecognitionEngine for ByWidth {
    fn probe(&self, _language: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn recognize(&self, png: &[u8], _config: &OcrConfig) -> Result<String, EngineError> {
        let width = image::load_from_memory(png)
            .map_err(|e| EngineError::CallFailed(e.to_string()))?
            .width();
        Ok(self
            .0
            .iter()
            .find(|(w, _)| *w == width)
            .map(|(_, text)| text.to_string())
            .unwrap_or_default())
    }
}

fn gray(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> SourceImage {
    SourceImage::new(DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| Luma([f(x, y)]))))
}

fn text_page() -> SourceImage {
    gray(400, 300, |x, y| if (y / 8) % 3 == 0 && x % 7 < 5 { 20 } else { 235 })
}

#[tokio::test]
async fn large_image_bands_keep_top_to_bottom_order() {
    let engine = Arc::new(Brightness { calls: AtomicUsize::new(0) });
    let settings = ScanSettings {
        mode: ScanMode::Generic,
        ..ScanSettings::default()
    };
    let scanner = Scanner::new(engine.clone(), settings);

    // 600x1600 = 960k px: over the banding threshold, under the OCR pixel cap.
    let source = gray(600, 1600, |_, y| (y * 250 / 1600) as u8);
    let report = scanner.scan(&source).await.unwrap();

    assert_eq!(report.strategy, Some(Strategy::Banded));
    assert_eq!(report.kind, None);
    let levels: Vec<u64> = report
        .text
        .lines()
        .filter_map(|l| l.strip_prefix("level "))
        .filter_map(|n| n.parse().ok())
        .collect();
    assert!(levels.len() >= 2, "expected one line per band, got {:?}", report.text);
    assert!(levels.windows(2).all(|w| w[0] < w[1]), "bands out of order: {:?}", levels);
    // Two calls per band.
    assert_eq!(engine.calls.load(Ordering::SeqCst), levels.len() * 2);
}

#[tokio::test]
async fn missing_engine_is_surfaced() {
    let scanner = Scanner::new(Arc::new(Missing), ScanSettings::default());
    let err = scanner.scan(&text_page()).await.unwrap_err();
    assert!(matches!(err, ScanError::EngineUnavailable(_)));
}

#[tokio::test]
async fn engine_vanishing_mid_scan_aborts() {
    let scanner = Scanner::new(Arc::new(VanishesMidScan), ScanSettings::default());
    let err = scanner.scan(&text_page()).await.unwrap_err();
    assert!(matches!(err, ScanError::EngineUnavailable(_)));
}

#[tokio::test]
async fn blank_image_reports_no_text_without_recognition() {
    let engine = Arc::new(Brightness { calls: AtomicUsize::new(0) });
    let scanner = Scanner::new(engine.clone(), ScanSettings::default());
    let report = scanner.scan(&gray(300, 300, |_, _| 255)).await.unwrap();

    assert_eq!(report.status, ScanStatus::NoUsableText);
    assert!(report.text.is_empty());
    assert!(report.is_empty());
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn placeholder_output_is_no_usable_text() {
    let scanner = Scanner::new(Arc::new(Scripted("--- ___ ...")), ScanSettings::default());
    let report = scanner.scan(&text_page()).await.unwrap();
    assert_eq!(report.status, ScanStatus::NoUsableText);
    assert_eq!(report.text, "");
}

#[tokio::test]
async fn forced_certificate_mode_lays_out_headings() {
    let settings = ScanSettings {
        mode: ScanMode::Forced(ImageKind::Certificate),
        ..ScanSettings::default()
    };
    let scanner = Scanner::new(
        Arc::new(Scripted("Certlficate of completion presented to Jane Doe 05/12/2023")),
        settings,
    );
    let report = scanner.scan(&text_page()).await.unwrap();

    assert_eq!(report.kind, Some(ImageKind::Certificate));
    assert_eq!(report.status, ScanStatus::Ok);
    assert!(report.text.starts_with("CERTIFICATE\n"), "got {:?}", report.text);
    assert!(report.text.contains("presented to\n"));
    assert!(!report.candidates.is_empty());
    assert!(report.primary_png_data_uri().unwrap().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn spawned_scan_runs_to_completion() {
    let scanner = Scanner::new(Arc::new(Scripted("Hello world")), ScanSettings::default());
    let report = scanner.spawn_scan(text_page()).await.unwrap().unwrap();
    assert_eq!(report.status, ScanStatus::Ok);
    assert!(report.text.contains("Hello world"));
}

#[test]
fn selecting_from_nothing_is_no_usable_text() {
    let config = OcrConfig::new("eng", adaptive_ocr::engine::EngineMode::Neural, adaptive_ocr::engine::SegmentationMode::Auto);
    let candidates = vec![
        OcrCandidate::new("", "a", config.clone()),
        OcrCandidate::failed("b", config),
    ];
    for kind in [None, Some(ImageKind::Document), Some(ImageKind::SingleLine)] {
        let selection = select(kind, &candidates);
        assert_eq!(selection.status, ScanStatus::NoUsableText);
        assert!(selection.text.is_empty());
    }
    assert_eq!(select(None, &[]).status, ScanStatus::NoUsableText);
}

#[tokio::test]
async fn failed_legacy_passes_do_not_stop_the_scan() {
    let settings = ScanSettings {
        mode: ScanMode::Forced(ImageKind::Document),
        ..ScanSettings::default()
    };
    let scanner = Scanner::new(Arc::new(NeuralOnly), settings);
    let report = scanner.scan(&text_page()).await.unwrap();

    assert_eq!(report.status, ScanStatus::Ok);
    assert_eq!(report.strategy, Some(Strategy::Specialized));
    assert_eq!(report.text, "Quarterly revenue grew in every region");
    let failed: Vec<&str> = report
        .candidates
        .iter()
        .filter(|c| c.candidate.failed)
        .map(|c| c.candidate.variant.as_str())
        .collect();
    assert_eq!(failed, vec!["otsu-clahe"]);
}

#[tokio::test]
async fn two_column_page_reads_columns_separately() {
    // Ruled text in x 100..350 and 500..800 of a 900 px wide page.
    let page = gray(900, 400, |x, y| {
        let in_column = (100..350).contains(&x) || (500..800).contains(&x);
        if in_column && y % 8 < 3 {
            20
        } else {
            235
        }
    });
    let engine = ByWidth(vec![
        (900, "Mixed lines"),
        (250, "Left column opening paragraph"),
        (300, "Right column closing paragraph"),
    ]);
    let settings = ScanSettings {
        mode: ScanMode::Forced(ImageKind::Document),
        ..ScanSettings::default()
    };
    let report = Scanner::new(Arc::new(engine), settings).scan(&page).await.unwrap();

    assert_eq!(report.strategy, Some(Strategy::Specialized));
    let columns = report
        .candidates
        .iter()
        .find(|c| c.candidate.variant == "columns")
        .expect("column pass ran");
    assert_eq!(
        columns.candidate.text,
        "Left column opening paragraph\n\nRight column closing paragraph"
    );
    assert!(report.candidates.iter().all(|c| c.score <= columns.score));
    assert_eq!(report.text, "Left column opening paragraph\nRight column closing paragraph");
}

#[tokio::test]
async fn screenshot_ui_elements_are_read_one_by_one() {
    // Two buttons stacked on the left, a wider field lower right.
    let buttons = [(20, 20, 120, 30), (20, 80, 120, 30), (200, 150, 150, 40)];
    let shot = gray(400, 300, |x, y| {
        let inside = buttons
            .iter()
            .any(|&(bx, by, bw, bh)| (bx..bx + bw).contains(&x) && (by..by + bh).contains(&y));
        if inside {
            20
        } else {
            235
        }
    });
    // Padded crops are 130 and 160 px wide; the whole shot reads as nothing.
    let engine = ByWidth(vec![(130, "Save"), (160, "Cancel")]);
    let settings = ScanSettings {
        mode: ScanMode::Forced(ImageKind::Screenshot),
        ..ScanSettings::default()
    };
    let report = Scanner::new(Arc::new(engine), settings).scan(&shot).await.unwrap();

    let elements = report
        .candidates
        .iter()
        .find(|c| c.candidate.variant == "ui-elements")
        .expect("ui element pass ran");
    assert_eq!(elements.candidate.text, "Save\nSave\nCancel");
    assert_eq!(report.status, ScanStatus::Ok);
    assert_eq!(report.text, "Save\nSave\nCancel");
}

#[tokio::test]
async fn engine_lost_during_banded_scan_is_surfaced() {
    let settings = ScanSettings {
        mode: ScanMode::Generic,
        ..ScanSettings::default()
    };
    let scanner = Scanner::new(Arc::new(VanishesMidScan), settings);
    let source = gray(600, 1600, |_, y| (y * 250 / 1600) as u8);
    let err = scanner.scan(&source).await.unwrap_err();
    assert!(matches!(err, ScanError::EngineUnavailable(_)));
}
