//! Adaptive OCR: turn a raster image into text without per-image tuning.
//!
//! A scan classifies the image (document, screenshot, certificate or
//! single line), builds several preprocessed variants for that label,
//! drives a recognition engine across them with label-specific configs,
//! keeps the best-scoring text and normalizes it.
//!
//! Modules:
//!   - kind / source      : labels, scan modes, the decoded input image
//!   - classify           : cheap image signals to a label
//!   - preprocess         : variant recipes (+ filters)
//!   - profiles           : per-label recipes, configs, passes and scoring
//!   - engine             : config types, configurator, Tesseract CLI adapter
//!   - orchestrator       : multi-pass, region and banded recognition
//!   - select / normalize : candidate choice and text cleanup
//!   - pipeline           : `Scanner`, the entry point tying it together

pub mod classify;
pub mod engine;
pub mod error;
pub mod kind;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod preprocess;
pub mod profiles;
pub mod select;
pub mod settings;
pub mod source;

pub use classify::{classify, Classification};
pub use engine::{OcrConfig, RecognitionEngine, TesseractEngine};
pub use error::{EngineError, ScanError};
pub use kind::{ImageKind, ScanMode};
pub use normalize::normalize;
pub use pipeline::{ScanReport, Scanner};
pub use select::ScanStatus;
pub use settings::ScanSettings;
pub use source::SourceImage;

/// Load `.env.local` / `.env` from the working directory and start logging.
///
/// Safe to call more than once; later calls leave the logger alone.
pub fn bootstrap() {
    for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break;
        }
    }
    let _ = env_logger::try_init();
}
