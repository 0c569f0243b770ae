//! Recognition engine boundary.
//!
//! The pipeline talks to any engine through `RecognitionEngine`: PNG
//! bytes plus an `OcrConfig` in, UTF-8 text out. `TesseractEngine` is
//! the production implementation; tests substitute a scripted double.

pub mod configure;
pub mod tesseract;

pub use configure::configure;
pub use tesseract::TesseractEngine;

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which recognizer family the engine runs (`--oem`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Legacy = 0,
    Neural = 1,
    Combined = 3,
}

impl EngineMode {
    pub fn token(self) -> u8 {
        self as u8
    }
}

/// How the engine assumes text is laid out (`--psm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentationMode {
    Auto = 3,
    SingleColumn = 4,
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    Sparse = 11,
}

impl SegmentationMode {
    pub fn token(self) -> u8 {
        self as u8
    }

    /// The fallback layout to try when this one was already attempted.
    pub fn alternate(self) -> SegmentationMode {
        match self {
            SegmentationMode::Auto | SegmentationMode::SingleLine => SegmentationMode::SingleBlock,
            SegmentationMode::SingleBlock => SegmentationMode::Auto,
            _ => SegmentationMode::SingleBlock,
        }
    }
}

/// Immutable engine parameters for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    pub language: String,
    pub engine: EngineMode,
    pub segmentation: SegmentationMode,
    /// Opaque `-c key=value` parameters, passed through verbatim.
    pub options: BTreeMap<String, String>,
}

impl OcrConfig {
    pub fn new(language: &str, engine: EngineMode, segmentation: SegmentationMode) -> Self {
        Self {
            language: language.to_string(),
            engine,
            segmentation,
            options: BTreeMap::new(),
        }
    }

    /// Builder-style option setter.
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_segmentation(&self, segmentation: SegmentationMode) -> Self {
        Self {
            segmentation,
            ..self.clone()
        }
    }

    pub fn with_engine(&self, engine: EngineMode) -> Self {
        Self {
            engine,
            ..self.clone()
        }
    }

    /// Same config with the segmentation mode swapped for its alternate.
    pub fn alternate(&self) -> Self {
        self.with_segmentation(self.segmentation.alternate())
    }

    /// Command-line arguments in engine order.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            self.language.clone(),
            "--oem".to_string(),
            self.engine.token().to_string(),
            "--psm".to_string(),
            self.segmentation.token().to_string(),
        ];
        for (key, value) in &self.options {
            args.push("-c".to_string());
            args.push(format!("{}={}", key, value));
        }
        args
    }
}

impl fmt::Display for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}

/// An external text recognizer.
///
/// Calls are blocking; the orchestrator runs them on the blocking pool.
pub trait RecognitionEngine: Send + Sync {
    /// Verify the engine can be invoked for `language` at all.
    fn probe(&self, language: &str) -> Result<(), EngineError>;

    /// Recognize text in a PNG-encoded image.
    fn recognize(&self, png: &[u8], config: &OcrConfig) -> Result<String, EngineError>;
}
