//! Label → engine parameters.

use super::{EngineMode, OcrConfig, SegmentationMode};
use crate::kind::ImageKind;
use crate::profiles;

/// Pick the engine config for a scan.
///
/// `kind` is `None` for the generic path. A certificate-like image gets
/// the certificate config whatever its nominal label.
pub fn configure(kind: Option<ImageKind>, language: &str, certificate_like: bool) -> OcrConfig {
    let config = if certificate_like {
        certificate_override(language)
    } else {
        match kind {
            Some(k) => profiles::profile(k).base_config(language),
            None => default_config(language),
        }
    };
    log::info!("[CONFIG] {}", config);
    config
}

/// Auto / generic: neural engine, automatic layout.
pub fn default_config(language: &str) -> OcrConfig {
    OcrConfig::new(language, EngineMode::Neural, SegmentationMode::Auto)
        .with_option("preserve_interword_spaces", "1")
        .with_option("textord_heavy_nr", "1")
}

/// Formal layouts: single column, variable spacing, table detection.
pub fn certificate_override(language: &str) -> OcrConfig {
    OcrConfig::new(language, EngineMode::Neural, SegmentationMode::SingleColumn)
        .with_option("preserve_interword_spaces", "1")
        .with_option("textord_space_size_is_variable", "1")
        .with_option("textord_min_linesize", "1.5")
        .with_option("textord_tablefind_recognize_tables", "1")
}
