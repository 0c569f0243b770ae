//! Scan settings persistence and environment overrides.
//!
//! Settings live in `~/.config/adaptive-ocr/settings.json`. Every field
//! has a default, so a missing or partial file is fine. Environment
//! variables win over the file:
//!
//!   OCR_LANG, OCR_MODE, OCR_ENHANCEMENT, OCR_AI_ENHANCE,
//!   TESSERACT_CMD, OCR_DEBUG_ARTIFACT

use crate::classify::ClassifierThresholds;
use crate::kind::ScanMode;
use crate::orchestrator::BandingSettings;
use crate::preprocess::Enhancement;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a scan can be tuned with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Tesseract language code, e.g. "eng" or "eng+deu".
    pub language: String,
    pub mode: ScanMode,
    /// Preset for the generic (non-specialised) recipe.
    pub enhancement: Enhancement,
    /// Append the multi-approach enhancement variants to the generic recipe.
    pub ai_enhance: bool,
    pub tesseract_cmd: String,
    /// Persist the primary processed image after each scan.
    pub debug_artifact: bool,
    pub debug_dir: Option<PathBuf>,
    /// Primary variant is downscaled to at most this many pixels before OCR.
    pub max_ocr_pixels: u64,
    /// Optional JSON file of extra confusable-word corrections.
    pub extra_corrections: Option<PathBuf>,
    pub classifier: ClassifierThresholds,
    pub banding: BandingSettings,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            mode: ScanMode::Auto,
            enhancement: Enhancement::None,
            ai_enhance: false,
            tesseract_cmd: "tesseract".to_string(),
            debug_artifact: false,
            debug_dir: None,
            max_ocr_pixels: 1_000_000,
            extra_corrections: None,
            classifier: ClassifierThresholds::default(),
            banding: BandingSettings::default(),
        }
    }
}

/// Directory where settings are stored.
fn settings_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adaptive-ocr")
}

/// Full path to the settings file.
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Default location of the debug artifact directory.
pub fn default_debug_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adaptive-ocr")
}

/// Load settings from a specific file.
///
/// Returns defaults if the file doesn't exist or is invalid.
pub fn load_settings_from(path: &Path) -> ScanSettings {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("[SETTINGS] Ignoring invalid {}: {}", path.display(), e);
                ScanSettings::default()
            }
        },
        Err(_) => ScanSettings::default(),
    }
}

/// Load settings from the standard location, then apply env overrides.
pub fn load_settings() -> ScanSettings {
    let mut settings = load_settings_from(&settings_path());
    apply_env_overrides(&mut settings);
    settings
}

/// Persist settings to a specific file, creating the parent directory.
pub fn save_settings_to(path: &Path, settings: &ScanSettings) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create settings dir: {}", e))?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;
    log::info!("[SETTINGS] Saved settings to {}", path.display());
    Ok(())
}

/// Persist settings to the standard location.
pub fn save_settings(settings: &ScanSettings) -> Result<(), String> {
    save_settings_to(&settings_path(), settings)
}

/// Override settings fields from environment variables.
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides(settings: &mut ScanSettings) {
    if let Some(lang) = env_value("OCR_LANG") {
        settings.language = lang;
    }
    if let Some(raw) = env_value("OCR_MODE") {
        match raw.parse::<ScanMode>() {
            Ok(mode) => {
                log::info!("[SETTINGS] Mode override: {}", mode);
                settings.mode = mode;
            }
            Err(e) => log::warn!("[SETTINGS] OCR_MODE ignored: {}", e),
        }
    }
    if let Some(raw) = env_value("OCR_ENHANCEMENT") {
        match raw.parse::<Enhancement>() {
            Ok(preset) => settings.enhancement = preset,
            Err(e) => log::warn!("[SETTINGS] OCR_ENHANCEMENT ignored: {}", e),
        }
    }
    if let Some(raw) = env_value("OCR_AI_ENHANCE") {
        settings.ai_enhance = parse_flag(&raw);
    }
    if let Some(cmd) = env_value("TESSERACT_CMD") {
        settings.tesseract_cmd = cmd;
    }
    if let Some(raw) = env_value("OCR_DEBUG_ARTIFACT") {
        settings.debug_artifact = parse_flag(&raw);
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ImageKind;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("adaptive-ocr-tests")
            .join(format!("{}.json", name))
    }

    #[test]
    fn load_missing_settings_returns_defaults() {
        let settings = load_settings_from(&scratch_path("does-not-exist"));
        assert_eq!(settings.language, "eng");
        assert_eq!(settings.mode, ScanMode::Auto);
        assert_eq!(settings.max_ocr_pixels, 1_000_000);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let path = scratch_path("roundtrip");
        let mut settings = ScanSettings::default();
        settings.language = "deu".to_string();
        settings.mode = ScanMode::Forced(ImageKind::Certificate);
        settings.classifier.score_floor = 9;

        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.language, "deu");
        assert_eq!(loaded.mode, ScanMode::Forced(ImageKind::Certificate));
        assert_eq!(loaded.classifier.score_floor, 9);

        // Cleanup
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = scratch_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "mode": "single-line", "ai_enhance": true }"#).unwrap();

        let loaded = load_settings_from(&path);
        assert_eq!(loaded.mode, ScanMode::Forced(ImageKind::SingleLine));
        assert!(loaded.ai_enhance);
        assert_eq!(loaded.tesseract_cmd, "tesseract");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag("Yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }
}
