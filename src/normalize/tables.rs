//! Correction tables for the normalizer.
//!
//! The built-in tables ship inside the binary as JSON. A user file with the
//! same word-map shape can be layered on top through the settings.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

const GLYPHS_JSON: &str = include_str!("../../data/confusable_glyphs.json");
const WORDS_JSON: &str = include_str!("../../data/confusable_words.json");
const CERTIFICATE_JSON: &str = include_str!("../../data/certificate_words.json");

static BUILTIN: OnceLock<CorrectionTables> = OnceLock::new();

#[derive(Debug, Clone, Default)]
pub struct CorrectionTables {
    /// Single glyph to replacement string.
    pub glyphs: HashMap<char, String>,
    /// Misread word to correction. Lowercase keys match case-insensitively.
    pub words: HashMap<String, String>,
    /// Extra word corrections only applied to certificate text.
    pub certificate: HashMap<String, String>,
}

/// Shape of a user corrections file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtraCorrections {
    glyphs: HashMap<String, String>,
    words: HashMap<String, String>,
    certificate: HashMap<String, String>,
}

impl CorrectionTables {
    pub fn from_json(glyphs: &str, words: &str, certificate: &str) -> Result<Self, String> {
        let glyphs: HashMap<String, String> =
            serde_json::from_str(glyphs).map_err(|e| format!("Glyph table: {e}"))?;
        let words: HashMap<String, String> =
            serde_json::from_str(words).map_err(|e| format!("Word table: {e}"))?;
        let certificate: HashMap<String, String> =
            serde_json::from_str(certificate).map_err(|e| format!("Certificate table: {e}"))?;

        let mut tables = Self {
            words,
            certificate,
            ..Self::default()
        };
        tables.add_glyphs(glyphs);
        Ok(tables)
    }

    /// Tables compiled into the crate. Falls back to empty tables if the
    /// embedded JSON is ever malformed.
    pub fn builtin() -> &'static CorrectionTables {
        BUILTIN.get_or_init(|| {
            Self::from_json(GLYPHS_JSON, WORDS_JSON, CERTIFICATE_JSON).unwrap_or_else(|e| {
                log::error!("[NORMALIZE] Built-in tables unusable: {}", e);
                Self::default()
            })
        })
    }

    /// Built-in tables with a user file merged on top. User entries win.
    pub fn with_extra_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let extra: ExtraCorrections = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

        let mut tables = Self::builtin().clone();
        tables.add_glyphs(extra.glyphs);
        tables.words.extend(extra.words);
        tables.certificate.extend(extra.certificate);
        log::info!(
            "[NORMALIZE] Loaded extra corrections from {} ({} words)",
            path.display(),
            tables.words.len()
        );
        Ok(tables)
    }

    fn add_glyphs(&mut self, glyphs: HashMap<String, String>) {
        for (key, value) in glyphs {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    self.glyphs.insert(c, value);
                }
                _ => log::warn!("[NORMALIZE] Ignoring glyph entry {:?}: not a single character", key),
            }
        }
    }

    /// Correct one word against `table`, preserving its capitalization.
    /// Entries whose key carries capitals only match exactly and are used verbatim.
    pub fn correct(table: &HashMap<String, String>, word: &str) -> Option<String> {
        if word.chars().any(char::is_uppercase) {
            if let Some(fixed) = table.get(word) {
                return Some(fixed.clone());
            }
        }
        let fixed = table.get(&word.to_lowercase())?;
        Some(match_case(word, fixed))
    }
}

fn match_case(original: &str, fixed: &str) -> String {
    let has_lower = original.chars().any(char::is_lowercase);
    let first_upper = original.chars().next().is_some_and(char::is_uppercase);
    if !has_lower && original.chars().any(char::is_uppercase) {
        fixed.to_uppercase()
    } else if first_upper {
        let mut chars = fixed.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        fixed.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_load() {
        let t = CorrectionTables::builtin();
        assert_eq!(t.glyphs.get(&'|').map(String::as_str), Some("I"));
        assert_eq!(t.words.get("tbe").map(String::as_str), Some("the"));
        assert!(t.certificate.contains_key("certif"));
        // Digits stay digits.
        assert!(!t.glyphs.contains_key(&'1'));
    }

    #[test]
    fn correction_keeps_case() {
        let t = CorrectionTables::builtin();
        assert_eq!(CorrectionTables::correct(&t.words, "tbe").as_deref(), Some("the"));
        assert_eq!(CorrectionTables::correct(&t.words, "Tbe").as_deref(), Some("The"));
        assert_eq!(CorrectionTables::correct(&t.words, "TBE").as_deref(), Some("THE"));
        assert_eq!(CorrectionTables::correct(&t.words, "Iike").as_deref(), Some("like"));
        assert_eq!(CorrectionTables::correct(&t.words, "hello"), None);
    }

    #[test]
    fn extra_file_overrides_builtin() {
        let dir = std::env::temp_dir().join(format!("adaptive-ocr-tables-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("extra.json");
        std::fs::write(&path, r#"{"words": {"tbe": "thee", "recieve": "receive"}, "glyphs": {"~": "-", "ab": "x"}}"#)
            .unwrap();

        let t = CorrectionTables::with_extra_file(&path).unwrap();
        assert_eq!(t.words.get("tbe").map(String::as_str), Some("thee"));
        assert_eq!(t.words.get("recieve").map(String::as_str), Some("receive"));
        assert_eq!(t.glyphs.get(&'~').map(String::as_str), Some("-"));
        assert!(t.certificate.contains_key("certif"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        let err = CorrectionTables::with_extra_file(Path::new("/nonexistent/corrections.json")).unwrap_err();
        assert!(err.contains("Failed to read"));
    }
}
