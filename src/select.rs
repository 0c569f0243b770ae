//! Candidate scoring and selection.
//!
//! Scoring is label-aware: each profile supplies its own score, and
//! single-line scans simply keep the longest text. Ties go to the
//! candidate seen first. Selection never fails; with nothing usable it
//! returns empty text and `ScanStatus::NoUsableText`.

use crate::engine::OcrConfig;
use crate::kind::ImageKind;
use crate::profiles;
use serde::{Deserialize, Serialize};

/// One raw recognition result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrCandidate {
    pub text: String,
    /// Recipe id or region-pass label that produced it.
    pub variant: String,
    pub config: OcrConfig,
    /// The engine call failed; `text` is empty and the candidate is ignored.
    #[serde(default)]
    pub failed: bool,
}

impl OcrCandidate {
    pub fn new(text: impl Into<String>, variant: impl Into<String>, config: OcrConfig) -> Self {
        Self {
            text: text.into(),
            variant: variant.into(),
            config,
            failed: false,
        }
    }

    pub fn failed(variant: impl Into<String>, config: OcrConfig) -> Self {
        Self {
            text: String::new(),
            variant: variant.into(),
            config,
            failed: true,
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.failed && !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: OcrCandidate,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStatus {
    Ok,
    /// Every candidate was empty or placeholder-only.
    NoUsableText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub text: String,
    pub status: ScanStatus,
    /// Index into `scored` of the winner, if any.
    pub chosen: Option<usize>,
    pub scored: Vec<ScoredCandidate>,
}

/// Pick the best candidate for `kind` (`None` = generic scoring).
pub fn select(kind: Option<ImageKind>, candidates: &[OcrCandidate]) -> Selection {
    let scorer = |text: &str| match kind {
        Some(k) => profiles::profile(k).score(text),
        None => generic_score(text),
    };
    let scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| ScoredCandidate {
            candidate: c.clone(),
            score: if c.is_usable() { scorer(&c.text) } else { 0.0 },
        })
        .collect();

    let chosen = if kind == Some(ImageKind::SingleLine) {
        longest(candidates)
    } else {
        best_scored(&scored)
    };

    let text = chosen
        .map(|i| scored[i].candidate.text.clone())
        .unwrap_or_default();
    let status = if text.trim().is_empty() {
        ScanStatus::NoUsableText
    } else {
        ScanStatus::Ok
    };
    if let Some(i) = chosen {
        log::info!(
            "[SELECT] Chose '{}' (score {:.1}) from {} candidates",
            scored[i].candidate.variant,
            scored[i].score,
            scored.len()
        );
    } else {
        log::info!("[SELECT] No usable text in {} candidates", scored.len());
    }

    Selection {
        text,
        status,
        chosen,
        scored,
    }
}

/// Highest score among usable candidates; first seen wins ties.
fn best_scored(scored: &[ScoredCandidate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in scored.iter().enumerate() {
        if !s.candidate.is_usable() {
            continue;
        }
        if best.map_or(true, |(_, b)| s.score > b) {
            best = Some((i, s.score));
        }
    }
    best.map(|(i, _)| i)
}

/// Longest non-empty text (by characters); falls back to the first candidate.
fn longest(candidates: &[OcrCandidate]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, c) in candidates.iter().enumerate() {
        if !c.is_usable() {
            continue;
        }
        let len = c.text.chars().count();
        if best.map_or(true, |(_, b)| len > b) {
            best = Some((i, len));
        }
    }
    match best {
        Some((i, _)) => Some(i),
        None if candidates.is_empty() => None,
        None => Some(0),
    }
}

/// Fraction of characters matching `pred`, 0 for empty text.
pub fn char_ratio(text: &str, pred: impl Fn(char) -> bool) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    text.chars().filter(|c| pred(*c)).count() as f64 / total as f64
}

/// Word-count, real-word and character-class score with a word cap.
pub fn capped_generic_score(text: &str, word_cap: usize) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    let real_words = words
        .iter()
        .filter(|w| w.chars().count() > 1 && w.chars().all(char::is_alphabetic))
        .count();
    let alnum = char_ratio(text, |c| c.is_alphanumeric() || c.is_whitespace());
    let special = char_ratio(text, |c| !(c.is_alphanumeric() || c.is_whitespace()));

    words.len().min(word_cap) as f64 + real_words as f64 * 2.0 + alnum * 50.0 - special * 30.0
}

/// The label-agnostic score used by the generic path and per-band picks.
pub fn generic_score(text: &str) -> f64 {
    capped_generic_score(text, 50)
}

/// Non-empty lines.
pub fn line_count(text: &str) -> usize {
    text.lines().filter(|l| !l.trim().is_empty()).count()
}
