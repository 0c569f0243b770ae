//! Image labels and caller-selected scan modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four layouts the pipeline knows how to specialise for.
///
/// Classification always lands on exactly one of these; there is no
/// "unknown" label, `Document` is the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageKind {
    Document,
    Screenshot,
    Certificate,
    SingleLine,
}

impl ImageKind {
    /// Every label, in the order ties are resolved (first wins).
    pub const ALL: [ImageKind; 4] = [
        ImageKind::Screenshot,
        ImageKind::Document,
        ImageKind::Certificate,
        ImageKind::SingleLine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Document => "document",
            ImageKind::Screenshot => "screenshot",
            ImageKind::Certificate => "certificate",
            ImageKind::SingleLine => "single-line",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "document" | "doc" => Ok(ImageKind::Document),
            "screenshot" => Ok(ImageKind::Screenshot),
            "certificate" | "cert" => Ok(ImageKind::Certificate),
            "single-line" | "single" | "line" => Ok(ImageKind::SingleLine),
            other => Err(format!("Unknown image kind: {}", other)),
        }
    }
}

/// How the caller wants the label chosen.
///
/// Serialized as a plain string (`"auto"`, `"generic"` or a label name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScanMode {
    /// Let the classifier decide.
    #[default]
    Auto,
    /// Force one label's recipes, configs and scoring.
    Forced(ImageKind),
    /// No specialised recipe: enhancement preset + generic multi-pass.
    Generic,
}

impl ScanMode {
    /// The label that drives the pipeline, given what the classifier saw.
    pub fn resolve(self, detected: ImageKind) -> Option<ImageKind> {
        match self {
            ScanMode::Auto => Some(detected),
            ScanMode::Forced(kind) => Some(kind),
            ScanMode::Generic => None,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Auto => f.write_str("auto"),
            ScanMode::Forced(kind) => write!(f, "{}", kind),
            ScanMode::Generic => f.write_str("generic"),
        }
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(ScanMode::Auto),
            "generic" | "none" => Ok(ScanMode::Generic),
            other => other.parse::<ImageKind>().map(ScanMode::Forced),
        }
    }
}

impl TryFrom<String> for ScanMode {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ScanMode> for String {
    fn from(mode: ScanMode) -> Self {
        mode.to_string()
    }
}
