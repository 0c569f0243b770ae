//! Error taxonomy for a scan.
//!
//! Only `ScanError` ever leaves the crate. Engine and preprocessing
//! errors are recovered inside the pipeline except for
//! `EngineError::Unavailable`, which aborts the scan.

use thiserror::Error;

/// Failure of one call into the recognition engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine cannot be invoked at all (missing binary, missing language data).
    #[error("recognition engine unavailable: {0}")]
    Unavailable(String),
    /// A single pass failed. The candidate is dropped and the batch continues.
    #[error("recognition call failed: {0}")]
    CallFailed(String),
}

/// A preprocessing recipe could not produce a usable variant.
#[derive(Debug, Clone, Error)]
pub enum PreprocessError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("recipe '{recipe}' produced invalid output: {reason}")]
    InvalidOutput { recipe: &'static str, reason: String },
}

/// Errors surfaced to the caller of a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Fatal for the current scan: no text is produced.
    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("scan task aborted: {0}")]
    TaskAborted(String),
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(e: tokio::task::JoinError) -> Self {
        ScanError::TaskAborted(e.to_string())
    }
}
