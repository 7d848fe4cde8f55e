//! Error types for runtime provisioning.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while provisioning or talking to the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Download failed after exhausting all attempts.
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// Downloaded artifact does not match the expected digest.
    #[error("Checksum mismatch. Expected: {expected}, got: {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Archive could not be read or written out.
    #[error("Failed to extract {archive}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    /// Runtime executable still missing after extraction.
    #[error("{name} not found under {dir}")]
    MissingExecutable { name: String, dir: PathBuf },

    /// Runtime process could not be started.
    #[error("Failed to start runtime: {0}")]
    Launch(String),

    /// Nothing accepted connections before the deadline.
    #[error("Timeout after {timeout:?} waiting for {addr}")]
    ReadinessTimeout { addr: String, timeout: Duration },

    /// `ollama create` failed.
    #[error("Failed to create model '{model}': {reason}")]
    Provisioning { model: String, reason: String },

    /// Runtime answered with an error status.
    #[error("API error: {0}")]
    Api(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
