//! Error types for the Aegis core

use thiserror::Error;

/// Result type alias for core operations
pub type AegisResult<T> = Result<T, AegisError>;

/// Errors raised by the core and by the collaborators it drives.
///
/// Producer loops and fan-out workers never propagate these past their own
/// cycle; they are logged at the call site.
#[derive(Error, Debug)]
pub enum AegisError {
    #[error("Screen capture error: {0}")]
    Capture(String),

    /// The OCR engine is not installed or cannot be started.
    #[error("OCR backend unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Speech recognition backend error: {0}")]
    Recognition(String),

    #[error("Speech output error: {0}")]
    Speech(String),

    #[error("Overlay error: {0}")]
    Overlay(String),

    #[error("Launch error: {0}")]
    Launch(String),

    #[error("App registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    #[error("Task join error: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AegisError {
    /// True for the "backend missing" condition that switches a producer into fallback mode.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AegisError::OcrUnavailable(_))
    }
}

impl From<tokio::task::JoinError> for AegisError {
    fn from(err: tokio::task::JoinError) -> Self {
        AegisError::Join(err.to_string())
    }
}
