//! Narrow interfaces to the external collaborators: screen capture, OCR, microphone,
//! speech recognition, speech output, overlay drawing and app launching.
//!
//! All methods are blocking; the core calls them through `spawn_blocking` or from
//! dedicated worker tasks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detector::{HighlightRegion, TextBox};
use crate::error::AegisResult;

/// A captured screen image on disk. Temporary captures are removed on drop.
#[derive(Debug)]
pub struct ScreenImage {
    path: PathBuf,
    _temp: Option<tempfile::TempPath>,
}

impl ScreenImage {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _temp: None,
        }
    }

    pub fn from_temp(temp: tempfile::TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            _temp: Some(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Text recognized on screen plus optional per-word boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub boxes: Vec<TextBox>,
}

pub trait ScreenCapture: Send + Sync {
    fn capture(&self) -> AegisResult<ScreenImage>;
}

pub trait TextExtractor: Send + Sync {
    /// One-off capability check at startup. `Err(AegisError::OcrUnavailable)` when the
    /// engine is missing.
    fn probe(&self) -> AegisResult<()>;

    fn extract(&self, image: &ScreenImage) -> AegisResult<OcrOutput>;
}

/// Mono PCM audio, f32 in -1.0..1.0.
#[derive(Debug, Clone, Default)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

pub trait AudioInput: Send + Sync {
    /// Record one segment of `duration` from the input device.
    fn record(&self, duration: Duration) -> AegisResult<AudioSegment>;
}

/// Outcome of recognizing one segment. Backend failures are `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Heard(String),
    NoMatch,
}

pub trait SpeechRecognizer: Send + Sync {
    fn recognize(&self, segment: &AudioSegment) -> AegisResult<Recognition>;
}

pub trait Speaker: Send + Sync {
    /// Vocalize `text`. May block until playback finishes.
    fn speak(&self, text: &str) -> AegisResult<()>;
}

pub trait Overlay: Send + Sync {
    /// Draw `region`; the collaborator removes it after `duration`.
    fn highlight(&self, region: &HighlightRegion, duration: Duration) -> AegisResult<()>;
}

pub trait Launcher: Send + Sync {
    fn open_url(&self, url: &str) -> AegisResult<()>;

    /// Start a registered launch target (executable path or protocol string).
    fn launch_target(&self, target: &str) -> AegisResult<()>;

    /// OS-level best effort launch by literal name.
    fn launch_by_name(&self, name: &str) -> AegisResult<()>;
}
