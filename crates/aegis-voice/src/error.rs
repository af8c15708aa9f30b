//! Error types for the Aegis speech collaborators

use aegis_core::AegisError;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

impl From<VoiceError> for AegisError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::AudioDevice(e) | VoiceError::AudioStream(e) => AegisError::AudioDevice(e),
            VoiceError::Stt(e) => AegisError::Recognition(e),
            VoiceError::Playback(e) | VoiceError::Tts(e) | VoiceError::Config(e) => {
                AegisError::Speech(e)
            }
            VoiceError::Io(e) => AegisError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_faults_map_to_audio_device() {
        let err: AegisError = VoiceError::AudioStream("stream died".into()).into();
        assert!(matches!(err, AegisError::AudioDevice(_)));
        let err: AegisError = VoiceError::Stt("503".into()).into();
        assert!(matches!(err, AegisError::Recognition(_)));
    }
}
