//! # Aegis Voice - speech collaborators for the Aegis core
//!
//! ```text
//!   microphone (cpal) ──▶ CpalMicrophone ──AudioSegment──▶ SpeechRecognizer (STT)
//!                                                              │
//!   AlertFanout ──text──▶ PlaybackSpeaker ──TtsBackend──▶ audio thread (rodio)
//! ```
//!
//! Every type here implements one of the `aegis_core::ports` traits; the core never sees
//! cpal, rodio or HTTP.

pub mod error;
pub mod mic;
pub mod playback;
pub mod stt;
pub mod tts;

use std::sync::Arc;

use aegis_core::ports::{AudioInput, Speaker, SpeechRecognizer};
use tracing::warn;

pub use error::{VoiceError, VoiceResult};
pub use mic::CpalMicrophone;
pub use playback::{PlaybackSpeaker, SilentSpeaker};
pub use stt::{create_best_stt, pcm_f32_to_wav, OpenRouterStt, PlaceholderStt};
pub use tts::{create_best_tts, OpenRouterTts, TtsBackend};

/// Speaker for the fan-out: real playback when a synthesis backend and an output device
/// exist, otherwise [`SilentSpeaker`].
pub fn create_speaker() -> Arc<dyn Speaker> {
    let Some(tts) = create_best_tts() else {
        return Arc::new(SilentSpeaker);
    };
    match PlaybackSpeaker::new(tts) {
        Ok(speaker) => Arc::new(speaker),
        Err(e) => {
            warn!(target: "aegis::voice", error = %e, "no audio output; speech will only be logged");
            Arc::new(SilentSpeaker)
        }
    }
}

/// Microphone plus recognizer when both are available. `None` puts the voice producer in
/// mock mode.
pub fn create_voice_input() -> Option<(Arc<dyn AudioInput>, Arc<dyn SpeechRecognizer>)> {
    let mic = match CpalMicrophone::open() {
        Ok(mic) => mic,
        Err(e) => {
            warn!(target: "aegis::voice", error = %e, "no microphone; voice input falls back to mock commands");
            return None;
        }
    };
    let Some(recognizer) = create_best_stt() else {
        warn!(target: "aegis::voice", device = mic.device_name(), "microphone found but no recognizer; voice input falls back to mock commands");
        return None;
    };
    let input: Arc<dyn AudioInput> = Arc::new(mic);
    Some((input, Arc::from(recognizer)))
}
