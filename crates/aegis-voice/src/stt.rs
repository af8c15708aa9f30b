//! **Speech-to-Text**: turn a recorded [`AudioSegment`] into a [`Recognition`].
//!
//! An empty transcript is `NoMatch`; transport and API failures are backend errors.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use aegis_core::ports::{AudioSegment, Recognition, SpeechRecognizer};
use aegis_core::AegisResult;
use tracing::info;

use crate::error::{VoiceError, VoiceResult};

/// Encode f32 PCM (mono) to 16-bit WAV bytes for API upload.
pub fn pcm_f32_to_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut buf = Vec::with_capacity(44 + data_len as usize);
    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    // fmt subchunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    buf.extend_from_slice(&2u16.to_le_bytes()); // block align
    buf.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    // data subchunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    for &s in samples {
        let i = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        buf.extend_from_slice(&i.to_le_bytes());
    }
    buf
}

fn transcript(text: &str) -> Recognition {
    let text = text.trim();
    if text.is_empty() {
        Recognition::NoMatch
    } else {
        Recognition::Heard(text.to_lowercase())
    }
}

/// Scripted recognizer: hears the queued phrases in order, then nothing.
/// Lets the voice loop run without a transcription service.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    script: Mutex<VecDeque<String>>,
}

impl PlaceholderStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(phrases.into_iter().map(Into::into).collect()),
        }
    }
}

impl SpeechRecognizer for PlaceholderStt {
    fn recognize(&self, _segment: &AudioSegment) -> AegisResult<Recognition> {
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(next.map_or(Recognition::NoMatch, |t| transcript(&t)))
    }
}

/// OpenAI-compatible transcription API (OpenAI Whisper, OpenRouter, etc.).
/// Uses `STT_API_URL` (default https://api.openai.com/v1), `STT_API_KEY` and `STT_MODEL`
/// (default whisper-1).
#[derive(Debug, Clone)]
pub struct OpenRouterStt {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::blocking::Client,
}

impl OpenRouterStt {
    /// Build from environment: STT_API_URL, STT_API_KEY (or OPENROUTER_API_KEY), STT_MODEL.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("STT_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("STT_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .map_err(|_| VoiceError::Config("STT requires STT_API_KEY or OPENROUTER_API_KEY".to_string()))?;
        let model = std::env::var("STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        Self::new(base_url, api_key, model)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    fn transcribe(&self, segment: &AudioSegment) -> VoiceResult<Recognition> {
        if segment.samples.is_empty() {
            return Ok(Recognition::NoMatch);
        }
        let wav = pcm_f32_to_wav(&segment.samples, segment.sample_rate);
        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Stt(format!("STT API error {}: {}", status, body)));
        }
        let json: serde_json::Value = res.json().map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(transcript(json.get("text").and_then(|t| t.as_str()).unwrap_or("")))
    }
}

impl SpeechRecognizer for OpenRouterStt {
    fn recognize(&self, segment: &AudioSegment) -> AegisResult<Recognition> {
        Ok(self.transcribe(segment)?)
    }
}

/// HTTP recognizer when a key is configured, else `None` (voice input then runs in mock mode).
pub fn create_best_stt() -> Option<Box<dyn SpeechRecognizer>> {
    match OpenRouterStt::from_env() {
        Ok(stt) => {
            info!(target: "aegis::voice", model = %stt.model, "speech recognition via HTTP backend");
            Some(Box::new(stt))
        }
        Err(e) => {
            info!(target: "aegis::voice", reason = %e, "no speech recognition backend configured");
            None
        }
    }
}
