//! **Text-to-Speech** backends: text in, encoded audio bytes (WAV/MP3) out.

use std::time::Duration;

use tracing::info;

use crate::error::{VoiceError, VoiceResult};

/// Backend that turns text into audio bytes. An empty vec means "nothing to play".
pub trait TtsBackend: Send + Sync {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// OpenAI-compatible speech API (OpenAI, OpenRouter, etc.).
/// Uses `TTS_API_URL`, `TTS_API_KEY`, `TTS_MODEL` (default tts-1) and `TTS_VOICE`
/// (default nova).
#[derive(Debug, Clone)]
pub struct OpenRouterTts {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub api_key: String,
    /// tts-1 (fast) or tts-1-hd.
    pub model: String,
    pub voice: String,
    client: reqwest::blocking::Client,
}

impl OpenRouterTts {
    /// Build from environment: TTS_API_URL, TTS_API_KEY (or OPENROUTER_API_KEY), TTS_MODEL, TTS_VOICE.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_KEY or OPENROUTER_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "nova".to_string());
        Self::new(base_url, api_key, model).map(|t| t.with_voice(voice))
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: "nova".to_string(),
            client,
        })
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

impl TtsBackend for OpenRouterTts {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// HTTP backend when a key is configured, else `None`.
pub fn create_best_tts() -> Option<Box<dyn TtsBackend>> {
    match OpenRouterTts::from_env() {
        Ok(tts) => {
            info!(target: "aegis::voice", model = %tts.model, voice = %tts.voice, "speech synthesis via HTTP backend");
            Some(Box::new(tts))
        }
        Err(e) => {
            info!(target: "aegis::voice", reason = %e, "no speech synthesis backend configured");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_not_sent() {
        let tts = OpenRouterTts::new("http://127.0.0.1:9", "key", "tts-1").unwrap();
        assert!(tts.synthesize("   ").unwrap().is_empty());
        assert_eq!(tts.with_voice("onyx").voice, "onyx");
    }
}
