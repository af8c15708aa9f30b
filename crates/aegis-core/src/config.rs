//! Runtime configuration loaded from defaults, an optional TOML file and `AEGIS__*` env vars.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | host | 127.0.0.1 | Bind address of the gateway. |
//! | port | 8000 | HTTP / WebSocket port. |
//! | ui_dir | (gateway static dir) | Directory served under `/ui`. |
//! | registry_path | apps.json | App registry file. |
//! | screen_interval_secs | 5 | Seconds between screen captures. |
//! | min_text_len | 10 | Screen text must be longer than this to be analyzed. |
//! | publish_interval_ms | 1000 | Snapshot push cadence. |
//! | highlight_secs | 5.0 | Overlay highlight lifetime. |
//! | wake_phrases | ["hey friday", "friday"] | Phrases that open command listening. |
//! | wake_segment_secs | 3 | Length of each wake-listening segment. |
//! | command_segment_secs | 5 | Length of the follow-up command utterance. |
//! | ack_pause_ms | 2000 | Pause after the wake acknowledgement. |
//! | mock_command_interval_secs | 20 | Mock-mode synthetic "scan" cadence. |
//! | effect_queue_capacity | 8 | Bound of each fan-out queue (drop-oldest). |
//! | capture_command | platform default | Screenshot command; `{path}` is replaced by the output file. |
//! | ocr_command | tesseract | OCR executable. |
//! | open_browser | false | Open the dashboard at startup. |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AegisResult;

#[cfg(target_os = "macos")]
const DEFAULT_CAPTURE_COMMAND: &str = "screencapture -x {path}";
#[cfg(target_os = "windows")]
const DEFAULT_CAPTURE_COMMAND: &str = "nircmd savescreenshot {path}";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const DEFAULT_CAPTURE_COMMAND: &str = "import -window root {path}";

fn default_wake_phrases() -> Vec<String> {
    vec!["hey friday".to_string(), "friday".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AegisConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub ui_dir: Option<String>,
    pub registry_path: String,
    pub screen_interval_secs: u64,
    pub min_text_len: usize,
    pub publish_interval_ms: u64,
    pub highlight_secs: f32,
    #[serde(default = "default_wake_phrases")]
    pub wake_phrases: Vec<String>,
    pub wake_segment_secs: u64,
    pub command_segment_secs: u64,
    pub ack_pause_ms: u64,
    pub mock_command_interval_secs: u64,
    pub effect_queue_capacity: usize,
    pub capture_command: String,
    pub ocr_command: String,
    #[serde(default)]
    pub open_browser: bool,
}

impl Default for AegisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            ui_dir: None,
            registry_path: "apps.json".to_string(),
            screen_interval_secs: 5,
            min_text_len: 10,
            publish_interval_ms: 1000,
            highlight_secs: 5.0,
            wake_phrases: default_wake_phrases(),
            wake_segment_secs: 3,
            command_segment_secs: 5,
            ack_pause_ms: 2000,
            mock_command_interval_secs: 20,
            effect_queue_capacity: 8,
            capture_command: DEFAULT_CAPTURE_COMMAND.to_string(),
            ocr_command: "tesseract".to_string(),
            open_browser: false,
        }
    }
}

impl AegisConfig {
    /// Load config from file and environment. Precedence: `AEGIS__*` env > `AEGIS_CONFIG` file
    /// (default `config/aegis.toml`, skipped when missing) > built-in defaults.
    pub fn load() -> AegisResult<Self> {
        let config_path =
            std::env::var("AEGIS_CONFIG").unwrap_or_else(|_| "config/aegis.toml".to_string());
        let defaults = AegisConfig::default();
        let builder = config::Config::builder()
            .set_default("host", defaults.host.clone())?
            .set_default("port", i64::from(defaults.port))?
            .set_default("registry_path", defaults.registry_path.clone())?
            .set_default("screen_interval_secs", defaults.screen_interval_secs)?
            .set_default("min_text_len", defaults.min_text_len as u64)?
            .set_default("publish_interval_ms", defaults.publish_interval_ms)?
            .set_default("highlight_secs", f64::from(defaults.highlight_secs))?
            .set_default("wake_phrases", defaults.wake_phrases.clone())?
            .set_default("wake_segment_secs", defaults.wake_segment_secs)?
            .set_default("command_segment_secs", defaults.command_segment_secs)?
            .set_default("ack_pause_ms", defaults.ack_pause_ms)?
            .set_default("mock_command_interval_secs", defaults.mock_command_interval_secs)?
            .set_default("effect_queue_capacity", defaults.effect_queue_capacity as u64)?
            .set_default("capture_command", defaults.capture_command.clone())?
            .set_default("ocr_command", defaults.ocr_command.clone())?
            .set_default("open_browser", defaults.open_browser)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("AEGIS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("wake_phrases")
                    .try_parsing(true),
            )
            .build()?;

        let config: AegisConfig = built.try_deserialize()?;
        Ok(config.sanitized())
    }

    /// Clamp intervals and capacities that would otherwise spin or deadlock.
    pub fn sanitized(mut self) -> Self {
        self.screen_interval_secs = self.screen_interval_secs.max(1);
        self.publish_interval_ms = self.publish_interval_ms.max(1);
        self.wake_segment_secs = self.wake_segment_secs.max(1);
        self.command_segment_secs = self.command_segment_secs.max(1);
        self.mock_command_interval_secs = self.mock_command_interval_secs.max(1);
        self.effect_queue_capacity = self.effect_queue_capacity.max(1);
        if !self.highlight_secs.is_finite() || self.highlight_secs <= 0.0 {
            self.highlight_secs = 5.0;
        }
        self.wake_phrases = self
            .wake_phrases
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if self.wake_phrases.is_empty() {
            self.wake_phrases = default_wake_phrases();
        }
        self
    }

    pub fn screen_interval(&self) -> Duration {
        Duration::from_secs(self.screen_interval_secs)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_secs_f32(self.highlight_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cadences() {
        let c = AegisConfig::default();
        assert_eq!(c.screen_interval(), Duration::from_secs(5));
        assert_eq!(c.publish_interval(), Duration::from_secs(1));
        assert_eq!(c.min_text_len, 10);
        assert_eq!(c.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn sanitize_clamps_zero_values() {
        let c = AegisConfig {
            screen_interval_secs: 0,
            publish_interval_ms: 0,
            effect_queue_capacity: 0,
            highlight_secs: -1.0,
            wake_phrases: vec!["  ".to_string()],
            ..AegisConfig::default()
        }
        .sanitized();
        assert_eq!(c.screen_interval_secs, 1);
        assert_eq!(c.publish_interval_ms, 1);
        assert_eq!(c.effect_queue_capacity, 1);
        assert_eq!(c.highlight_secs, 5.0);
        assert_eq!(c.wake_phrases, vec!["hey friday", "friday"]);
    }

    #[test]
    fn wake_phrases_are_lowercased() {
        let c = AegisConfig {
            wake_phrases: vec!["Hey Aegis".to_string()],
            ..AegisConfig::default()
        }
        .sanitized();
        assert_eq!(c.wake_phrases, vec!["hey aegis"]);
    }
}
