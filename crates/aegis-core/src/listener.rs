//! **Voice producer**: wake phrase, then one command utterance, then back to listening.
//!
//! ```text
//! Idle → WakeListening ──wake phrase──▶ CommandListening ──one utterance──▶ WakeListening
//! ```
//!
//! Without an audio input the producer runs in mock mode and synthesizes a "scan" command
//! on a fixed interval, tagged [`CommandSource::Mock`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{CommandExecutor, CommandReport, CommandSource};
use crate::config::AegisConfig;
use crate::error::{AegisError, AegisResult};
use crate::ports::{AudioInput, Recognition, SpeechRecognizer};

pub const WAKE_ACK: &str = "Yes, boss. How can I help?";
pub const MISSED_COMMAND: &str = "I didn't catch that command.";
pub const MOCK_COMMAND: &str = "scan";

/// Back-off after an audio device fault.
const DEVICE_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceMode {
    Live,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenState {
    Idle,
    WakeListening,
    CommandListening,
}

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub wake_phrases: Vec<String>,
    pub wake_segment: Duration,
    pub command_segment: Duration,
    pub ack_pause: Duration,
    pub mock_interval: Duration,
}

impl From<&AegisConfig> for ListenerSettings {
    fn from(cfg: &AegisConfig) -> Self {
        Self {
            wake_phrases: cfg.wake_phrases.clone(),
            wake_segment: Duration::from_secs(cfg.wake_segment_secs),
            command_segment: Duration::from_secs(cfg.command_segment_secs),
            ack_pause: Duration::from_millis(cfg.ack_pause_ms),
            mock_interval: Duration::from_secs(cfg.mock_command_interval_secs),
        }
    }
}

impl ListenerSettings {
    pub fn is_wake(&self, heard: &str) -> bool {
        let heard = heard.to_lowercase();
        self.wake_phrases.iter().any(|p| heard.contains(p.as_str()))
    }
}

enum Ears {
    Live {
        input: Arc<dyn AudioInput>,
        recognizer: Arc<dyn SpeechRecognizer>,
    },
    Mock,
}

pub struct VoiceListener {
    ears: Ears,
    executor: Arc<CommandExecutor>,
    settings: ListenerSettings,
    state: watch::Sender<ListenState>,
    reports: Option<mpsc::Sender<CommandReport>>,
}

impl VoiceListener {
    pub fn live(
        input: Arc<dyn AudioInput>,
        recognizer: Arc<dyn SpeechRecognizer>,
        executor: Arc<CommandExecutor>,
        settings: ListenerSettings,
    ) -> Self {
        Self::with_ears(Ears::Live { input, recognizer }, executor, settings)
    }

    pub fn mock(executor: Arc<CommandExecutor>, settings: ListenerSettings) -> Self {
        Self::with_ears(Ears::Mock, executor, settings)
    }

    fn with_ears(ears: Ears, executor: Arc<CommandExecutor>, settings: ListenerSettings) -> Self {
        let (state, _) = watch::channel(ListenState::Idle);
        Self {
            ears,
            executor,
            settings,
            state,
            reports: None,
        }
    }

    /// Forward every executed command's report to `tx`. Full channels drop reports.
    pub fn with_reports(mut self, tx: mpsc::Sender<CommandReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn mode(&self) -> VoiceMode {
        match self.ears {
            Ears::Live { .. } => VoiceMode::Live,
            Ears::Mock => VoiceMode::Mock,
        }
    }

    pub fn watch_state(&self) -> watch::Receiver<ListenState> {
        self.state.subscribe()
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(target: "aegis::voice", mode = ?self.mode(), "voice listener started");
        match &self.ears {
            Ears::Live { input, recognizer } => {
                self.run_live(Arc::clone(input), Arc::clone(recognizer), &cancel).await
            }
            Ears::Mock => self.run_mock(&cancel).await,
        }
        self.state.send_replace(ListenState::Idle);
        info!(target: "aegis::voice", "voice listener shutting down");
    }

    async fn run_mock(&self, cancel: &CancellationToken) {
        warn!(
            target: "aegis::voice",
            every_secs = self.settings.mock_interval.as_secs(),
            "No voice input available; synthesizing mock commands"
        );
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.mock_interval) => {
                    info!(target: "aegis::voice", "[MOCK] Simulating 'Hey Friday, scan this' command...");
                    let report = self.executor.handle(MOCK_COMMAND, CommandSource::Mock).await;
                    self.publish(report);
                }
            }
        }
    }

    async fn run_live(
        &self,
        input: Arc<dyn AudioInput>,
        recognizer: Arc<dyn SpeechRecognizer>,
        cancel: &CancellationToken,
    ) {
        info!(target: "aegis::voice", "Listening for wake phrase...");
        while !cancel.is_cancelled() {
            self.state.send_replace(ListenState::WakeListening);
            match listen(&input, &recognizer, self.settings.wake_segment).await {
                Ok(Recognition::Heard(text)) => {
                    debug!(target: "aegis::voice", "Heard: {}", text);
                    if self.settings.is_wake(&text) {
                        self.command_turn(&input, &recognizer, cancel).await;
                    }
                }
                Ok(Recognition::NoMatch) => {}
                Err(AegisError::AudioDevice(e)) => {
                    error!(target: "aegis::voice", error = %e, "Error in listen loop");
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(DEVICE_RETRY) => {}
                    }
                }
                Err(e) => {
                    warn!(target: "aegis::voice", error = %e, "Could not request results from speech recognition backend");
                }
            }
        }
    }

    async fn command_turn(
        &self,
        input: &Arc<dyn AudioInput>,
        recognizer: &Arc<dyn SpeechRecognizer>,
        cancel: &CancellationToken,
    ) {
        self.executor.speak(WAKE_ACK);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.settings.ack_pause) => {}
        }

        self.state.send_replace(ListenState::CommandListening);
        info!(target: "aegis::voice", "Listening for command...");
        match listen(input, recognizer, self.settings.command_segment).await {
            Ok(Recognition::Heard(text)) => {
                let report = self.executor.handle(&text.to_lowercase(), CommandSource::Voice).await;
                self.publish(report);
            }
            Ok(Recognition::NoMatch) => self.executor.speak(MISSED_COMMAND),
            Err(e) => {
                error!(target: "aegis::voice", error = %e, "Error handling command");
                self.executor.speak(MISSED_COMMAND);
            }
        }
    }

    fn publish(&self, report: CommandReport) {
        if let Some(tx) = &self.reports {
            if tx.try_send(report).is_err() {
                debug!(target: "aegis::voice", "command report dropped");
            }
        }
    }
}

/// Record one segment and recognize it, off the async runtime.
async fn listen(
    input: &Arc<dyn AudioInput>,
    recognizer: &Arc<dyn SpeechRecognizer>,
    duration: Duration,
) -> AegisResult<Recognition> {
    let input = Arc::clone(input);
    let recognizer = Arc::clone(recognizer);
    tokio::task::spawn_blocking(move || {
        let segment = input.record(duration)?;
        recognizer.recognize(&segment)
    })
    .await?
}
