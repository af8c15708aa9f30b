//! Shared handler state and the status document served by `GET /api/status`.

use std::sync::Arc;

use aegis_core::{
    AppRegistry, CommandExecutor, CommandReport, ListenState, ProducerState, RiskMonitor,
    RiskSnapshot, ScreenMode, SubscriberHub, VoiceMode,
};
use serde::Serialize;
use tokio::sync::{watch, RwLock};

/// Read-only views of the producers, kept live by their owners.
#[derive(Clone)]
pub struct ProducerViews {
    pub screen_mode: watch::Receiver<ScreenMode>,
    pub screen_state: watch::Receiver<ProducerState>,
    pub voice_mode: VoiceMode,
    pub voice_listen: watch::Receiver<ListenState>,
    pub voice_state: watch::Receiver<ProducerState>,
    pub publisher_state: watch::Receiver<ProducerState>,
}

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<RiskMonitor>,
    pub hub: Arc<SubscriberHub>,
    pub registry: Arc<AppRegistry>,
    pub executor: Arc<CommandExecutor>,
    pub producers: ProducerViews,
    /// Most recent command from any source.
    pub last_command: Arc<RwLock<Option<CommandReport>>>,
}

#[derive(Debug, Serialize)]
pub struct ScreenStatus {
    pub mode: ScreenMode,
    pub state: ProducerState,
}

#[derive(Debug, Serialize)]
pub struct VoiceStatus {
    pub mode: VoiceMode,
    pub listening: ListenState,
    pub state: ProducerState,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub snapshot: RiskSnapshot,
    pub screen: ScreenStatus,
    pub voice: VoiceStatus,
    pub publisher: ProducerState,
    pub subscribers: usize,
    pub last_command: Option<CommandReport>,
}

impl AppState {
    pub async fn remember(&self, report: &CommandReport) {
        *self.last_command.write().await = Some(report.clone());
    }

    pub async fn status(&self) -> StatusResponse {
        let p = &self.producers;
        let last_command = self.last_command.read().await.clone();
        StatusResponse {
            snapshot: self.monitor.snapshot(),
            screen: ScreenStatus {
                mode: *p.screen_mode.borrow(),
                state: *p.screen_state.borrow(),
            },
            voice: VoiceStatus {
                mode: p.voice_mode,
                listening: *p.voice_listen.borrow(),
                state: *p.voice_state.borrow(),
            },
            publisher: *p.publisher_state.borrow(),
            subscribers: self.hub.len(),
            last_command,
        }
    }
}
