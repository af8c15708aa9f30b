//! **Risk monitor**: the single owner of [`RiskState`].
//!
//! Every read-modify-write of the (level, confidence, alerts) triple happens under one
//! mutex, so a snapshot or a "scan" read never sees a half-applied verdict. Fan-out is
//! signalled after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::detector::{Detector, TextBox, Verdict};
use crate::fanout::AlertFanout;
use crate::risk::{Alert, RiskLevel, RiskSnapshot, RiskState};

/// Receiver of threat verdicts. Must only submit work, never block.
pub trait AlertSink: Send + Sync {
    fn on_alert(&self, verdict: &Verdict);
}

impl AlertSink for AlertFanout {
    fn on_alert(&self, verdict: &Verdict) {
        self.dispatch(verdict);
    }
}

/// Consistent view used by the "scan" command.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatSummary {
    pub level: RiskLevel,
    pub confidence: f64,
    pub last_alert: Option<Alert>,
}

pub struct RiskMonitor {
    state: Mutex<RiskState>,
    detector: Detector,
    sink: Arc<dyn AlertSink>,
}

impl RiskMonitor {
    pub fn new(detector: Detector, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            state: Mutex::new(RiskState::new()),
            detector,
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RiskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate `text` and apply the verdict.
    pub fn analyze(&self, text: &str, boxes: Option<&[TextBox]>) -> Verdict {
        let verdict = self.detector.evaluate(text, boxes);
        self.apply(&verdict);
        verdict
    }

    /// Apply a verdict. Threats append an alert and signal the sink once; GREEN only resets
    /// level and confidence, keeping alert history.
    pub fn apply(&self, verdict: &Verdict) {
        if verdict.level.is_threat() {
            {
                let mut state = self.lock();
                state.record(
                    Alert::now(verdict.message.clone(), verdict.level),
                    verdict.confidence,
                );
            }
            warn!(target: "aegis::risk", "ALERT [{}]: {}", verdict.level, verdict.message);
            self.sink.on_alert(verdict);
        } else {
            self.lock().reset_level();
            info!(target: "aegis::risk", "No threats detected.");
        }
    }

    /// Clear level, confidence and alert history.
    pub fn dismiss(&self) {
        self.lock().clear();
        info!(target: "aegis::risk", "Alerts cleared by user.");
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        self.lock().snapshot()
    }

    pub fn summary(&self) -> ThreatSummary {
        let state = self.lock();
        ThreatSummary {
            level: state.level,
            confidence: state.confidence,
            last_alert: state.last_alert().cloned(),
        }
    }

    pub fn level(&self) -> RiskLevel {
        self.lock().level
    }
}
