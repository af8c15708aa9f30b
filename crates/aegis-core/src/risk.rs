//! Risk level, alert history and the snapshot pushed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of most recent alerts exposed to any reader.
pub const VISIBLE_ALERTS: usize = 5;

/// Severity of the current screen content. Ordered GREEN < YELLOW < RED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Green,
    Yellow,
    Red,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Green => "GREEN",
            RiskLevel::Yellow => "YELLOW",
            RiskLevel::Red => "RED",
        }
    }

    pub fn is_threat(&self) -> bool {
        *self != RiskLevel::Green
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of alert history. Never mutated once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub message: String,
    pub level: RiskLevel,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn now(message: impl Into<String>, level: RiskLevel) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }
    }
}

/// Current threat record. `confidence == 0` exactly when `level == Green`.
#[derive(Debug, Clone, Default)]
pub struct RiskState {
    pub level: RiskLevel,
    pub confidence: f64,
    alerts: Vec<Alert>,
}

impl RiskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, alert: Alert, confidence: f64) {
        self.level = alert.level;
        self.confidence = confidence;
        self.alerts.push(alert);
    }

    pub(crate) fn reset_level(&mut self) {
        self.level = RiskLevel::Green;
        self.confidence = 0.0;
    }

    pub(crate) fn clear(&mut self) {
        self.reset_level();
        self.alerts.clear();
    }

    /// Last [`VISIBLE_ALERTS`] alerts in insertion order.
    pub fn recent_alerts(&self) -> &[Alert] {
        let start = self.alerts.len().saturating_sub(VISIBLE_ALERTS);
        &self.alerts[start..]
    }

    pub fn last_alert(&self) -> Option<&Alert> {
        self.alerts.last()
    }

    /// Total alerts recorded since the last dismiss (history is never truncated).
    pub fn history_len(&self) -> usize {
        self.alerts.len()
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            risk_level: self.level,
            confidence: self.confidence,
            alerts: self
                .recent_alerts()
                .iter()
                .map(|a| AlertView {
                    message: a.message.clone(),
                    risk: a.level,
                })
                .collect(),
        }
    }
}

/// Alert as seen on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertView {
    pub message: String,
    pub risk: RiskLevel,
}

/// Immutable copy of the risk state, serialized as
/// `{risk_level, confidence, alerts: [{message, risk}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub alerts: Vec<AlertView>,
}
