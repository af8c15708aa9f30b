//! aegis-core: phishing detection and multi-channel alert coordination.
//!
//! One [`RiskMonitor`] owns the risk state. The screen watcher and the voice listener feed
//! it concurrently; the [`AlertFanout`] speaks and highlights threats; the state publisher
//! pushes snapshots to subscribers on a timer.

mod config;
mod error;
mod fanout;
mod monitor;
mod publisher;
mod risk;
mod supervisor;

pub mod command;
pub mod detector;
pub mod launcher;
pub mod listener;
pub mod ports;
pub mod registry;
pub mod screen;
pub mod vision;

pub use config::AegisConfig;
pub use error::{AegisError, AegisResult};

// Risk state + detection
pub use detector::{DetectionRule, Detector, HighlightRegion, TextBox, Verdict};
pub use monitor::{AlertSink, RiskMonitor, ThreatSummary};
pub use risk::{Alert, AlertView, RiskLevel, RiskSnapshot, RiskState, VISIBLE_ALERTS};

// Effects + publishing
pub use fanout::{AlertFanout, EffectQueue};
pub use publisher::{publish_once, run_publisher, SubscriberHub, SubscriberId};

// Commands, producers, supervision
pub use command::{CommandExecutor, CommandIntent, CommandReport, CommandSource};
pub use listener::{ListenState, ListenerSettings, VoiceListener, VoiceMode};
pub use registry::AppRegistry;
pub use screen::{probe_ocr, ChangeFilter, ScreenMode, ScreenWatcher, FALLBACK_SAMPLE};
pub use supervisor::{ProducerState, Supervisor};
