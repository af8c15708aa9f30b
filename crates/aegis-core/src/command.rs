//! Command interpreter: recognized utterance → [`CommandIntent`] → spoken response and
//! state change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::AegisResult;
use crate::fanout::AlertFanout;
use crate::monitor::RiskMonitor;
use crate::ports::Launcher;
use crate::registry::AppRegistry;
use crate::risk::RiskLevel;

const OPEN_PREFIXES: [&str; 3] = ["open ", "launch ", "start "];

/// Well-known web destinations, matched by substring before the registry is consulted.
const WEB_DESTINATIONS: [(&str, &str); 3] = [
    ("google", "https://www.google.com"),
    ("youtube", "https://www.youtube.com"),
    ("netflix", "https://www.netflix.com"),
];

pub const SCAN_ACK: &str = "Scanning screen now.";
pub const ALL_CLEAR: &str = "No active threats detected. Systems are green.";
pub const EXPLAIN_THREAT: &str =
    "The detected pattern matches known phishing attempts and high-risk URL domains.";
pub const EXPLAIN_NOTHING: &str = "There is nothing to explain at the moment. Everything is secure.";
pub const BLOCK_ACK: &str = "Done. Sender blocked and activity neutralized.";
pub const NOT_UNDERSTOOD: &str = "I'm sorry, I didn't verify that command over the noise.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", content = "target", rename_all = "snake_case")]
pub enum CommandIntent {
    Scan,
    Explain,
    Block,
    OpenTarget(String),
    Unknown,
}

impl CommandIntent {
    /// Ordered keyword checks over the lower-cased utterance; first match wins.
    pub fn interpret(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.contains("scan") || text.contains("safe") {
            CommandIntent::Scan
        } else if text.contains("explain") || text.contains("why") {
            CommandIntent::Explain
        } else if text.contains("block") || text.contains("ignore") {
            CommandIntent::Block
        } else if let Some(rest) = OPEN_PREFIXES.iter().find_map(|p| text.strip_prefix(p)) {
            CommandIntent::OpenTarget(rest.trim().to_string())
        } else {
            CommandIntent::Unknown
        }
    }
}

/// Where a command came from. Mock commands are synthesized when no microphone exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Voice,
    Mock,
    Api,
}

/// Outcome of one executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub source: CommandSource,
    #[serde(flatten)]
    pub intent: CommandIntent,
    pub spoken: Vec<String>,
}

impl CommandReport {
    fn new(source: CommandSource, intent: CommandIntent) -> Self {
        Self {
            source,
            intent,
            spoken: Vec::new(),
        }
    }
}

pub struct CommandExecutor {
    monitor: Arc<RiskMonitor>,
    fanout: Arc<AlertFanout>,
    registry: Arc<AppRegistry>,
    launcher: Arc<dyn Launcher>,
}

impl CommandExecutor {
    pub fn new(
        monitor: Arc<RiskMonitor>,
        fanout: Arc<AlertFanout>,
        registry: Arc<AppRegistry>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            monitor,
            fanout,
            registry,
            launcher,
        }
    }

    pub fn speak(&self, line: impl Into<String>) {
        self.fanout.say(line);
    }

    /// Interpret and execute `text`. Never fails: problems are spoken, not returned.
    pub async fn handle(&self, text: &str, source: CommandSource) -> CommandReport {
        let intent = CommandIntent::interpret(text);
        info!(target: "aegis::command", ?source, ?intent, "Command heard: {}", text);
        self.execute(intent, source).await
    }

    pub async fn execute(&self, intent: CommandIntent, source: CommandSource) -> CommandReport {
        let mut report = CommandReport::new(source, intent.clone());
        let mut say = |line: String| {
            self.fanout.say(line.clone());
            report.spoken.push(line);
        };

        match intent {
            CommandIntent::Scan => {
                say(SCAN_ACK.to_string());
                let summary = self.monitor.summary();
                if summary.level == RiskLevel::Green {
                    say(ALL_CLEAR.to_string());
                } else {
                    let detail = summary
                        .last_alert
                        .map(|a| a.message)
                        .unwrap_or_else(|| "an anomaly.".to_string());
                    say(format!("I found a {} level threat. {}", summary.level, detail));
                }
            }
            CommandIntent::Explain => {
                if self.monitor.level().is_threat() {
                    say(EXPLAIN_THREAT.to_string());
                } else {
                    say(EXPLAIN_NOTHING.to_string());
                }
            }
            CommandIntent::Block => {
                say(BLOCK_ACK.to_string());
                self.monitor.analyze("", None);
            }
            CommandIntent::OpenTarget(target) => {
                say(format!("Opening {target}."));
                if let Err(e) = self.open(&target).await {
                    error!(target: "aegis::command", error = %e, "Failed to open {}", target);
                    say(format!("Sorry, I couldn't open {target}."));
                }
            }
            CommandIntent::Unknown => say(NOT_UNDERSTOOD.to_string()),
        }
        report
    }

    /// Web destinations first, then the registry, then a best-effort launch by name.
    async fn open(&self, target: &str) -> AegisResult<()> {
        let launcher = Arc::clone(&self.launcher);

        if let Some((_, url)) = WEB_DESTINATIONS.iter().find(|(key, _)| target.contains(key)) {
            let url = url.to_string();
            return tokio::task::spawn_blocking(move || launcher.open_url(&url)).await?;
        }

        match self.registry.resolve(target) {
            Some((key, path)) => {
                info!(target: "aegis::command", app = %key, "Launching mapped application: {}", path);
                tokio::task::spawn_blocking(move || {
                    launcher.launch_target(&path).or_else(|e| {
                        warn!(target: "aegis::command", app = %key, error = %e, "mapped launch failed; trying by name");
                        launcher.launch_by_name(&key)
                    })
                })
                .await?
            }
            None => {
                info!(target: "aegis::command", "App '{}' not in registry. Falling back to OS launch by name.", target);
                let name = target.to_string();
                tokio::task::spawn_blocking(move || launcher.launch_by_name(&name)).await?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_order_decides_intent() {
        assert_eq!(CommandIntent::interpret("is this safe"), CommandIntent::Scan);
        assert_eq!(CommandIntent::interpret("scan and explain"), CommandIntent::Scan);
        assert_eq!(CommandIntent::interpret("why is it red"), CommandIntent::Explain);
        assert_eq!(CommandIntent::interpret("ignore it"), CommandIntent::Block);
        assert_eq!(
            CommandIntent::interpret("Open Spotify"),
            CommandIntent::OpenTarget("spotify".into())
        );
        assert_eq!(
            CommandIntent::interpret("launch  calculator "),
            CommandIntent::OpenTarget("calculator".into())
        );
        assert_eq!(CommandIntent::interpret("make coffee"), CommandIntent::Unknown);
        assert_eq!(CommandIntent::interpret("please open chrome"), CommandIntent::Unknown);
    }

    #[test]
    fn report_serializes_flat() {
        let report = CommandReport {
            source: CommandSource::Api,
            intent: CommandIntent::OpenTarget("chrome".into()),
            spoken: vec!["Opening chrome.".into()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source"], "api");
        assert_eq!(json["intent"], "open_target");
        assert_eq!(json["target"], "chrome");
        assert_eq!(json["spoken"][0], "Opening chrome.");
    }
}
