//! Deterministic phishing detector: ordered RED then YELLOW phrase rules.
//!
//! No scoring and no rule combination. The first matching RED rule wins; failing that,
//! the first matching YELLOW rule; otherwise the verdict is GREEN.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

pub const RED_CONFIDENCE: f64 = 0.95;
pub const YELLOW_CONFIDENCE: f64 = 0.60;

pub const RED_WARNING: &str = "Excuse me, I've detected a high-risk phishing attempt on your screen. I strongly advise against interacting with it.";
pub const YELLOW_WARNING: &str = "Caution, I've noticed suspicious or urgent language on your screen. Please be careful.";

/// Words of the matched phrase shorter than this are ignored for highlighting.
const SIGNIFICANT_WORD_LEN: usize = 3;

const RED_RULES: &[(&str, &str)] = &[
    (r"account suspended", "account suspended"),
    (r"immediate action required", "immediate action required"),
    (r"verify your account immediately", "verify your account immediately"),
    (r"netflix-verify\.tk", "netflix-verify.tk"),
    (r"bank-verify", "bank-verify"),
];

const YELLOW_RULES: &[(&str, &str)] = &[
    (r"urgent", "urgent"),
    (r"one-time password", "one-time password"),
    (r"otp", "otp"),
    (r"click here", "click here"),
    (r"payment needed", "payment needed"),
];

/// One OCR word with its on-screen rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub word: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl TextBox {
    pub fn new(word: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            word: word.into(),
            x,
            y,
            width,
            height,
        }
    }
}

/// Rectangle to highlight, tagged with the verdict level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub level: RiskLevel,
}

#[derive(Debug, Clone)]
pub struct DetectionRule {
    pattern: Regex,
    /// Human-readable phrase used in messages (no regex escapes or wildcards).
    phrase: String,
    severity: RiskLevel,
    confidence: f64,
    spoken_warning: &'static str,
}

impl DetectionRule {
    pub fn new(
        pattern: &str,
        phrase: impl Into<String>,
        severity: RiskLevel,
        confidence: f64,
        spoken_warning: &'static str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            phrase: phrase.into(),
            severity,
            confidence,
            spoken_warning,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn severity(&self) -> RiskLevel {
        self.severity
    }

    fn message(&self) -> String {
        match self.severity {
            RiskLevel::Red => format!(
                "Phishing attempt detected: Found high-risk phrase '{}'",
                self.phrase
            ),
            _ => format!("Suspicious activity: Found caution phrase '{}'", self.phrase),
        }
    }
}

/// Output of one detector evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub level: RiskLevel,
    pub confidence: f64,
    pub message: String,
    pub spoken_warning: String,
    pub regions: Vec<HighlightRegion>,
    /// Display phrase of the matching rule, if any.
    pub matched_phrase: Option<String>,
}

impl Verdict {
    pub fn green() -> Self {
        Self {
            level: RiskLevel::Green,
            confidence: 0.0,
            message: String::new(),
            spoken_warning: String::new(),
            regions: Vec::new(),
            matched_phrase: None,
        }
    }
}

/// Rule tables evaluated RED-first. Pure: evaluation never mutates anything.
#[derive(Debug, Clone)]
pub struct Detector {
    red: Vec<DetectionRule>,
    yellow: Vec<DetectionRule>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Detector with the built-in phishing phrase tables.
    pub fn new() -> Self {
        let build = |rules: &[(&str, &str)], level: RiskLevel, confidence: f64, warning: &'static str| {
            rules
                .iter()
                .filter_map(|(pattern, phrase)| {
                    DetectionRule::new(pattern, *phrase, level, confidence, warning).ok()
                })
                .collect::<Vec<_>>()
        };
        Self {
            red: build(RED_RULES, RiskLevel::Red, RED_CONFIDENCE, RED_WARNING),
            yellow: build(YELLOW_RULES, RiskLevel::Yellow, YELLOW_CONFIDENCE, YELLOW_WARNING),
        }
    }

    /// Detector over caller-supplied tables; the built-in phrases are not included.
    pub fn with_rules(red: Vec<DetectionRule>, yellow: Vec<DetectionRule>) -> Self {
        Self { red, yellow }
    }

    pub fn rule_count(&self) -> usize {
        self.red.len() + self.yellow.len()
    }

    /// Classify `text`. Empty text always yields GREEN.
    pub fn evaluate(&self, text: &str, boxes: Option<&[TextBox]>) -> Verdict {
        let text_lower = text.to_lowercase();
        let Some(rule) = self
            .red
            .iter()
            .find(|r| r.pattern.is_match(&text_lower))
            .or_else(|| self.yellow.iter().find(|r| r.pattern.is_match(&text_lower)))
        else {
            return Verdict::green();
        };

        let regions = boxes
            .map(|b| select_regions(&text_lower, rule.phrase(), rule.severity, b))
            .unwrap_or_default();

        Verdict {
            level: rule.severity,
            confidence: rule.confidence,
            message: rule.message(),
            spoken_warning: rule.spoken_warning.to_string(),
            regions,
            matched_phrase: Some(rule.phrase.clone()),
        }
    }
}

/// Best-effort correlation of a matched phrase with OCR word boxes.
///
/// A box is selected when its word occurs in the text and contains one of the
/// phrase's significant words. Output preserves the input box order.
fn select_regions(
    text_lower: &str,
    phrase: &str,
    level: RiskLevel,
    boxes: &[TextBox],
) -> Vec<HighlightRegion> {
    let significant: Vec<String> = phrase
        .split_whitespace()
        .filter(|w| w.chars().count() > SIGNIFICANT_WORD_LEN)
        .map(str::to_lowercase)
        .collect();
    if significant.is_empty() {
        return Vec::new();
    }

    boxes
        .iter()
        .filter(|b| {
            let word = b.word.trim().to_lowercase();
            !word.is_empty()
                && text_lower.contains(&word)
                && significant.iter().any(|s| word.contains(s.as_str()))
        })
        .map(|b| HighlightRegion {
            x: b.x,
            y: b.y,
            width: b.width,
            height: b.height,
            level,
        })
        .collect()
}
