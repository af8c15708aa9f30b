//! Screen-text producer: capture → OCR → change filter → risk monitor, on a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::detector::Verdict;
use crate::error::AegisResult;
use crate::monitor::RiskMonitor;
use crate::ports::{OcrOutput, ScreenCapture, TextExtractor};

/// Synthetic observation used while no OCR engine is available.
pub const FALLBACK_SAMPLE: &str =
    "A fake mock text regarding urgent payment needed account suspended netflix-verify.tk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenMode {
    Ocr,
    Fallback,
}

/// Startup capability check for the OCR engine.
pub fn probe_ocr(ocr: &dyn TextExtractor) -> ScreenMode {
    match ocr.probe() {
        Ok(()) => ScreenMode::Ocr,
        Err(e) => {
            warn!(target: "aegis::screen", error = %e, "OCR engine unavailable; screen producer in fallback mode");
            ScreenMode::Fallback
        }
    }
}

/// Passes text that is long enough and differs from the last passed observation.
///
/// Length is the character count after trimming, so OCR padding (blank lines, trailing
/// spaces) never counts toward `min_len`.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    min_len: usize,
    last: Option<String>,
}

impl ChangeFilter {
    pub fn new(min_len: usize) -> Self {
        Self { min_len, last: None }
    }

    pub fn observe(&mut self, text: &str) -> bool {
        if text.trim().chars().count() <= self.min_len {
            return false;
        }
        if self.last.as_deref() == Some(text) {
            return false;
        }
        self.last = Some(text.to_string());
        true
    }
}

pub struct ScreenWatcher {
    capture: Arc<dyn ScreenCapture>,
    ocr: Arc<dyn TextExtractor>,
    monitor: Arc<RiskMonitor>,
    interval: Duration,
    filter: ChangeFilter,
    mode: watch::Sender<ScreenMode>,
}

impl ScreenWatcher {
    pub fn new(
        capture: Arc<dyn ScreenCapture>,
        ocr: Arc<dyn TextExtractor>,
        monitor: Arc<RiskMonitor>,
        mode: ScreenMode,
        interval: Duration,
        min_text_len: usize,
    ) -> Self {
        let (mode, _) = watch::channel(mode);
        Self {
            capture,
            ocr,
            monitor,
            interval,
            filter: ChangeFilter::new(min_text_len),
            mode,
        }
    }

    pub fn mode(&self) -> ScreenMode {
        *self.mode.borrow()
    }

    pub fn watch_mode(&self) -> watch::Receiver<ScreenMode> {
        self.mode.subscribe()
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(target: "aegis::screen", mode = ?self.mode(), "screen watcher started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(target: "aegis::screen", "screen watcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.cycle().await;
                }
            }
        }
    }

    /// One observation. Returns the verdict when the text changed and was analyzed.
    pub async fn cycle(&mut self) -> Option<Verdict> {
        let observation = match self.mode() {
            ScreenMode::Fallback => fallback_observation(),
            ScreenMode::Ocr => match self.read_screen().await {
                Ok(out) => out,
                Err(e) if e.is_unavailable() => {
                    warn!(target: "aegis::screen", error = %e, "OCR engine went away; switching to fallback mode");
                    self.mode.send_replace(ScreenMode::Fallback);
                    fallback_observation()
                }
                Err(e) => {
                    error!(target: "aegis::screen", error = %e, "Error in screen cycle");
                    return None;
                }
            },
        };

        // Length gate uses the trimmed character count.
        if !self.filter.observe(&observation.text) {
            debug!(target: "aegis::screen", "screen unchanged");
            return None;
        }
        info!(target: "aegis::screen", "Detected screen change via OCR, analyzing...");
        let boxes = (!observation.boxes.is_empty()).then_some(observation.boxes.as_slice());
        Some(self.monitor.analyze(&observation.text, boxes))
    }

    async fn read_screen(&self) -> AegisResult<OcrOutput> {
        let capture = Arc::clone(&self.capture);
        let ocr = Arc::clone(&self.ocr);
        tokio::task::spawn_blocking(move || {
            let image = capture.capture()?;
            ocr.extract(&image)
        })
        .await?
    }
}

fn fallback_observation() -> OcrOutput {
    OcrOutput {
        text: FALLBACK_SAMPLE.to_string(),
        boxes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_suppresses_repeats_and_short_text() {
        let mut f = ChangeFilter::new(10);
        assert!(!f.observe("too short"));
        assert!(f.observe("account suspended today"));
        assert!(!f.observe("account suspended today"));
        assert!(f.observe("something else entirely"));
        assert!(f.observe("account suspended today"));
    }

    #[test]
    fn exactly_min_len_is_rejected() {
        let mut f = ChangeFilter::new(10);
        assert!(!f.observe("0123456789"));
        assert!(f.observe("0123456789a"));
    }

    #[test]
    fn whitespace_padding_does_not_count_toward_length() {
        let mut f = ChangeFilter::new(10);
        assert!(!f.observe("\n\n  too short  \n\n"));
        assert!(!f.observe("   ééééééééé   "));
        assert!(f.observe("\n  0123456789a  \n"));
    }
}
