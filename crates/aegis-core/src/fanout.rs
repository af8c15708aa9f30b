//! **Alert fan-out**: speech and overlay effects, each on its own bounded queue.
//!
//! Submission never blocks: `push` appends and returns. When a queue is full the
//! oldest pending job is dropped so the newest warning always survives. One worker
//! per queue runs jobs sequentially on the blocking pool, so speech lines never
//! overlap and a slow overlay never delays speech (or the next verdict).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::detector::{HighlightRegion, Verdict};
use crate::error::AegisResult;
use crate::ports::{Overlay, Speaker};

struct QueueInner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
}

/// Bounded single-consumer queue with a drop-oldest overflow policy.
pub struct EffectQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for EffectQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> EffectQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
                notify: Notify::new(),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue `item`. Returns the job that was evicted to make room, if any.
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut items = self.inner.items.lock().unwrap_or_else(PoisonError::into_inner);
            let evicted = if items.len() >= self.inner.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            evicted
        };
        if evicted.is_some() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.notify.notify_one();
        evicted
    }

    /// Wait for the next job. Pending jobs are drained before a closed queue returns `None`.
    pub async fn next(&self) -> Option<T> {
        loop {
            {
                let mut items = self.inner.items.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Jobs evicted by the overflow policy since creation.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// Run `handler` for every job of `queue` on the blocking pool, one at a time.
fn spawn_worker<T, F>(name: &'static str, queue: EffectQueue<T>, handler: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) -> AegisResult<()> + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        while let Some(job) = queue.next().await {
            let handler = Arc::clone(&handler);
            match tokio::task::spawn_blocking(move || handler(job)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(target: "aegis::fanout", effect = name, error = %e, "effect failed"),
                Err(e) => warn!(target: "aegis::fanout", effect = name, error = %e, "effect worker panicked"),
            }
        }
        debug!(target: "aegis::fanout", effect = name, "effect worker stopped");
    })
}

struct OverlayJob {
    region: HighlightRegion,
    duration: Duration,
}

/// Speech and overlay dispatch shared by the risk monitor and the command executor.
pub struct AlertFanout {
    speech: EffectQueue<String>,
    overlay: EffectQueue<OverlayJob>,
    highlight_duration: Duration,
    _workers: [JoinHandle<()>; 2],
}

impl AlertFanout {
    /// Spawn the speech and overlay workers. Must be called inside a tokio runtime.
    pub fn new(
        speaker: Arc<dyn Speaker>,
        overlay: Arc<dyn Overlay>,
        queue_capacity: usize,
        highlight_duration: Duration,
    ) -> Self {
        let speech = EffectQueue::new(queue_capacity);
        let overlay_queue = EffectQueue::new(queue_capacity);

        let speech_worker = spawn_worker("speech", speech.clone(), move |text: String| {
            speaker.speak(&text)
        });
        let overlay_worker = spawn_worker("overlay", overlay_queue.clone(), move |job: OverlayJob| {
            overlay.highlight(&job.region, job.duration)
        });

        Self {
            speech,
            overlay: overlay_queue,
            highlight_duration,
            _workers: [speech_worker, overlay_worker],
        }
    }

    /// Queue a spoken line. Never blocks.
    pub fn say(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        info!(target: "aegis::speech", "[FRIDAY SPEAKS]: {}", text);
        if let Some(evicted) = self.speech.push(text) {
            warn!(
                target: "aegis::fanout",
                dropped = self.speech.dropped(),
                "speech queue full; dropped oldest line: {}",
                evicted
            );
        }
    }

    /// Submit both effects for a threat verdict: a highlight per region and the spoken warning.
    pub fn dispatch(&self, verdict: &Verdict) {
        for region in &verdict.regions {
            let job = OverlayJob {
                region: region.clone(),
                duration: self.highlight_duration,
            };
            if self.overlay.push(job).is_some() {
                warn!(
                    target: "aegis::fanout",
                    dropped = self.overlay.dropped(),
                    "overlay queue full; dropped oldest highlight"
                );
            }
        }
        self.say(verdict.spoken_warning.clone());
    }

    pub fn pending_speech(&self) -> usize {
        self.speech.len()
    }

    pub fn pending_highlights(&self) -> usize {
        self.overlay.len()
    }
}

/// Closing lets both workers drain what is already queued, then exit.
impl Drop for AlertFanout {
    fn drop(&mut self) {
        self.speech.close();
        self.overlay.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use crate::error::AegisError;
    use crate::risk::RiskLevel;

    #[derive(Default)]
    struct RecordingSpeaker(Mutex<Vec<String>>);

    impl Speaker for RecordingSpeaker {
        fn speak(&self, text: &str) -> AegisResult<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingOverlay(Mutex<Vec<HighlightRegion>>);

    impl Overlay for RecordingOverlay {
        fn highlight(&self, region: &HighlightRegion, _duration: Duration) -> AegisResult<()> {
            self.0.lock().unwrap().push(region.clone());
            Ok(())
        }
    }

    struct BrokenOverlay;

    impl Overlay for BrokenOverlay {
        fn highlight(&self, _region: &HighlightRegion, _duration: Duration) -> AegisResult<()> {
            Err(AegisError::Overlay("no display".into()))
        }
    }

    /// Records each call on entry, then takes `delay` to finish.
    struct SlowEffects {
        started: Mutex<usize>,
        delay: Duration,
    }

    impl SlowEffects {
        fn new(delay: Duration) -> Self {
            Self {
                started: Mutex::new(0),
                delay,
            }
        }

        fn started(&self) -> usize {
            *self.started.lock().unwrap()
        }

        fn run(&self) -> AegisResult<()> {
            *self.started.lock().unwrap() += 1;
            std::thread::sleep(self.delay);
            Ok(())
        }
    }

    impl Speaker for SlowEffects {
        fn speak(&self, _text: &str) -> AegisResult<()> {
            self.run()
        }
    }

    impl Overlay for SlowEffects {
        fn highlight(&self, _region: &HighlightRegion, _duration: Duration) -> AegisResult<()> {
            self.run()
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn queue_drops_oldest_when_full() {
        let q = EffectQueue::new(2);
        assert!(q.push(1).is_none());
        assert!(q.push(2).is_none());
        assert_eq!(q.push(3), Some(1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped(), 1);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let q = EffectQueue::new(4);
        q.push("a");
        q.close();
        assert_eq!(q.next().await, Some("a"));
        assert_eq!(q.next().await, None);
    }

    #[tokio::test]
    async fn dispatch_speaks_and_highlights() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let overlay = Arc::new(RecordingOverlay::default());
        let fanout = AlertFanout::new(speaker.clone(), overlay.clone(), 8, Duration::from_secs(5));

        let boxes = vec![crate::detector::TextBox::new("suspended", 10, 20, 30, 40)];
        let verdict = Detector::new().evaluate("account suspended", Some(&boxes));
        fanout.dispatch(&verdict);

        wait_until(|| speaker.0.lock().unwrap().len() == 1).await;
        wait_until(|| overlay.0.lock().unwrap().len() == 1).await;
        assert_eq!(overlay.0.lock().unwrap()[0].level, RiskLevel::Red);
        assert!(speaker.0.lock().unwrap()[0].starts_with("Excuse me"));
    }

    #[tokio::test]
    async fn overlay_failure_does_not_stop_speech() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let fanout = AlertFanout::new(speaker.clone(), Arc::new(BrokenOverlay), 8, Duration::from_secs(1));
        let boxes = vec![crate::detector::TextBox::new("suspended", 0, 0, 1, 1)];
        let verdict = Detector::new().evaluate("account suspended", Some(&boxes));
        fanout.dispatch(&verdict);
        fanout.say("second line");
        wait_until(|| speaker.0.lock().unwrap().len() == 2).await;
    }

    #[tokio::test]
    async fn slow_effects_never_block_the_monitor() {
        let speaker = Arc::new(SlowEffects::new(Duration::from_millis(300)));
        let overlay = Arc::new(SlowEffects::new(Duration::from_millis(300)));
        let fanout = Arc::new(AlertFanout::new(speaker.clone(), overlay.clone(), 4, Duration::from_secs(1)));
        let monitor = crate::monitor::RiskMonitor::new(Detector::new(), fanout.clone());

        let boxes = vec![crate::detector::TextBox::new("suspended", 0, 0, 10, 10)];
        let verdict = Detector::new().evaluate("account suspended", Some(&boxes));
        monitor.apply(&verdict);
        // Both workers are now inside a 300 ms effect.
        wait_until(|| speaker.started() == 1 && overlay.started() == 1).await;

        let began = std::time::Instant::now();
        for _ in 0..10 {
            monitor.apply(&verdict);
        }
        assert!(began.elapsed() < Duration::from_millis(100), "apply blocked for {:?}", began.elapsed());

        assert_eq!(fanout.pending_speech(), 4);
        assert_eq!(fanout.pending_highlights(), 4);
        assert_eq!(monitor.snapshot().alerts.len(), crate::risk::VISIBLE_ALERTS);
    }

    #[tokio::test]
    async fn blank_lines_are_not_queued() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let fanout = AlertFanout::new(speaker, Arc::new(RecordingOverlay::default()), 8, Duration::from_secs(1));
        fanout.say("   ");
        assert_eq!(fanout.pending_speech(), 0);
    }
}
