//! Process wiring: collaborators → core services → supervised producers.

use std::sync::Arc;

use aegis_core::launcher::SystemLauncher;
use aegis_core::vision::{CommandCapture, TesseractOcr};
use aegis_core::{
    probe_ocr, run_publisher, AegisConfig, AlertFanout, AppRegistry, CommandExecutor,
    CommandReport, Detector, ListenerSettings, RiskMonitor, ScreenWatcher, SubscriberHub,
    Supervisor, VoiceListener,
};
use anyhow::Context;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::overlay::LogOverlay;
use crate::state::{AppState, ProducerViews};

/// The running producers plus the state shared with HTTP handlers.
pub struct Runtime {
    pub state: AppState,
    publisher: Supervisor,
    screen: Supervisor,
    voice: Supervisor,
    report_task: JoinHandle<()>,
}

impl Runtime {
    pub async fn start(config: &AegisConfig) -> anyhow::Result<Self> {
        // Device probes and HTTP client construction block.
        let (speaker, voice_input) = tokio::task::spawn_blocking(|| {
            (aegis_voice::create_speaker(), aegis_voice::create_voice_input())
        })
        .await
        .context("voice collaborator probe failed")?;

        let fanout = Arc::new(AlertFanout::new(
            speaker,
            Arc::new(LogOverlay),
            config.effect_queue_capacity,
            config.highlight_duration(),
        ));
        let monitor = Arc::new(RiskMonitor::new(Detector::new(), fanout.clone()));

        let registry_path = config.registry_path.clone();
        let registry = Arc::new(
            tokio::task::spawn_blocking(move || AppRegistry::load(registry_path))
                .await
                .context("app registry load failed")?,
        );
        info!(apps = registry.keys().len(), path = %registry.path().display(), "app registry ready");

        let executor = Arc::new(CommandExecutor::new(
            monitor.clone(),
            fanout,
            registry.clone(),
            Arc::new(SystemLauncher::new()),
        ));
        let hub = Arc::new(SubscriberHub::new());

        let mut publisher = Supervisor::new("publisher");
        {
            let monitor = monitor.clone();
            let hub = hub.clone();
            let every = config.publish_interval();
            publisher.start(move |cancel| run_publisher(monitor, hub, every, cancel))?;
        }

        let capture = Arc::new(CommandCapture::new(config.capture_command.clone()));
        let ocr = Arc::new(TesseractOcr::new(config.ocr_command.clone()));
        let mode = {
            let ocr = ocr.clone();
            tokio::task::spawn_blocking(move || probe_ocr(&*ocr))
                .await
                .context("OCR probe failed")?
        };
        let watcher = ScreenWatcher::new(
            capture,
            ocr,
            monitor.clone(),
            mode,
            config.screen_interval(),
            config.min_text_len,
        );
        let screen_mode = watcher.watch_mode();
        let mut screen = Supervisor::new("screen");
        screen.start(move |cancel| watcher.run(cancel))?;

        let settings = ListenerSettings::from(config);
        let (report_tx, report_rx) = mpsc::channel(16);
        let listener = match voice_input {
            Some((input, recognizer)) => {
                VoiceListener::live(input, recognizer, executor.clone(), settings)
            }
            None => VoiceListener::mock(executor.clone(), settings),
        }
        .with_reports(report_tx);
        let voice_mode = listener.mode();
        let voice_listen = listener.watch_state();
        let mut voice = Supervisor::new("voice");
        voice.start(move |cancel| listener.run(cancel))?;

        let last_command = Arc::new(RwLock::new(None));
        let report_task = tokio::spawn(record_reports(report_rx, last_command.clone()));

        let producers = ProducerViews {
            screen_mode,
            screen_state: screen.watch(),
            voice_mode,
            voice_listen,
            voice_state: voice.watch(),
            publisher_state: publisher.watch(),
        };

        Ok(Self {
            state: AppState {
                monitor,
                hub,
                registry,
                executor,
                producers,
                last_command,
            },
            publisher,
            screen,
            voice,
            report_task,
        })
    }

    /// Stop every producer and wait for each loop to exit.
    pub async fn shutdown(mut self) {
        for sup in [&mut self.voice, &mut self.screen, &mut self.publisher] {
            if let Err(e) = sup.stop().await {
                warn!(producer = sup.name(), error = %e, "producer did not stop cleanly");
            }
        }
        // The listener owned the report sender, so this ends on its own.
        if let Err(e) = self.report_task.await {
            warn!(error = %e, "command report task failed");
        }
        info!("all producers stopped");
    }
}

async fn record_reports(
    mut rx: mpsc::Receiver<CommandReport>,
    last: Arc<RwLock<Option<CommandReport>>>,
) {
    while let Some(report) = rx.recv().await {
        *last.write().await = Some(report);
    }
}
