//! Start/stop lifecycle for a long-running producer loop.
//!
//! `Stopped → Running → Stopping → Stopped`. The loop receives a [`CancellationToken`]
//! and is expected to check it once per cycle; `stop` cancels and then awaits the task,
//! so a stopped producer has observably exited.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AegisError, AegisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerState {
    Stopped,
    Running,
    Stopping,
}

pub struct Supervisor {
    name: &'static str,
    state: Arc<watch::Sender<ProducerState>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Supervisor {
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(ProducerState::Stopped);
        Self {
            name,
            state: Arc::new(state),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ProducerState {
        *self.state.borrow()
    }

    /// Live view of the lifecycle state, for status reporting.
    pub fn watch(&self) -> watch::Receiver<ProducerState> {
        self.state.subscribe()
    }

    /// Spawn the loop built by `producer`. Fails unless currently stopped.
    pub fn start<F, Fut>(&mut self, producer: F) -> AegisResult<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.state() != ProducerState::Stopped {
            return Err(AegisError::AlreadyRunning(self.name));
        }

        let cancel_token = CancellationToken::new();
        let fut = producer(cancel_token.clone());
        let state = Arc::clone(&self.state);
        let name = self.name;
        self.state.send_replace(ProducerState::Running);
        let handle = tokio::spawn(async move {
            fut.await;
            state.send_replace(ProducerState::Stopped);
            info!(target: "aegis::supervisor", producer = name, "producer loop exited");
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!(target: "aegis::supervisor", producer = self.name, "producer started");
        Ok(())
    }

    /// Cancel the loop and wait for it to exit. A no-op when stopped.
    pub async fn stop(&mut self) -> AegisResult<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if self.state() == ProducerState::Running {
            self.state.send_replace(ProducerState::Stopping);
        }
        let joined = handle.await;
        self.state.send_replace(ProducerState::Stopped);
        joined.map_err(AegisError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn lifecycle_round_trip() {
        let exited = Arc::new(AtomicBool::new(false));
        let mut sup = Supervisor::new("test");
        assert_eq!(sup.state(), ProducerState::Stopped);

        let flag = Arc::clone(&exited);
        sup.start(move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(sup.state(), ProducerState::Running);

        sup.stop().await.unwrap();
        assert!(exited.load(Ordering::SeqCst));
        assert_eq!(sup.state(), ProducerState::Stopped);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut sup = Supervisor::new("screen");
        sup.start(|token| async move { token.cancelled().await }).unwrap();
        let err = sup.start(|token| async move { token.cancelled().await }).unwrap_err();
        assert!(matches!(err, AegisError::AlreadyRunning("screen")));
        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn loop_that_returns_reports_stopped() {
        let mut sup = Supervisor::new("oneshot");
        let mut state = sup.watch();
        sup.start(|_token| async {}).unwrap();
        state
            .wait_for(|s| *s == ProducerState::Stopped)
            .await
            .unwrap();
        sup.start(|token| async move { token.cancelled().await }).unwrap();
        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_when_stopped_is_noop() {
        let mut sup = Supervisor::new("idle");
        sup.stop().await.unwrap();
        assert_eq!(sup.state(), ProducerState::Stopped);
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let mut sup = Supervisor::new("voice");
        sup.start(|token| async move { token.cancelled().await }).unwrap();
        sup.stop().await.unwrap();
        sup.start(|token| async move { token.cancelled().await }).unwrap();
        assert_eq!(sup.state(), ProducerState::Running);
        sup.stop().await.unwrap();
    }
}
