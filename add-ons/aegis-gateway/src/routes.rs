//! HTTP + WebSocket surface of the dashboard.

use std::path::PathBuf;

use aegis_core::CommandSource;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Static frontend directory: `ui_dir` from config, else the crate's `static/`.
pub fn frontend_root_dir(configured: Option<&str>) -> PathBuf {
    configured
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")))
}

pub fn build_app(state: AppState, ui_dir: PathBuf) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/dismiss", post(dismiss))
        .route("/api/apps", get(list_apps).post(register_app))
        .route("/api/command", post(run_command))
        .route("/api/status", get(status))
        .nest_service("/ui", ServeDir::new(ui_dir))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "OK"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| subscriber_session(socket, state))
}

/// Push snapshots to one dashboard until either side goes away. Client messages are ignored.
async fn subscriber_session(socket: WebSocket, state: AppState) {
    let (id, mut frames) = state.hub.subscribe();
    info!(subscriber = id, "dashboard connected");
    let (mut sender, mut receiver) = socket.split();

    // New dashboards should not wait a full publish interval for their first frame.
    match serde_json::to_string(&state.monitor.snapshot()) {
        Ok(first) => {
            if sender.send(Message::Text(first)).await.is_err() {
                state.hub.unsubscribe(id);
                return;
            }
        }
        Err(e) => error!(error = %e, "Error serializing risk snapshot"),
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => debug!(subscriber = id, "ignoring client message"),
            },
        }
    }

    state.hub.unsubscribe(id);
    info!(subscriber = id, "dashboard disconnected");
}

async fn dismiss(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.monitor.dismiss();
    Json(json!({ "status": "success" }))
}

async fn list_apps(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "apps": state.registry.keys() }))
}

#[derive(Debug, Deserialize)]
struct RegisterAppRequest {
    name: String,
    target: String,
}

async fn register_app(
    State(state): State<AppState>,
    Json(req): Json<RegisterAppRequest>,
) -> Response {
    if req.name.trim().is_empty() || req.target.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "error": "name and target are required" })),
        )
            .into_response();
    }

    let registry = state.registry.clone();
    let written = tokio::task::spawn_blocking(move || registry.insert(&req.name, &req.target)).await;
    match written {
        Ok(Ok(())) => Json(json!({ "status": "success", "apps": state.registry.keys() })).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "app registration failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "app registration task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    text: String,
}

async fn run_command(State(state): State<AppState>, Json(req): Json<CommandRequest>) -> Response {
    let report = state
        .executor
        .handle(&req.text.to_lowercase(), CommandSource::Api)
        .await;
    state.remember(&report).await;
    Json(report).into_response()
}

async fn status(State(state): State<AppState>) -> Response {
    Json(state.status().await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use aegis_core::ports::Launcher;
    use aegis_core::{
        AegisResult, AlertFanout, AppRegistry, CommandExecutor, Detector, ListenState,
        ProducerState, RiskLevel, RiskMonitor, ScreenMode, SubscriberHub, VoiceMode,
    };
    use aegis_voice::SilentSpeaker;
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::{watch, RwLock};
    use tower::ServiceExt;

    use crate::overlay::LogOverlay;
    use crate::state::ProducerViews;

    #[derive(Default)]
    struct RecordingLauncher(Mutex<Vec<String>>);

    impl Launcher for RecordingLauncher {
        fn open_url(&self, url: &str) -> AegisResult<()> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn launch_target(&self, target: &str) -> AegisResult<()> {
            self.0.lock().unwrap().push(target.to_string());
            Ok(())
        }

        fn launch_by_name(&self, name: &str) -> AegisResult<()> {
            self.0.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    struct Harness {
        app: Router,
        state: AppState,
        launcher: Arc<RecordingLauncher>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let fanout = Arc::new(AlertFanout::new(
            Arc::new(SilentSpeaker),
            Arc::new(LogOverlay),
            8,
            Duration::from_secs(5),
        ));
        let monitor = Arc::new(RiskMonitor::new(Detector::new(), fanout.clone()));
        let registry = Arc::new(AppRegistry::load(dir.path().join("apps.json")));
        let launcher = Arc::new(RecordingLauncher::default());
        let executor = Arc::new(CommandExecutor::new(
            monitor.clone(),
            fanout,
            registry.clone(),
            launcher.clone(),
        ));
        let state = AppState {
            monitor,
            hub: Arc::new(SubscriberHub::new()),
            registry,
            executor,
            producers: ProducerViews {
                screen_mode: watch::channel(ScreenMode::Fallback).1,
                screen_state: watch::channel(ProducerState::Running).1,
                voice_mode: VoiceMode::Mock,
                voice_listen: watch::channel(ListenState::Idle).1,
                voice_state: watch::channel(ProducerState::Running).1,
                publisher_state: watch::channel(ProducerState::Running).1,
            },
            last_command: Arc::new(RwLock::new(None)),
        };
        let app = build_app(state.clone(), dir.path().to_path_buf());
        Harness {
            app,
            state,
            launcher,
            _dir: dir,
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let h = harness();
        let res = h.app.clone().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_root_serves_dashboard_page() {
        let h = harness();
        let res = h.app.clone().oneshot(get_req("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("risk-level"));
    }

    #[tokio::test]
    async fn test_dismiss_resets_state() {
        let h = harness();
        h.state.monitor.analyze("your account suspended", None);
        assert_eq!(h.state.monitor.level(), RiskLevel::Red);

        let (status, json) = call(&h.app, post_json("/api/dismiss", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        let snap = h.state.monitor.snapshot();
        assert_eq!(snap.risk_level, RiskLevel::Green);
        assert!(snap.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_register_app_then_list() {
        let h = harness();
        let (status, json) = call(
            &h.app,
            post_json("/api/apps", json!({ "name": "Terminal", "target": "xterm" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");

        let (_, json) = call(&h.app, get_req("/api/apps")).await;
        let apps: Vec<String> = serde_json::from_value(json["apps"].clone()).unwrap();
        assert!(apps.contains(&"terminal".to_string()));
        assert_eq!(h.state.registry.get("terminal").as_deref(), Some("xterm"));
    }

    #[tokio::test]
    async fn test_register_app_rejects_blank_name() {
        let h = harness();
        let (status, json) = call(
            &h.app,
            post_json("/api/apps", json!({ "name": "  ", "target": "xterm" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn test_command_open_youtube() {
        let h = harness();
        let (status, json) = call(
            &h.app,
            post_json("/api/command", json!({ "text": "Open YouTube" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["source"], "api");
        assert_eq!(json["intent"], "open_target");
        assert_eq!(json["target"], "youtube");
        assert_eq!(json["spoken"][0], "Opening youtube.");
        assert_eq!(*h.launcher.0.lock().unwrap(), vec!["https://www.youtube.com"]);
        assert!(h.state.last_command.read().await.is_some());
    }

    #[tokio::test]
    async fn test_status_reports_modes_and_snapshot() {
        let h = harness();
        let (status, json) = call(&h.app, get_req("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["snapshot"]["risk_level"], "GREEN");
        assert_eq!(json["screen"]["mode"], "fallback");
        assert_eq!(json["voice"]["mode"], "mock");
        assert_eq!(json["voice"]["listening"], "idle");
        assert_eq!(json["publisher"], "running");
        assert_eq!(json["subscribers"], 0);
        assert!(json["last_command"].is_null());
    }

    #[test]
    fn frontend_dir_prefers_configured_path() {
        assert_eq!(frontend_root_dir(Some("/srv/ui")), PathBuf::from("/srv/ui"));
        assert!(frontend_root_dir(None).ends_with("static"));
    }
}
