//! Aegis gateway: runs the screen and voice producers, the alert fan-out and the dashboard
//! server in one process.

mod overlay;
mod routes;
mod runtime;
mod state;

use aegis_core::AegisConfig;
use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::runtime::Runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[aegis-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AegisConfig::load().context("failed to load Aegis configuration")?;
    tracing::info!("Starting Aegis components...");

    let runtime = Runtime::start(&config).await?;
    let ui_dir = routes::frontend_root_dir(config.ui_dir.as_deref());
    let app = routes::build_app(runtime.state.clone(), ui_dir);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Aegis dashboard listening on http://{}", addr);

    if config.open_browser {
        let url = format!("http://{addr}");
        if let Err(e) = webbrowser::open(&url) {
            tracing::warn!(error = %e, "could not open the dashboard in a browser");
        }
    }

    // Producers are joined inside the shutdown signal, before the server future resolves.
    let hub = runtime.state.hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Shutdown initiated (Ctrl+C received)");
            runtime.shutdown().await;
            hub.close_all();
        })
        .await
        .context("server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}
