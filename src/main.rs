use std::env;

use anyhow::Context;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use nutri_rag::core;
use nutri_rag::server;
use nutri_rag::state::AppState;

const DEFAULT_HOST: &str = "127.0.0.1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    let config = state
        .config
        .load_config()
        .context("Failed to reload configuration")?;
    tracing::debug!(
        config = %state.config.redact_sensitive_values(&config),
        "Effective configuration"
    );

    let bind_addr = resolve_bind_addr(&config);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("NUTRI_RAG_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn resolve_bind_addr(config: &Value) -> String {
    let server = config.get("server");
    let host = server
        .and_then(|v| v.get("host"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_HOST);
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .or_else(|| {
            server
                .and_then(|v| v.get("port"))
                .and_then(|v| v.as_u64())
                .and_then(|v| u16::try_from(v).ok())
        })
        .unwrap_or(0);
    format!("{}:{}", host, port)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
