//! `parley serve`: the REST API server.

use std::time::Duration;

use anyhow::Result;
use console::style;

use crate::http;
use crate::state::AppState;

/// Grace period for detached generations and title jobs after shutdown.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

pub async fn serve(state: AppState, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Parley API listening on {}",
        style("⚡").bold(),
        style(format!("http://{addr}/api/v1")).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());
    tracing::info!(%addr, "Server started");

    let tasks = state.tasks.clone();
    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !tasks.is_empty() {
        println!("  Waiting for {} background task(s)...", tasks.len());
    }
    tasks.shutdown(DRAIN_GRACE).await;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
