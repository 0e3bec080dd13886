//! Process bootstrap: connect storage, spawn the listener, serve health.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;

use napbridge_storage::PostgresStore;
use napbridge_ws::StreamListener;

use crate::health;
use crate::settings::Settings;

/// Run the service until SIGINT/SIGTERM.
///
/// An unreachable database or an unbindable HTTP address is fatal; upstream
/// WebSocket trouble never is.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let store = PostgresStore::connect_with(settings.pg_connect_options(), settings.postgres_options())
        .await
        .with_context(|| {
            format!(
                "failed to connect to Postgres at {}:{}",
                settings.postgres_host, settings.postgres_port
            )
        })?;

    let listener = Arc::new(StreamListener::new(settings.listener_config(), Arc::new(store)));
    let ingest = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.run().await })
    };

    let address = settings.http_addr();
    let tcp = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("Health endpoint listening on http://{address}");
    axum::serve(tcp, health::router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("health server error")?;

    ingest.abort();
    let stats = listener.stats().snapshot();
    tracing::info!(
        sessions = stats.sessions,
        frames = stats.frames,
        inserted = stats.inserted,
        duplicates = stats.duplicates,
        dropped = stats.dropped,
        decode_failures = stats.decode_failures,
        "shut down"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
