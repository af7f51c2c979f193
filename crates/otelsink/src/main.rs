//! otelsink binary entry point.
//!
//! Serves the OTLP gRPC receiver until SIGINT or SIGTERM.

use std::sync::Arc;

use otelsink::{server, Sink, SinkConfig};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otelsink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting otelsink");

    let config = SinkConfig::load()?;
    tracing::info!(
        grpc_addr = %config.server.grpc_addr,
        accept_gzip = config.server.accept_gzip,
        "Configuration loaded"
    );

    let sink = Arc::new(Sink::new(config.storage.path.clone()));
    tracing::info!(root = %sink.root().display(), "Sink created");

    let grpc_addr = config.server.grpc_addr;
    let listener = tokio::net::TcpListener::bind(grpc_addr)
        .await
        .map_err(|e| format!("failed to listen on {grpc_addr}: {e}"))?;
    tracing::info!(grpc = %grpc_addr, "Server starting");

    if let Err(e) = server::serve(listener, sink, &config.server, shutdown_signal()).await {
        tracing::error!(error = %e, "gRPC server error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Create a shutdown signal future for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
