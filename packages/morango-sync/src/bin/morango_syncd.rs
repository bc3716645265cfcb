//! `morango-syncd` -- a standalone peer-to-peer sync daemon.
//!
//! Serves the HTTP transport for peers to push/pull against, backed by the
//! in-memory reference storage. Shuts down cleanly on `SIGINT`/`SIGTERM`.

use std::sync::Arc;

use clap::Parser;
use morango_core::{InstanceId, InstanceRegistry};
use morango_sync::{Cli, InMemoryRepository, InMemorySessionStore, ServerState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    morango_sync::telemetry::init();

    let cli = Cli::parse();
    let engine_config = cli.engine_config();
    let network_config = cli.network_config();

    let repository = Arc::new(InMemoryRepository::new());
    let session_store = Arc::new(InMemorySessionStore::new());
    let instance_registry = Arc::new(InstanceRegistry::new(InstanceId::new()));

    let _registry = morango_sync::default_middleware_registry(
        repository.clone(),
        session_store.clone(),
        instance_registry,
        engine_config.profile.clone(),
    );

    let state = Arc::new(ServerState { repository, session_store });
    let app = morango_sync::transport::build_router(state, &network_config);

    let addr = format!("{}:{}", network_config.host, network_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, profile = %engine_config.profile, "morango-syncd listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
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
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
