use std::{net::SocketAddr, sync::Arc};

use server::{
    api,
    config::{load_settings, normalize_database_url},
    build_router, ApiContext, AppState,
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; check the parent directory and its permissions"
        );
        error
    })?;

    let api = ApiContext { storage };
    let existing = api::list_events(&api, &settings.default_collection)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read default collection: {e}"))?;
    info!(
        collection = %settings.default_collection,
        records = existing.len(),
        "default collection ready"
    );

    let state = AppState::new(api, settings.snapshot_channel_capacity);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
