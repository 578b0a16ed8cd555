// Membership Metrics - Web Server
// REST API with Axum over the SQLite snapshot

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use membership_metrics::api::{self, AppState};
use membership_metrics::{config, MetricsEngine, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = config::load()?;
    let addr = cfg.server.listen_addr()?;

    if !cfg.store.path.exists() {
        anyhow::bail!(
            "database not found at {}; run `membership-metrics import <dump.json>` first",
            cfg.store.path.display()
        );
    }

    let store = SqliteStore::open(&cfg.store.path)?;
    tracing::info!(path = %cfg.store.path.display(), "database opened");

    let state = AppState::new(
        MetricsEngine::new(Arc::new(store)),
        cfg.server.request_timeout(),
    );
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, version = membership_metrics::VERSION, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
