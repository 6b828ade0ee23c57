/**
 * WARDEN KERNEL - Point d'entrée du serveur
 *
 * RÔLE : Bootstrap complet : .env, logging, config, store handlers,
 * container managers, clusters initiaux puis API REST.
 *
 * UTILITÉ : Point d'administration unique des hosts et de leurs clusters.
 */

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_kernel::config::load_config;
use warden_kernel::http::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Ok si .env n'existe pas
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden_kernel=info")))
        .init();

    let cfg = load_config().await;

    let store = Arc::new(cfg.build_store().context("failed to initialize store handlers")?);
    info!(
        handlers = store.handler_summaries().len(),
        container_managers = store.list_container_managers().len(),
        "[kernel] store ready"
    );

    match cfg.seed_clusters(&store) {
        Ok(created) => info!(created, "[kernel] clusters seeded"),
        Err(e) => warn!(error = %e, "[kernel] failed to seed clusters"),
    }

    let app = http::build_router(AppState::new(store));

    let addr = cfg.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("[kernel] listening on http://{addr}");

    http::serve(listener, app).await.context("http server stopped")?;
    Ok(())
}
