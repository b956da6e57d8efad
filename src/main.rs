use std::sync::Arc;

use anyhow::Context;
use duel_chess::server::config::ServerConfig;
use duel_chess::server::connection;
use duel_chess::server::dispatch::Services;
use duel_chess::server::hub::Hub;
use duel_chess::session::identity::MemoryIdentityProvider;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("duel_chess=info")),
        )
        .init();

    let config = ServerConfig::from_env().context("failed to load configuration")?;
    let identities = Arc::new(MemoryIdentityProvider::new(config.starting_rating));
    let addr = config.addr;
    let hub = Hub::new(Services::new(config, identities));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "duel chess server listening");

    axum::serve(listener, connection::router(hub))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
