use anyhow::Context;
use std::net::SocketAddr;

use tessera_api::{app, runtime};
use tessera_store::app_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    runtime::init_tracing();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tessera API on port {}", config.server.port);

    let infra = runtime::connect(&config).await?;
    let state = runtime::build_state(&config, &infra)?;

    if config.expiry.embedded_worker {
        tokio::spawn(runtime::expiry_worker(&config, &infra).run());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind")?;
    axum::serve(listener, app(state)).await.context("Server error")?;
    Ok(())
}
