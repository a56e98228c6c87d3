use anyhow::Context;

use tessera_api::runtime;
use tessera_store::app_config::Config;

/// Runs only the expiry worker, for deployments that keep it out of the API
/// process (`expiry.embedded_worker = false`).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    runtime::init_tracing();

    let config = Config::load().context("Failed to load config")?;
    let infra = runtime::connect(&config).await?;

    tracing::info!("Starting standalone expiry worker");
    runtime::expiry_worker(&config, &infra).run().await;
    Ok(())
}
