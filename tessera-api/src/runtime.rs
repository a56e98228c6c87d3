use anyhow::Context;
use std::sync::Arc;

use tessera_core::repository::ReservationStore;
use tessera_order::{ExpiryHandler, OrderSettlement, ReservationOrchestrator, ReservationPolicy};
use tessera_store::app_config::Config;
use tessera_store::{DbClient, EventProducer, HttpIdentityVerifier, PostgresReservationStore, RedisExpiryQueue};

use crate::auth::JwtCredentialIssuer;
use crate::metrics::ApiMetrics;
use crate::state::{AppState, AuthConfig};
use crate::worker::ExpiryWorker;

/// Connections shared by the API and the expiry worker.
pub struct Infrastructure {
    pub store: Arc<dyn ReservationStore>,
    pub queue: Arc<RedisExpiryQueue>,
    pub metrics: Arc<ApiMetrics>,
}

pub async fn connect(config: &Config) -> anyhow::Result<Infrastructure> {
    let db = DbClient::new(&config.database).await.context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let queue = RedisExpiryQueue::new(&config.redis.url, config.redis.expiry_queue_key.clone())
        .context("Invalid Redis url")?;
    queue.ping().await.context("Failed to connect to Redis")?;

    let metrics = ApiMetrics::new().context("Failed to register metrics")?;

    Ok(Infrastructure {
        store: Arc::new(PostgresReservationStore::new(db.pool.clone())),
        queue: Arc::new(queue),
        metrics: Arc::new(metrics),
    })
}

pub fn build_state(config: &Config, infra: &Infrastructure) -> anyhow::Result<AppState> {
    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
        gateway_secret: config.auth.gateway_secret.clone(),
    };

    let producer = EventProducer::new(&config.kafka.brokers, config.kafka.order_topic.clone())
        .context("Failed to create Kafka producer")?;
    let verifier = HttpIdentityVerifier::new(&config.identity).context("Failed to build identity client")?;

    let orchestrator = ReservationOrchestrator::new(
        infra.store.clone(),
        Arc::new(verifier),
        infra.queue.clone(),
        Arc::new(producer),
        Arc::new(JwtCredentialIssuer::new(auth.clone())),
        ReservationPolicy {
            hold: config.business_rules.transaction_hold(),
            identity_call_timeout: config.identity.timeout(),
            default_adult_minimum_age: config.business_rules.default_adult_minimum_age,
            default_max_items_per_order: config.business_rules.default_max_items_per_order,
            side_effect_timeout: config.business_rules.side_effect_timeout(),
        },
    );

    Ok(AppState {
        store: infra.store.clone(),
        orchestrator: Arc::new(orchestrator),
        settlement: OrderSettlement::new(infra.store.clone()),
        metrics: infra.metrics.clone(),
        auth,
        verbose_errors: config.server.verbose_errors,
    })
}

pub fn expiry_worker(config: &Config, infra: &Infrastructure) -> ExpiryWorker {
    ExpiryWorker::new(
        infra.queue.clone(),
        ExpiryHandler::new(infra.store.clone()),
        config.expiry.clone(),
        infra.metrics.clone(),
    )
}

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera_api=debug,tessera_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
