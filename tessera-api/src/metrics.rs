use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// Counters exposed on `/metrics`. Each instance owns its registry so tests
/// can build as many as they like.
pub struct ApiMetrics {
    registry: Registry,
    reservations: IntCounterVec,
    expiry_releases: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reservations = IntCounterVec::new(
            Opts::new("tessera_reservations_total", "Reservation attempts by outcome and error code"),
            &["outcome", "code"],
        )?;
        let expiry_releases = IntCounterVec::new(
            Opts::new("tessera_expiry_tasks_total", "Processed expiry tasks by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(reservations.clone()))?;
        registry.register(Box::new(expiry_releases.clone()))?;

        Ok(Self { registry, reservations, expiry_releases })
    }

    pub fn reservation_accepted(&self) {
        self.reservations.with_label_values(&["accepted", "0"]).inc();
    }

    pub fn reservation_rejected(&self, code: u16) {
        let code = code.to_string();
        self.reservations.with_label_values(&["rejected", code.as_str()]).inc();
    }

    /// `outcome` is one of `released`, `unchanged`, `retried`, `dropped`.
    pub fn expiry_task(&self, outcome: &str) {
        self.expiry_releases.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {}", e)),
    }
}
