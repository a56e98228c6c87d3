use std::sync::Arc;

use tessera_core::repository::ReservationStore;
use tessera_core::ReservationError;
use tessera_order::{OrderSettlement, ReservationOrchestrator};

use crate::error::AppError;
use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    /// Signs buyer order tokens.
    pub secret: String,
    pub expiration: u64,
    /// Signs payment gateway tokens. Kept apart from `secret` so a leaked
    /// buyer token secret cannot settle payments.
    pub gateway_secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReservationStore>,
    pub orchestrator: Arc<ReservationOrchestrator>,
    pub settlement: OrderSettlement,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
    pub verbose_errors: bool,
}

impl AppState {
    pub fn reject(&self, error: ReservationError) -> AppError {
        AppError::reservation(error, self.verbose_errors)
    }
}
