use std::sync::Arc;
use tracing::info;

use tessera_core::order::OrderStatus;
use tessera_core::repository::ReservationStore;
use tessera_core::ReservationError;
use tessera_shared::models::events::ExpiryTask;

use crate::settlement::{OrderSettlement, SettlementOutcome};

/// Releases the hold of an order whose payment window has passed.
///
/// Running the same task twice is harmless: the second run finds the order
/// no longer pending and leaves it alone.
#[derive(Clone)]
pub struct ExpiryHandler {
    settlement: OrderSettlement,
}

impl ExpiryHandler {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { settlement: OrderSettlement::new(store) }
    }

    pub async fn handle(&self, task: &ExpiryTask) -> Result<SettlementOutcome, ReservationError> {
        let outcome = self.settlement.settle(task.order_id, OrderStatus::Expired).await?;
        if let SettlementOutcome::Applied { .. } = outcome {
            info!(order_id = %task.order_id, attempt = task.attempt, "Hold expired and released");
        }
        Ok(outcome)
    }
}
