use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use tessera_core::order::OrderStatus;
use tessera_core::repository::ReservationStore;
use tessera_core::ReservationError;

/// What happened to an order when a final status was requested for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Applied { from: OrderStatus, to: OrderStatus },
    /// The order had already left `Pending`; nothing was written.
    Unchanged(OrderStatus),
}

impl SettlementOutcome {
    pub fn status(&self) -> OrderStatus {
        match self {
            SettlementOutcome::Applied { to, .. } => *to,
            SettlementOutcome::Unchanged(status) => *status,
        }
    }
}

/// Moves a pending order to its final status, handing the held inventory back
/// when the order did not go through.
#[derive(Clone)]
pub struct OrderSettlement {
    store: Arc<dyn ReservationStore>,
}

impl OrderSettlement {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    pub async fn settle(&self, order_id: Uuid, target: OrderStatus) -> Result<SettlementOutcome, ReservationError> {
        let mut uow = self.store.begin().await?;
        let order = uow.lock_order(order_id).await?.ok_or(ReservationError::OrderNotFound)?;

        if !order.status.can_transition_to(target) {
            debug!(order_id = %order_id, status = %order.status, target = %target, "Order already settled");
            return Ok(SettlementOutcome::Unchanged(order.status));
        }

        if target.releases_inventory() {
            uow.release_holds(&order).await?;
        }
        uow.update_order_status(order_id, target).await?;
        uow.commit().await?;

        info!(order_id = %order_id, from = %order.status, to = %target, items = order.item_count, "Order settled");
        Ok(SettlementOutcome::Applied { from: order.status, to: target })
    }
}
