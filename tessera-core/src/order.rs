use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::SeatCoordinate;

/// Order lifecycle. A hold starts as `Pending` and settles exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Success,
    Failed,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Success)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Pending, OrderStatus::Expired)
        )
    }

    /// Settling into one of these hands the reserved inventory back.
    pub fn releases_inventory(&self) -> bool {
        matches!(self, OrderStatus::Failed | OrderStatus::Expired)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "SUCCESS" => Ok(OrderStatus::Success),
            "FAILED" => Ok(OrderStatus::Failed),
            "EXPIRED" => Ok(OrderStatus::Expired),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// Monetary breakdown of an order, all amounts in minor currency units.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeeBreakdown {
    pub total_price: i64,
    pub tax_percentage: f64,
    pub total_tax: i64,
    pub admin_fee_percentage: f64,
    pub total_admin_fee: i64,
    pub pg_additional_fee: i64,
    pub grand_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub event_id: Uuid,
    pub ticket_category_id: Uuid,
    pub status: OrderStatus,
    pub fullname: String,
    pub email: String,
    pub payment_method: String,
    pub item_count: u32,
    pub fees: FeeBreakdown,
    pub payment_expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn seats(&self) -> Vec<SeatCoordinate> {
        self.items.iter().filter_map(|item| item.seat).collect()
    }

    pub fn identity_tokens(&self) -> Vec<String> {
        self.items.iter().filter_map(|item| item.identity_token.clone()).collect()
    }
}

/// One ticket within an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seat: Option<SeatCoordinate>,
    pub fullname: String,
    pub email: String,
    pub phone_number: String,
    pub identity_token: Option<String>,
    pub age: Option<u32>,
    pub additional_information: Option<String>,
    pub price: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_orders_settle() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Success));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Expired));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Expired.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Success.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Success));
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [OrderStatus::Pending, OrderStatus::Success, OrderStatus::Failed, OrderStatus::Expired] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("PAID".parse::<OrderStatus>().is_err());
    }
}
