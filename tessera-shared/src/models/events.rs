use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Published once an order has been committed. Consumed by the notification
/// side (confirmation mail, ticket issuance).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderReservedEvent {
    pub recipient: Recipient,
    pub order: OrderSummary,
    pub event: EventSnapshot,
    pub published_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub fullname: String,
    pub email: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub transaction_id: Uuid,
    pub order_number: String,
    pub payment_method: String,
    pub item_count: u32,
    pub total_price: i64,
    pub total_tax: i64,
    pub total_admin_fee: i64,
    pub pg_additional_fee: i64,
    pub grand_total: i64,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    pub event_id: Uuid,
    pub event_name: String,
    pub venue_name: String,
    pub starts_at: DateTime<Utc>,
    pub ticket_category_id: Uuid,
    pub ticket_category_name: String,
    pub sector_name: Option<String>,
}

/// Payload stored in the expiry queue.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryTask {
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt: u32,
}

impl ExpiryTask {
    pub fn new(order_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self { order_id, created_at, attempt: 0 }
    }

    pub fn next_attempt(&self) -> Self {
        Self { attempt: self.attempt + 1, ..self.clone() }
    }
}
