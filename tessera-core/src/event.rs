use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Finished,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "DRAFT",
            EventStatus::Published => "PUBLISHED",
            EventStatus::Cancelled => "CANCELLED",
            EventStatus::Finished => "FINISHED",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(EventStatus::Draft),
            "PUBLISHED" => Ok(EventStatus::Published),
            "CANCELLED" => Ok(EventStatus::Cancelled),
            "FINISHED" => Ok(EventStatus::Finished),
            other => Err(format!("unknown event status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub status: EventStatus,
    pub venue_name: String,
    pub starts_at: DateTime<Utc>,
    pub start_sale_at: DateTime<Utc>,
    pub end_sale_at: DateTime<Utc>,
    /// Organizer-controlled pause switch, independent of the sale window.
    pub is_sale_active: bool,
}

/// Position of `now` relative to an event's sale window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleWindow {
    NotStarted,
    Open,
    Over,
}

impl Event {
    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }

    /// The window is inclusive on both ends.
    pub fn sale_window_at(&self, now: DateTime<Utc>) -> SaleWindow {
        if now < self.start_sale_at {
            SaleWindow::NotStarted
        } else if now > self.end_sale_at {
            SaleWindow::Over
        } else {
            SaleWindow::Open
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    pub event_id: Uuid,
    pub identity_verification_required: bool,
    pub max_items_per_order: u32,
    pub adult_minimum_age: u32,
}

/// Event-scoped fee rule. Rules compose additively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdditionalFee {
    pub name: String,
    pub is_tax: bool,
    pub is_percentage: bool,
    pub value: f64,
}

/// Payment method chosen by the buyer, with its gateway surcharge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethod {
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub is_paused: bool,
    pub additional_fee: f64,
    pub is_percentage: bool,
}

impl PaymentMethod {
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_paused
    }
}
