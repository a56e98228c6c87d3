use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Price tier within an event, backed by a counted stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCategory {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    /// Minor currency units.
    pub price: i64,
    pub total_public_stock: i32,
    pub public_stock: i32,
    pub sector_id: Option<Uuid>,
}

impl TicketCategory {
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        i64::from(self.public_stock) >= i64::from(quantity)
    }
}

/// A venue subdivision. Sectors without a seat map are general admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSector {
    pub id: Uuid,
    pub name: String,
    pub has_seat_map: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatCoordinate {
    pub row: i32,
    pub column: i32,
}

impl SeatCoordinate {
    pub fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }
}

impl std::fmt::Display for SeatCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}C{}", self.row, self.column)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Booked,
    Unavailable,
    Disabled,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Booked => "BOOKED",
            SeatStatus::Unavailable => "UNAVAILABLE",
            SeatStatus::Disabled => "DISABLED",
        }
    }
}

impl std::str::FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "BOOKED" => Ok(SeatStatus::Booked),
            "UNAVAILABLE" => Ok(SeatStatus::Unavailable),
            "DISABLED" => Ok(SeatStatus::Disabled),
            other => Err(format!("unknown seat status: {}", other)),
        }
    }
}
