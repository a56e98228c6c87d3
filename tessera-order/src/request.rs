use uuid::Uuid;

use tessera_core::inventory::SeatCoordinate;
use tessera_core::order::Order;
use tessera_core::ReservationError;

/// A buyer's request to hold tickets of one category.
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub event_id: Uuid,
    pub ticket_category_id: Uuid,
    pub fullname: String,
    pub email: String,
    pub payment_method: String,
    pub items: Vec<ItemRequest>,
}

impl ReservationRequest {
    pub fn item_count(&self) -> u32 {
        self.items.len() as u32
    }
}

/// One requested ticket. Which fields are required depends on the event:
/// seat-mapped sectors need a seat, identity-checked events need a token.
#[derive(Debug, Clone, Default)]
pub struct ItemRequest {
    pub seat_row: Option<i32>,
    pub seat_column: Option<i32>,
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub identity_token: Option<String>,
    pub additional_information: Option<String>,
}

impl ItemRequest {
    /// Row and column come as a pair; half a coordinate is malformed.
    pub fn seat(&self, index: usize) -> Result<Option<SeatCoordinate>, ReservationError> {
        match (self.seat_row, self.seat_column) {
            (Some(row), Some(column)) => Ok(Some(SeatCoordinate::new(row, column))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ReservationError::InvalidItemField { index, field: "seatColumn" }),
            (None, Some(_)) => Err(ReservationError::InvalidItemField { index, field: "seatRow" }),
        }
    }
}

/// Result of a committed reservation.
#[derive(Debug, Clone)]
pub struct ReservationReceipt {
    pub order: Order,
    /// Absent when the credential could not be issued after commit.
    pub access_token: Option<String>,
}
