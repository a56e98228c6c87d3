use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::event::{AdditionalFee, Event, EventSettings, PaymentMethod};
use crate::inventory::{SeatCoordinate, SeatStatus, TicketCategory, VenueSector};
use crate::order::{Order, OrderStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not enough stock left")]
    OutOfStock,
    #[error("seat already booked")]
    SeatConflict,
    #[error("identity already used for this event")]
    IdentityConflict,
    #[error("buyer already has an order for this event")]
    DuplicateBuyer,
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read side plus the entry point into an atomic unit of work.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    async fn find_event_settings(&self, event_id: Uuid) -> StoreResult<Option<EventSettings>>;

    async fn find_ticket_category(
        &self,
        event_id: Uuid,
        category_id: Uuid,
    ) -> StoreResult<Option<TicketCategory>>;

    async fn find_sector(&self, sector_id: Uuid) -> StoreResult<Option<VenueSector>>;

    async fn find_payment_method(&self, code: &str) -> StoreResult<Option<PaymentMethod>>;

    async fn list_additional_fees(&self, event_id: Uuid) -> StoreResult<Vec<AdditionalFee>>;

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

    /// Open a unit of work. Dropping it without `commit` discards every change
    /// made through it.
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// All writes of a reservation (or a release) go through one of these.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert the per-buyer dedup record. `DuplicateBuyer` on conflict.
    async fn claim_buyer_slot(&mut self, event_id: Uuid, email: &str) -> StoreResult<Uuid>;

    async fn link_buyer_slot(&mut self, slot_id: Uuid, order_id: Uuid) -> StoreResult<()>;

    /// Re-read under the unit of work's isolation.
    async fn fetch_ticket_category(
        &mut self,
        event_id: Uuid,
        category_id: Uuid,
    ) -> StoreResult<Option<TicketCategory>>;

    async fn fetch_sector(&mut self, sector_id: Uuid) -> StoreResult<Option<VenueSector>>;

    /// Compare-and-decrement of `public_stock`. `OutOfStock` when fewer than
    /// `quantity` units remain.
    async fn reserve_stock(&mut self, category_id: Uuid, quantity: u32) -> StoreResult<()>;

    /// Seats missing from the sector's seat map are missing from the result.
    async fn read_seat_statuses(
        &mut self,
        event_id: Uuid,
        sector_id: Uuid,
        seats: &[SeatCoordinate],
    ) -> StoreResult<HashMap<SeatCoordinate, SeatStatus>>;

    /// All-or-nothing insert of seat bookings. `SeatConflict` on any duplicate.
    async fn reserve_seats(
        &mut self,
        event_id: Uuid,
        sector_id: Uuid,
        order_id: Uuid,
        seats: &[SeatCoordinate],
    ) -> StoreResult<()>;

    /// All-or-nothing insert of identity bookings. `IdentityConflict` on any duplicate.
    async fn reserve_identities(
        &mut self,
        event_id: Uuid,
        order_id: Uuid,
        tokens: &[String],
    ) -> StoreResult<()>;

    /// Persist the order together with its items.
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;

    /// Load an order and keep it locked until the unit of work ends.
    async fn lock_order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>>;

    /// Drop seat, identity and buyer-slot bookings of the order and put its
    /// items back into `public_stock`.
    async fn release_holds(&mut self, order: &Order) -> StoreResult<()>;

    async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
