use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use tessera_core::event::{AdditionalFee, Event, EventSettings, PaymentMethod};
use tessera_core::inventory::{SeatCoordinate, SeatStatus, TicketCategory, VenueSector};
use tessera_core::order::{Order, OrderStatus};
use tessera_core::repository::{ReservationStore, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Clone)]
struct BuyerSlot {
    id: Uuid,
    order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    events: HashMap<Uuid, Event>,
    settings: HashMap<Uuid, EventSettings>,
    categories: HashMap<Uuid, TicketCategory>,
    sectors: HashMap<Uuid, VenueSector>,
    seat_map: HashMap<(Uuid, SeatCoordinate), SeatStatus>,
    payment_methods: HashMap<String, PaymentMethod>,
    fees: HashMap<Uuid, Vec<AdditionalFee>>,
    orders: HashMap<Uuid, Order>,
    seat_books: HashMap<(Uuid, Uuid, SeatCoordinate), Uuid>,
    identity_books: HashMap<(Uuid, String), Uuid>,
    buyer_slots: HashMap<(Uuid, String), BuyerSlot>,
}

/// Store kept entirely in process memory.
///
/// A unit of work holds the store lock for its whole lifetime, so units of
/// work are serialized. Uncommitted changes are undone by restoring the
/// snapshot taken when the unit of work began.
#[derive(Clone, Default)]
pub struct InMemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    pub async fn insert_settings(&self, settings: EventSettings) {
        self.state.lock().await.settings.insert(settings.event_id, settings);
    }

    pub async fn insert_category(&self, category: TicketCategory) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    pub async fn insert_sector(&self, sector: VenueSector, seats: &[(SeatCoordinate, SeatStatus)]) {
        let mut state = self.state.lock().await;
        for (seat, status) in seats {
            state.seat_map.insert((sector.id, *seat), *status);
        }
        state.sectors.insert(sector.id, sector);
    }

    pub async fn insert_payment_method(&self, method: PaymentMethod) {
        self.state.lock().await.payment_methods.insert(method.code.clone(), method);
    }

    pub async fn insert_fee(&self, event_id: Uuid, fee: AdditionalFee) {
        self.state.lock().await.fees.entry(event_id).or_default().push(fee);
    }

    pub async fn public_stock(&self, category_id: Uuid) -> Option<i32> {
        self.state.lock().await.categories.get(&category_id).map(|c| c.public_stock)
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn seat_book_count(&self) -> usize {
        self.state.lock().await.seat_books.len()
    }

    pub async fn identity_book_count(&self) -> usize {
        self.state.lock().await.identity_books.len()
    }

    pub async fn buyer_slot_count(&self) -> usize {
        self.state.lock().await.buyer_slots.len()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&event_id).cloned())
    }

    async fn find_event_settings(&self, event_id: Uuid) -> StoreResult<Option<EventSettings>> {
        Ok(self.state.lock().await.settings.get(&event_id).cloned())
    }

    async fn find_ticket_category(
        &self,
        event_id: Uuid,
        category_id: Uuid,
    ) -> StoreResult<Option<TicketCategory>> {
        let state = self.state.lock().await;
        Ok(state.categories.get(&category_id).filter(|c| c.event_id == event_id).cloned())
    }

    async fn find_sector(&self, sector_id: Uuid) -> StoreResult<Option<VenueSector>> {
        Ok(self.state.lock().await.sectors.get(&sector_id).cloned())
    }

    async fn find_payment_method(&self, code: &str) -> StoreResult<Option<PaymentMethod>> {
        Ok(self.state.lock().await.payment_methods.get(code).cloned())
    }

    async fn list_additional_fees(&self, event_id: Uuid) -> StoreResult<Vec<AdditionalFee>> {
        Ok(self.state.lock().await.fees.get(&event_id).cloned().unwrap_or_default())
    }

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, snapshot: Some(snapshot) }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn claim_buyer_slot(&mut self, event_id: Uuid, email: &str) -> StoreResult<Uuid> {
        let key = (event_id, email.to_lowercase());
        if self.guard.buyer_slots.contains_key(&key) {
            return Err(StoreError::DuplicateBuyer);
        }
        let id = Uuid::new_v4();
        self.guard.buyer_slots.insert(key, BuyerSlot { id, order_id: None });
        Ok(id)
    }

    async fn link_buyer_slot(&mut self, slot_id: Uuid, order_id: Uuid) -> StoreResult<()> {
        if let Some(slot) = self.guard.buyer_slots.values_mut().find(|s| s.id == slot_id) {
            slot.order_id = Some(order_id);
        }
        Ok(())
    }

    async fn fetch_ticket_category(
        &mut self,
        event_id: Uuid,
        category_id: Uuid,
    ) -> StoreResult<Option<TicketCategory>> {
        Ok(self.guard.categories.get(&category_id).filter(|c| c.event_id == event_id).cloned())
    }

    async fn fetch_sector(&mut self, sector_id: Uuid) -> StoreResult<Option<VenueSector>> {
        Ok(self.guard.sectors.get(&sector_id).cloned())
    }

    async fn reserve_stock(&mut self, category_id: Uuid, quantity: u32) -> StoreResult<()> {
        let category = self
            .guard
            .categories
            .get_mut(&category_id)
            .ok_or_else(|| StoreError::Database(format!("ticket category {} missing", category_id)))?;
        if !category.has_stock_for(quantity) {
            return Err(StoreError::OutOfStock);
        }
        category.public_stock -= quantity as i32;
        Ok(())
    }

    async fn read_seat_statuses(
        &mut self,
        event_id: Uuid,
        sector_id: Uuid,
        seats: &[SeatCoordinate],
    ) -> StoreResult<HashMap<SeatCoordinate, SeatStatus>> {
        let mut statuses = HashMap::new();
        for seat in seats {
            if let Some(status) = self.guard.seat_map.get(&(sector_id, *seat)) {
                let status = if self.guard.seat_books.contains_key(&(event_id, sector_id, *seat)) {
                    SeatStatus::Booked
                } else {
                    *status
                };
                statuses.insert(*seat, status);
            }
        }
        Ok(statuses)
    }

    async fn reserve_seats(
        &mut self,
        event_id: Uuid,
        sector_id: Uuid,
        order_id: Uuid,
        seats: &[SeatCoordinate],
    ) -> StoreResult<()> {
        let mut keys = Vec::with_capacity(seats.len());
        for seat in seats {
            let key = (event_id, sector_id, *seat);
            if self.guard.seat_books.contains_key(&key) || keys.contains(&key) {
                return Err(StoreError::SeatConflict);
            }
            keys.push(key);
        }
        for key in keys {
            self.guard.seat_books.insert(key, order_id);
        }
        Ok(())
    }

    async fn reserve_identities(&mut self, event_id: Uuid, order_id: Uuid, tokens: &[String]) -> StoreResult<()> {
        let mut keys = Vec::with_capacity(tokens.len());
        for token in tokens {
            let key = (event_id, token.clone());
            if self.guard.identity_books.contains_key(&key) || keys.contains(&key) {
                return Err(StoreError::IdentityConflict);
            }
            keys.push(key);
        }
        for key in keys {
            self.guard.identity_books.insert(key, order_id);
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        if self.guard.orders.contains_key(&order.id) {
            return Err(StoreError::Database(format!("order {} already exists", order.id)));
        }
        self.guard.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.guard.orders.get(&order_id).cloned())
    }

    async fn release_holds(&mut self, order: &Order) -> StoreResult<()> {
        let state = &mut *self.guard;
        state.seat_books.retain(|_, owner| *owner != order.id);
        state.identity_books.retain(|_, owner| *owner != order.id);
        state.buyer_slots.retain(|_, slot| slot.order_id != Some(order.id));
        if let Some(category) = state.categories.get_mut(&order.ticket_category_id) {
            category.public_stock =
                (category.public_stock + order.item_count as i32).min(category.total_public_stock);
        }
        Ok(())
    }

    async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> StoreResult<()> {
        let order = self
            .guard
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::Database(format!("order {} missing", order_id)))?;
        order.status = status;
        order.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.snapshot = None;
        Ok(())
    }
}
