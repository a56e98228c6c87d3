#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use tessera_core::event::{AdditionalFee, Event, EventSettings, EventStatus, PaymentMethod};
use tessera_core::events::{AccessCredentialIssuer, CredentialError, OrderEventPublisher, PublishError};
use tessera_core::identity::{IdentityRejection, IdentityVerifier, VerifiedIdentity};
use tessera_core::inventory::{SeatCoordinate, SeatStatus, TicketCategory, VenueSector};
use tessera_core::scheduler::{ExpiryScheduler, SchedulerError};
use tessera_order::{ItemRequest, ReservationOrchestrator, ReservationPolicy, ReservationRequest};
use tessera_shared::models::events::{ExpiryTask, OrderReservedEvent};
use tessera_store::{InMemoryEventSink, InMemoryExpiryQueue, InMemoryReservationStore};

pub const PAYMENT_METHOD: &str = "VA_BCA";
pub const TICKET_PRICE: i64 = 100_000;

/// Registry double: tokens map to an age or a rejection; unknown tokens are
/// not found.
#[derive(Default)]
pub struct StubRegistry {
    answers: HashMap<String, Result<u32, IdentityRejection>>,
    pub calls: AtomicUsize,
}

impl StubRegistry {
    pub fn with(answers: &[(&str, Result<u32, IdentityRejection>)]) -> Self {
        Self {
            answers: answers.iter().map(|(t, a)| (t.to_string(), a.clone())).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for StubRegistry {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityRejection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let age = self.answers.get(token).cloned().unwrap_or(Err(IdentityRejection::NotFound))?;
        Ok(VerifiedIdentity {
            token: token.to_string(),
            fans_id: format!("F-{}", token),
            display_name: format!("Holder {}", token),
            email: format!("{}@fans.example.com", token),
            phone_number: "+6281299990000".to_string(),
            age,
        })
    }
}

pub struct StaticCredentials;

impl AccessCredentialIssuer for StaticCredentials {
    fn issue(&self, order_id: Uuid) -> Result<String, CredentialError> {
        Ok(format!("token-{}", order_id))
    }
}

pub struct RefusingCredentials;

impl AccessCredentialIssuer for RefusingCredentials {
    fn issue(&self, _order_id: Uuid) -> Result<String, CredentialError> {
        Err(CredentialError("signing key unavailable".to_string()))
    }
}

/// Scheduler and publisher double that either fails at once or never answers.
pub struct BrokenOutbox {
    hang: bool,
}

impl BrokenOutbox {
    pub fn failing() -> Self {
        Self { hang: false }
    }

    pub fn hanging() -> Self {
        Self { hang: true }
    }

    async fn wait(&self) {
        if self.hang {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl ExpiryScheduler for BrokenOutbox {
    async fn schedule_release(&self, _task: ExpiryTask, _fire_after: Duration) -> Result<(), SchedulerError> {
        self.wait().await;
        Err(SchedulerError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl OrderEventPublisher for BrokenOutbox {
    async fn publish_order_reserved(&self, _event: &OrderReservedEvent) -> Result<(), PublishError> {
        self.wait().await;
        Err(PublishError::Broker("broker transport failure".to_string()))
    }
}

pub struct Fixture {
    pub store: InMemoryReservationStore,
    pub queue: InMemoryExpiryQueue,
    pub sink: InMemoryEventSink,
    pub registry: Arc<StubRegistry>,
    pub orchestrator: Arc<ReservationOrchestrator>,
    pub event_id: Uuid,
    pub category_id: Uuid,
}

pub struct FixtureBuilder {
    stock: i32,
    seats: Option<Vec<(SeatCoordinate, SeatStatus)>>,
    identity_required: bool,
    registry: StubRegistry,
    event_status: EventStatus,
    sale_active: bool,
    credentials: Option<Arc<dyn AccessCredentialIssuer>>,
    outbox: Option<Arc<BrokenOutbox>>,
}

impl FixtureBuilder {
    pub fn new(stock: i32) -> Self {
        Self {
            stock,
            seats: None,
            identity_required: false,
            registry: StubRegistry::default(),
            event_status: EventStatus::Published,
            sale_active: true,
            credentials: None,
            outbox: None,
        }
    }

    pub fn credentials(mut self, credentials: impl AccessCredentialIssuer + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Routes expiry scheduling and event publishing to `outbox` instead of
    /// the in-memory queue and sink.
    pub fn outbox(mut self, outbox: BrokenOutbox) -> Self {
        self.outbox = Some(Arc::new(outbox));
        self
    }

    pub fn seated(mut self, seats: Vec<(SeatCoordinate, SeatStatus)>) -> Self {
        self.seats = Some(seats);
        self
    }

    pub fn identity_checked(mut self, registry: StubRegistry) -> Self {
        self.identity_required = true;
        self.registry = registry;
        self
    }

    pub fn status(mut self, status: EventStatus) -> Self {
        self.event_status = status;
        self
    }

    pub fn sale_paused(mut self) -> Self {
        self.sale_active = false;
        self
    }

    pub async fn build(self) -> Fixture {
        let store = InMemoryReservationStore::new();
        let now = Utc::now();
        let event_id = Uuid::new_v4();

        store
            .insert_event(Event {
                id: event_id,
                name: "Jakarta Summer Fest".to_string(),
                status: self.event_status,
                venue_name: "Gelora Arena".to_string(),
                starts_at: now + ChronoDuration::days(30),
                start_sale_at: now - ChronoDuration::hours(1),
                end_sale_at: now + ChronoDuration::days(7),
                is_sale_active: self.sale_active,
            })
            .await;
        store
            .insert_settings(EventSettings {
                event_id,
                identity_verification_required: self.identity_required,
                max_items_per_order: 4,
                adult_minimum_age: 17,
            })
            .await;
        store
            .insert_fee(event_id, AdditionalFee { name: "VAT".into(), is_tax: true, is_percentage: true, value: 11.0 })
            .await;
        store
            .insert_fee(event_id, AdditionalFee { name: "Admin".into(), is_tax: false, is_percentage: false, value: 5000.0 })
            .await;
        store
            .insert_payment_method(PaymentMethod {
                code: PAYMENT_METHOD.to_string(),
                name: "BCA Virtual Account".to_string(),
                is_active: true,
                is_paused: false,
                additional_fee: 0.0,
                is_percentage: false,
            })
            .await;
        store
            .insert_payment_method(PaymentMethod {
                code: "QRIS".to_string(),
                name: "QRIS".to_string(),
                is_active: true,
                is_paused: true,
                additional_fee: 0.7,
                is_percentage: true,
            })
            .await;

        let sector_id = match self.seats {
            Some(seats) => {
                let sector = VenueSector { id: Uuid::new_v4(), name: "Tribune A".to_string(), has_seat_map: true };
                let id = sector.id;
                store.insert_sector(sector, &seats).await;
                Some(id)
            }
            None => None,
        };

        let category_id = Uuid::new_v4();
        store
            .insert_category(TicketCategory {
                id: category_id,
                event_id,
                name: "CAT 1".to_string(),
                price: TICKET_PRICE,
                total_public_stock: self.stock,
                public_stock: self.stock,
                sector_id,
            })
            .await;

        let queue = InMemoryExpiryQueue::new();
        let sink = InMemoryEventSink::new();
        let registry = Arc::new(self.registry);
        let mut scheduler: Arc<dyn ExpiryScheduler> = Arc::new(queue.clone());
        let mut publisher: Arc<dyn OrderEventPublisher> = Arc::new(sink.clone());
        if let Some(outbox) = self.outbox {
            scheduler = outbox.clone();
            publisher = outbox;
        }
        let credentials: Arc<dyn AccessCredentialIssuer> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(StaticCredentials),
        };
        let orchestrator = Arc::new(ReservationOrchestrator::new(
            Arc::new(store.clone()),
            registry.clone(),
            scheduler,
            publisher,
            credentials,
            ReservationPolicy {
                hold: Duration::from_secs(900),
                identity_call_timeout: Duration::from_secs(2),
                default_adult_minimum_age: 17,
                default_max_items_per_order: 5,
                side_effect_timeout: Duration::from_millis(200),
            },
        ));

        Fixture { store, queue, sink, registry, orchestrator, event_id, category_id }
    }
}

impl Fixture {
    pub fn request(&self, email: &str, items: Vec<ItemRequest>) -> ReservationRequest {
        ReservationRequest {
            event_id: self.event_id,
            ticket_category_id: self.category_id,
            fullname: "Rina Kusuma".to_string(),
            email: email.to_string(),
            payment_method: PAYMENT_METHOD.to_string(),
            items,
        }
    }

    pub async fn stock(&self) -> i32 {
        self.store.public_stock(self.category_id).await.unwrap_or(-1)
    }
}

pub fn holder(name: &str) -> ItemRequest {
    ItemRequest {
        fullname: Some(name.to_string()),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        phone_number: Some("081234567890".to_string()),
        ..Default::default()
    }
}

pub fn seated_holder(name: &str, row: i32, column: i32) -> ItemRequest {
    ItemRequest { seat_row: Some(row), seat_column: Some(column), ..holder(name) }
}

pub fn identity_item(token: &str) -> ItemRequest {
    ItemRequest { identity_token: Some(token.to_string()), ..Default::default() }
}

pub fn seat_map(rows: i32, columns: i32) -> Vec<(SeatCoordinate, SeatStatus)> {
    let mut seats = Vec::new();
    for row in 1..=rows {
        for column in 1..=columns {
            seats.push((SeatCoordinate::new(row, column), SeatStatus::Available));
        }
    }
    seats
}
