use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tessera_catalog::FeeCalculator;
use tessera_core::event::{AdditionalFee, Event, EventSettings, PaymentMethod, SaleWindow};
use tessera_core::events::{AccessCredentialIssuer, OrderEventPublisher};
use tessera_core::identity::{IdentityVerifier, VerifiedIdentity};
use tessera_core::inventory::{SeatCoordinate, SeatStatus, TicketCategory, VenueSector};
use tessera_core::order::{Order, OrderItem, OrderStatus};
use tessera_core::repository::{ReservationStore, UnitOfWork};
use tessera_core::scheduler::ExpiryScheduler;
use tessera_core::ReservationError;
use tessera_shared::models::events::{EventSnapshot, ExpiryTask, OrderReservedEvent, OrderSummary, Recipient};
use tessera_shared::Masked;

use crate::request::{ItemRequest, ReservationReceipt, ReservationRequest};
use crate::validation;
use crate::verification::IdentityFanOut;

/// Knobs that do not come from the event itself.
#[derive(Debug, Clone)]
pub struct ReservationPolicy {
    pub hold: Duration,
    pub identity_call_timeout: Duration,
    /// Applied when an event has no settings of its own.
    pub default_adult_minimum_age: u32,
    pub default_max_items_per_order: u32,
    /// Upper bound for each post-commit call (expiry scheduling, event publishing).
    pub side_effect_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationPhase {
    Validating,
    VerifyingIdentity,
    Reserving,
    Persisting,
    Committed,
    Rejected,
}

impl fmt::Display for ReservationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReservationPhase::Validating => "validating",
            ReservationPhase::VerifyingIdentity => "verifying_identity",
            ReservationPhase::Reserving => "reserving",
            ReservationPhase::Persisting => "persisting",
            ReservationPhase::Committed => "committed",
            ReservationPhase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Everything step 1 loads and checks before any write happens.
struct Validated {
    event: Event,
    settings: EventSettings,
    payment_method: PaymentMethod,
    fee_rules: Vec<AdditionalFee>,
}

/// Per-item holder data after validation or identity verification.
struct Holder {
    fullname: String,
    email: String,
    phone_number: String,
    identity_token: Option<String>,
    age: Option<u32>,
}

/// Drives a reservation from the incoming request to a committed hold.
///
/// Nothing is written before identity verification finishes. All writes share
/// one unit of work, so any failure leaves the store untouched. Expiry
/// scheduling, credential issuance and event publishing happen after commit and
/// never fail the reservation.
pub struct ReservationOrchestrator {
    store: Arc<dyn ReservationStore>,
    identities: IdentityFanOut,
    scheduler: Arc<dyn ExpiryScheduler>,
    publisher: Arc<dyn OrderEventPublisher>,
    credentials: Arc<dyn AccessCredentialIssuer>,
    policy: ReservationPolicy,
}

impl ReservationOrchestrator {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        verifier: Arc<dyn IdentityVerifier>,
        scheduler: Arc<dyn ExpiryScheduler>,
        publisher: Arc<dyn OrderEventPublisher>,
        credentials: Arc<dyn AccessCredentialIssuer>,
        policy: ReservationPolicy,
    ) -> Self {
        let identities = IdentityFanOut::new(verifier, policy.identity_call_timeout);
        Self { store, identities, scheduler, publisher, credentials, policy }
    }

    pub async fn reserve(&self, request: ReservationRequest) -> Result<ReservationReceipt, ReservationError> {
        let order_id = Uuid::new_v4();
        match self.run(order_id, &request).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                enter(order_id, ReservationPhase::Rejected);
                if e.is_business_error() {
                    info!(order_id = %order_id, code = e.code(), "Reservation rejected: {}", e);
                } else {
                    error!(order_id = %order_id, code = e.code(), "Reservation failed: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn run(&self, order_id: Uuid, request: &ReservationRequest) -> Result<ReservationReceipt, ReservationError> {
        enter(order_id, ReservationPhase::Validating);
        let validated = self.validate(request).await?;

        enter(order_id, ReservationPhase::VerifyingIdentity);
        let holders = self.resolve_holders(request, &validated.settings).await?;

        let mut uow = self.store.begin().await?;
        let (order, category, sector) = self
            .reserve_and_persist(uow.as_mut(), order_id, request, &validated, holders)
            .await?;
        uow.commit().await?;
        enter(order_id, ReservationPhase::Committed);
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = order.item_count,
            grand_total = order.fees.grand_total,
            buyer = %Masked(order.email.as_str()),
            "Reservation committed"
        );

        let access_token = self.after_commit(&order, &validated.event, &category, sector.as_ref()).await;
        Ok(ReservationReceipt { order, access_token })
    }

    async fn validate(&self, request: &ReservationRequest) -> Result<Validated, ReservationError> {
        let event = self
            .store
            .find_event(request.event_id)
            .await?
            .filter(Event::is_published)
            .ok_or(ReservationError::EventNotFound)?;

        match event.sale_window_at(Utc::now()) {
            SaleWindow::NotStarted => return Err(ReservationError::SaleNotStarted),
            SaleWindow::Over => return Err(ReservationError::SaleAlreadyOver),
            SaleWindow::Open => {}
        }
        if !event.is_sale_active {
            return Err(ReservationError::SalePaused);
        }

        let payment_method = self
            .store
            .find_payment_method(&request.payment_method)
            .await?
            .filter(PaymentMethod::is_usable)
            .ok_or_else(|| ReservationError::PaymentMethodInvalid(request.payment_method.clone()))?;

        self.store
            .find_ticket_category(event.id, request.ticket_category_id)
            .await?
            .ok_or(ReservationError::TicketCategoryNotFound)?;

        if request.items.is_empty() {
            return Err(ReservationError::EmptyOrder);
        }

        let settings = self.store.find_event_settings(event.id).await?.unwrap_or_else(|| EventSettings {
            event_id: event.id,
            identity_verification_required: false,
            max_items_per_order: self.policy.default_max_items_per_order,
            adult_minimum_age: self.policy.default_adult_minimum_age,
        });

        let requested = request.item_count();
        if requested > settings.max_items_per_order {
            return Err(ReservationError::PurchaseQuantityExceedsLimit {
                requested,
                limit: settings.max_items_per_order,
            });
        }

        let fee_rules = self.store.list_additional_fees(event.id).await?;
        Ok(Validated { event, settings, payment_method, fee_rules })
    }

    async fn resolve_holders(
        &self,
        request: &ReservationRequest,
        settings: &EventSettings,
    ) -> Result<Vec<Holder>, ReservationError> {
        validation::validate_buyer(&request.fullname, &request.email)?;

        if !settings.identity_verification_required {
            for (index, item) in request.items.iter().enumerate() {
                validation::validate_item(index, item)?;
            }
            return Ok(request.items.iter().map(Holder::from_request).collect());
        }

        let mut tokens = Vec::with_capacity(request.items.len());
        for (index, item) in request.items.iter().enumerate() {
            item.seat(index)?;
            match item.identity_token.as_deref().map(str::trim) {
                Some(token) if !token.is_empty() => tokens.push(token.to_string()),
                _ => return Err(ReservationError::MissingIdentityToken { index }),
            }
        }

        let verified = self.identities.verify_all(&tokens, settings.adult_minimum_age).await?;
        Ok(request
            .items
            .iter()
            .zip(verified)
            .map(|(item, identity)| Holder::from_identity(item, identity))
            .collect())
    }

    async fn reserve_and_persist(
        &self,
        uow: &mut dyn UnitOfWork,
        order_id: Uuid,
        request: &ReservationRequest,
        validated: &Validated,
        holders: Vec<Holder>,
    ) -> Result<(Order, TicketCategory, Option<VenueSector>), ReservationError> {
        let event = &validated.event;
        let item_count = request.item_count();

        enter(order_id, ReservationPhase::Reserving);
        let buyer_slot = uow.claim_buyer_slot(event.id, request.email.trim()).await?;

        let category = uow
            .fetch_ticket_category(event.id, request.ticket_category_id)
            .await?
            .ok_or(ReservationError::TicketCategoryNotFound)?;
        let sector = match category.sector_id {
            Some(sector_id) => Some(uow.fetch_sector(sector_id).await?.ok_or(ReservationError::SectorNotFound)?),
            None => None,
        };

        if !category.has_stock_for(item_count) {
            return Err(ReservationError::TicketOutOfStock);
        }
        uow.reserve_stock(category.id, item_count).await?;

        let seats = match sector.as_ref().filter(|s| s.has_seat_map) {
            Some(sector) => {
                let seats = requested_seats(&request.items)?;
                prescreen_seats(uow, event.id, sector.id, &seats).await?;
                uow.reserve_seats(event.id, sector.id, order_id, &seats).await?;
                Some(seats)
            }
            None => None,
        };

        if validated.settings.identity_verification_required {
            let tokens: Vec<String> = holders.iter().filter_map(|h| h.identity_token.clone()).collect();
            uow.reserve_identities(event.id, order_id, &tokens).await?;
        }

        enter(order_id, ReservationPhase::Persisting);
        let fees = FeeCalculator::calculate(category.price, item_count, &validated.fee_rules, &validated.payment_method);
        let now = Utc::now();
        let items = holders
            .into_iter()
            .enumerate()
            .map(|(index, holder)| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                seat: seats.as_ref().map(|s| s[index]),
                fullname: holder.fullname,
                email: holder.email,
                phone_number: holder.phone_number,
                identity_token: holder.identity_token,
                age: holder.age,
                additional_information: request.items[index].additional_information.clone(),
                price: category.price,
            })
            .collect();

        let order = Order {
            id: order_id,
            order_number: order_number(now),
            event_id: event.id,
            ticket_category_id: category.id,
            status: OrderStatus::Pending,
            fullname: request.fullname.trim().to_string(),
            email: request.email.trim().to_string(),
            payment_method: validated.payment_method.code.clone(),
            item_count,
            fees,
            payment_expired_at: now + hold_as_chrono(self.policy.hold),
            created_at: now,
            updated_at: now,
            items,
        };

        uow.insert_order(&order).await?;
        uow.link_buyer_slot(buyer_slot, order_id).await?;
        Ok((order, category, sector))
    }

    /// Side effects of a committed order. Failures are logged and otherwise
    /// ignored; the order stands either way.
    async fn after_commit(
        &self,
        order: &Order,
        event: &Event,
        category: &TicketCategory,
        sector: Option<&VenueSector>,
    ) -> Option<String> {
        let access_token = match self.credentials.issue(order.id) {
            Ok(token) => Some(token),
            Err(e) => {
                error!(order_id = %order.id, "Failed to issue access token: {}", e);
                None
            }
        };

        let limit = self.policy.side_effect_timeout;
        let task = ExpiryTask::new(order.id, order.created_at);
        match timeout(limit, self.scheduler.schedule_release(task, self.policy.hold)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(order_id = %order.id, "Failed to schedule hold expiry: {}", e),
            Err(_) => error!(order_id = %order.id, "Scheduling hold expiry timed out after {:?}", limit),
        }

        let message = order_reserved_event(order, event, category, sector);
        match timeout(limit, self.publisher.publish_order_reserved(&message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(order_id = %order.id, "Failed to publish order event: {}", e),
            Err(_) => warn!(order_id = %order.id, "Publishing order event timed out after {:?}", limit),
        }

        access_token
    }
}

fn enter(order_id: Uuid, phase: ReservationPhase) {
    debug!(order_id = %order_id, phase = %phase, "Reservation phase");
}

impl Holder {
    fn from_request(item: &ItemRequest) -> Self {
        let trimmed = |value: &Option<String>| value.as_deref().map(str::trim).unwrap_or_default().to_string();
        Self {
            fullname: trimmed(&item.fullname),
            email: trimmed(&item.email),
            phone_number: trimmed(&item.phone_number),
            identity_token: None,
            age: None,
        }
    }

    /// Registry data is authoritative; request fields only fill gaps.
    fn from_identity(item: &ItemRequest, identity: VerifiedIdentity) -> Self {
        let fallback = Self::from_request(item);
        let pick = |registry: String, requested: String| if registry.is_empty() { requested } else { registry };
        Self {
            fullname: pick(identity.display_name, fallback.fullname),
            email: pick(identity.email, fallback.email),
            phone_number: pick(identity.phone_number, fallback.phone_number),
            identity_token: Some(identity.token),
            age: Some(identity.age),
        }
    }
}

fn requested_seats(items: &[ItemRequest]) -> Result<Vec<SeatCoordinate>, ReservationError> {
    let mut seats = Vec::with_capacity(items.len());
    let mut seen = HashSet::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let seat = item.seat(index)?.ok_or(ReservationError::SeatSelectionRequired { index })?;
        if !seen.insert(seat) {
            return Err(ReservationError::DuplicateSeatInPayload(seat.to_string()));
        }
        seats.push(seat);
    }
    Ok(seats)
}

/// Fails fast on seats that are obviously taken. The insert in `reserve_seats`
/// stays the authority.
async fn prescreen_seats(
    uow: &mut dyn UnitOfWork,
    event_id: Uuid,
    sector_id: Uuid,
    seats: &[SeatCoordinate],
) -> Result<(), ReservationError> {
    let statuses: HashMap<SeatCoordinate, SeatStatus> = uow.read_seat_statuses(event_id, sector_id, seats).await?;
    for seat in seats {
        match statuses.get(seat) {
            None => return Err(ReservationError::BookedSeatNotFound(seat.to_string())),
            Some(SeatStatus::Available) => {}
            Some(SeatStatus::Booked) => return Err(ReservationError::SeatAlreadyBooked),
            Some(SeatStatus::Unavailable) | Some(SeatStatus::Disabled) => {
                return Err(ReservationError::SeatNotAvailable(seat.to_string()))
            }
        }
    }
    Ok(())
}

fn hold_as_chrono(hold: Duration) -> chrono::Duration {
    chrono::Duration::from_std(hold).unwrap_or_else(|_| chrono::Duration::zero())
}

/// e.g. `TSR-20261016-7KQ2M9XA`
fn order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("TSR-{}-{}", now.format("%Y%m%d"), suffix)
}

fn order_reserved_event(
    order: &Order,
    event: &Event,
    category: &TicketCategory,
    sector: Option<&VenueSector>,
) -> OrderReservedEvent {
    OrderReservedEvent {
        recipient: Recipient { fullname: order.fullname.clone(), email: order.email.clone() },
        order: OrderSummary {
            transaction_id: order.id,
            order_number: order.order_number.clone(),
            payment_method: order.payment_method.clone(),
            item_count: order.item_count,
            total_price: order.fees.total_price,
            total_tax: order.fees.total_tax,
            total_admin_fee: order.fees.total_admin_fee,
            pg_additional_fee: order.fees.pg_additional_fee,
            grand_total: order.fees.grand_total,
            created_at: order.created_at,
            expired_at: order.payment_expired_at,
        },
        event: EventSnapshot {
            event_id: event.id,
            event_name: event.name.clone(),
            venue_name: event.venue_name.clone(),
            starts_at: event.starts_at,
            ticket_category_id: category.id,
            ticket_category_name: category.name.clone(),
            sector_name: sector.map(|s| s.name.clone()),
        },
        published_at: Utc::now().timestamp(),
    }
}
