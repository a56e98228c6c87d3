use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tessera_core::order::{Order, OrderItem, OrderStatus};
use tessera_core::ReservationError;
use tessera_order::{ItemRequest, ReservationRequest};
use tessera_shared::Masked;

use crate::error::AppError;
use crate::middleware::auth::{GatewayAccess, OrderAccess};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItem {
    pub seat_row: Option<i32>,
    pub seat_column: Option<i32>,
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub identity_token: Option<String>,
    pub additional_information: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_number: String,
    pub payment_method: String,
    pub total_price: i64,
    pub tax_percentage: f64,
    pub total_tax: i64,
    pub admin_fee_percentage: f64,
    pub total_admin_fee: i64,
    pub pg_additional_fee: i64,
    pub grand_total: i64,
    pub access_token: Option<String>,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub transaction_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub fullname: String,
    pub email: Masked<String>,
    pub payment_method: String,
    pub item_count: u32,
    pub total_price: i64,
    pub total_tax: i64,
    pub total_admin_fee: i64,
    pub pg_additional_fee: i64,
    pub grand_total: i64,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub seat_row: Option<i32>,
    pub seat_column: Option<i32>,
    pub fullname: String,
    pub email: Masked<String>,
    pub price: i64,
    pub additional_information: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct PaymentOutcomeRequest {
    pub status: PaymentOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcomeResponse {
    pub transaction_id: Uuid,
    pub status: OrderStatus,
    /// False when the order had already settled and nothing changed.
    pub applied: bool,
}

impl From<CreateOrderItem> for ItemRequest {
    fn from(item: CreateOrderItem) -> Self {
        ItemRequest {
            seat_row: item.seat_row,
            seat_column: item.seat_column,
            fullname: item.fullname,
            email: item.email,
            phone_number: item.phone_number,
            identity_token: item.identity_token,
            additional_information: item.additional_information,
        }
    }
}

impl From<Order> for CreateOrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_number: order.order_number,
            payment_method: order.payment_method,
            total_price: order.fees.total_price,
            tax_percentage: order.fees.tax_percentage,
            total_tax: order.fees.total_tax,
            admin_fee_percentage: order.fees.admin_fee_percentage,
            total_admin_fee: order.fees.total_admin_fee,
            pg_additional_fee: order.fees.pg_additional_fee,
            grand_total: order.fees.grand_total,
            access_token: None,
            transaction_id: order.id,
            created_at: order.created_at,
            expired_at: order.payment_expired_at,
        }
    }
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            seat_row: item.seat.map(|s| s.row),
            seat_column: item.seat.map(|s| s.column),
            fullname: item.fullname.clone(),
            email: Masked(item.email.clone()),
            price: item.price,
            additional_information: item.additional_information.clone(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            transaction_id: order.id,
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            order_number: order.order_number,
            status: order.status,
            fullname: order.fullname,
            email: Masked(order.email),
            payment_method: order.payment_method,
            item_count: order.item_count,
            total_price: order.fees.total_price,
            total_tax: order.fees.total_tax,
            total_admin_fee: order.fees.total_admin_fee,
            pg_additional_fee: order.fees.pg_additional_fee,
            grand_total: order.fees.grand_total,
            created_at: order.created_at,
            expired_at: order.payment_expired_at,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events/{event_id}/ticket-categories/{ticket_category_id}/order",
            post(create_order),
        )
        .route("/orders/{transaction_id}", get(get_order))
        .route("/orders/{transaction_id}/payment-outcome", post(record_payment_outcome))
}

async fn create_order(
    State(state): State<AppState>,
    Path((event_id, ticket_category_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;

    let request = ReservationRequest {
        event_id,
        ticket_category_id,
        fullname: req.fullname,
        email: req.email,
        payment_method: req.payment_method,
        items: req.items.into_iter().map(ItemRequest::from).collect(),
    };

    match state.orchestrator.reserve(request).await {
        Ok(receipt) => {
            state.metrics.reservation_accepted();
            let mut response = CreateOrderResponse::from(receipt.order);
            response.access_token = receipt.access_token;
            Ok(Json(response))
        }
        Err(e) => {
            state.metrics.reservation_rejected(e.code());
            Err(state.reject(e))
        }
    }
}

async fn get_order(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    access: OrderAccess,
) -> Result<Json<OrderResponse>, AppError> {
    access.ensure(transaction_id)?;

    let order = state
        .store
        .find_order(transaction_id)
        .await
        .map_err(|e| state.reject(e.into()))?
        .ok_or_else(|| state.reject(ReservationError::OrderNotFound))?;

    Ok(Json(OrderResponse::from(order)))
}

async fn record_payment_outcome(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    gateway: GatewayAccess,
    payload: Result<Json<PaymentOutcomeRequest>, JsonRejection>,
) -> Result<Json<PaymentOutcomeResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let target = match req.status {
        PaymentOutcome::Success => OrderStatus::Success,
        PaymentOutcome::Failed => OrderStatus::Failed,
    };

    let outcome = state
        .settlement
        .settle(transaction_id, target)
        .await
        .map_err(|e| state.reject(e))?;

    info!(order_id = %transaction_id, gateway = %gateway.caller, requested = %target, status = %outcome.status(), "Payment outcome recorded");
    Ok(Json(PaymentOutcomeResponse {
        transaction_id,
        status: outcome.status(),
        applied: matches!(outcome, tessera_order::SettlementOutcome::Applied { .. }),
    }))
}
