mod common;

use std::sync::Arc;
use uuid::Uuid;

use common::{holder, identity_item, seat_map, seated_holder, FixtureBuilder, StubRegistry};
use tessera_core::order::OrderStatus;
use tessera_core::repository::ReservationStore;
use tessera_core::ReservationError;
use tessera_order::{ExpiryHandler, OrderSettlement, SettlementOutcome};
use tessera_shared::models::events::ExpiryTask;

#[tokio::test]
async fn test_expiry_releases_once() {
    let fx = FixtureBuilder::new(10).seated(seat_map(1, 5)).build().await;
    let receipt = fx
        .orchestrator
        .reserve(fx.request("rina@example.com", vec![seated_holder("Rina", 1, 1), seated_holder("Bayu", 1, 2)]))
        .await
        .unwrap();
    assert_eq!(fx.stock().await, 8);

    let handler = ExpiryHandler::new(Arc::new(fx.store.clone()));
    let task = ExpiryTask::new(receipt.order.id, receipt.order.created_at);

    let first = handler.handle(&task).await.unwrap();
    assert_eq!(first, SettlementOutcome::Applied { from: OrderStatus::Pending, to: OrderStatus::Expired });
    assert_eq!(fx.stock().await, 10);
    assert_eq!(fx.store.seat_book_count().await, 0);
    assert_eq!(fx.store.buyer_slot_count().await, 0);

    let second = handler.handle(&task.next_attempt()).await.unwrap();
    assert_eq!(second, SettlementOutcome::Unchanged(OrderStatus::Expired));
    assert_eq!(fx.stock().await, 10);

    let order = fx.store.find_order(receipt.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Expired);

    // Released seats and buyer can be booked again.
    fx.orchestrator
        .reserve(fx.request("rina@example.com", vec![seated_holder("Rina", 1, 1)]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expiry_after_payment_is_a_no_op() {
    let fx = FixtureBuilder::new(10).build().await;
    let receipt = fx.orchestrator.reserve(fx.request("a@example.com", vec![holder("Ana")])).await.unwrap();

    let settlement = OrderSettlement::new(Arc::new(fx.store.clone()));
    let paid = settlement.settle(receipt.order.id, OrderStatus::Success).await.unwrap();
    assert_eq!(paid.status(), OrderStatus::Success);

    let handler = ExpiryHandler::new(Arc::new(fx.store.clone()));
    let outcome = handler.handle(&ExpiryTask::new(receipt.order.id, receipt.order.created_at)).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::Unchanged(OrderStatus::Success));
    assert_eq!(fx.stock().await, 9);
    assert_eq!(fx.store.buyer_slot_count().await, 1);
}

#[tokio::test]
async fn test_failed_payment_returns_identities_and_stock() {
    let fx = FixtureBuilder::new(4)
        .identity_checked(StubRegistry::with(&[("tok-a", Ok(25))]))
        .build()
        .await;
    let receipt = fx
        .orchestrator
        .reserve(fx.request("a@example.com", vec![identity_item("tok-a")]))
        .await
        .unwrap();
    assert_eq!(fx.store.identity_book_count().await, 1);

    let settlement = OrderSettlement::new(Arc::new(fx.store.clone()));
    let outcome = settlement.settle(receipt.order.id, OrderStatus::Failed).await.unwrap();
    assert_eq!(outcome, SettlementOutcome::Applied { from: OrderStatus::Pending, to: OrderStatus::Failed });
    assert_eq!(fx.store.identity_book_count().await, 0);
    assert_eq!(fx.stock().await, 4);

    // A late success callback does not revive the order.
    let late = settlement.settle(receipt.order.id, OrderStatus::Success).await.unwrap();
    assert_eq!(late, SettlementOutcome::Unchanged(OrderStatus::Failed));
}

#[tokio::test]
async fn test_unknown_order_cannot_be_settled() {
    let fx = FixtureBuilder::new(1).build().await;
    let settlement = OrderSettlement::new(Arc::new(fx.store.clone()));
    assert!(matches!(
        settlement.settle(Uuid::new_v4(), OrderStatus::Expired).await,
        Err(ReservationError::OrderNotFound)
    ));
}
