mod common;

use std::time::Duration;
use tokio::time::Instant;

use common::{holder, BrokenOutbox, FixtureBuilder, RefusingCredentials};
use tessera_core::order::OrderStatus;
use tessera_core::repository::ReservationStore;

#[tokio::test]
async fn test_failed_side_effects_keep_the_committed_order() {
    let fx = FixtureBuilder::new(10)
        .credentials(RefusingCredentials)
        .outbox(BrokenOutbox::failing())
        .build()
        .await;

    let receipt = fx
        .orchestrator
        .reserve(fx.request("rina@example.com", vec![holder("Rina"), holder("Bayu")]))
        .await
        .unwrap();

    assert!(receipt.access_token.is_none());
    assert_eq!(fx.stock().await, 8);
    assert_eq!(fx.store.order_count().await, 1);

    let stored = fx.store.find_order(receipt.order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.items.len(), 2);
}

#[tokio::test]
async fn test_unresponsive_side_effects_are_cut_off() {
    let fx = FixtureBuilder::new(5).outbox(BrokenOutbox::hanging()).build().await;

    let started = Instant::now();
    let receipt = tokio::time::timeout(
        Duration::from_secs(5),
        fx.orchestrator.reserve(fx.request("bayu@example.com", vec![holder("Bayu")])),
    )
    .await
    .expect("reservation returned despite hanging scheduler and publisher")
    .unwrap();

    // Two bounded calls of 200ms each.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(receipt.access_token.is_some());
    assert_eq!(fx.stock().await, 4);
    assert!(fx.store.find_order(receipt.order.id).await.unwrap().is_some());
}
