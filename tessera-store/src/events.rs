use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

use tessera_core::events::{OrderEventPublisher, PublishError};
use tessera_shared::models::events::OrderReservedEvent;

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    order_topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, order_topic: impl Into<String>) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer, order_topic: order_topic.into() })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl OrderEventPublisher for EventProducer {
    async fn publish_order_reserved(&self, event: &OrderReservedEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event).map_err(|e| PublishError::Encode(e.to_string()))?;
        let key = event.order.transaction_id.to_string();
        self.publish(&self.order_topic, &key, &payload)
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))
    }
}

/// Keeps published events in memory. Used where no broker is available.
#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<OrderReservedEvent>>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<OrderReservedEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl OrderEventPublisher for InMemoryEventSink {
    async fn publish_order_reserved(&self, event: &OrderReservedEvent) -> Result<(), PublishError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
