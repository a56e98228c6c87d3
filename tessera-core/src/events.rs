use async_trait::async_trait;
use tessera_shared::models::events::OrderReservedEvent;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(String),
    #[error("broker rejected event: {0}")]
    Broker(String),
}

#[async_trait]
pub trait OrderEventPublisher: Send + Sync {
    async fn publish_order_reserved(&self, event: &OrderReservedEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to issue access credential: {0}")]
pub struct CredentialError(pub String);

/// Issues the opaque credential a buyer uses to look up their own order.
pub trait AccessCredentialIssuer: Send + Sync {
    fn issue(&self, order_id: uuid::Uuid) -> Result<String, CredentialError>;
}
