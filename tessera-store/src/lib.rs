pub mod app_config;
pub mod database;
pub mod events;
pub mod identity_client;
pub mod memory;
pub mod redis_repo;
pub mod reservation_repo;

pub use database::DbClient;
pub use events::{EventProducer, InMemoryEventSink};
pub use identity_client::HttpIdentityVerifier;
pub use memory::InMemoryReservationStore;
pub use redis_repo::{InMemoryExpiryQueue, RedisExpiryQueue};
pub use reservation_repo::PostgresReservationStore;
