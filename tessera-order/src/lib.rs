pub mod expiry;
pub mod orchestrator;
pub mod request;
pub mod settlement;
pub mod validation;
pub mod verification;

pub use expiry::ExpiryHandler;
pub use orchestrator::{ReservationOrchestrator, ReservationPolicy};
pub use request::{ItemRequest, ReservationReceipt, ReservationRequest};
pub use settlement::{OrderSettlement, SettlementOutcome};
pub use verification::IdentityFanOut;
