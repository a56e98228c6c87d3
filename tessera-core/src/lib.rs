pub mod error;
pub mod event;
pub mod events;
pub mod identity;
pub mod inventory;
pub mod order;
pub mod repository;
pub mod scheduler;

pub use error::{ErrorKind, ReservationError};

pub type CoreResult<T> = Result<T, ReservationError>;
