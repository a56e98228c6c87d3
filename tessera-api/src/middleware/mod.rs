pub mod auth;

pub use auth::{GatewayAccess, GatewayClaims, OrderAccess, OrderClaims};
