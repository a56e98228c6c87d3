use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity confirmed by the external registry for one identity token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedIdentity {
    pub token: String,
    pub fans_id: String,
    pub display_name: String,
    pub email: String,
    pub phone_number: String,
    pub age: u32,
}

/// Closed set of reasons the registry can refuse a token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityRejection {
    #[error("identity not found")]
    NotFound,
    #[error("identity is blacklisted")]
    Blacklisted,
    #[error("identity is invalid")]
    Invalid,
    #[error("identity was rejected: {0}")]
    Rejected(String),
    #[error("identity service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IdentityRejection {
    pub fn is_transient(&self) -> bool {
        matches!(self, IdentityRejection::ServiceUnavailable(_))
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Check a single identity token against the registry.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityRejection>;
}
