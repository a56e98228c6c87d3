use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use tessera_core::identity::{IdentityRejection, IdentityVerifier, VerifiedIdentity};
use tessera_shared::Masked;

use crate::app_config::IdentityConfig;

#[derive(Debug, thiserror::Error)]
pub enum IdentityClientError {
    #[error("invalid registry url: {0}")]
    Url(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Client of the external identity registry.
#[derive(Clone)]
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryResponse {
    success: bool,
    #[serde(default)]
    data: Option<RegistryIdentity>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryIdentity {
    fans_id: String,
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone_number: String,
    age: u32,
    is_available: bool,
}

impl HttpIdentityVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| IdentityClientError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(IdentityClientError::Url(config.base_url.clone()));
        }
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, base_url })
    }

    fn verify_url(&self, token: &str) -> Result<Url, IdentityRejection> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityRejection::ServiceUnavailable("registry url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v1", "user", "verify", token]);
        Ok(url)
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityRejection> {
        let url = self.verify_url(token)?;
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Identity registry call failed: {}", e);
            IdentityRejection::ServiceUnavailable(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IdentityRejection::NotFound);
        }
        if status.is_server_error() {
            warn!("Identity registry answered {}", status);
            return Err(IdentityRejection::ServiceUnavailable(format!("registry returned {}", status)));
        }

        let body: RegistryResponse = response
            .json()
            .await
            .map_err(|e| IdentityRejection::ServiceUnavailable(format!("undecodable registry response: {}", e)))?;

        let verified = interpret(token, body)?;
        debug!(
            fans_id = %verified.fans_id,
            email = %Masked(verified.email.as_str()),
            "Identity verified"
        );
        Ok(verified)
    }
}

fn interpret(token: &str, body: RegistryResponse) -> Result<VerifiedIdentity, IdentityRejection> {
    if !body.success {
        return Err(match body.error_code.as_deref() {
            Some("NOT_FOUND") => IdentityRejection::NotFound,
            Some("BLACKLISTED") => IdentityRejection::Blacklisted,
            _ => IdentityRejection::Invalid,
        });
    }

    let data = body
        .data
        .ok_or_else(|| IdentityRejection::ServiceUnavailable("registry response without data".into()))?;

    if !data.is_available {
        let reason = body.message.unwrap_or_else(|| "identity is not available".to_string());
        return Err(IdentityRejection::Rejected(reason));
    }

    Ok(VerifiedIdentity {
        token: token.to_string(),
        fans_id: data.fans_id,
        display_name: data.name,
        email: data.email,
        phone_number: data.phone_number,
        age: data.age,
    })
}
