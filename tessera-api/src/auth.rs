use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use tessera_core::events::{AccessCredentialIssuer, CredentialError};

use crate::middleware::auth::{GatewayClaims, OrderClaims};
use crate::state::AuthConfig;

pub const ORDER_SCOPE: &str = "ORDER";
pub const GATEWAY_SCOPE: &str = "PAYMENT_GATEWAY";

/// Issues the bearer token a buyer uses to read back their own order.
pub struct JwtCredentialIssuer {
    auth: AuthConfig,
}

impl JwtCredentialIssuer {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth }
    }
}

impl AccessCredentialIssuer for JwtCredentialIssuer {
    fn issue(&self, order_id: Uuid) -> Result<String, CredentialError> {
        let claims = OrderClaims {
            sub: order_id.to_string(),
            scope: ORDER_SCOPE.to_owned(),
            exp: (Utc::now() + Duration::seconds(self.auth.expiration as i64)).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.auth.secret.as_bytes()))
            .map_err(|e| CredentialError(format!("Token encoding failed: {}", e)))
    }
}

pub fn decode_order_token(auth: &AuthConfig, token: &str) -> Result<OrderClaims, jsonwebtoken::errors::Error> {
    let data = decode::<OrderClaims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Mints the service token the payment gateway presents on payment outcome
/// callbacks. Operators run this out of band; the API never hands one out.
pub fn issue_gateway_token(
    auth: &AuthConfig,
    caller: &str,
    ttl_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = GatewayClaims {
        sub: caller.to_owned(),
        scope: GATEWAY_SCOPE.to_owned(),
        exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.gateway_secret.as_bytes()))
}

pub fn decode_gateway_token(auth: &AuthConfig, token: &str) -> Result<GatewayClaims, jsonwebtoken::errors::Error> {
    let data = decode::<GatewayClaims>(
        token,
        &DecodingKey::from_secret(auth.gateway_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(secret: &str) -> AuthConfig {
        AuthConfig { secret: secret.to_string(), expiration: 3600, gateway_secret: format!("{}-gw", secret) }
    }

    #[test]
    fn test_token_is_scoped_to_the_order() {
        let order_id = Uuid::new_v4();
        let token = JwtCredentialIssuer::new(auth("s3cret")).issue(order_id).unwrap();

        let claims = decode_order_token(&auth("s3cret"), &token).unwrap();
        assert_eq!(claims.sub, order_id.to_string());
        assert_eq!(claims.scope, ORDER_SCOPE);
    }

    #[test]
    fn test_token_signed_with_another_secret_is_refused() {
        let token = JwtCredentialIssuer::new(auth("one")).issue(Uuid::new_v4()).unwrap();
        assert!(decode_order_token(&auth("two"), &token).is_err());
    }

    #[test]
    fn test_order_tokens_do_not_pass_as_gateway_tokens() {
        let auth = auth("s3cret");
        let order_token = JwtCredentialIssuer::new(auth.clone()).issue(Uuid::new_v4()).unwrap();
        assert!(decode_gateway_token(&auth, &order_token).is_err());

        let gateway_token = issue_gateway_token(&auth, "midtrans", 60).unwrap();
        let claims = decode_gateway_token(&auth, &gateway_token).unwrap();
        assert_eq!(claims.sub, "midtrans");
        assert_eq!(claims.scope, GATEWAY_SCOPE);
        assert!(decode_order_token(&auth, &gateway_token).is_err());
    }
}
