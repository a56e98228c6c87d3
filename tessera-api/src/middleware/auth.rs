use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{decode_gateway_token, decode_order_token, GATEWAY_SCOPE, ORDER_SCOPE};
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderClaims {
    /// Transaction id the token grants access to.
    pub sub: String,
    pub scope: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayClaims {
    /// Name of the calling gateway, for logs.
    pub sub: String,
    pub scope: String,
    pub exp: usize,
}

async fn bearer_token(parts: &mut Parts) -> Result<String, AppError> {
    let TypedHeader(Authorization(bearer)) = parts
        .extract::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AppError::AuthenticationError("Missing bearer token".to_string()))?;
    Ok(bearer.token().to_owned())
}

// ============================================================================
// Order access extractor
// ============================================================================

/// Bearer token of an order, decoded and checked for scope. Whether it
/// matches the requested order is up to the handler.
#[derive(Debug, Clone)]
pub struct OrderAccess {
    pub order_id: Uuid,
}

impl OrderAccess {
    pub fn ensure(&self, order_id: Uuid) -> Result<(), AppError> {
        if self.order_id != order_id {
            return Err(AppError::AuthorizationError("Token does not grant access to this order".to_string()));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for OrderAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).await?;
        let claims = decode_order_token(&state.auth, &token)
            .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

        if claims.scope != ORDER_SCOPE {
            return Err(AppError::AuthorizationError("Token scope does not allow order access".to_string()));
        }

        let order_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthenticationError("Invalid token subject".to_string()))?;

        Ok(Self { order_id })
    }
}

// ============================================================================
// Payment gateway extractor
// ============================================================================

/// Service credential of the payment gateway. Required on every call that
/// settles an order.
#[derive(Debug, Clone)]
pub struct GatewayAccess {
    pub caller: String,
}

impl FromRequestParts<AppState> for GatewayAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).await?;
        let claims = decode_gateway_token(&state.auth, &token)
            .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

        if claims.scope != GATEWAY_SCOPE {
            return Err(AppError::AuthorizationError("Token scope does not allow payment settlement".to_string()));
        }

        Ok(Self { caller: claims.sub })
    }
}
