use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use tessera_core::identity::IdentityRejection;
use tessera_core::{ErrorKind, ReservationError};

#[derive(Debug)]
pub enum AppError {
    /// A reservation or settlement failure. `verbose` adds the debug detail to
    /// the response body.
    Reservation { error: ReservationError, verbose: bool },
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
}

impl AppError {
    pub fn reservation(error: ReservationError, verbose: bool) -> Self {
        AppError::Reservation { error, verbose }
    }
}

pub fn status_for(kind: &ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::SaleWindow => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::IdentityVerification(rejection) => match rejection {
            IdentityRejection::NotFound => StatusCode::NOT_FOUND,
            IdentityRejection::Blacklisted => StatusCode::FORBIDDEN,
            IdentityRejection::Invalid => StatusCode::BAD_REQUEST,
            IdentityRejection::Rejected(_) => StatusCode::CONFLICT,
            IdentityRejection::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, detail) = match self {
            AppError::Reservation { error, verbose } => {
                let status = status_for(&error.kind());
                let detail = verbose.then(|| format!("{:?}", error));
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", error);
                    let detail = verbose.then(|| error.to_string());
                    (status, error.code(), "Internal Server Error".to_string(), detail)
                } else {
                    (status, error.code(), error.to_string(), detail)
                }
            }
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, 1501, msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, 1502, msg, None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, 1000, msg, None),
        };

        let mut body = json!({
            "code": code,
            "error": message,
        });
        if let Some(detail) = detail {
            body["detail"] = json!(detail);
        }

        (status, Json(body)).into_response()
    }
}
