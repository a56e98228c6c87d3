use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::time::Duration;

use tessera_core::identity::{IdentityRejection, IdentityVerifier};
use tessera_store::app_config::IdentityConfig;
use tessera_store::HttpIdentityVerifier;

async fn verify(Path(token): Path<String>) -> Response {
    match token.as_str() {
        "adult" => Json(json!({
            "success": true,
            "data": {
                "fansId": "F-100",
                "name": "Sari Wulandari",
                "email": "sari@example.com",
                "phoneNumber": "+6281234567",
                "age": 27,
                "isAvailable": true
            }
        }))
        .into_response(),
        "blacklisted" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "errorCode": "BLACKLISTED" })),
        )
            .into_response(),
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "broken" => StatusCode::BAD_GATEWAY.into_response(),
        "garbage" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK.into_response()
        }
        _ => Json(json!({ "success": false, "errorCode": "TOKEN_EXPIRED" })).into_response(),
    }
}

async fn spawn_registry() -> String {
    let app = Router::new().route("/v1/user/verify/{token}", get(verify));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn verifier() -> HttpIdentityVerifier {
    let base_url = spawn_registry().await;
    HttpIdentityVerifier::new(&IdentityConfig { base_url, timeout_ms: 300 }).unwrap()
}

#[tokio::test]
async fn test_verified_identity() {
    let verifier = verifier().await;
    let identity = verifier.verify("adult").await.unwrap();
    assert_eq!(identity.fans_id, "F-100");
    assert_eq!(identity.display_name, "Sari Wulandari");
    assert_eq!(identity.age, 27);
}

#[tokio::test]
async fn test_registry_rejections() {
    let verifier = verifier().await;
    assert_eq!(verifier.verify("missing").await, Err(IdentityRejection::NotFound));
    assert_eq!(verifier.verify("blacklisted").await, Err(IdentityRejection::Blacklisted));
    assert_eq!(verifier.verify("expired").await, Err(IdentityRejection::Invalid));
}

#[tokio::test]
async fn test_registry_failures_are_transient() {
    let verifier = verifier().await;
    for token in ["broken", "garbage", "slow"] {
        let rejection = verifier.verify(token).await.unwrap_err();
        assert!(rejection.is_transient(), "{} gave {:?}", token, rejection);
    }
}
