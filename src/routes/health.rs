//! Health endpoints.
//!
//! Neither route touches storage, so both answer before the database is connected.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness check served at `GET /`.
///
/// # Returns
///
/// * `200 OK` with the plain-text body `Hello World`
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "Hello World")
}

/// API smoke test served at `GET /api/v1/test`.
///
/// # Returns
///
/// * `200 OK` with `{"msg":"test route"}`
pub async fn test_route() -> impl IntoResponse {
    Json(json!({ "msg": "test route" }))
}
