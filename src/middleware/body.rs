//! JSON body stage.
//!
//! Buffers JSON request bodies, parses them once, and exposes the value to handlers through
//! [`JsonBody`]. Bodies that are not declared as JSON are left alone and read as `{}`.

use std::convert::Infallible;

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{header::CONTENT_LENGTH, header::CONTENT_TYPE, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The parsed JSON body, stored in request extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Extractor for the parsed (and sanitized) request body. Defaults to an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

impl<S> FromRequestParts<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .extensions
            .get::<ParsedBody>()
            .map(|body| body.0.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(JsonBody(value))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

/// Parses raw bytes; an empty body reads as `{}`.
pub fn parse_json(bytes: &[u8]) -> AppResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| AppError::MalformedBody(format!("invalid JSON body: {}", e)))
}

pub async fn parse_json_body(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    if !is_json(req.headers()) {
        return Ok(next.run(req).await);
    }

    let limit = state.config.server.body_limit;
    if declared_length(req.headers()).is_some_and(|len| len > limit) {
        return Err(AppError::PayloadTooLarge { limit });
    }

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|e| {
        let too_large = e
            .into_inner()
            .downcast_ref::<http_body_util::LengthLimitError>()
            .is_some();
        if too_large {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::MalformedBody("request body could not be read".to_string())
        }
    })?;
    let value = parse_json(&bytes)?;

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(ParsedBody(value));
    Ok(next.run(req).await)
}
