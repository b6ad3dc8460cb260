//! Strips database-operator keys from untrusted input.
//!
//! A key is suspicious when it starts with `$` (query operator) or contains `.` (nested
//! path). Such keys are removed from the parsed body and from the query string; the request
//! is never rejected.

use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_LENGTH, uri::PathAndQuery, HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use super::body::ParsedBody;

const OPERATOR_PREFIX: char = '$';
const PATH_SEPARATOR: char = '.';

pub fn is_suspicious_key(key: &str) -> bool {
    key.starts_with(OPERATOR_PREFIX) || key.contains(PATH_SEPARATOR)
}

/// Removes suspicious keys at every depth. Returns `true` when anything was removed.
pub fn sanitize_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_suspicious_key(key));
            let mut removed = map.len() != before;
            for child in map.values_mut() {
                removed |= sanitize_value(child);
            }
            removed
        }
        Value::Array(items) => items.iter_mut().fold(false, |removed, item| sanitize_value(item) | removed),
        _ => false,
    }
}

/// Checks every bracket segment of a query key, so `price[$gt]` is caught as well as `$where`.
fn is_suspicious_query_key(key: &str) -> bool {
    key.split(['[', ']'])
        .filter(|segment| !segment.is_empty())
        .any(is_suspicious_key)
}

/// Returns the query string with suspicious keys dropped, or `None` when nothing changed.
pub fn sanitize_query(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_suspicious_query_key(k)).collect();
    if kept.len() == pairs.len() {
        return None;
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in kept {
        serializer.append_pair(k, v);
    }
    Some(serializer.finish())
}

fn rewrite_query(uri: &Uri, query: &str) -> Option<Uri> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>().ok()?);
    Uri::from_parts(parts).ok()
}

pub async fn sanitize_request(mut req: Request, next: Next) -> Response {
    if let Some(cleaned) = req.uri().query().and_then(sanitize_query) {
        match rewrite_query(req.uri(), &cleaned) {
            Some(uri) => {
                tracing::warn!(path = req.uri().path(), "Removed operator keys from query string");
                *req.uri_mut() = uri;
            }
            None => tracing::warn!("Could not rebuild sanitized query; leaving request URI as-is"),
        }
    }

    let rewritten = req
        .extensions_mut()
        .get_mut::<ParsedBody>()
        .and_then(|ParsedBody(value)| if sanitize_value(value) { serde_json::to_vec(value).ok() } else { None });
    if let Some(bytes) = rewritten {
        tracing::warn!(path = req.uri().path(), "Removed operator keys from request body");
        if let Ok(len) = HeaderValue::from_str(&bytes.len().to_string()) {
            req.headers_mut().insert(CONTENT_LENGTH, len);
        }
        *req.body_mut() = Body::from(bytes);
    }

    next.run(req).await
}
