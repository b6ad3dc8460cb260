//! Cookie parsing stage.
//!
//! Collects every `Cookie` header on the request into a [`Cookies`] map stored as a request
//! extension. Later stages, the auth gate in particular, read cookies from there instead of
//! re-parsing headers.

use std::collections::HashMap;

use axum::{extract::Request, http::header::COOKIE, middleware::Next, response::Response};

/// Cookies sent with the request, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parses one `Cookie` header value. Pairs without a name or `=` are skipped.
    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::default();
        cookies.extend_from(header);
        cookies
    }

    fn extend_from(&mut self, header: &str) {
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            // First occurrence wins, as browsers send the most specific path first.
            self.0.entry(name.to_string()).or_insert_with(|| value.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Attaches the parsed [`Cookies`] to the request.
///
/// Multiple `Cookie` headers are merged in order. Headers that are not valid UTF-8 are
/// skipped. The stage never rejects a request.
///
/// # Arguments
///
/// * `req` - The incoming HTTP request
/// * `next` - The next stage in the pipeline
///
/// # Returns
///
/// The downstream response; the request it forwarded carries a [`Cookies`] extension,
/// empty when no cookies were sent
pub async fn parse_cookies(mut req: Request, next: Next) -> Response {
    let mut cookies = Cookies::default();
    for value in req.headers().get_all(COOKIE) {
        match value.to_str() {
            Ok(raw) => cookies.extend_from(raw),
            Err(_) => tracing::debug!("Ignoring non-UTF-8 Cookie header"),
        }
    }
    req.extensions_mut().insert(cookies);
    next.run(req).await
}
