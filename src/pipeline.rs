//! The request pipeline as data.
//!
//! Stages are listed in the order a request meets them. [`Pipeline::apply`] wraps the router
//! so that the first stage is the outermost layer; a stage that answers early (static files,
//! a malformed body) therefore skips every stage after it.

use axum::{
    body::Body,
    http::Response,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    Router,
};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::{body, cookies, sanitize, security_headers, static_files};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Method, path, status and latency per request. Development only.
    AccessLog,
    /// Files from the client build; short-circuits when one matches.
    StaticFiles,
    Cookies,
    /// JSON body parsing; 400 on invalid JSON.
    JsonBody,
    SecurityHeaders,
    /// Operator-key stripping on body and query.
    Sanitize,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::AccessLog => "access-log",
            Stage::StaticFiles => "static-files",
            Stage::Cookies => "cookies",
            Stage::JsonBody => "json-body",
            Stage::SecurityHeaders => "security-headers",
            Stage::Sanitize => "sanitize",
        }
    }

    fn wrap(self, router: Router, state: &AppState) -> Router {
        match self {
            Stage::AccessLog => router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis),
                    ),
            ),
            Stage::StaticFiles => {
                router.layer(from_fn_with_state(state.clone(), static_files::serve_static))
            }
            Stage::Cookies => router.layer(from_fn(cookies::parse_cookies)),
            Stage::JsonBody => router.layer(from_fn_with_state(state.clone(), body::parse_json_body)),
            Stage::SecurityHeaders => router.layer(from_fn(security_headers::security_headers_middleware)),
            Stage::Sanitize => router.layer(from_fn(sanitize::sanitize_request)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// The standard stage order. Access logging is only present in development.
    pub fn for_config(cfg: &AppConfig) -> Self {
        let mut stages = Vec::with_capacity(6);
        if cfg.is_development() {
            stages.push(Stage::AccessLog);
        }
        stages.extend([
            Stage::StaticFiles,
            Stage::Cookies,
            Stage::JsonBody,
            Stage::SecurityHeaders,
            Stage::Sanitize,
        ]);
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Wraps `router` in every stage, then in the panic translator, which is always last to
    /// see a response.
    pub fn apply(&self, router: Router, state: &AppState) -> Router {
        let router = self
            .stages
            .iter()
            .rev()
            .fold(router, |router, stage| stage.wrap(router, state));
        router.layer(CatchPanicLayer::custom(translate_panic))
    }
}

fn translate_panic(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    AppError::Internal(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn production_order() {
        let cfg = AppConfig::default();
        assert_eq!(
            Pipeline::for_config(&cfg).names(),
            vec!["static-files", "cookies", "json-body", "security-headers", "sanitize"]
        );
    }

    #[test]
    fn development_adds_access_log_first() {
        let mut cfg = AppConfig::default();
        cfg.environment = "development".to_string();
        let pipeline = Pipeline::for_config(&cfg);
        assert_eq!(pipeline.stages().first(), Some(&Stage::AccessLog));
        assert_eq!(pipeline.stages().len(), 6);
    }

    #[test]
    fn body_is_parsed_before_it_is_sanitized() {
        let stages = Pipeline::for_config(&AppConfig::default()).stages().to_vec();
        let pos = |s: Stage| stages.iter().position(|x| *x == s).unwrap();
        assert!(pos(Stage::StaticFiles) < pos(Stage::Cookies));
        assert!(pos(Stage::Cookies) < pos(Stage::JsonBody));
        assert!(pos(Stage::JsonBody) < pos(Stage::Sanitize));
    }

    #[test]
    fn panic_becomes_generic_500() {
        let res = translate_panic(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
