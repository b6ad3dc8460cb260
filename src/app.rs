//! Router composition for both listeners.

use axum::{routing::get, Router};
use tower::Layer;
use tower_http::{
    cors::CorsLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
};

use crate::pipeline::Pipeline;
use crate::realtime;
use crate::routes::{self, fallback, health};
use crate::state::AppState;

/// The two listeners share state and routes; only the realtime one accepts socket upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    Realtime,
    Rest,
}

impl Listener {
    pub fn name(&self) -> &'static str {
        match self {
            Listener::Realtime => "realtime",
            Listener::Rest => "rest",
        }
    }
}

/// A listener's service: the pipeline-wrapped router behind trailing-slash trimming.
pub type App = NormalizePath<Router>;

/// Builds the complete service for one listener: routes, SPA/404 fallback, then the
/// request pipeline around all of it.
///
/// Trailing slashes are trimmed before routing, so `/api/v1/products/` reaches the
/// collection route.
pub fn build(state: AppState, listener: Listener) -> App {
    let mut router = Router::new()
        .route("/", get(health::liveness))
        .route("/api/v1/test", get(health::test_route))
        .merge(routes::api_router(&state));

    if listener == Listener::Realtime {
        router = router.route(&state.config.realtime.path, get(realtime::socket_entry));
    }

    let router = router
        .fallback(fallback::unmatched)
        .method_not_allowed_fallback(fallback::unmatched)
        .with_state(state.clone());

    let app = Pipeline::for_config(&state.config).apply(router, &state);

    // Permissive CORS for a separately served client during local development
    let app = if cfg!(debug_assertions) { app.layer(CorsLayer::permissive()) } else { app };

    // Router layers run after route matching, so trimming has to wrap the router itself.
    NormalizePathLayer::trim_trailing_slash().layer(app)
}
