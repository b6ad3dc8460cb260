//! Catch-all for requests no router claimed.

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::middleware::static_files::serve_index;
use crate::state::AppState;

/// Terminal handler for anything no router claimed.
///
/// Reads get the SPA entry file so client-side routing works on deep links; everything else,
/// and reads when no client build is present, get `404 {"msg":"not found"}`.
///
/// # Arguments
///
/// * `State(state)` - Application state holding the client build location
/// * `req` - The unmatched request
///
/// # Returns
///
/// * `200 OK` with `index.html` - For GET/HEAD when the client build has an entry file
/// * `404 Not Found` - Otherwise
pub async fn unmatched(State(state): State<AppState>, req: Request) -> Response {
    match serve_index(&state.client, req).await {
        Ok(res) => res,
        Err(req) => {
            tracing::debug!(method = %req.method(), path = req.uri().path(), "No route matched");
            AppError::NotFound("not found".to_string()).into_response()
        }
    }
}
