//! Session gate for protected router groups.
//!
//! Runs after the cookie stage and trusts nothing but the signed token: the caller's id and
//! role come from verified claims, never from the request body.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::cookies::Cookies;
use crate::auth::AuthError;
use crate::error::AppResult;
use crate::state::AppState;

/// Auth gate for protected router groups.
///
/// Reads the session token from the parsed cookies, verifies signature and expiry, and
/// attaches the resolved [`AuthUser`](crate::auth::AuthUser) to the request. Any failure
/// stops the request with 401 before the router sees it.
///
/// # Arguments
///
/// * `State(state)` - Application state with the cookie name and token service
/// * `req` - The incoming request, carrying [`Cookies`] from the cookie stage
/// * `next` - The protected router
///
/// # Returns
///
/// * `Ok(Response)` - The router's response for an authenticated caller
/// * `Err(AppError::Unauthenticated)` - Missing, malformed, forged or expired token
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> AppResult<Response> {
    let token = req
        .extensions()
        .get::<Cookies>()
        .and_then(|cookies| cookies.get(&state.config.auth.cookie_name))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::MissingToken)?;

    let user = state.tokens.verify(&token)?;
    tracing::debug!(user_id = %user.user_id, role = user.role.as_str(), "Authenticated request");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
