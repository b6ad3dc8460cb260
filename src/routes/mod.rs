//! HTTP route handlers for the marketplace API.
//!
//! - `auth`: registration, login and logout (cookie sessions)
//! - `fallback`: SPA entry file and the 404 terminal handler
//! - `health`: liveness and the test route
//! - `resource`: CRUD router shared by the marketplace collections
//! - `users`: current user, profile update and admin statistics

pub mod auth;
pub mod fallback;
pub mod health;
pub mod resource;
pub mod users;

use axum::{middleware::from_fn_with_state, Router};

use crate::middleware::auth::require_user;
use crate::state::AppState;
use resource::Resource;

/// Whether a router group sits behind the auth gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
}

#[derive(Debug, Clone, Copy)]
pub enum Group {
    Resource(Resource),
    Auth,
    Users,
}

/// Prefix, router group and access level, in mount order.
pub const MOUNTS: &[(&str, Group, Access)] = &[
    ("/api/v1/jobs", Group::Resource(resource::JOBS), Access::Authenticated),
    ("/api/v1/products", Group::Resource(resource::PRODUCTS), Access::Public),
    ("/api/v1/company", Group::Resource(resource::COMPANIES), Access::Public),
    ("/api/v1/orders", Group::Resource(resource::ORDERS), Access::Public),
    ("/api/v1/cleaners", Group::Resource(resource::CLEANERS), Access::Public),
    ("/api/v1/users", Group::Users, Access::Authenticated),
    ("/api/v1/auth", Group::Auth, Access::Public),
    ("/api/v1/admin/add-on", Group::Resource(resource::ADD_ONS), Access::Public),
    ("/api/v1/admin/category", Group::Resource(resource::CATEGORIES), Access::Public),
];

impl Group {
    fn router(self) -> Router<AppState> {
        match self {
            Group::Resource(resource) => resource::router(resource),
            Group::Auth => auth::router(),
            Group::Users => users::router(),
        }
    }
}

/// Builds one mounted group. Unmatched paths and methods under the prefix fall through to the
/// SPA/404 handler, behind the gate when the group is protected.
pub fn group(group: Group, access: Access, state: &AppState) -> Router<AppState> {
    let router = group
        .router()
        .fallback(fallback::unmatched)
        .method_not_allowed_fallback(fallback::unmatched);
    match access {
        Access::Public => router,
        Access::Authenticated => router.layer(from_fn_with_state(state.clone(), require_user)),
    }
}

/// Every domain router nested under its prefix.
pub fn api_router(state: &AppState) -> Router<AppState> {
    MOUNTS.iter().fold(Router::new(), |router, &(prefix, g, access)| {
        router.nest(prefix, group(g, access, state))
    })
}
