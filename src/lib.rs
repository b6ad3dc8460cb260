//! # Marketplace Server Library
//!
//! Backend for the service marketplace: REST routers for jobs, products, companies, orders,
//! cleaners and admin catalogues, cookie-session authentication, hosting of the bundled
//! single-page client, and a realtime socket channel.
//!
//! ## Architecture
//!
//! - **Axum**: routing, extractors, middleware and WebSocket upgrades
//! - **MongoDB**: document storage behind the [`store::DocumentStore`] trait
//! - **Tokio**: async runtime for both listeners
//! - **Serde**: JSON bodies and configuration
//!
//! ## Core Components
//!
//! - [`app`]: router composition for the realtime and REST listeners
//! - [`assets`]: asset storage used to derive image URLs
//! - [`auth`]: session tokens and password hashing
//! - [`bootstrap`]: listener startup order and graceful shutdown
//! - [`config`]: layered configuration with legacy environment variables
//! - [`error`]: the error translator, mapping error kinds to JSON responses
//! - [`middleware`]: individual request stages (static files, cookies, body, headers, sanitizer, auth gate)
//! - [`pipeline`]: the ordered stage list wrapped around every listener
//! - [`realtime`]: socket connect/disconnect tracking
//! - [`routes`]: domain routers and the SPA/404 fallback
//! - [`state`]: shared application state
//! - [`store`]: document store collaborator (MongoDB and in-memory)

pub mod app;
pub mod assets;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod store;

#[cfg(test)]
mod tests;
