//! Middleware stages for HTTP request processing.
//!
//! Each stage is a plain `axum::middleware` function; [`crate::pipeline`] decides their order.

pub mod auth;
pub mod body;
pub mod cookies;
pub mod sanitize;
pub mod security_headers;
pub mod static_files;

pub use body::JsonBody;
pub use cookies::Cookies;
