//! Session credentials: signed tokens carried in a cookie and Argon2id password hashes.

mod password;
mod token;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use password::PasswordHasher;
pub use token::{Claims, TokenService};

/// Errors raised while issuing or checking credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication invalid")]
    MissingToken,
    #[error("authentication invalid")]
    InvalidToken,
    #[error("session expired, please log in again")]
    TokenExpired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token encoding failed: {0}")]
    Encoding(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Identity resolved by the auth gate and attached to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
