use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AuthError, AuthUser, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<String>,
    ttl_hours: u64,
}

impl TokenService {
    pub fn new(secret: String, ttl_hours: u64) -> Self {
        Self { secret: Arc::new(secret), ttl_hours }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_hours.saturating_mul(3600)
    }

    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = i64::try_from(self.ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Encoding(format!("token lifetime of {} hours is out of range", self.ttl_hours)))?;
        self.sign(&Claims {
            user_id: user_id.to_string(),
            role,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::default(), claims, &key).map_err(|e| {
            tracing::error!("Failed to encode session token: {}", e);
            AuthError::Encoding(e.to_string())
        })
    }

    /// Checks signature and expiry, returning the identity the token was issued for.
    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        decode::<Claims>(token, &key, &validation)
            .map(|data| AuthUser { user_id: data.claims.user_id, role: data.claims.role })
            .map_err(|e| {
                tracing::debug!("Token validation failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })
    }
}
