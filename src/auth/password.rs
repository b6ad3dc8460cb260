use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash as Argon2Hash, PasswordHasher as Argon2Hasher,
        PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use super::AuthError;

/// Argon2id password hashing, run on the blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// OWASP minimum recommended memory cost: 19 MiB (19,456 KiB)
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;
    const OUTPUT_LEN: usize = 32;

    pub fn new() -> Self {
        Self::with_params(Self::MEMORY_COST, Self::TIME_COST, Self::PARALLELISM)
    }

    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))
            .unwrap_or_else(|e| {
                tracing::warn!("Invalid Argon2 parameters ({}), using library defaults", e);
                Params::default()
            });
        Self { params }
    }

    pub async fn hash(&self, password: String) -> Result<String, AuthError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|e| AuthError::Hashing(format!("hash task failed: {}", e)))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Returns `false` for a wrong password or an unparseable stored hash.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || match Argon2Hash::new(&hash) {
            Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                tracing::warn!("Stored password hash is not valid PHC: {}", e);
                false
            }
        })
        .await
        .map_err(|e| AuthError::Hashing(format!("verify task failed: {}", e)))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
