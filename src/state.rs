use std::sync::Arc;

use crate::assets::AssetStorage;
use crate::auth::{PasswordHasher, TokenService};
use crate::config::AppConfig;
use crate::middleware::static_files::ClientAssets;
use crate::realtime::RealtimeHub;
use crate::store::StoreHandle;

/// The shared application state.
///
/// Built once by the bootstrap and cloned into both listeners. Collaborators are held behind
/// `Arc`s so tests can substitute them.
#[derive(Clone)]
pub struct AppState {
    /// Configuration snapshot; read-only after startup.
    pub config: Arc<AppConfig>,
    /// Document store, installed once the database connection is confirmed.
    pub store: StoreHandle,
    /// Asset storage client configured from the `assets` section.
    pub assets: Arc<dyn AssetStorage>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
    /// Bundled client build served by the static stage and the SPA fallback.
    pub client: ClientAssets,
    pub realtime: RealtimeHub,
}

impl AppState {
    pub fn new(config: AppConfig, assets: Arc<dyn AssetStorage>, store: StoreHandle) -> Self {
        let tokens = TokenService::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_hours);
        let client = ClientAssets::new(&config.server.client_dir);

        Self {
            config: Arc::new(config),
            store,
            assets,
            tokens,
            passwords: PasswordHasher::new(),
            client,
            realtime: RealtimeHub::new(),
        }
    }

    /// Replaces the password hasher; tests use cheap parameters.
    pub fn with_password_hasher(mut self, passwords: PasswordHasher) -> Self {
        self.passwords = passwords;
        self
    }
}
