//! Asset storage collaborator.
//!
//! Uploads happen in the client against the storage provider directly; the server only needs
//! to know whether storage is configured and how to turn a stored reference into a URL.

use crate::config::AssetConfig;

const DELIVERY_BASE: &str = "https://res.cloudinary.com";

pub trait AssetStorage: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Delivery URL for a stored asset, or `None` when storage is not configured.
    fn url_for(&self, public_id: &str) -> Option<String>;
}

/// Cloudinary account credentials, set once at startup.
#[derive(Debug, Clone)]
pub struct CloudinaryStorage {
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStorage {
    pub fn from_config(cfg: &AssetConfig) -> Self {
        Self {
            cloud_name: cfg.cloud_name.trim().to_string(),
            api_key: cfg.api_key.trim().to_string(),
            api_secret: cfg.api_secret.trim().to_string(),
        }
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }
}

impl AssetStorage for CloudinaryStorage {
    fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    fn url_for(&self, public_id: &str) -> Option<String> {
        let public_id = public_id.trim().trim_start_matches('/');
        if !self.is_configured() || public_id.is_empty() {
            return None;
        }
        Some(format!("{}/{}/image/upload/{}", DELIVERY_BASE, self.cloud_name, public_id))
    }
}
