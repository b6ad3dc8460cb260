//! Document store collaborator.
//!
//! Domain routers talk to storage only through [`DocumentStore`]. Records are JSON objects
//! whose `_id` is a 24-character hex ObjectId string.

pub mod memory;
pub mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A stored document.
pub type Record = Map<String, Value>;

/// Equality filter: every key must match the record's value exactly.
pub type Filter = Map<String, Value>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str, filter: Filter) -> AppResult<Vec<Record>>;

    async fn find_one(&self, collection: &str, filter: Filter) -> AppResult<Option<Record>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Record>>;

    /// Stores a new record and returns it with its assigned `_id`.
    async fn insert(&self, collection: &str, record: Record) -> AppResult<Record>;

    /// Inserts `record` unless another record already has the same `unique_field` value.
    ///
    /// Returns `None` on a duplicate. When the record is the first one the collection ever
    /// accepted, `first_fields` are merged into it. Both decisions are made atomically with
    /// the insert.
    async fn insert_unique(
        &self,
        collection: &str,
        unique_field: &str,
        record: Record,
        first_fields: Record,
    ) -> AppResult<Option<Record>>;

    /// Merges `changes` into the record, returning the updated record.
    async fn update(&self, collection: &str, id: &str, changes: Record) -> AppResult<Option<Record>>;

    /// Removes the record, returning what was removed.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<Option<Record>>;

    async fn count(&self, collection: &str, filter: Filter) -> AppResult<u64>;
}

/// Opens the configured store. `memory://` URLs select the in-process store.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if cfg.url.starts_with("memory://") {
        tracing::warn!("Using in-memory document store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = MongoStore::connect(&cfg.url, &cfg.name).await?;
    Ok(Arc::new(store))
}

/// Shared slot for the store, filled once the database connection is confirmed.
///
/// Listeners start before the database is reachable; until [`StoreHandle::install`] runs,
/// every storage access fails with `ServiceUnavailable`.
#[derive(Clone, Default)]
pub struct StoreHandle {
    cell: Arc<OnceCell<Arc<dyn DocumentStore>>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(store: Arc<dyn DocumentStore>) -> Self {
        let handle = Self::new();
        handle.install(store);
        handle
    }

    pub fn install(&self, store: Arc<dyn DocumentStore>) {
        if self.cell.set(store).is_err() {
            tracing::warn!("Document store already installed; ignoring second connection");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub fn get(&self) -> AppResult<Arc<dyn DocumentStore>> {
        self.cell
            .get()
            .cloned()
            .ok_or_else(|| AppError::ServiceUnavailable("database not ready, try again shortly".to_string()))
    }
}
