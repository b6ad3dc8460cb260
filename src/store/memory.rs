use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{DocumentStore, Filter, Record};
use crate::error::AppResult;

/// In-process store used for local development and tests.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(record: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| record.get(key) == Some(expected))
}

fn has_id(record: &Record, id: &str) -> bool {
    record.get("_id").and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str, filter: Filter) -> AppResult<Vec<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| records.iter().filter(|r| matches(r, &filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: &str, filter: Filter) -> AppResult<Option<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| matches(r, &filter)).cloned()))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| has_id(r, id)).cloned()))
    }

    async fn insert(&self, collection: &str, record: Record) -> AppResult<Record> {
        let mut stored = Record::new();
        stored.insert("_id".to_string(), Value::String(ObjectId::new().to_hex()));
        stored.extend(record.into_iter().filter(|(k, _)| k != "_id"));

        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn insert_unique(
        &self,
        collection: &str,
        unique_field: &str,
        record: Record,
        first_fields: Record,
    ) -> AppResult<Option<Record>> {
        let mut stored = Record::new();
        stored.insert("_id".to_string(), Value::String(ObjectId::new().to_hex()));
        stored.extend(record.into_iter().filter(|(k, _)| k != "_id"));

        // One write guard covers the duplicate check, the first-record check and the insert.
        let mut collections = self.collections.write().await;
        let first = !collections.contains_key(collection);
        let records = collections.entry(collection.to_string()).or_default();
        if let Some(value) = stored.get(unique_field) {
            if records.iter().any(|r| r.get(unique_field) == Some(value)) {
                return Ok(None);
            }
        }
        if first {
            stored.extend(first_fields.into_iter().filter(|(k, _)| k != "_id"));
        }
        records.push(stored.clone());
        Ok(Some(stored))
    }

    async fn update(&self, collection: &str, id: &str, changes: Record) -> AppResult<Option<Record>> {
        let mut collections = self.collections.write().await;
        let Some(record) = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| has_id(r, id)))
        else {
            return Ok(None);
        };
        record.extend(changes.into_iter().filter(|(k, _)| k != "_id"));
        Ok(Some(record.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<Option<Record>> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(records.iter().position(|r| has_id(r, id)).map(|idx| records.remove(idx)))
    }

    async fn count(&self, collection: &str, filter: Filter) -> AppResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| records.iter().filter(|r| matches(r, &filter)).count() as u64)
            .unwrap_or(0))
    }
}
