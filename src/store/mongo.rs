use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};
use serde_json::Value;

use super::{DocumentStore, Filter, Record};
use crate::error::AppResult;

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// One marker document per collection whose first insert has been claimed.
const FIRST_INSERTS: &str = "_first_inserts";

/// Unique indexes created at startup.
const UNIQUE_FIELDS: &[(&str, &str)] = &[("users", "email")];

/// `true` when the server rejected a write because of a unique index.
pub(crate) fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// MongoDB-backed store.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connects and pings the server so that an unreachable database fails here, not on
    /// the first request.
    pub async fn connect(url: &str, fallback_name: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(url).await.context("invalid database url")?;
        let db = client.default_database().unwrap_or_else(|| client.database(fallback_name));
        db.run_command(doc! { "ping": 1 })
            .await
            .with_context(|| format!("database '{}' did not answer ping", db.name()))?;
        tracing::info!(database = db.name(), "Connected to document database");

        let store = Self { db };
        for (collection, field) in UNIQUE_FIELDS {
            store
                .ensure_unique(collection, field)
                .await
                .with_context(|| format!("could not create unique index on {}.{}", collection, field))?;
            // A populated collection already had its first record.
            if store.collection(collection).count_documents(doc! {}).await? > 0 {
                store.claim_first(collection).await?;
            }
        }
        Ok(store)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), MongoError> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection).create_index(index).await?;
        Ok(())
    }

    /// Atomically claims the first-insert marker; only one caller per collection gets `true`.
    async fn claim_first(&self, collection: &str) -> Result<bool, MongoError> {
        match self.collection(FIRST_INSERTS).insert_one(doc! { "_id": collection }).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Converts a JSON record into a BSON document, turning a hex `_id` into an ObjectId.
fn to_document(mut record: Record) -> AppResult<Document> {
    let id = record.remove("_id");
    let mut doc = mongodb::bson::to_document(&record)?;
    if let Some(Value::String(hex)) = id {
        doc.insert("_id", ObjectId::parse_str(&hex)?);
    }
    Ok(doc)
}

fn from_document(mut doc: Document) -> Record {
    let id = doc.remove("_id");
    let mut record = Record::new();
    if let Some(id) = id {
        let id = match id {
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            other => other.into_relaxed_extjson(),
        };
        record.insert("_id".to_string(), id);
    }
    if let Value::Object(fields) = Bson::Document(doc).into_relaxed_extjson() {
        record.extend(fields);
    }
    record
}

fn by_id(id: &str) -> AppResult<Document> {
    Ok(doc! { "_id": ObjectId::parse_str(id)? })
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list(&self, collection: &str, filter: Filter) -> AppResult<Vec<Record>> {
        let cursor = self.collection(collection).find(to_document(filter)?).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(from_document).collect())
    }

    async fn find_one(&self, collection: &str, filter: Filter) -> AppResult<Option<Record>> {
        let found = self.collection(collection).find_one(to_document(filter)?).await?;
        Ok(found.map(from_document))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Record>> {
        let found = self.collection(collection).find_one(by_id(id)?).await?;
        Ok(found.map(from_document))
    }

    async fn insert(&self, collection: &str, mut record: Record) -> AppResult<Record> {
        record.remove("_id");
        let doc = to_document(record)?;
        let result = self.collection(collection).insert_one(doc.clone()).await?;
        let mut stored = doc;
        stored.insert("_id", result.inserted_id);
        Ok(from_document(stored))
    }

    async fn insert_unique(
        &self,
        collection: &str,
        unique_field: &str,
        mut record: Record,
        first_fields: Record,
    ) -> AppResult<Option<Record>> {
        record.remove("_id");
        self.ensure_unique(collection, unique_field).await?;

        let mut doc = to_document(record)?;
        let inserted = match self.collection(collection).insert_one(doc.clone()).await {
            Ok(result) => result.inserted_id,
            Err(e) if is_duplicate_key(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        doc.insert("_id", inserted.clone());

        if !first_fields.is_empty() && self.claim_first(collection).await? {
            let promoted = self
                .collection(collection)
                .find_one_and_update(doc! { "_id": inserted }, doc! { "$set": to_document(first_fields)? })
                .return_document(ReturnDocument::After)
                .await?;
            if let Some(promoted) = promoted {
                return Ok(Some(from_document(promoted)));
            }
        }
        Ok(Some(from_document(doc)))
    }

    async fn update(&self, collection: &str, id: &str, mut changes: Record) -> AppResult<Option<Record>> {
        changes.remove("_id");
        let updated = self
            .collection(collection)
            .find_one_and_update(by_id(id)?, doc! { "$set": to_document(changes)? })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(from_document))
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<Option<Record>> {
        let removed = self.collection(collection).find_one_and_delete(by_id(id)?).await?;
        Ok(removed.map(from_document))
    }

    async fn count(&self, collection: &str, filter: Filter) -> AppResult<u64> {
        Ok(self.collection(collection).count_documents(to_document(filter)?).await?)
    }
}
