//! CRUD router shared by the marketplace collections.

use axum::{
    extract::{FromRequestParts, Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::JsonBody;
use crate::state::AppState;
use crate::store::{Filter, Record};

/// Fields the server owns; client values for them are discarded.
const RESERVED_FIELDS: &[&str] = &["_id", "createdBy", "createdAt", "updatedAt"];

/// Query keys that never become equality filters.
const NON_FILTER_KEYS: &[&str] = &["sort", "page", "limit", "search"];

/// Describes one collection exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    /// Singular name, used as the response key for one record.
    pub name: &'static str,
    /// Storage collection, also the response key for lists.
    pub collection: &'static str,
    /// Fields that must be present and non-empty on create.
    pub required: &'static [&'static str],
    /// Records belong to their creator; non-admins only see their own.
    pub owned: bool,
    /// Records may carry an `imageId` resolved through asset storage.
    pub images: bool,
}

pub const JOBS: Resource =
    Resource { name: "job", collection: "jobs", required: &["company", "position"], owned: true, images: false };
pub const PRODUCTS: Resource =
    Resource { name: "product", collection: "products", required: &["name", "price"], owned: false, images: true };
pub const COMPANIES: Resource =
    Resource { name: "company", collection: "companies", required: &["name"], owned: false, images: true };
pub const ORDERS: Resource =
    Resource { name: "order", collection: "orders", required: &["product"], owned: false, images: false };
pub const CLEANERS: Resource =
    Resource { name: "cleaner", collection: "cleaners", required: &["name"], owned: false, images: true };
pub const ADD_ONS: Resource =
    Resource { name: "addOn", collection: "addons", required: &["name", "price"], owned: false, images: false };
pub const CATEGORIES: Resource =
    Resource { name: "category", collection: "categories", required: &["name"], owned: false, images: true };

/// The `{id}` path segment; malformed segments are answered by [`AppError`].
#[derive(Debug, Deserialize, FromRequestParts)]
#[serde(transparent)]
#[from_request(via(Path), rejection(AppError))]
struct RecordId(String);

pub fn router(resource: Resource) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).patch(update).delete(remove))
        .route_layer(Extension(resource))
}

/// Parses a record id; anything that is not a 24-hex ObjectId is rejected.
pub fn parse_id(id: &str) -> AppResult<String> {
    ObjectId::parse_str(id)
        .map(|oid| oid.to_hex())
        .map_err(|_| AppError::validation("id", format!("invalid id: {}", id)))
}

/// Equality filter from the (already sanitized) query string.
pub fn query_filter(query: Option<&str>) -> Filter {
    let mut filter = Filter::new();
    let Some(query) = query else {
        return filter;
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() || key.contains('[') || NON_FILTER_KEYS.contains(&key.as_ref()) {
            continue;
        }
        filter.insert(key.into_owned(), coerce(&value));
    }
    filter
}

/// Numbers and booleans in the query match stored numbers and booleans.
fn coerce(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

/// `Some(user_id)` when access must be limited to the caller's own records.
fn owner_scope(resource: &Resource, user: Option<&AuthUser>) -> AppResult<Option<String>> {
    if !resource.owned {
        return Ok(None);
    }
    let user = user.ok_or_else(|| AppError::Unauthenticated("authentication invalid".to_string()))?;
    Ok(if user.is_admin() { None } else { Some(user.user_id.clone()) })
}

fn check_owner(record: &Record, owner: Option<&str>) -> AppResult<()> {
    match owner {
        Some(owner) if record.get("createdBy").and_then(Value::as_str) != Some(owner) => {
            Err(AppError::Forbidden("not authorized to access this route".to_string()))
        }
        _ => Ok(()),
    }
}

fn body_fields(body: Value) -> AppResult<Record> {
    match body {
        Value::Object(mut fields) => {
            fields.retain(|k, _| !RESERVED_FIELDS.contains(&k.as_str()));
            Ok(fields)
        }
        _ => Err(AppError::BadRequest("request body must be a JSON object".to_string())),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn with_image_url(state: &AppState, resource: &Resource, mut record: Record) -> Record {
    if resource.images {
        let url = record
            .get("imageId")
            .and_then(Value::as_str)
            .and_then(|id| state.assets.url_for(id));
        if let Some(url) = url {
            record.insert("imageUrl".to_string(), Value::String(url));
        }
    }
    record
}

fn keyed(entries: Vec<(&str, Value)>) -> Json<Value> {
    let map: Map<String, Value> = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Json(Value::Object(map))
}

async fn list(
    Extension(resource): Extension<Resource>,
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<Value>> {
    let mut filter = query_filter(query.as_deref());
    if let Some(owner) = owner_scope(&resource, user.as_deref())? {
        filter.insert("createdBy".to_string(), Value::String(owner));
    }

    let records = state.store.get()?.list(resource.collection, filter).await?;
    let count = records.len();
    let records: Vec<Value> =
        records.into_iter().map(|r| Value::Object(with_image_url(&state, &resource, r))).collect();

    Ok(keyed(vec![(resource.collection, Value::Array(records)), ("count", Value::from(count))]))
}

async fn create(
    Extension(resource): Extension<Resource>,
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    JsonBody(body): JsonBody,
) -> AppResult<impl IntoResponse> {
    let mut fields = body_fields(body)?;
    for field in resource.required {
        if is_blank(fields.get(*field)) {
            return Err(AppError::validation(field, format!("please provide {}", field)));
        }
    }
    if resource.owned {
        let user = user.as_deref().ok_or_else(|| AppError::Unauthenticated("authentication invalid".to_string()))?;
        fields.insert("createdBy".to_string(), Value::String(user.user_id.clone()));
    }
    fields.insert("createdAt".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));

    let stored = state.store.get()?.insert(resource.collection, fields).await?;
    tracing::info!(collection = resource.collection, id = ?stored.get("_id"), "Record created");
    let stored = with_image_url(&state, &resource, stored);
    Ok((StatusCode::CREATED, keyed(vec![(resource.name, Value::Object(stored))])))
}

async fn show(
    Extension(resource): Extension<Resource>,
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    RecordId(id): RecordId,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let owner = owner_scope(&resource, user.as_deref())?;
    let record = state
        .store
        .get()?
        .find_by_id(resource.collection, &id)
        .await?
        .ok_or_not_found(&format!("{} with id {}", resource.name, id))?;
    check_owner(&record, owner.as_deref())?;

    let record = with_image_url(&state, &resource, record);
    Ok(keyed(vec![(resource.name, Value::Object(record))]))
}

async fn update(
    Extension(resource): Extension<Resource>,
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    RecordId(id): RecordId,
    JsonBody(body): JsonBody,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let mut changes = body_fields(body)?;
    if changes.is_empty() {
        return Err(AppError::BadRequest("no fields to update".to_string()));
    }
    for field in resource.required {
        if changes.contains_key(*field) && is_blank(changes.get(*field)) {
            return Err(AppError::validation(field, format!("{} cannot be empty", field)));
        }
    }

    let store = state.store.get()?;
    let owner = owner_scope(&resource, user.as_deref())?;
    let existing = store
        .find_by_id(resource.collection, &id)
        .await?
        .ok_or_not_found(&format!("{} with id {}", resource.name, id))?;
    check_owner(&existing, owner.as_deref())?;

    changes.insert("updatedAt".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
    let updated = store
        .update(resource.collection, &id, changes)
        .await?
        .ok_or_not_found(&format!("{} with id {}", resource.name, id))?;
    let updated = with_image_url(&state, &resource, updated);
    Ok(keyed(vec![
        ("msg", Value::String(format!("{} modified", resource.name))),
        (resource.name, Value::Object(updated)),
    ]))
}

async fn remove(
    Extension(resource): Extension<Resource>,
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    RecordId(id): RecordId,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id)?;
    let store = state.store.get()?;
    let owner = owner_scope(&resource, user.as_deref())?;
    let existing = store
        .find_by_id(resource.collection, &id)
        .await?
        .ok_or_not_found(&format!("{} with id {}", resource.name, id))?;
    check_owner(&existing, owner.as_deref())?;

    let removed = store
        .delete(resource.collection, &id)
        .await?
        .ok_or_not_found(&format!("{} with id {}", resource.name, id))?;
    tracing::info!(collection = resource.collection, %id, "Record deleted");
    Ok(keyed(vec![
        ("msg", Value::String(format!("{} deleted", resource.name))),
        (resource.name, Value::Object(removed)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use serde_json::json;

    #[test]
    fn ids_must_be_object_ids() {
        assert!(parse_id("64b7f0c2a1b2c3d4e5f60718").is_ok());
        assert!(matches!(parse_id("$gt"), Err(AppError::Validation { .. })));
        assert!(parse_id("123").is_err());
    }

    #[test]
    fn query_filter_coerces_and_skips_reserved() {
        let filter = query_filter(Some("status=pending&price=12&active=true&sort=newest&a%5Bb%5D=1"));
        assert_eq!(filter.get("status"), Some(&json!("pending")));
        assert_eq!(filter.get("price"), Some(&json!(12)));
        assert_eq!(filter.get("active"), Some(&json!(true)));
        assert_eq!(filter.len(), 3);
        assert!(query_filter(None).is_empty());
    }

    #[test]
    fn owner_scope_rules() {
        let user = AuthUser { user_id: "u1".into(), role: Role::User };
        let admin = AuthUser { user_id: "a1".into(), role: Role::Admin };
        assert_eq!(owner_scope(&JOBS, Some(&user)).unwrap(), Some("u1".to_string()));
        assert_eq!(owner_scope(&JOBS, Some(&admin)).unwrap(), None);
        assert!(owner_scope(&JOBS, None).is_err());
        assert_eq!(owner_scope(&PRODUCTS, None).unwrap(), None);
    }

    #[test]
    fn reserved_fields_are_dropped() {
        let fields = body_fields(json!({"_id": "x", "createdBy": "evil", "name": "mop"})).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(body_fields(json!([1, 2])).is_err());
    }
}
