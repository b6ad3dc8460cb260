use axum::{
    extract::State,
    routing::{get, patch},
    Extension, Json, Router,
};
use serde_json::{json, Value};

use super::auth::{email_filter, normalize_email, USERS};
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::JsonBody;
use crate::state::AppState;
use crate::store::{Filter, Record};

/// Profile fields a user may change about themselves.
const EDITABLE_FIELDS: &[&str] = &["name", "email", "lastName", "location"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/current-user", get(current_user))
        .route("/update-user", patch(update_user))
        .route("/admin/app-stats", get(app_stats))
}

fn without_password(mut user: Record) -> Record {
    user.remove("password");
    user
}

async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let record = state
        .store
        .get()?
        .find_by_id(USERS, &user.user_id)
        .await?
        .ok_or_not_found("user")?;
    Ok(Json(json!({ "user": without_password(record) })))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody,
) -> AppResult<Json<Value>> {
    let Value::Object(body) = body else {
        return Err(AppError::BadRequest("request body must be a JSON object".to_string()));
    };
    let mut changes: Record = body
        .into_iter()
        .filter(|(key, _)| EDITABLE_FIELDS.contains(&key.as_str()))
        .collect();
    if changes.is_empty() {
        return Err(AppError::BadRequest("no fields to update".to_string()));
    }
    for (field, value) in &changes {
        if !matches!(value, Value::String(s) if !s.trim().is_empty()) {
            return Err(AppError::validation(field, format!("please provide {}", field)));
        }
    }

    let store = state.store.get()?;
    if let Some(raw) = changes.get("email").and_then(Value::as_str).map(str::to_string) {
        let email = normalize_email(&raw)?;
        let taken = store
            .find_one(USERS, email_filter(&email))
            .await?
            .and_then(|other| other.get("_id").and_then(Value::as_str).map(str::to_string))
            .is_some_and(|id| id != user.user_id);
        if taken {
            return Err(AppError::BadRequest("email already in use".to_string()));
        }
        changes.insert("email".to_string(), Value::String(email));
    }
    changes.insert("updatedAt".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));

    let updated = store.update(USERS, &user.user_id, changes).await?.ok_or_not_found("user")?;
    tracing::info!(user_id = %user.user_id, "User profile updated");
    Ok(Json(json!({ "msg": "update user", "user": without_password(updated) })))
}

async fn app_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("not authorized to access this route".to_string()));
    }
    let store = state.store.get()?;
    let users = store.count(USERS, Filter::new()).await?;
    let jobs = store.count(super::resource::JOBS.collection, Filter::new()).await?;
    Ok(Json(json!({ "users": users, "jobs": jobs })))
}
