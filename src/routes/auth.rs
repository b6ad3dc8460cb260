//! Account registration and cookie sessions.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::auth::{AuthError, Role};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::JsonBody;
use crate::state::AppState;
use crate::store::Filter;

pub const USERS: &str = "users";

const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_LAST_NAME: &str = "lastName";
const DEFAULT_LOCATION: &str = "my city";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterInput {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    last_name: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginInput {
    email: Option<String>,
    password: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(format!("invalid request body: {}", e)))
}

fn required(field: &str, value: Option<String>) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(field, format!("please provide {}", field))),
    }
}

/// Lowercased, trimmed address with a non-empty local part and a dotted domain.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::validation("email", "please provide a valid email"))
    }
}

pub(crate) fn email_filter(email: &str) -> Filter {
    let mut filter = Filter::new();
    filter.insert("email".to_string(), Value::String(email.to_string()));
    filter
}

/// `Set-Cookie` value carrying the session token.
pub fn session_cookie(cfg: &AppConfig, token: &str, max_age_secs: u64) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Strict; Max-Age={}",
        cfg.auth.cookie_name, token, max_age_secs
    );
    if cfg.is_production() {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_header(cookie: String) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie header: {}", e)))
}

async fn register(State(state): State<AppState>, JsonBody(body): JsonBody) -> AppResult<impl IntoResponse> {
    let input: RegisterInput = decode(body)?;
    let name = required("name", input.name)?;
    let email = normalize_email(&required("email", input.email)?)?;
    let password = input.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password",
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let store = state.store.get()?;
    if store.find_one(USERS, email_filter(&email)).await?.is_some() {
        return Err(AppError::BadRequest("email already in use".to_string()));
    }
    let hash = state.passwords.hash(password).await?;

    let mut user = Map::new();
    user.insert("name".to_string(), Value::String(name));
    user.insert("email".to_string(), Value::String(email));
    user.insert("password".to_string(), Value::String(hash));
    user.insert(
        "lastName".to_string(),
        Value::String(input.last_name.unwrap_or_else(|| DEFAULT_LAST_NAME.to_string())),
    );
    user.insert(
        "location".to_string(),
        Value::String(input.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string())),
    );
    user.insert("role".to_string(), Value::String(Role::User.as_str().to_string()));
    user.insert("createdAt".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));

    // The first account ever registered becomes the admin.
    let mut first = Map::new();
    first.insert("role".to_string(), Value::String(Role::Admin.as_str().to_string()));

    let stored = store
        .insert_unique(USERS, "email", user, first)
        .await?
        .ok_or_else(|| AppError::BadRequest("email already in use".to_string()))?;
    let role = stored.get("role").and_then(Value::as_str).unwrap_or_default();
    tracing::info!(user_id = ?stored.get("_id"), role, "User registered");
    Ok((StatusCode::CREATED, Json(json!({ "msg": "user created" }))))
}

async fn login(State(state): State<AppState>, JsonBody(body): JsonBody) -> AppResult<impl IntoResponse> {
    let input: LoginInput = decode(body)?;
    let email = required("email", input.email)?.to_lowercase();
    let password = required("password", input.password)?;

    let user = state
        .store
        .get()?
        .find_one(USERS, email_filter(&email))
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let hash = user.get("password").and_then(Value::as_str).unwrap_or_default().to_string();
    if !state.passwords.verify(password, hash).await? {
        tracing::info!("Rejected login with bad credentials");
        return Err(AuthError::InvalidCredentials.into());
    }

    let user_id = user
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("stored user has no id")))?;
    let role = user
        .get("role")
        .cloned()
        .and_then(|r| serde_json::from_value::<Role>(r).ok())
        .unwrap_or(Role::User);
    let token = state.tokens.issue(user_id, role)?;
    let cookie = session_cookie(&state.config, &token, state.tokens.ttl_seconds());

    tracing::info!(%user_id, "User logged in");
    Ok(([(SET_COOKIE, cookie_header(cookie)?)], Json(json!({ "msg": "user logged in" }))))
}

async fn logout(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let cookie = session_cookie(&state.config, "logout", 0);
    Ok(([(SET_COOKIE, cookie_header(cookie)?)], Json(json!({ "msg": "user logged out!" }))))
}
