//! Router-level tests for the marketplace server.
//!
//! Each test builds the full service for one listener and drives it with
//! `tower::ServiceExt::oneshot`; storage is the in-memory document store and the client build
//! is a throwaway directory.
//!
//! - **api_tests**: pipeline behaviour, fallbacks, headers, static files
//! - **auth_tests**: registration, login, the auth gate and the users router
//! - **resource_tests**: CRUD routers, sanitizing and image URLs
//! - **config_tests**: layered configuration and validation
//! - **error_tests**: error-to-response translation

mod auth_tests;
mod resource_tests;

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::app::{self, App, Listener};
use crate::assets::CloudinaryStorage;
use crate::auth::PasswordHasher;
use crate::config::{AppConfig, AssetConfig};
use crate::state::AppState;
use crate::store::{MemoryStore, StoreHandle};

pub(crate) const INDEX_HTML: &str = "<!doctype html><title>marketplace</title>";
pub(crate) const APP_JS: &str = "console.log('marketplace')";
pub(crate) const LOGO_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\"/>";

pub(crate) struct TestApp {
    pub state: AppState,
    pub router: App,
    _client: TempDir,
}

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub(crate) fn test_config(client_dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.environment = "test".to_string();
    cfg.server.client_dir = client_dir.display().to_string();
    cfg.server.body_limit = 1024;
    cfg.database.url = "memory://".to_string();
    cfg.auth.jwt_secret = "router-test-secret".to_string();
    cfg.assets = AssetConfig {
        cloud_name: "demo".to_string(),
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
    };
    cfg
}

fn client_dir(with_index: bool) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets/app.js"), APP_JS).unwrap();
    std::fs::write(dir.path().join("assets/my logo.svg"), LOGO_SVG).unwrap();
    if with_index {
        std::fs::write(dir.path().join("index.html"), INDEX_HTML).unwrap();
    }
    dir
}

fn build(store: StoreHandle, with_index: bool, listener: Listener) -> TestApp {
    let client = client_dir(with_index);
    let cfg = test_config(client.path());
    let assets = Arc::new(CloudinaryStorage::from_config(&cfg.assets));
    let state = AppState::new(cfg, assets, store).with_password_hasher(PasswordHasher::with_params(4096, 1, 1));
    let router = app::build(state.clone(), listener);
    TestApp { state, router, _client: client }
}

/// REST listener with a ready in-memory store and a client build.
pub(crate) fn spawn_app() -> TestApp {
    build(StoreHandle::ready(Arc::new(MemoryStore::new())), true, Listener::Rest)
}

pub(crate) fn spawn_app_without_index() -> TestApp {
    build(StoreHandle::ready(Arc::new(MemoryStore::new())), false, Listener::Rest)
}

/// Realtime listener whose database has not connected yet.
pub(crate) fn spawn_app_before_database() -> TestApp {
    build(StoreHandle::new(), true, Listener::Realtime)
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie, None)).await
    }

    pub async fn json(&self, method: Method, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.send(request(method, uri, cookie, Some(body.to_string()))).await
    }

    /// Registers an account and returns the `token=...` cookie pair from logging in.
    pub async fn login_as(&self, name: &str, email: &str) -> String {
        let password = "correct horse battery";
        let res = self
            .json(
                Method::POST,
                "/api/v1/auth/register",
                None,
                serde_json::json!({ "name": name, "email": email, "password": password }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.text());

        let res = self
            .json(
                Method::POST,
                "/api/v1/auth/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.text());
        session_cookie(&res)
    }
}

pub(crate) fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// The `name=value` part of the response's `Set-Cookie` header.
pub(crate) fn session_cookie(res: &TestResponse) -> String {
    let set_cookie = res.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    set_cookie.split(';').next().unwrap().trim().to_string()
}
