use axum::http::{header, Method, StatusCode};
use serde_json::json;

use super::{session_cookie, spawn_app};
use crate::auth::{Claims, Role};

#[tokio::test]
async fn first_account_is_admin_and_later_accounts_are_users() {
    let app = spawn_app();
    let admin = app.login_as("Ada", "ada@example.com").await;
    let user = app.login_as("Bob", "bob@example.com").await;

    let res = app.get("/api/v1/users/current-user", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["user"]["role"], "admin");
    assert!(res.json()["user"].get("password").is_none());

    let res = app.get("/api/v1/users/current-user", Some(&user)).await;
    assert_eq!(res.json()["user"]["role"], "user");
    assert_eq!(res.json()["user"]["email"], "bob@example.com");
    assert_eq!(res.json()["user"]["location"], "my city");
}

#[tokio::test]
async fn register_rejects_duplicates_and_short_passwords() {
    let app = spawn_app();
    app.login_as("Ada", "ada@example.com").await;

    let res = app
        .json(
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({ "name": "Ada", "email": "ADA@example.com", "password": "another-password" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["msg"], "email already in use");

    let res = app
        .json(
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({ "name": "Cy", "email": "cy@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["field"], "password");

    let res = app
        .json(Method::POST, "/api/v1/auth/register", None, json!({ "email": "dee@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["field"], "name");
}

#[tokio::test]
async fn simultaneous_registrations_admit_one_email() {
    let app = spawn_app();
    let body = json!({ "name": "Ada", "email": "ada@example.com", "password": "correct horse battery" });

    let (a, b) = tokio::join!(
        app.json(Method::POST, "/api/v1/auth/register", None, body.clone()),
        app.json(Method::POST, "/api/v1/auth/register", None, body.clone()),
    );
    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    let rejected = if a.status == StatusCode::BAD_REQUEST { a } else { b };
    assert_eq!(rejected.json()["msg"], "email already in use");

    let stats = app.state.store.get().unwrap().count("users", Default::default()).await.unwrap();
    assert_eq!(stats, 1);
}

#[tokio::test]
async fn simultaneous_first_registrations_create_one_admin() {
    let app = spawn_app();
    let app = &app;
    let register = move |name: &'static str, email: &'static str| {
        app.json(
            Method::POST,
            "/api/v1/auth/register",
            None,
            json!({ "name": name, "email": email, "password": "correct horse battery" }),
        )
    };

    let (a, b, c) = tokio::join!(
        register("Ada", "ada@example.com"),
        register("Bob", "bob@example.com"),
        register("Cy", "cy@example.com"),
    );
    assert!([a.status, b.status, c.status].iter().all(|s| *s == StatusCode::CREATED));

    let users = app.state.store.get().unwrap().list("users", Default::default()).await.unwrap();
    let admins = users.iter().filter(|u| u["role"] == "admin").count();
    assert_eq!(users.len(), 3);
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn login_sets_http_only_cookie() {
    let app = spawn_app();
    app.login_as("Ada", "ada@example.com").await;

    let res = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "msg": "user logged in" }));

    let set_cookie = res.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains(&format!("Max-Age={}", app.state.tokens.ttl_seconds())));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn bad_credentials_are_unauthenticated() {
    let app = spawn_app();
    app.login_as("Ada", "ada@example.com").await;

    let res = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "ada@example.com", "password": "wrong password!" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json(), json!({ "msg": "invalid credentials" }));

    let res = app
        .json(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": "whatever-password" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let app = spawn_app();
    let res = app.get("/api/v1/auth/logout", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "msg": "user logged out!" }));
    let set_cookie = res.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
    assert_eq!(session_cookie(&res), "token=logout");
}

#[tokio::test]
async fn garbage_and_expired_tokens_are_rejected() {
    let app = spawn_app();
    let res = app.get("/api/v1/jobs", Some("token=not-a-jwt")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let expired = app
        .state
        .tokens
        .sign(&Claims {
            user_id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
            role: Role::User,
            iat: 1_000,
            exp: 2_000,
        })
        .unwrap();
    let res = app.get("/api/v1/jobs", Some(&format!("token={}", expired))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["msg"], "session expired, please log in again");
}

#[tokio::test]
async fn jobs_are_scoped_to_their_creator() {
    let app = spawn_app();
    let admin = app.login_as("Ada", "ada@example.com").await;
    let bob = app.login_as("Bob", "bob@example.com").await;
    let cy = app.login_as("Cy", "cy@example.com").await;

    let res = app
        .json(Method::POST, "/api/v1/jobs", Some(&bob), json!({ "company": "Acme", "position": "cleaner" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let job = res.json()["job"].clone();
    let job_id = job["_id"].as_str().unwrap().to_string();
    assert!(job["createdBy"].is_string());

    let res = app.get("/api/v1/jobs", Some(&bob)).await;
    assert_eq!(res.json()["count"], 1);

    let res = app.get("/api/v1/jobs", Some(&cy)).await;
    assert_eq!(res.json()["count"], 0);

    let res = app.get(&format!("/api/v1/jobs/{}", job_id), Some(&cy)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .json(Method::PATCH, &format!("/api/v1/jobs/{}", job_id), Some(&cy), json!({ "position": "boss" }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/v1/jobs", Some(&admin)).await;
    assert_eq!(res.json()["count"], 1);

    let res = app
        .send(super::request(Method::DELETE, &format!("/api/v1/jobs/{}", job_id), Some(&bob), None))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["msg"], "job deleted");
}

#[tokio::test]
async fn job_creator_cannot_be_spoofed() {
    let app = spawn_app();
    let bob = app.login_as("Bob", "bob@example.com").await;

    let res = app
        .json(
            Method::POST,
            "/api/v1/jobs",
            Some(&bob),
            json!({ "company": "Acme", "position": "cleaner", "createdBy": "64b7f0c2a1b2c3d4e5f60718" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_ne!(res.json()["job"]["createdBy"], "64b7f0c2a1b2c3d4e5f60718");
}

#[tokio::test]
async fn update_user_only_touches_profile_fields() {
    let app = spawn_app();
    let ada = app.login_as("Ada", "ada@example.com").await;
    app.login_as("Bob", "bob@example.com").await;

    let res = app
        .json(
            Method::PATCH,
            "/api/v1/users/update-user",
            Some(&ada),
            json!({ "location": "Lisbon", "role": "user", "password": "hijacked-password" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["user"]["location"], "Lisbon");
    assert_eq!(res.json()["user"]["role"], "admin");
    assert!(res.json()["user"].get("password").is_none());

    let res = app
        .json(Method::PATCH, "/api/v1/users/update-user", Some(&ada), json!({ "email": "BOB@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .json(Method::PATCH, "/api/v1/users/update-user", Some(&ada), json!({ "role": "user" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn app_stats_are_admin_only() {
    let app = spawn_app();
    let admin = app.login_as("Ada", "ada@example.com").await;
    let bob = app.login_as("Bob", "bob@example.com").await;
    app.json(Method::POST, "/api/v1/jobs", Some(&bob), json!({ "company": "Acme", "position": "cleaner" }))
        .await;

    let res = app.get("/api/v1/users/admin/app-stats", Some(&bob)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/v1/users/admin/app-stats", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "users": 2, "jobs": 1 }));
}
