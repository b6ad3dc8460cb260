use axum::http::{Method, StatusCode};
use serde_json::json;

use super::{request, spawn_app};

#[tokio::test]
async fn product_lifecycle() {
    let app = spawn_app();

    let res = app
        .json(Method::POST, "/api/v1/products", None, json!({ "name": "Mop", "price": 12, "imageId": "mops/blue" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let product = res.json()["product"].clone();
    let id = product["_id"].as_str().unwrap().to_string();
    assert_eq!(product["imageUrl"], "https://res.cloudinary.com/demo/image/upload/mops/blue");

    let res = app.get(&format!("/api/v1/products/{}", id), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["product"]["name"], "Mop");

    let res = app
        .json(Method::PATCH, &format!("/api/v1/products/{}", id), None, json!({ "price": 15 }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["msg"], "product modified");
    assert_eq!(res.json()["product"]["price"], 15);
    assert_eq!(res.json()["product"]["name"], "Mop");

    let res = app.send(request(Method::DELETE, &format!("/api/v1/products/{}", id), None, None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["msg"], "product deleted");

    let res = app.get(&format!("/api/v1/products/{}", id), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["msg"], format!("no product with id {}", id));
}

#[tokio::test]
async fn list_filters_by_query() {
    let app = spawn_app();
    for (name, category) in [("Mop", "floor"), ("Broom", "floor"), ("Sponge", "kitchen")] {
        let res = app
            .json(Method::POST, "/api/v1/products", None, json!({ "name": name, "price": 3, "category": category }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let res = app.get("/api/v1/products", None).await;
    assert_eq!(res.json()["count"], 3);

    let res = app.get("/api/v1/products?category=floor", None).await;
    assert_eq!(res.json()["count"], 2);
    assert_eq!(res.json()["products"].as_array().unwrap().len(), 2);

    let res = app.get("/api/v1/products?price=3&sort=newest", None).await;
    assert_eq!(res.json()["count"], 3);
}

#[tokio::test]
async fn missing_required_field_is_a_validation_error() {
    let app = spawn_app();
    let res = app.json(Method::POST, "/api/v1/admin/add-on", None, json!({ "name": "Window polish" })).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json(), json!({ "msg": "please provide price", "field": "price" }));
}

#[tokio::test]
async fn malformed_id_is_rejected() {
    let app = spawn_app();
    let res = app.get("/api/v1/company/not-an-id", None).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["field"], "id");
}

#[tokio::test]
async fn operator_keys_in_body_never_reach_storage() {
    let app = spawn_app();
    let res = app
        .json(
            Method::POST,
            "/api/v1/cleaners",
            None,
            json!({ "name": "Eve", "$where": "sleep(1000)", "profile": { "rating.avg": 5, "bio": "tidy" } }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let cleaner = res.json()["cleaner"].clone();
    assert!(cleaner.get("$where").is_none());
    assert_eq!(cleaner["profile"], json!({ "bio": "tidy" }));
}

#[tokio::test]
async fn operator_keys_in_query_are_dropped() {
    let app = spawn_app();
    app.json(Method::POST, "/api/v1/orders", None, json!({ "product": "mop", "status": "open" })).await;
    app.json(Method::POST, "/api/v1/orders", None, json!({ "product": "broom", "status": "done" })).await;

    let res = app.get("/api/v1/orders?status%5B%24ne%5D=open", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["count"], 2);

    let res = app.get("/api/v1/orders?status=done&%24where=1", None).await;
    assert_eq!(res.json()["count"], 1);
}

#[tokio::test]
async fn admin_catalogues_are_mounted() {
    let app = spawn_app();
    let res = app.json(Method::POST, "/api/v1/admin/category", None, json!({ "name": "Deep clean" })).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json()["category"]["name"], "Deep clean");

    let res = app.get("/api/v1/admin/category", None).await;
    assert_eq!(res.json()["count"], 1);
    assert_eq!(res.json()["categories"][0]["name"], "Deep clean");
}
