// HTTP routes against an in-memory store
// Run with: cargo test --test api_routes

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use giofarma_catalog::config::{OdooConfig, SyncSettings};
use giofarma_catalog::models::catalog::{CategoryUpsert, ProductUpsert};
use giofarma_catalog::models::sync_log::SyncStatus;
use giofarma_catalog::repositories::{CatalogStore, MemoryStore};
use giofarma_catalog::services::erp::OdooClient;
use giofarma_catalog::{create_router, AppState, Stores};

const CRON_SECRET: &str = "cron-test-secret";

fn product(odoo_id: i64, name: &str, category_id: i64, active: bool) -> ProductUpsert {
    ProductUpsert {
        odoo_id,
        name: name.to_string(),
        sku: Some(format!("GF-{}", odoo_id)),
        list_price: dec!(99.90),
        cost_price: None,
        qty_available: Decimal::from(10),
        virtual_available: Decimal::from(8),
        description: None,
        image_url: None,
        category_id: Some(category_id),
        category_name: Some("Dermocosmética".to_string()),
        uom_name: Some("Unidades".to_string()),
        active,
        write_date: Utc::now(),
    }
}

/// Odoo is left unconfigured: catalog routes never touch it and sync runs
/// fail at connect().
async fn server(cron_secret: Option<&str>) -> (TestServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    store
        .upsert_categories(&[
            CategoryUpsert { odoo_id: 2, name: "Vitaminas".to_string(), parent_id: None, parent_name: None },
            CategoryUpsert { odoo_id: 1, name: "Dermocosmética".to_string(), parent_id: None, parent_name: None },
        ])
        .await
        .unwrap();

    let mut rows: Vec<ProductUpsert> = (1..=15)
        .map(|i| product(i, &format!("Crema {:02}", i), 1, true))
        .collect();
    rows.push(product(16, "Crema Descontinuada", 1, false));
    rows.push(product(17, "Vitamina C 1g", 2, true));
    store.upsert_products(&rows).await.unwrap();

    let odoo = Arc::new(OdooClient::from_config(OdooConfig::default()).unwrap());
    let state = AppState::new(
        odoo,
        Stores::memory(store.clone()),
        SyncSettings::default(),
        cron_secret.map(str::to_string),
    );
    let app = create_router(state, &["http://localhost:3000".to_string()]);

    (TestServer::new(app).unwrap(), store)
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (server, _) = server(None).await;

    let response = server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], json!("ok"));
}

#[tokio::test]
async fn test_products_are_paginated() {
    let (server, _) = server(None).await;

    let response = server
        .get("/api/products")
        .add_query_param("page", 2)
        .add_query_param("limit", 10)
        .add_query_param("category", 1)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"][0]["name"], json!("Crema 11"));
    assert_eq!(
        body["pagination"],
        json!({"page": 2, "limit": 10, "total": 15, "total_pages": 2})
    );
}

#[tokio::test]
async fn test_products_default_page_size_and_search() {
    let (server, _) = server(None).await;

    let body: Value = server.get("/api/products").await.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 12);
    assert_eq!(body["pagination"]["total"], json!(16));

    let body: Value = server.get("/api/products").add_query_param("search", "vitamina").await.json();
    assert_eq!(body["pagination"]["total"], json!(1));
    assert_eq!(body["data"][0]["odoo_id"], json!(17));
}

#[tokio::test]
async fn test_products_rejects_malformed_params() {
    let (server, _) = server(None).await;

    let response = server.get("/api/products").add_query_param("page", "two").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["success"], json!(false));
}

#[tokio::test]
async fn test_products_far_page_is_empty() {
    let (server, _) = server(None).await;

    let response = server
        .get("/api/products")
        .add_query_param("page", i64::MAX)
        .add_query_param("limit", 100)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["pagination"]["total"], json!(16));
}

#[tokio::test]
async fn test_categories_sorted_by_name() {
    let (server, _) = server(None).await;

    let body: Value = server.get("/api/categories").await.json();

    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Dermocosmética", "Vitaminas"]);
}

#[tokio::test]
async fn test_orders_lookup_requires_email() {
    let (server, _) = server(None).await;

    let response = server.get("/api/orders").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>(),
        json!({"success": false, "error": "email is required"})
    );
}

#[tokio::test]
async fn test_orders_lookup_by_email() {
    let (server, _) = server(None).await;

    let response = server.get("/api/orders").add_query_param("email", "nadie@example.com").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"success": true, "data": []}));
}

#[tokio::test]
async fn test_invalid_order_is_rejected_before_odoo() {
    let (server, store) = server(None).await;

    let response = server
        .post("/api/orders")
        .json(&json!({
            "customer_name": "Ana",
            "customer_email": "ana@example.com",
            "items": [],
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], json!("Validation failed"));
    assert!(store.orders().await.is_empty());
}

#[tokio::test]
async fn test_unparseable_order_body() {
    let (server, _) = server(None).await;

    let response = server
        .post("/api/orders")
        .content_type("application/json")
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], json!("Invalid JSON"));
}

#[tokio::test]
async fn test_order_failure_hides_details() {
    let (server, store) = server(None).await;

    let response = server
        .post("/api/orders")
        .json(&json!({
            "customer_name": "Ana",
            "customer_email": "ana@example.com",
            "items": [{"product_id": 1, "name": "Crema 01", "price": 99.9, "quantity": 1}],
        }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let error = response.json::<Value>()["error"].as_str().unwrap().to_string();
    assert!(error.contains("support"));
    assert!(!error.contains("ODOO"));
    assert!(store.orders().await.is_empty());
}

#[tokio::test]
async fn test_sync_requires_cron_token() {
    let (server, store) = server(Some(CRON_SECRET)).await;

    server.get("/api/sync").await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/sync")
        .add_header(header::AUTHORIZATION, bearer("guess"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert!(store.sync_runs().await.is_empty());
}

#[tokio::test]
async fn test_sync_failure_is_reported_and_logged() {
    let (server, store) = server(Some(CRON_SECRET)).await;

    let response = server
        .get("/api/sync")
        .add_query_param("mode", "incremental")
        .add_header(header::AUTHORIZATION, bearer(CRON_SECRET))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("ODOO_URL"));

    let runs = store.sync_runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncStatus::Error);
}

#[tokio::test]
async fn test_sync_rejects_unknown_mode() {
    let (server, _) = server(None).await;

    server
        .get("/api/sync")
        .add_query_param("mode", "everything")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sync_history_lists_runs_newest_first() {
    let (server, _) = server(Some(CRON_SECRET)).await;

    server
        .get("/api/sync/runs")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    for _ in 0..2 {
        server
            .get("/api/sync")
            .add_query_param("mode", "incremental")
            .add_header(header::AUTHORIZATION, bearer(CRON_SECRET))
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let response = server
        .get("/api/sync/runs")
        .add_query_param("limit", 1)
        .add_header(header::AUTHORIZATION, bearer(CRON_SECRET))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], json!("error"));
    assert_eq!(body["data"][0]["sync_type"], json!("incremental"));
}
