//! Integration tests for idlink-server HTTP endpoints
//!
//! Each test drives the router against a fresh SQLite database in a
//! temporary directory.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use idlink_common::config::StoreConfig;
use idlink_common::db::SqliteContactStore;
use idlink_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: app over a temporary store; TempDir must outlive the test
async fn setup_app() -> (TempDir, axum::Router) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("contacts.db");
    let config = StoreConfig::new(format!("sqlite://{}?mode=rwc", db_path.display()));
    let store = SqliteContactStore::connect(&config)
        .await
        .expect("Should open test store");

    let app = build_router(AppState::new(store, Duration::from_secs(2)));
    (dir, app)
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send a request and decode the JSON body
async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = serde_json::from_slice(&bytes).expect("Should parse JSON");
    (status, body)
}

async fn identify(app: &axum::Router, body: Value) -> Value {
    let (status, body) = send(app, json_request("/identify", body)).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    body["contact"].clone()
}

// =============================================================================
// Health / probe
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, app) = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "idlink-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_testdb_reports_store_version() {
    let (_dir, app) = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/testdb")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["version"].as_str().unwrap().starts_with("SQLite"));
    assert!(body["time"].is_string());
}

// =============================================================================
// POST /identify
// =============================================================================

#[tokio::test]
async fn test_identify_new_contact() {
    let (_dir, app) = setup_app().await;

    let contact = identify(
        &app,
        json!({"email": "lorraine@hillvalley.edu", "phoneNumber": "123456"}),
    )
    .await;

    assert!(contact["primaryContactId"].is_number());
    assert_eq!(contact["emails"], json!(["lorraine@hillvalley.edu"]));
    assert_eq!(contact["phoneNumbers"], json!(["123456"]));
    assert_eq!(contact["secondaryContactIds"], json!([]));
}

#[tokio::test]
async fn test_identify_links_secondary() {
    let (_dir, app) = setup_app().await;

    let first = identify(
        &app,
        json!({"email": "lorraine@hillvalley.edu", "phoneNumber": "123456"}),
    )
    .await;
    let contact = identify(
        &app,
        json!({"email": "mcfly@hillvalley.edu", "phoneNumber": "123456"}),
    )
    .await;

    assert_eq!(contact["primaryContactId"], first["primaryContactId"]);
    assert_eq!(
        contact["emails"],
        json!(["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"])
    );
    assert_eq!(contact["phoneNumbers"], json!(["123456"]));
    assert_eq!(contact["secondaryContactIds"].as_array().unwrap().len(), 1);

    // Lookups by either single field return the same identity
    let by_phone = identify(&app, json!({"phoneNumber": "123456"})).await;
    let by_email = identify(&app, json!({"email": "mcfly@hillvalley.edu", "phoneNumber": null})).await;
    assert_eq!(by_phone, contact);
    assert_eq!(by_email, contact);
}

#[tokio::test]
async fn test_identify_merges_primaries() {
    let (_dir, app) = setup_app().await;

    let george = identify(
        &app,
        json!({"email": "george@hillvalley.edu", "phoneNumber": "919191"}),
    )
    .await;
    let biff = identify(
        &app,
        json!({"email": "biffsucks@hillvalley.edu", "phoneNumber": "717171"}),
    )
    .await;

    let contact = identify(
        &app,
        json!({"email": "george@hillvalley.edu", "phoneNumber": "717171"}),
    )
    .await;

    assert_eq!(contact["primaryContactId"], george["primaryContactId"]);
    assert_eq!(
        contact["emails"],
        json!(["george@hillvalley.edu", "biffsucks@hillvalley.edu"])
    );
    assert_eq!(contact["phoneNumbers"], json!(["919191", "717171"]));
    assert_eq!(
        contact["secondaryContactIds"],
        json!([biff["primaryContactId"]])
    );

    let (_, records) = send(&app, test_request("GET", "/contacts")).await;
    let primaries = records
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["linkprecedence"] == "primary")
        .count();
    assert_eq!(primaries, 1);
}

#[tokio::test]
async fn test_identify_accepts_numeric_phone() {
    let (_dir, app) = setup_app().await;

    let contact = identify(&app, json!({"phoneNumber": 123456})).await;
    assert_eq!(contact["phoneNumbers"], json!(["123456"]));
    assert_eq!(contact["emails"], json!([]));
}

#[tokio::test]
async fn test_identify_requires_email_or_phone() {
    let (_dir, app) = setup_app().await;

    let (status, body) = send(&app, json_request("/identify", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        json_request("/identify", json!({"email": null, "phoneNumber": null})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_identify_rejects_malformed_body() {
    let (_dir, app) = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/identify")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// =============================================================================
// GET /contacts
// =============================================================================

#[tokio::test]
async fn test_list_contacts_raw_records() {
    let (_dir, app) = setup_app().await;
    let first = identify(&app, json!({"email": "doc@hillvalley.edu"})).await;
    identify(&app, json!({"email": "doc@hillvalley.edu", "phoneNumber": "555"})).await;

    let (status, body) = send(&app, test_request("GET", "/contacts")).await;
    assert_eq!(status, StatusCode::OK);

    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);

    let primary = &records[0];
    assert_eq!(primary["id"], first["primaryContactId"]);
    assert_eq!(primary["email"], "doc@hillvalley.edu");
    assert!(primary["phonenumber"].is_null());
    assert!(primary["linkedid"].is_null());
    assert_eq!(primary["linkprecedence"], "primary");
    assert!(primary["createdat"].is_string());
    assert!(primary["updatedat"].is_string());
    assert!(primary["deletedat"].is_null());

    let secondary = &records[1];
    assert_eq!(secondary["linkedid"], first["primaryContactId"]);
    assert_eq!(secondary["linkprecedence"], "secondary");
    assert_eq!(secondary["phonenumber"], "555");
    assert!(secondary["id"].as_i64().unwrap() > primary["id"].as_i64().unwrap());
}

// =============================================================================
// DELETE /contacts/:id
// =============================================================================

#[tokio::test]
async fn test_delete_primary_cascades() {
    let (_dir, app) = setup_app().await;
    let first = identify(&app, json!({"email": "a@x.io", "phoneNumber": "111"})).await;
    identify(&app, json!({"email": "b@x.io", "phoneNumber": "111"})).await;
    identify(&app, json!({"email": "z@x.io", "phoneNumber": "999"})).await;

    let id = first["primaryContactId"].as_i64().unwrap();
    let (status, body) = send(&app, test_request("DELETE", &format!("/contacts/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedContactId"], id);
    assert!(body["message"].as_str().unwrap().contains("1 linked"));

    let (_, records) = send(&app, test_request("GET", "/contacts")).await;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["email"], "z@x.io");

    // The deleted pair is a brand new identity now
    let again = identify(&app, json!({"email": "b@x.io", "phoneNumber": "111"})).await;
    assert_ne!(again["primaryContactId"], first["primaryContactId"]);
    assert_eq!(again["secondaryContactIds"], json!([]));
}

#[tokio::test]
async fn test_delete_invalid_id() {
    let (_dir, app) = setup_app().await;

    let (status, body) = send(&app, test_request("DELETE", "/contacts/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid contact id"));
}

#[tokio::test]
async fn test_delete_not_found_and_already_deleted() {
    let (_dir, app) = setup_app().await;

    let (status, _) = send(&app, test_request("DELETE", "/contacts/4242")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let contact = identify(&app, json!({"email": "a@x.io"})).await;
    let uri = format!("/contacts/{}", contact["primaryContactId"]);
    let (status, _) = send(&app, test_request("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, test_request("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

// =============================================================================
// DELETE /contacts?confirm=true
// =============================================================================

#[tokio::test]
async fn test_bulk_delete_gate() {
    let (_dir, app) = setup_app().await;
    identify(&app, json!({"email": "a@x.io", "phoneNumber": "111"})).await;
    identify(&app, json!({"email": "a@x.io", "phoneNumber": "222"})).await;
    identify(&app, json!({"email": "c@x.io", "phoneNumber": "333"})).await;

    for uri in ["/contacts", "/contacts?confirm=false", "/contacts?confirm=TRUE", "/contacts?confirm=1"] {
        let (status, body) = send(&app, test_request("DELETE", uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} must be rejected", uri);
        assert!(body["error"].is_string());
    }

    let (_, records) = send(&app, test_request("GET", "/contacts")).await;
    assert_eq!(records.as_array().unwrap().len(), 3);

    let (status, body) = send(&app, test_request("DELETE", "/contacts?confirm=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedCount"], 3);

    let (_, records) = send(&app, test_request("GET", "/contacts")).await;
    assert!(records.as_array().unwrap().is_empty());
}
