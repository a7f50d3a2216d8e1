//! Shared helpers for HTTP tests.

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, header::AUTHORIZATION};
use axum_test::{TestRequest, TestServer};
use bastion_persistence::backends::memory::MemoryBackend;
use bastion_persistence::isolation::IsolatedStore;
use bastion_rest::{ServerConfig, create_app};
use serde_json::{Value, json};

pub const X_TENANT_ID: HeaderName = HeaderName::from_static("x-tenant-id");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Tokens installed by `ServerConfig::for_testing`.
pub const OPERATOR: &str = "operator-token";
pub const ACME_ADMIN: &str = "acme-admin";
pub const ACME_MEMBER: &str = "acme-member";
pub const GLOBEX_MEMBER: &str = "globex-member";
pub const FLOATING_MEMBER: &str = "floating-member";

/// Creates a test server over an in-memory store.
pub fn create_test_server() -> (TestServer, IsolatedStore<MemoryBackend>) {
    create_test_server_with(ServerConfig::for_testing())
}

/// Creates a test server with a custom configuration.
pub fn create_test_server_with(
    config: ServerConfig,
) -> (TestServer, IsolatedStore<MemoryBackend>) {
    let store = IsolatedStore::new(MemoryBackend::new());
    let app = create_app(store.clone(), config).expect("Failed to build app");
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, store)
}

/// Adds a bearer token to a request.
pub fn as_caller(request: TestRequest, token: &str) -> TestRequest {
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header");
    request.add_header(AUTHORIZATION, value)
}

/// Creates a subscription as `token` and returns the response body.
pub async fn create_subscription(
    server: &TestServer,
    token: &str,
    plan: &str,
    tenant_id: Option<i64>,
) -> Value {
    let mut body = json!({"plan": plan, "seats": 5});
    if let Some(tenant_id) = tenant_id {
        body["tenant_id"] = json!(tenant_id);
    }
    let response = as_caller(server.post("/subscriptions"), token)
        .json(&body)
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

/// Lists subscriptions as `token` and returns their plans, sorted.
pub async fn visible_plans(server: &TestServer, token: &str) -> Vec<String> {
    let response = as_caller(server.get("/subscriptions"), token).await;
    response.assert_status_ok();
    let mut plans: Vec<String> = response
        .json::<Vec<Value>>()
        .iter()
        .filter_map(|s| s["plan"].as_str().map(String::from))
        .collect();
    plans.sort();
    plans
}

/// Returns the `error.code` field of an error body.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
