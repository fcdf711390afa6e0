//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pipeline_gateway::config::GatewayConfig;
use pipeline_gateway::database::Database;
use pipeline_gateway::{HttpServer, Shutdown, SqliteDatabase};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TOKEN: &str = "test-proxy-token";

/// Router over a fresh in-memory SQLite database.
pub fn sqlite_app(config: GatewayConfig) -> Router {
    let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    HttpServer::new(config, db).router()
}

/// Router over an arbitrary database.
pub fn app_with(config: GatewayConfig, db: Arc<dyn Database>) -> Router {
    HttpServer::new(config, db).router()
}

/// Config with the bearer gate enabled.
pub fn gated_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.token = Some(TOKEN.to_string());
    config
}

pub fn execute(sql: &str) -> Value {
    json!({"type": "execute", "stmt": {"sql": sql}})
}

pub fn close() -> Value {
    json!({"type": "close"})
}

pub fn batch(items: Vec<Value>) -> Value {
    json!({ "requests": items })
}

/// Send a request through the router without a socket.
///
/// Returns the status, the raw body and the body parsed as JSON (`null` if empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Vec<u8>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, bytes, json)
}

pub async fn post_pipeline(app: &Router, body: Value, token: Option<&str>) -> (StatusCode, Value) {
    let (status, _, json) = send(app, "POST", "/v2/pipeline", Some(body), token).await;
    (status, json)
}

/// Start a real server on an ephemeral port. Returns its address and shutdown handle.
pub async fn spawn_server(config: GatewayConfig, db: Arc<dyn Database>) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, db);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}
