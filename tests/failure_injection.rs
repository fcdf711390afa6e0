//! Failure injection tests for the pipeline gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use pipeline_gateway::config::GatewayConfig;
use pipeline_gateway::database::{DatabaseError, QueryResult, ScriptedDatabase};
use pipeline_gateway::pipeline::{self, PipelineOptions, PipelineRequest, RequestItem, Statement};
use pipeline_gateway::SqliteDatabase;
use serde_json::{json, Value};

mod common;
use common::{batch, close, execute, post_pipeline, spawn_server, TOKEN};

#[tokio::test]
async fn test_database_error_discards_partial_results() {
    let db = Arc::new(
        ScriptedDatabase::new()
            .with_result(QueryResult::empty().with_rows_affected(1))
            .with_error(DatabaseError::new("database is locked", "SQLITE_BUSY"))
            .with_result(QueryResult::empty()),
    );
    let app = common::app_with(GatewayConfig::default(), db.clone());

    let body = batch(vec![execute("INSERT a"), execute("INSERT b"), execute("INSERT c"), close()]);
    let (status, json) = post_pipeline(&app, body, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json,
        json!({"error": {"message": "database is locked", "code": "SQLITE_BUSY"}})
    );
    assert_eq!(db.executed().len(), 2);
}

#[tokio::test]
async fn test_error_without_code_is_internal() {
    let db = Arc::new(ScriptedDatabase::new().with_error(DatabaseError::internal("driver went away")));
    let app = common::app_with(GatewayConfig::default(), db);

    let (status, json) = post_pipeline(&app, batch(vec![execute("SELECT 1")]), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"]["message"], "driver went away");
}

#[tokio::test]
async fn test_slow_statement_times_out() {
    let db = Arc::new(ScriptedDatabase::new().with_delay(Duration::from_secs(30)));
    let mut config = GatewayConfig::default();
    config.timeouts.statement_ms = 50;
    let app = common::app_with(config, db.clone());

    let (status, json) = post_pipeline(&app, batch(vec![execute("SELECT slow()"), close()]), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "TIMEOUT");
    assert_eq!(db.cancelled_count(), 1);
}

#[tokio::test]
async fn test_runaway_sqlite_query_is_interrupted() {
    let mut config = GatewayConfig::default();
    config.timeouts.statement_ms = 100;
    let app = common::sqlite_app(config);

    let runaway = "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n) SELECT count(*) FROM n";
    let (status, json) = post_pipeline(&app, batch(vec![execute(runaway)]), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "TIMEOUT");

    // The connection is usable again once the interrupted query unwinds.
    let (status, json) = post_pipeline(&app, batch(vec![execute("SELECT 1")]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["response"]["result"]["rows"][0][0]["value"], "1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timed_out_write_leaves_no_rows() {
    let mut config = GatewayConfig::default();
    config.timeouts.statement_ms = 100;
    let app = common::sqlite_app(config);

    let (status, _) = post_pipeline(&app, batch(vec![execute("CREATE TABLE t (i INTEGER)")]), None).await;
    assert_eq!(status, StatusCode::OK);

    let endless_insert =
        "INSERT INTO t WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n) SELECT i FROM n";
    let (status, json) = post_pipeline(&app, batch(vec![execute(endless_insert)]), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "TIMEOUT");

    let (_, json) = post_pipeline(&app, batch(vec![execute("SELECT count(*) FROM t")]), None).await;
    assert_eq!(json["results"][0]["response"]["result"]["rows"][0][0]["value"], "0");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deadline_only_cancels_its_own_statement() {
    let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let single = |sql: &str| PipelineRequest {
        baton: None,
        requests: vec![RequestItem::Execute {
            stmt: Statement::new(sql),
        }],
    };
    pipeline::handle(db.as_ref(), single("CREATE TABLE t (i INTEGER)"), &PipelineOptions::default())
        .await
        .unwrap();

    // Long but finite, well inside its own generous deadline.
    let slow = {
        let db = Arc::clone(&db);
        let request = single(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 20000000) \
             SELECT count(*) FROM n",
        );
        tokio::spawn(async move {
            let options = PipelineOptions {
                statement_timeout: Duration::from_secs(120),
                ..PipelineOptions::default()
            };
            pipeline::handle(db.as_ref(), request, &options).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Queued behind the slow read, so it runs out of time before it starts.
    let fast_options = PipelineOptions {
        statement_timeout: Duration::from_millis(100),
        ..PipelineOptions::default()
    };
    let err = pipeline::handle(db.as_ref(), single("INSERT INTO t VALUES (1)"), &fast_options)
        .await
        .unwrap_err();
    assert_eq!(err.code, "TIMEOUT");

    let slow = slow.await.unwrap().unwrap();
    let json = serde_json::to_value(&slow).unwrap();
    assert_eq!(json["results"][0]["response"]["result"]["rows"][0][0]["value"], "20000000");

    let count = pipeline::handle(db.as_ref(), single("SELECT count(*) FROM t"), &PipelineOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&count).unwrap();
    assert_eq!(json["results"][0]["response"]["result"]["rows"][0][0]["value"], "0");
}

#[tokio::test]
async fn test_argument_mismatch_is_reported() {
    let app = common::sqlite_app(GatewayConfig::default());
    let body = batch(vec![json!({
        "type": "execute",
        "stmt": {"sql": "SELECT ?", "args": [{"type": "integer", "value": "1"}, {"type": "null"}]}
    })]);

    let (status, json) = post_pipeline(&app, body, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "SQLITE_RANGE");
}

#[tokio::test]
async fn test_over_the_wire_with_concurrent_clients() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::gated_config();
    config.database.path = dir.path().join("gateway.db").to_string_lossy().into_owned();
    let db = Arc::new(SqliteDatabase::open(&config.database).unwrap());
    let (addr, shutdown) = spawn_server(config, db).await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/v2/pipeline", addr);

    let setup = client
        .post(&url)
        .bearer_auth(TOKEN)
        .json(&batch(vec![execute("CREATE TABLE hits (id INTEGER PRIMARY KEY, who TEXT)")]))
        .send()
        .await
        .unwrap();
    assert_eq!(setup.status(), 200);

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let body = batch(vec![
                json!({
                    "type": "execute",
                    "stmt": {"sql": "INSERT INTO hits (who) VALUES (?)", "args": [{"type": "text", "value": format!("client-{i}")}]}
                }),
                close(),
            ]);
            let resp = client.post(&url).bearer_auth(TOKEN).json(&body).send().await.unwrap();
            (resp.status().as_u16(), resp.json::<Value>().await.unwrap())
        }));
    }

    for handle in handles {
        let (status, json) = handle.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(json["results"][0]["response"]["result"]["affected_row_count"], 1);
    }

    let count = client
        .post(&url)
        .bearer_auth(TOKEN)
        .json(&batch(vec![execute("SELECT count(*) FROM hits")]))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(count["results"][0]["response"]["result"]["rows"][0][0]["value"], "20");

    let denied = client.post(&url).json(&batch(vec![close()])).send().await.unwrap();
    assert_eq!(denied.status(), 401);

    let health = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    assert!(health.headers().contains_key("x-request-id"));

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.get(format!("http://{}/health", addr)).send().await.is_err());
}
