//! HTTP tool server tests.
//!
//! Serve the real router on an ephemeral port over the in-memory store and
//! call it with `reqwest`, the way an agent runtime would.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use template_vault::app::App;
use template_vault::blob::memory::MemoryBlobStore;
use template_vault::config::parse_config;
use template_vault::server::router;
use template_vault::tools::{Tool, ToolContext, ToolRegistry};

/// An extra Rust tool registered next to the built-ins.
struct CountTemplatesTool;

#[async_trait]
impl Tool for CountTemplatesTool {
    fn name(&self) -> &str {
        "count_templates"
    }

    fn description(&self) -> &str {
        "Count stored templates"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let items = ctx.templates().list_templates(None, None).await?;
        Ok(json!({ "count": items.len() }))
    }
}

async fn start_server(store: Arc<MemoryBlobStore>) -> String {
    let cfg = parse_config(
        r#"
[storage]
container = "kb"

[aliases.sql]
"pro load" = "pro_load_calculation"
"#,
    )
    .unwrap();
    let app = App::with_secondary(&cfg, store, None).unwrap();

    let mut tools = ToolRegistry::with_builtins();
    tools.register(Box::new(CountTemplatesTool));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = router(tools, app.tool_context());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn seeded_store() -> Arc<MemoryBlobStore> {
    let store = Arc::new(MemoryBlobStore::new());
    store.insert(
        "examples/sql/pro_load_calculation.sql",
        "SELECT * FROM load WHERE pro_id = <PRO_ID>;\n",
    );
    store
}

#[tokio::test]
async fn test_health_and_tool_list() {
    let base = start_server(seeded_store()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let list: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = list["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["read_template", "list_templates", "lookup_knowledge", "count_templates"]
    );
    assert_eq!(tools[0]["builtin"], true);
    assert_eq!(tools[3]["builtin"], false);
}

#[tokio::test]
async fn test_read_template_over_http() {
    let base = start_server(seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/read_template", base))
        .json(&json!({ "name": "Pro Load", "category": "sql" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["found"], true);
    assert_eq!(
        body["result"]["content"],
        "SELECT * FROM load WHERE pro_id = <PRO_ID>;\n"
    );

    let resp = client
        .post(format!("{}/tools/read_template", base))
        .json(&json!({ "name": "перегрузка про", "category": "sql" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["found"], false);
}

#[tokio::test]
async fn test_error_envelope() {
    let base = start_server(seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/read_template", base))
        .json(&json!({ "name": "pro load" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/tools/read_template", base))
        .json(&json!({ "name": "x", "category": "../etc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/tools/nope", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_unavailable_store_over_http() {
    let store = seeded_store();
    store.set_offline(true);
    let base = start_server(store).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/read_template", base))
        .json(&json!({ "name": "pro load", "category": "sql" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["status"], "unavailable");

    let resp = client
        .post(format!("{}/tools/count_templates", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}
