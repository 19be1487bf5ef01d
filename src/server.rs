//! HTTP tool server.
//!
//! Exposes the template tools over a JSON HTTP API so agent runtimes can
//! discover and call them. Built-in tools and any extra Rust tools share one
//! [`ToolRegistry`] and the same `POST /tools/{name}` handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "name must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `unavailable` (503), `tool_error` (500).
//!
//! A template miss is not an error: `read_template` answers 200 with
//! `"found": false`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Build the router. Split out from [`run_server`] so tests can drive it
/// on an ephemeral port.
pub fn router(tools: ToolRegistry, ctx: ToolContext) -> Router {
    let state = AppState {
        tools: Arc::new(tools),
        ctx,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve `tools` on `bind` until the process is terminated.
pub async fn run_server(bind: &str, tools: ToolRegistry, ctx: ToolContext) -> anyhow::Result<()> {
    println!("Registered {} tools:", tools.len());
    for t in tools.tools() {
        let tag = if t.is_builtin() { "builtin" } else { "rust" };
        println!("  POST /tools/{} ({})", t.name(), tag);
    }

    let app = router(tools, ctx);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("Tool server listening on http://{}", bind);
    tracing::info!(%bind, "tool server started");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Map a tool failure to an HTTP status by its message, so tools can keep
/// returning plain `anyhow` errors.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);
    let message = format!("{}: {}", tool_name, msg);

    if msg.contains("must not be empty")
        || msg.contains("invalid category")
        || msg.contains("unknown category")
    {
        bad_request(message)
    } else if msg.contains("not found") {
        not_found(message)
    } else if msg.contains("timed out") {
        app_error(StatusCode::REQUEST_TIMEOUT, "timeout", message)
    } else if msg.contains("unavailable") {
        app_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
    } else {
        app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::from_tool(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let result = tool.execute(validated, &state.ctx).await.map_err(|e| {
        tracing::warn!(tool = %name, error = %e, "tool call failed");
        classify_tool_error(&name, e)
    })?;

    Ok(Json(serde_json::json!({ "result": result })))
}
