//! HTTP server: REST query routes, tool dispatch and the MCP endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness, loaded flag, item count, version |
//! | `GET`  | `/api/examples` | Examples by `chart_category` / `source_collection` |
//! | `GET`  | `/api/commands` | Command and environment specs by `name` substring |
//! | `GET`  | `/api/feedback` | Warnings and notes by `source_collection` |
//! | `POST` | `/api/search` | Paginated free-text search |
//! | `GET`  | `/api/stats` | Knowledge base statistics |
//! | `GET`  | `/tools/list` | Registered tools with argument schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `POST` | `/rebuild` | Re-run the build and swap the snapshot |
//! | `*`    | `/mcp` | MCP Streamable HTTP transport |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "unknown chart_category: flowchart" } }
//! ```
//!
//! Error codes: `bad_request` (400), `rebuild_in_progress` (409),
//! `not_loaded` (503), `rebuild_failed` (500), `internal` (500). Tool calls always answer 200 with a [`ToolOutput`]; a
//! failed call is signalled by `isError`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use texkb_core::models::{ChartCategory, KnowledgeItem};
use texkb_core::query::{ListFilter, QueryEngine, SearchCategory, SearchRequest};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::mcp::McpBridge;
use crate::pipeline::run_build;
use crate::progress::NoProgress;
use crate::registry::ExtractorRegistry;
use crate::snapshot::KnowledgeHandle;
use crate::tools::{ToolOutput, ToolRegistry};

/// Shared state for every route handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    extractors: Arc<ExtractorRegistry>,
    handle: Arc<KnowledgeHandle>,
    /// Held for the whole build so two rebuilds never write artifacts at once.
    rebuild_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, handle: Arc<KnowledgeHandle>) -> Self {
        Self {
            config: Arc::new(config),
            tools: Arc::new(ToolRegistry::with_builtins()),
            extractors: Arc::new(ExtractorRegistry::with_builtins()),
            handle,
            rebuild_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Build the full router, MCP endpoint included.
pub fn router(state: AppState) -> Router {
    let bridge = McpBridge::new(
        state.config.clone(),
        state.tools.clone(),
        state.handle.clone(),
    );
    let mcp = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/examples", get(handle_examples))
        .route("/api/commands", get(handle_commands))
        .route("/api/feedback", get(handle_feedback))
        .route("/api/search", post(handle_search))
        .route("/api/stats", get(handle_stats))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/rebuild", post(handle_rebuild))
        .nest_service("/mcp", mcp)
        .layer(cors)
        .with_state(state)
}

/// Serve until the process is terminated.
pub async fn run_server(config: Config, handle: Arc<KnowledgeHandle>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config, handle);

    println!("Registered {} tools:", state.tools.len());
    for t in state.tools.tools() {
        println!("  POST /tools/{}  {}", t.name(), t.description());
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("texkb listening on http://{} (MCP at /mcp)", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_loaded() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "not_loaded",
        message: "knowledge base not loaded".to_string(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

fn engine(state: &AppState) -> Result<QueryEngine, AppError> {
    state.handle.engine().ok_or_else(not_loaded)
}

fn parse_chart(raw: Option<&str>) -> Result<Option<ChartCategory>, AppError> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) => ChartCategory::parse(s)
            .map(Some)
            .ok_or_else(|| bad_request(format!("unknown chart_category: {}", s))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    loaded: bool,
    total_items: usize,
    version: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.handle.health();
    Json(HealthResponse {
        status: "ok",
        loaded: health.loaded,
        total_items: health.total_items,
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /api/examples, /api/commands, /api/feedback ============

#[derive(Serialize)]
struct ListResponse<'a> {
    total: usize,
    items: Vec<&'a KnowledgeItem>,
    query: Value,
}

#[derive(Debug, Deserialize)]
struct ExamplesParams {
    #[serde(alias = "chart_type")]
    chart_category: Option<String>,
    #[serde(alias = "macro_package")]
    source_collection: Option<String>,
    limit: Option<usize>,
}

async fn handle_examples(
    State(state): State<AppState>,
    Query(params): Query<ExamplesParams>,
) -> Result<Response, AppError> {
    let engine = engine(&state)?;
    let chart = parse_chart(params.chart_category.as_deref())?;
    let collection = non_empty(params.source_collection);
    let limit = state
        .config
        .query
        .clamp(params.limit, state.config.query.example_limit);
    let items = engine.examples(chart, collection.as_deref(), limit);
    Ok(Json(ListResponse {
        total: items.len(),
        items,
        query: json!({
            "chart_category": chart,
            "source_collection": collection,
            "limit": limit,
        }),
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
struct CommandsParams {
    #[serde(alias = "command_name")]
    name: Option<String>,
    #[serde(alias = "macro_package")]
    source_collection: Option<String>,
    limit: Option<usize>,
}

async fn handle_commands(
    State(state): State<AppState>,
    Query(params): Query<CommandsParams>,
) -> Result<Response, AppError> {
    let engine = engine(&state)?;
    let name = params.name.unwrap_or_default();
    let collection = non_empty(params.source_collection);
    let limit = state
        .config
        .query
        .clamp(params.limit, state.config.query.search_limit);
    let items = engine.specs(&name, collection.as_deref(), limit);
    Ok(Json(ListResponse {
        total: items.len(),
        items,
        query: json!({
            "name": name,
            "source_collection": collection,
            "limit": limit,
        }),
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
struct FeedbackParams {
    #[serde(alias = "macro_package")]
    source_collection: Option<String>,
    limit: Option<usize>,
}

async fn handle_feedback(
    State(state): State<AppState>,
    Query(params): Query<FeedbackParams>,
) -> Result<Response, AppError> {
    let engine = engine(&state)?;
    let collection = non_empty(params.source_collection);
    let limit = state
        .config
        .query
        .clamp(params.limit, state.config.query.search_limit);
    let items = engine.feedback(collection.as_deref(), limit);
    Ok(Json(ListResponse {
        total: items.len(),
        items,
        query: json!({
            "source_collection": collection,
            "limit": limit,
        }),
    })
    .into_response())
}

// ============ POST /api/search ============

#[derive(Debug, Default, Deserialize)]
struct SearchFilters {
    #[serde(default, alias = "chart_type")]
    chart_category: Option<String>,
    #[serde(default, alias = "package")]
    source_collection: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    filters: SearchFilters,
}

#[derive(Serialize)]
struct SearchResponse<'a> {
    results: Vec<&'a KnowledgeItem>,
    total: usize,
    query: String,
    limit: usize,
    offset: usize,
    has_more: bool,
    next_offset: Option<usize>,
}

async fn handle_search(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let body: SearchBody = if body.is_empty() {
        serde_json::from_value(json!({})).map_err(|e| bad_request(e.to_string()))?
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid search body: {}", e)))?
    };
    let engine = engine(&state)?;
    let request = SearchRequest {
        query: body.query,
        category: SearchCategory::parse(body.category.as_deref().unwrap_or("all")),
        filters: ListFilter {
            kind: None,
            source_collection: non_empty(body.filters.source_collection),
            chart_category: parse_chart(body.filters.chart_category.as_deref())?,
        },
        offset: body.offset,
        limit: state
            .config
            .query
            .clamp(body.limit, state.config.query.search_limit),
    };
    let page = engine.search(&request);
    Ok(Json(SearchResponse {
        total: page.total,
        query: page.query.clone(),
        limit: page.limit,
        offset: page.offset,
        has_more: page.has_more,
        next_offset: page.next_offset,
        results: page.items,
    })
    .into_response())
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let engine = engine(&state)?;
    Ok(Json(engine.stats()).into_response())
}

// ============ GET /tools/list, POST /tools/{name} ============

async fn handle_list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tools": state.tools.list() }))
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Json<ToolOutput> {
    let params: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                return Json(ToolOutput::error(format!(
                    "Error executing tool {}: invalid arguments: {}",
                    name, e
                )))
            }
        }
    };
    let bridge = McpBridge::new(state.config.clone(), state.tools.clone(), state.handle.clone());
    Json(bridge.call(&name, params))
}

// ============ POST /rebuild ============

#[derive(Serialize)]
struct RebuildResponse {
    status: &'static str,
    raw_records: usize,
    total_items: usize,
    dropped: usize,
}

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<RebuildResponse>, AppError> {
    let Ok(_guard) = state.rebuild_lock.clone().try_lock_owned() else {
        return Err(AppError {
            status: StatusCode::CONFLICT,
            code: "rebuild_in_progress",
            message: "a rebuild is already running".to_string(),
        });
    };
    let config = state.config.clone();
    let extractors = state.extractors.clone();
    let handle = state.handle.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut counts = (0, 0);
        let rebuilt = handle.rebuild(|| {
            let output = run_build(&config, &extractors, &NoProgress)?;
            counts = (output.summary.raw_records, output.summary.dropped());
            Ok(output.knowledge)
        });
        rebuilt.map(|kb| (kb.len(), counts))
    })
    .await
    .map_err(|e| internal(format!("rebuild task failed: {}", e)))?;

    match result {
        Ok((total_items, (raw_records, dropped))) => {
            tracing::info!(total_items, raw_records, dropped, "rebuilt knowledge base");
            Ok(Json(RebuildResponse {
                status: "ok",
                raw_records,
                total_items,
                dropped,
            }))
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "rebuild failed, keeping previous snapshot");
            Err(AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "rebuild_failed",
                message: format!("{:#}", e),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use texkb_core::knowledge::{CollectionBatch, KnowledgeBase};
    use texkb_core::models::{raw_type, RawRecord};
    use tower::ServiceExt;

    fn knowledge() -> KnowledgeBase {
        let mut records = vec![
            RawRecord::new(raw_type::COMMAND, "pgfplots", "axis.tex")
                .with("command_name", "\\addplot")
                .with("syntax", "\\addplot")
                .with("description", "Adds a plot")
                .with_seed("cmd_\\addplot_axis"),
            RawRecord::new(raw_type::FEEDBACK, "pgfplots", "axis.tex")
                .with("feedback_type", "note")
                .with("content", "Use compat=newest")
                .with_seed("warning_Use compat=newest"),
        ];
        for i in 0..3 {
            records.push(
                RawRecord::new(raw_type::EXECUTABLE_EXAMPLE, "pgfplots", "axis.tex")
                    .with("code", format!("\\begin{{axis}}\\addplot[ybar] {{{}}};\\end{{axis}}", i))
                    .with_seed(&format!("example_axis_{}", i)),
            );
        }
        KnowledgeBase::build(&[CollectionBatch {
            collection: "pgfplots".to_string(),
            records,
        }])
        .0
    }

    fn app_with(handle: KnowledgeHandle, config: Config) -> Router {
        router(AppState::new(config, Arc::new(handle)))
    }

    fn app() -> Router {
        app_with(KnowledgeHandle::new(knowledge()), Config::for_root("/nonexistent"))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_item_count() {
        let (status, body) = send(app(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["loaded"], true);
        assert_eq!(body["total_items"], 5);
    }

    #[tokio::test]
    async fn unloaded_queries_are_unavailable() {
        let app = app_with(KnowledgeHandle::empty(), Config::for_root("/nonexistent"));
        let (status, body) = send(app, get_req("/api/stats")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "not_loaded");
    }

    #[tokio::test]
    async fn examples_filter_and_limit() {
        let (status, body) = send(
            app(),
            get_req("/api/examples?chart_category=bar_chart&limit=2"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["query"]["chart_category"], "bar_chart");
    }

    #[tokio::test]
    async fn unknown_chart_category_is_bad_request() {
        let (status, body) = send(app(), get_req("/api/examples?chart_category=flowchart")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn search_paginates() {
        let (status, body) = send(
            app(),
            post_json("/api/search", json!({ "query": "AddPlot", "limit": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "addplot");
        assert_eq!(body["total"], 3);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["has_more"], true);
        assert_eq!(body["next_offset"], 2);
    }

    #[tokio::test]
    async fn commands_by_name() {
        let (_, body) = send(app(), get_req("/api/commands?name=ADDPLOT")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["kind"], "command_specification");
    }

    #[tokio::test]
    async fn unknown_tool_answers_with_error_block() {
        let (status, body) = send(app(), post_json("/tools/nope", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isError"], true);
        assert_eq!(body["content"][0]["text"], "Unknown tool: nope");
    }

    #[tokio::test]
    async fn tool_call_without_body() {
        let req = Request::post("/tools/get_human_feedback")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(app(), req).await;
        assert_eq!(body["isError"], false);
        assert!(body["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Found 1 feedback items:"));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_snapshot() {
        let app = app();
        let (status, body) = send(app.clone(), post_json("/rebuild", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "rebuild_failed");

        let (status, body) = send(app.clone(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loaded"], true);
        assert_eq!(body["total_items"], 5);
        let (_, body) = send(app, get_req("/api/stats")).await;
        assert_eq!(body["by_kind"]["executable_example"], 3);
    }

    #[tokio::test]
    async fn concurrent_rebuild_is_rejected() {
        let handle = Arc::new(KnowledgeHandle::new(knowledge()));
        let state = AppState::new(Config::for_root("/nonexistent"), handle.clone());
        let app = router(state.clone());

        let running = state.rebuild_lock.lock().await;
        let (status, body) = send(app.clone(), post_json("/rebuild", json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "rebuild_in_progress");
        assert_eq!(handle.health().total_items, 5);
        drop(running);

        let (status, body) = send(app, post_json("/rebuild", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "rebuild_failed");
    }

    #[tokio::test]
    async fn rebuild_swaps_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let manual = dir.path().join("manuals/pgfplots-manual");
        std::fs::create_dir_all(&manual).unwrap();
        std::fs::write(
            manual.join("axis.tex"),
            "\\begin{command}{\\addplot}Adds a plot.\\end{command}",
        )
        .unwrap();
        let mut config = Config::for_root(dir.path().join("manuals"));
        config.output.dir = dir.path().join("out");

        let handle = Arc::new(KnowledgeHandle::new(knowledge()));
        let app = router(AppState::new(config, handle.clone()));
        let (status, body) = send(app, post_json("/rebuild", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_items"], 1);
        assert_eq!(handle.health().total_items, 1);
        assert!(dir.path().join("out/knowledge-structured.json").is_file());
    }
}
