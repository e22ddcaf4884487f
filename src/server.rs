use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::models::{Filters, NormalizedRow, Snapshot};
use crate::{dashboard, db, import};

/// Hard cap on the row-listing page size.
const MAX_PAGE_SIZE: usize = 200;
const DEFAULT_PAGE_SIZE: usize = 50;

/// Explicit server configuration; no process-wide defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
}

/// Plain-text error responses; clients render the body as-is.
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(msg: &str) -> Self {
        ApiError(StatusCode::BAD_REQUEST, msg.to_string())
    }

    fn not_found(msg: &str) -> Self {
        ApiError(StatusCode::NOT_FOUND, msg.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(86_400));

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.trim().parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_router(pool: PgPool, config: &ServerConfig) -> Router {
    let state = AppState { pool };
    Router::new()
        .route("/api/health", get(health))
        .route("/api/import", post(import_batch))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/rows", get(list_rows))
        .route("/api/snapshots", post(save_snapshot).get(list_snapshots))
        .route("/api/snapshots/:id", get(get_snapshot))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}

pub async fn serve(pool: PgPool, config: ServerConfig) -> anyhow::Result<()> {
    let app = build_router(pool, &config);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("listening on http://{}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    #[serde(default)]
    import_label: Option<String>,
    #[serde(default)]
    rows: Vec<NormalizedRow>,
}

async fn import_batch(
    State(state): State<AppState>,
    Json(body): Json<ImportRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.rows.is_empty() {
        return Err(ApiError::bad_request("no rows to import"));
    }
    let receipt = import::import_rows(&state.pool, body.import_label, body.rows).await?;
    Ok(Json(json!({
        "ok": true,
        "importedAt": receipt.imported_at,
        "importLabel": receipt.import_label,
        "inserted": receipt.inserted,
    })))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Query(filters): Query<Filters>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = db::fetch_rows(&state.pool).await?;
    let dash = dashboard::build_dashboard(&rows, &filters);
    Ok(Json(serde_json::to_value(dash).map_err(anyhow::Error::from)?))
}

#[derive(Debug, Deserialize)]
struct RowsQuery {
    #[serde(flatten)]
    filters: Filters,
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    offset: Option<String>,
}

fn page_limit(raw: &Option<String>) -> usize {
    raw.as_deref()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE)
}

fn page_offset(raw: &Option<String>) -> usize {
    raw.as_deref().and_then(|s| s.parse::<usize>().ok()).unwrap_or(0)
}

async fn list_rows(
    State(state): State<AppState>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = page_limit(&query.limit);
    let offset = page_offset(&query.offset);

    let rows = db::fetch_rows(&state.pool).await?;
    let filtered: Vec<_> = rows
        .into_iter()
        .filter(|r| crate::filter::matches(&query.filters, r))
        .collect();
    let total = filtered.len();
    let items: Vec<_> = filtered.into_iter().skip(offset).take(limit).collect();

    Ok(Json(json!({
        "total": total,
        "limit": limit,
        "offset": offset,
        "items": items,
    })))
}

#[derive(Debug, Deserialize)]
struct SaveSnapshotRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    filters: Option<Filters>,
}

async fn save_snapshot(
    State(state): State<AppState>,
    Json(body): Json<SaveSnapshotRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = body.name.as_deref().unwrap_or("").trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("snapshot name is required"));
    }
    let filters = body.filters.unwrap_or_default();

    let rows = db::fetch_rows(&state.pool).await?;
    let dash = dashboard::build_dashboard(&rows, &filters);

    let snapshot = Snapshot {
        id: Uuid::new_v4(),
        created_at: chrono::Utc::now(),
        name,
        filters,
        dashboard: dash,
    };
    db::insert_snapshot(&state.pool, &snapshot).await?;

    Ok(Json(json!({ "ok": true, "id": snapshot.id })))
}

async fn list_snapshots(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let items = db::list_snapshots(&state.pool).await?;
    Ok(Json(json!({ "items": items })))
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Err(ApiError::not_found("snapshot not found"));
    };
    match db::get_snapshot(&state.pool, id).await? {
        Some(snapshot) => {
            Ok(Json(serde_json::to_value(snapshot).map_err(anyhow::Error::from)?))
        }
        None => Err(ApiError::not_found("snapshot not found")),
    }
}
