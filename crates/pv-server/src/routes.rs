use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use pv_storage::{Period, StatsResponse};
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/store", get(get_store))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/{id}/history", get(get_history))
}

pub fn message_routes() -> Router<AppState> {
    Router::new().route("/api/v1/messages/search", get(search_messages))
}

// ========== Health ==========

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Palaver Statistics API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

// ========== Stats ==========

#[derive(Debug, Deserialize)]
struct StatsQuery {
    period: Option<String>,
}

async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let period = Period::from_param(query.period.as_deref());
    let stats = state.database.stats().collect(period).await?;
    Ok(Json(stats))
}

async fn get_store(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.store.stats()))
}

// ========== Users ==========

#[derive(Debug, Deserialize)]
struct CreateUser {
    id: i64,
    handle: Option<String>,
    display_name: String,
}

async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUser>,
) -> Result<Json<Value>, ApiError> {
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::bad_request("display_name must not be empty"));
    }
    let handle = body.handle.as_deref().filter(|h| !h.trim().is_empty());

    let identity = state.store.get_or_create_identity(body.id, handle, display_name);
    state.database.users().get_or_create(body.id, handle, display_name).await?;
    tracing::info!(user_id = body.id, "identity registered via API");

    Ok(Json(json!({
        "user_id": identity.user_id,
        "handle": identity.handle,
        "display_name": identity.display_name,
        "role": identity.role(),
        "created_at": identity.created_at,
    })))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_LIMIT);
    let turns = state
        .store
        .get_recent(id, limit)
        .ok_or_else(|| ApiError::not_found(format!("no conversation for user {id}")))?;
    Ok(Json(json!({
        "user_id": id,
        "count": turns.len(),
        "turns": turns,
    })))
}

// ========== Messages ==========

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    limit: Option<usize>,
}

async fn search_messages(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(ApiError::bad_request("query parameter 'q' is required"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_LIMIT);
    let results = state.database.messages().search(q, limit).await?;
    Ok(Json(json!({
        "query": q,
        "count": results.len(),
        "results": results,
    })))
}
