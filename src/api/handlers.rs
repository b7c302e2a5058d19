//! API Handlers
//!
//! HTTP request handlers for each endpoint of the cache service.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::TwoTierCache;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FlushResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Two-tier cache handle
    pub cache: TwoTierCache,
    /// Worker id claimed at startup, if any
    pub worker_id: Option<u16>,
}

impl AppState {
    /// Creates a new AppState around a cache handle.
    pub fn new(cache: TwoTierCache, worker_id: Option<u16>) -> Self {
        Self { cache, worker_id }
    }
}

/// Handler for PUT /set
///
/// Writes through to the remote store. `ttl` is the remote TTL in seconds;
/// omitted or zero stores the key without remote expiry.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = Duration::from_secs(req.ttl.unwrap_or(0));
    state.cache.set(&req.key, &req.value, ttl).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state.cache.get(&key).await?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.delete(&key).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /flush
///
/// Drops the local tier only.
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let dropped = state.cache.local().item_count();
    state.cache.flush();

    Json(FlushResponse::new(dropped))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.worker_id))
}
