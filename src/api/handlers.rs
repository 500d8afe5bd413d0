//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ContainsResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse, ValuesResponse,
};

/// Application state shared across all handlers.
///
/// The cache handle is itself cheap to clone and synchronizes internally.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: TtlCache<String, String>,
}

impl AppState {
    pub fn new(cache: TtlCache<String, String>) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Expired keys are reported through the log. Must be called inside a tokio runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = config
            .cache_options()
            .with_on_expired(|key: String, value: String| {
                info!(%key, value_len = value.len(), "key expired");
            });
        Ok(Self::new(TtlCache::new(options)?))
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    match req.ttl {
        Some(ttl) => state.cache.insert_with_ttl(req.key.clone(), req.value, ttl),
        None => state.cache.insert(req.key.clone(), req.value),
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    // may have expired since the lookup
    let ttl_remaining = state
        .cache
        .ttl_remaining(&key)
        .ok()
        .flatten()
        .map(|remaining| remaining.as_secs());

    Ok(Json(GetResponse::new(key, value, ttl_remaining)))
}

/// Handler for GET /contains/:key
pub async fn contains_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ContainsResponse> {
    let present = state.cache.contains(&key);
    Json(ContainsResponse { key, present })
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.remove(&key)?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /values
///
/// Returns a point-in-time snapshot of every stored value.
pub async fn values_handler(State(state): State<AppState>) -> Json<ValuesResponse> {
    Json(ValuesResponse::new(state.cache.snapshot().into_vec()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
