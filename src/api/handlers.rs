//! API Handlers
//!
//! HTTP request handlers for each price API endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::config::Config;
use crate::error::Result;
use crate::models::{ClearResponse, HealthResponse, PricePath, RemoveResponse, StatsResponse};
use crate::service::{PriceQuote, PriceService};

/// Application state shared across all handlers.
///
/// The price service is cheap to clone; its cache and executor are shared.
#[derive(Clone)]
pub struct AppState {
    pub service: PriceService,
}

impl AppState {
    /// Creates a new AppState around an existing service.
    pub fn new(service: PriceService) -> Self {
        Self { service }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(PriceService::from_config(config)?))
    }
}

/// Handler for GET /price/:app_id/:market_hash_name
///
/// Serves from the cache, falling back to the upstream through the executor.
pub async fn price_handler(
    State(state): State<AppState>,
    Path(path): Path<PricePath>,
) -> Result<Json<PriceQuote>> {
    let quote = state
        .service
        .price(path.app_id, &path.market_hash_name)
        .await?;
    Ok(Json(quote))
}

/// Handler for DELETE /cache/:key
///
/// Always succeeds; removing an absent key is a no-op.
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<RemoveResponse> {
    state.service.cache().remove(&key).await;
    Json(RemoveResponse::new(key))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.service.cache().clear().await;
    Json(ClearResponse::new())
}

/// Handler for GET /stats
///
/// Returns cache statistics and the breaker snapshot.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.service.cache().stats().await;
    let breaker = state.service.executor().breaker().snapshot();

    Json(StatsResponse::new(stats, breaker))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
