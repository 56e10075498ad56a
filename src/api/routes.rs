//! API Routes
//!
//! Configures the Axum router with all price API endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, price_handler, remove_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /price/:app_id/:market_hash_name` - Cached price lookup
/// - `DELETE /cache/:key` - Remove one cache entry
/// - `DELETE /cache` - Clear the cache
/// - `GET /stats` - Cache statistics and breaker state
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/price/:app_id/:market_hash_name", get(price_handler))
        .route("/cache", delete(clear_handler))
        .route("/cache/:key", delete(remove_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
