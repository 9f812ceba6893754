//! Read-side HTTP surface (§4.I): meetings/races endpoints for the UI,
//! fronted by response compression and request tracing.

pub mod compression;
pub mod routes;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{extract::Request, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::database::DbPool;
use routes::AppState;

#[derive(Clone, Copy)]
struct CompressionConfig {
    threshold_bytes: usize,
}

async fn compression_middleware(
    State(config): State<CompressionConfig>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    compression::compress_response(response, &headers, config.threshold_bytes).await
}

pub fn build_router(db_pool: DbPool, compression_threshold_bytes: usize) -> Router {
    let state = AppState { db_pool };
    let compression_config = CompressionConfig { threshold_bytes: compression_threshold_bytes };

    Router::new()
        .route("/health", get(routes::health))
        .route("/meetings", get(routes::list_meetings))
        .route("/meetings/:meeting_id", get(routes::get_meeting))
        .route("/races", get(routes::list_races))
        .route("/races/upcoming", get(routes::list_upcoming_races))
        .route("/races/:race_id", get(routes::get_race))
        .with_state(state)
        .layer(middleware::from_fn_with_state(compression_config, compression_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
