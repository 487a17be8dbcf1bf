//! API 模块
//!
//! 提供 REST API 支持。

#[cfg(test)]
mod api_tests;
pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use crate::api::app_state::AppState;
use crate::observability::{create_observability_router, track_requests};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: AppState) -> Router {
    let observability = app_state.observability.clone();
    let api = Router::new()
        .merge(routes::ask_routes::create_ask_router())
        .merge(routes::compare_routes::create_compare_router());

    Router::new()
        .nest("/api/v1", api)
        .with_state(app_state)
        .merge(create_observability_router(observability.clone()))
        .layer(axum::middleware::from_fn_with_state(
            observability,
            track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
