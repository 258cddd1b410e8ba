//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `auth` - Account registration, login, profile and setup
//! - `medicines` - Medicine registry and low-stock alerts
//! - `logs` - Dose schedule queries and status updates
//! - `analytics` - Adherence statistics, insights and patterns
//! - `hardware` - Device-facing schedule pull and status reports
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod analytics;
pub mod auth;
pub mod error;
pub mod hardware;
pub mod health;
pub mod logs;
pub mod medicines;
pub mod openapi;

// Re-export commonly used types
#[allow(unused_imports)]
pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
#[allow(unused_imports)]
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /docs                  - Swagger UI
/// /api
/// ├── /auth              - Registration, login, profile, setup
/// ├── /medicines         - Medicine registry and low-stock alerts
/// ├── /logs              - Dose schedule and status updates
/// ├── /analytics         - Adherence, insights, patterns
/// ├── /hardware          - Device-facing endpoints (bot-id identified)
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                // Accounts and sessions
                .nest("/auth", auth::router())
                // Medicine registry
                .nest("/medicines", medicines::router())
                // Dose logs
                .nest("/logs", logs::router())
                // Adherence analytics
                .nest("/analytics", analytics::router())
                // Dispenser-facing endpoints
                .nest("/hardware", hardware::router()),
        )
        .merge(SwaggerUi::new("/docs").url("/api/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .with_state(state)
}
