//! Adherence analytics API endpoints.
//!
//! All three endpoints are pure reads over the caller's dose history; the
//! heavy lifting lives in `pillbot_core::analytics`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use pillbot_core::{
    adherence_summary, build_insights, pattern_analysis, AdherenceSummary, Insight,
    PatternAnalysis, Period,
};

use crate::api::auth::CurrentUser;
use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Window for insights and pattern analysis, matching the monthly report
/// the mobile client renders.
const PATTERN_WINDOW_DAYS: i64 = 30;

/// Creates the analytics router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/adherence", get(get_adherence))
        .route("/insights", get(get_insights))
        .route("/patterns", get(get_patterns))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the adherence endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AdherenceQuery {
    /// Reporting period; defaults to `week`.
    pub period: Option<Period>,
}

/// Response carrying the adherence summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdherenceResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// The summary.
    pub data: AdherenceSummary,
}

/// Response carrying generated insights.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InsightsResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Number of insights.
    #[schema(example = 2)]
    pub count: usize,
    /// The insights, in rule order.
    pub data: Vec<Insight>,
}

/// Response carrying the pattern analysis.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PatternsResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// The analysis.
    pub data: PatternAnalysis,
}

// ============================================================================
// Handlers
// ============================================================================

/// Adherence statistics for a period.
#[utoipa::path(
    get,
    path = "/api/analytics/adherence",
    tag = "analytics",
    operation_id = "getAdherenceStats",
    summary = "Adherence statistics",
    description = "Overview counters, adherence rate, daily breakdown and \
        per-medicine breakdown over the requested period (week, month or \
        year, ending now).",
    security(("bearer" = [])),
    params(AdherenceQuery),
    responses(
        (status = 200, description = "Statistics computed", body = AdherenceResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_adherence(
    user: CurrentUser,
    State(state): State<SharedState>,
    Query(query): Query<AdherenceQuery>,
) -> ApiResult<Json<AdherenceResponse>> {
    let guard = state.read().await;
    let period = query.period.unwrap_or_default();
    let end = Utc::now();
    let start = end - Duration::days(i64::try_from(period.days()).unwrap_or(7));

    let logs = guard.ledger.for_user(user.id);
    let data = adherence_summary(&logs, period, start, end, guard.config.timezone);

    Ok(Json(AdherenceResponse {
        success: true,
        data,
    }))
}

/// Rule-based insights over the last 30 days.
#[utoipa::path(
    get,
    path = "/api/analytics/insights",
    tag = "analytics",
    operation_id = "getInsights",
    summary = "Adherence insights",
    description = "Ordered, independently evaluated rules: adherence band, \
        weakest time of day, streak celebration, trend prediction and \
        low-stock warning. Several can fire at once.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Insights generated", body = InsightsResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_insights(
    user: CurrentUser,
    State(state): State<SharedState>,
) -> ApiResult<Json<InsightsResponse>> {
    let guard = state.read().await;
    let now = Utc::now();
    let start = now - Duration::days(PATTERN_WINDOW_DAYS);

    let logs: Vec<&pillbot_core::DoseLog> = guard
        .ledger
        .for_user(user.id)
        .into_iter()
        .filter(|l| l.scheduled_time >= start && l.scheduled_time <= now)
        .collect();
    // The insight fires below the threshold, not at it; the alerts
    // endpoint is the inclusive one.
    let threshold = guard.config.low_stock_threshold;
    let low_stock = guard
        .medicines
        .active_for_user(user.id)
        .iter()
        .filter(|m| m.remaining < threshold)
        .count();

    let data = build_insights(&logs, low_stock, guard.config.timezone, now);

    Ok(Json(InsightsResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Day-of-week and time-of-day patterns over the last 30 days.
#[utoipa::path(
    get,
    path = "/api/analytics/patterns",
    tag = "analytics",
    operation_id = "getPatternAnalysis",
    summary = "Pattern analysis",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Patterns computed", body = PatternsResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_patterns(
    user: CurrentUser,
    State(state): State<SharedState>,
) -> ApiResult<Json<PatternsResponse>> {
    let guard = state.read().await;
    let now = Utc::now();
    let start = now - Duration::days(PATTERN_WINDOW_DAYS);

    let logs: Vec<&pillbot_core::DoseLog> = guard
        .ledger
        .for_user(user.id)
        .into_iter()
        .filter(|l| l.scheduled_time >= start && l.scheduled_time <= now)
        .collect();
    let data = pattern_analysis(&logs, guard.config.timezone);

    Ok(Json(PatternsResponse {
        success: true,
        data,
    }))
}
