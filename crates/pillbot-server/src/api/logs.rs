//! Dose log API endpoints (mobile path).
//!
//! Status updates funnel through the same transition logic as hardware
//! reports, so stock side effects and duplicate short-circuits behave
//! identically no matter who reports first.

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use pillbot_core::{
    adherence_rate, apply_transition, DoseLog, DoseStatus, LogQuery, ReportedStatus,
    SnoozePolicy, TransitionRequest,
};

use crate::api::auth::CurrentUser;
use crate::api::error::ApiResult;
use crate::state::SharedState;

/// History endpoint row cap.
const HISTORY_LIMIT: usize = 100;

/// Creates the logs router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_logs))
        .route("/today", get(get_today))
        .route("/pending", get(get_pending))
        .route("/{id}", get(get_log_by_id))
        .route("/{id}/status", put(update_log_status))
        .route("/history/{medicine_id}", get(get_medicine_history))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing logs.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LogsQuery {
    /// Inclusive lower bound on the scheduled time (RFC 3339).
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the scheduled time (RFC 3339).
    pub end_date: Option<DateTime<Utc>>,
    /// Only logs with this status.
    pub status: Option<DoseStatus>,
}

/// Response carrying a list of dose logs.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogListResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Number of logs returned.
    #[schema(example = 3)]
    pub count: usize,
    /// The logs, ascending by scheduled time.
    pub data: Vec<DoseLog>,
}

/// Response carrying one dose log.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// The log.
    pub data: DoseLog,
}

/// Request body for updating a log's status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "taken"
}))]
pub struct UpdateLogStatusRequest {
    /// The reported outcome.
    pub status: ReportedStatus,
    /// Skip reason; stored in the log's notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Snooze duration in minutes; defaults to 15 on this path.
    #[serde(default)]
    pub snooze_minutes: Option<i64>,
}

/// Response after a status update.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpdateLogStatusResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Medicine marked as taken")]
    pub message: String,
    /// `false` when the report was acknowledged as a duplicate.
    pub applied: bool,
    /// `true` when a taken report found the stock already empty.
    pub out_of_stock: bool,
    /// The log after the update.
    pub data: DoseLog,
}

/// Per-medicine history statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryStats {
    /// Rows in the history window.
    pub total: usize,
    /// Taken (on time or late).
    pub taken: usize,
    /// Skipped.
    pub skipped: usize,
    /// Snoozed.
    pub snoozed: usize,
    /// Pending.
    pub pending: usize,
    /// Missed.
    pub missed: usize,
    /// Rate over the window.
    #[schema(minimum = 0, maximum = 100)]
    pub adherence_rate: u32,
}

/// Response for the per-medicine history endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Aggregate statistics over the returned rows.
    pub stats: HistoryStats,
    /// The rows, newest first, capped at 100.
    pub data: Vec<DoseLog>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's dose logs.
#[utoipa::path(
    get,
    path = "/api/logs",
    tag = "logs",
    operation_id = "getLogs",
    summary = "List dose logs",
    security(("bearer" = [])),
    params(LogsQuery),
    responses(
        (status = 200, description = "Logs retrieved", body = LogListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_logs(
    user: CurrentUser,
    State(state): State<SharedState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogListResponse>> {
    let guard = state.read().await;
    let data: Vec<DoseLog> = guard
        .ledger
        .query(
            user.id,
            LogQuery {
                start: query.start_date,
                end: query.end_date,
                status: query.status,
            },
        )
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(LogListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Today's schedule.
#[utoipa::path(
    get,
    path = "/api/logs/today",
    tag = "logs",
    operation_id = "getTodaySchedule",
    summary = "Today's schedule",
    description = "All of the caller's doses for the current calendar day \
        in the configured timezone, every status included.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Today's logs retrieved", body = LogListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_today(
    user: CurrentUser,
    State(state): State<SharedState>,
) -> ApiResult<Json<LogListResponse>> {
    let guard = state.read().await;
    let tz = guard.config.timezone;
    let today = pillbot_core::local_date_of(Utc::now(), tz);
    let data: Vec<DoseLog> = guard
        .ledger
        .for_day(user.id, today, tz)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(LogListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Pending doses that are already due.
#[utoipa::path(
    get,
    path = "/api/logs/pending",
    tag = "logs",
    operation_id = "getPendingLogs",
    summary = "Due pending doses",
    description = "Pending doses whose scheduled time has passed and which \
        have received no update yet. No background sweep expires these; they \
        stay pending until a report arrives.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pending logs retrieved", body = LogListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_pending(
    user: CurrentUser,
    State(state): State<SharedState>,
) -> ApiResult<Json<LogListResponse>> {
    let guard = state.read().await;
    let data: Vec<DoseLog> = guard
        .ledger
        .pending_due(user.id, Utc::now())
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(LogListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Get one dose log by id.
#[utoipa::path(
    get,
    path = "/api/logs/{id}",
    tag = "logs",
    operation_id = "getLogById",
    summary = "Get a dose log",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Dose log id")),
    responses(
        (status = 200, description = "Log retrieved", body = LogResponse),
        (status = 404, description = "Log not found"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_log_by_id(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LogResponse>> {
    let guard = state.read().await;
    let data = guard.ledger.get(user.id, id)?.clone();

    Ok(Json(LogResponse {
        success: true,
        data,
    }))
}

/// Report a dose outcome from the mobile app.
#[utoipa::path(
    put,
    path = "/api/logs/{id}/status",
    tag = "logs",
    operation_id = "updateLogStatus",
    summary = "Update a dose status",
    description = "Applies one state-machine transition. Taken doses also \
        decrement the medicine's stock. A report matching an already-settled \
        outcome is acknowledged without side effects; a conflicting one \
        fails with 409.",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Dose log id")),
    request_body = UpdateLogStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateLogStatusResponse),
        (status = 404, description = "Log not found"),
        (status = 409, description = "Dose already settled with a different outcome"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_log_status(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLogStatusRequest>,
) -> ApiResult<Json<UpdateLogStatusResponse>> {
    let mut guard = state.write().await;
    let state = &mut *guard;

    let status = request.status;
    let transition = TransitionRequest {
        status,
        notes: request.notes,
        snooze_minutes: request.snooze_minutes,
        snooze_count_override: None,
        policy: SnoozePolicy::Plain,
    };
    let outcome = apply_transition(
        &mut state.ledger,
        &mut state.medicines,
        user.id,
        id,
        &transition,
        Utc::now(),
    )?;

    Ok(Json(UpdateLogStatusResponse {
        success: true,
        message: format!("Medicine marked as {}", outcome.log.status),
        applied: outcome.applied,
        out_of_stock: outcome.out_of_stock,
        data: outcome.log,
    }))
}

/// History of one medicine with aggregate statistics.
#[utoipa::path(
    get,
    path = "/api/logs/history/{medicine_id}",
    tag = "logs",
    operation_id = "getMedicineHistory",
    summary = "Per-medicine history",
    security(("bearer" = [])),
    params(("medicine_id" = Uuid, Path, description = "Medicine id")),
    responses(
        (status = 200, description = "History retrieved", body = HistoryResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_medicine_history(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(medicine_id): Path<Uuid>,
) -> ApiResult<Json<HistoryResponse>> {
    let guard = state.read().await;
    let data: Vec<DoseLog> = guard
        .ledger
        .history(user.id, medicine_id, HISTORY_LIMIT)
        .into_iter()
        .cloned()
        .collect();

    let count = |status: DoseStatus| data.iter().filter(|l| l.status == status).count();
    let taken = data.iter().filter(|l| l.status.counts_as_taken()).count();
    let stats = HistoryStats {
        total: data.len(),
        taken,
        skipped: count(DoseStatus::Skipped),
        snoozed: count(DoseStatus::Snoozed),
        pending: count(DoseStatus::Pending),
        missed: count(DoseStatus::Missed),
        adherence_rate: adherence_rate(taken, data.len()),
    };

    Ok(Json(HistoryResponse {
        success: true,
        stats,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_request_defaults() {
        let request: UpdateLogStatusRequest =
            serde_json::from_str(r#"{"status": "snoozed"}"#).unwrap();
        assert_eq!(request.status, ReportedStatus::Snoozed);
        assert!(request.notes.is_none());
        assert!(request.snooze_minutes.is_none());
    }

    #[test]
    fn test_logs_query_parses_status() {
        let query: LogsQuery = serde_urlencoded::from_str("status=taken_late").unwrap();
        assert_eq!(query.status, Some(DoseStatus::TakenLate));
    }
}
