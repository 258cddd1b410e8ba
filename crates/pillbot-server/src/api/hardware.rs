//! Device-facing API endpoints.
//!
//! The dispenser identifies itself with a bot id instead of a bearer
//! token; registration binds that id to a user account. The schedule pull
//! marks returned rows synced as a side effect of the read (an
//! at-least-once handoff), and status reports are reconciled through the
//! same transition logic the mobile path uses.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use pillbot_core::{
    day_bounds, local_date_of, BulkItemOutcome, DoseLog, DoseStatus, Medicine, StatusReport,
    TimeOfDay,
};

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the hardware router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/schedule", get(get_schedule))
        .route("/slots", get(get_slots))
        .route("/update-status", post(update_status))
        .route("/bulk-update", post(bulk_update))
        .route("/register", post(register_device))
        .route("/health", get(hardware_health))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the schedule pull.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ScheduleQuery {
    /// The dispenser's id.
    #[param(example = "MD-BOT-07")]
    pub bot_id: String,
    /// Window start (RFC 3339); defaults to the start of the current day.
    pub start_time: Option<DateTime<Utc>>,
    /// Window end (RFC 3339); defaults to the end of the current day.
    pub end_time: Option<DateTime<Utc>>,
}

/// One dose as the dispenser sees it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HardwareDose {
    /// Dose log id; echoed back in status reports.
    pub log_id: Uuid,
    /// Medicine name.
    #[schema(example = "Aspirin")]
    pub medicine_name: String,
    /// Dosage.
    #[schema(example = "100mg")]
    pub dosage: String,
    /// Dispenser slot.
    #[schema(example = "3")]
    pub slot: String,
    /// When the dose is due.
    pub scheduled_time: DateTime<Utc>,
    /// Current status (pending or snoozed).
    pub status: DoseStatus,
    /// Snoozes so far.
    pub snooze_count: u32,
    /// When the current snooze expires, if snoozed.
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl From<DoseLog> for HardwareDose {
    fn from(log: DoseLog) -> Self {
        Self {
            log_id: log.id,
            medicine_name: log.medicine_name,
            dosage: log.dosage,
            slot: log.slot,
            scheduled_time: log.scheduled_time,
            status: log.status,
            snooze_count: log.snooze_count,
            snoozed_until: log.snoozed_until,
        }
    }
}

/// Response for the schedule pull.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HardwareScheduleResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Number of doses returned.
    #[schema(example = 2)]
    pub count: usize,
    /// Doses to dispense, ascending by scheduled time. Each returned row
    /// is marked synced before the response is sent.
    pub data: Vec<HardwareDose>,
}

/// One slot in the dispenser's configuration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotConfig {
    /// Slot identifier.
    #[schema(example = "3")]
    pub slot: String,
    /// Medicine loaded in the slot.
    pub medicine_id: Uuid,
    /// Its name.
    #[schema(example = "Aspirin")]
    pub medicine_name: String,
    /// Its dosage.
    #[schema(example = "100mg")]
    pub dosage: String,
    /// Daily dispense times.
    #[schema(value_type = Vec<String>, example = json!(["08:00", "20:00"]))]
    pub times: Vec<TimeOfDay>,
    /// Doses remaining.
    pub remaining: u32,
}

impl From<&Medicine> for SlotConfig {
    fn from(medicine: &Medicine) -> Self {
        Self {
            slot: medicine.slot.clone(),
            medicine_id: medicine.id,
            medicine_name: medicine.name.clone(),
            dosage: medicine.dosage.clone(),
            times: medicine.times.clone(),
            remaining: medicine.remaining,
        }
    }
}

/// Response for the slot configuration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotsResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Number of occupied slots.
    #[schema(example = 4)]
    pub count: usize,
    /// The slot map.
    pub data: Vec<SlotConfig>,
}

/// Request body for a single status report.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "bot_id": "MD-BOT-07",
    "log_id": "7f8a6e2e-1f4b-4f6a-9df0-3a1f2b4c5d6e",
    "status": "dispensed",
    "seq": 42
}))]
pub struct UpdateStatusRequest {
    /// The dispenser's id.
    pub bot_id: String,
    /// The dose being reported on.
    pub log_id: Uuid,
    /// Reported outcome.
    pub status: pillbot_core::ReportedStatus,
    /// When the event happened on the device.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Device-side snooze counter; overrides the locally tracked one.
    #[serde(default)]
    pub snooze_count: Option<u32>,
    /// Monotonic per-device sequence number.
    #[serde(default)]
    pub seq: Option<u64>,
}

/// Response after a single status report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpdateStatusResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Medicine status updated successfully")]
    pub message: String,
    /// `false` when the report was acknowledged as a duplicate or stale
    /// delivery.
    pub applied: bool,
    /// `true` when a dispense report found the stock already empty.
    pub out_of_stock: bool,
    /// The log after the report.
    pub data: DoseLog,
}

/// Request body for a bulk report.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkUpdateRequest {
    /// The dispenser's id.
    #[schema(example = "MD-BOT-07")]
    pub bot_id: String,
    /// Reports, applied independently.
    pub updates: Vec<StatusReport>,
}

/// Response after a bulk report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkUpdateResponse {
    /// Always `true` (per-item failures are in `results`).
    #[schema(example = true)]
    pub success: bool,
    /// Items processed without error.
    #[schema(example = 5)]
    pub succeeded: usize,
    /// Items that failed.
    #[schema(example = 1)]
    pub failed: usize,
    /// Per-item outcomes, in request order.
    pub results: Vec<BulkItemOutcome>,
}

/// Request body for device registration.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "bot_id": "MD-BOT-07",
    "user_id": "a81bc81b-dead-4e5d-abff-90865d1e13b1"
}))]
pub struct RegisterDeviceRequest {
    /// The dispenser's id.
    pub bot_id: String,
    /// Account the dispenser will report for.
    pub user_id: Uuid,
}

/// Response after device registration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterDeviceResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Device registered successfully")]
    pub message: String,
}

/// Query parameters for the hardware health check.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct HardwareHealthQuery {
    /// When present, the response reports whether this bot is registered.
    #[param(example = "MD-BOT-07")]
    pub bot_id: Option<String>,
}

/// Hardware health response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HardwareHealthResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Status message.
    #[schema(example = "Hardware API is running")]
    pub message: String,
    /// Server time, for device clock sanity checks.
    pub timestamp: DateTime<Utc>,
    /// Whether the queried bot id is registered; absent without `bot_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered: Option<bool>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Pull the due schedule for a device.
#[utoipa::path(
    get,
    path = "/api/hardware/schedule",
    tag = "hardware",
    operation_id = "getHardwareSchedule",
    summary = "Pull the due schedule",
    description = "Returns pending and snoozed doses in the window that have \
        not been handed to the device yet, and marks them synced. This is an \
        at-least-once handoff: rows are flagged before the response travels, \
        so a healthy pull delivers each dose exactly once.",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Schedule pulled", body = HardwareScheduleResponse),
        (status = 404, description = "Device not registered")
    )
)]
pub async fn get_schedule(
    State(state): State<SharedState>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Json<HardwareScheduleResponse>> {
    let mut guard = state.write().await;
    let now = Utc::now();
    let (day_start, day_end) = day_bounds(local_date_of(now, guard.config.timezone), guard.config.timezone);
    let start = query.start_time.unwrap_or(day_start);
    let end = query.end_time.unwrap_or(day_end);

    let state = &mut *guard;
    let pulled = state
        .gateway
        .pull_schedule(&mut state.ledger, &query.bot_id, start, end, now)?;

    let data: Vec<HardwareDose> = pulled.into_iter().map(HardwareDose::from).collect();
    Ok(Json(HardwareScheduleResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Current slot → medicine mapping for a device.
#[utoipa::path(
    get,
    path = "/api/hardware/slots",
    tag = "hardware",
    operation_id = "getSlotConfiguration",
    summary = "Slot configuration",
    params(HardwareHealthQuery),
    responses(
        (status = 200, description = "Slot map retrieved", body = SlotsResponse),
        (status = 404, description = "Device not registered")
    )
)]
pub async fn get_slots(
    State(state): State<SharedState>,
    Query(query): Query<HardwareHealthQuery>,
) -> ApiResult<Json<SlotsResponse>> {
    let guard = state.read().await;
    let bot_id = query.bot_id.ok_or_else(|| ApiError::BadRequest {
        error_code: "missing_bot_id".to_string(),
        message: "bot_id query parameter is required".to_string(),
        errors: None,
    })?;
    let user_id = guard.gateway.resolve(&bot_id)?;

    let mut data: Vec<SlotConfig> = guard
        .medicines
        .active_for_user(user_id)
        .into_iter()
        .map(SlotConfig::from)
        .collect();
    data.sort_by(|a, b| a.slot.cmp(&b.slot));

    Ok(Json(SlotsResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Report one dose outcome from a device.
#[utoipa::path(
    post,
    path = "/api/hardware/update-status",
    tag = "hardware",
    operation_id = "updateStatusFromHardware",
    summary = "Report a dose outcome",
    description = "Applies one state-machine transition. Dispensed doses \
        decrement stock; duplicate and stale deliveries (same terminal \
        outcome, or a seq at or below the device's cursor) are acknowledged \
        without side effects. Three snoozes escalate the dose to missed.",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateStatusResponse),
        (status = 404, description = "Device not registered or log not found"),
        (status = 409, description = "Dose already settled with a different outcome")
    )
)]
pub async fn update_status(
    State(state): State<SharedState>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UpdateStatusResponse>> {
    let mut guard = state.write().await;
    let state = &mut *guard;

    let report = StatusReport {
        log_id: request.log_id,
        status: request.status,
        timestamp: request.timestamp,
        snooze_count: request.snooze_count,
        seq: request.seq,
    };
    let outcome = state.gateway.report_status(
        &mut state.ledger,
        &mut state.medicines,
        &request.bot_id,
        &report,
        Utc::now(),
    )?;

    Ok(Json(UpdateStatusResponse {
        success: true,
        message: "Medicine status updated successfully".to_string(),
        applied: outcome.applied,
        out_of_stock: outcome.out_of_stock,
        data: outcome.log,
    }))
}

/// Report a batch of dose outcomes from a device.
#[utoipa::path(
    post,
    path = "/api/hardware/bulk-update",
    tag = "hardware",
    operation_id = "bulkUpdateStatus",
    summary = "Report outcomes in bulk",
    description = "Applies each report independently; one failing item \
        never aborts the batch. The response carries a per-item outcome \
        list and aggregate counts.",
    request_body = BulkUpdateRequest,
    responses(
        (status = 200, description = "Batch processed", body = BulkUpdateResponse),
        (status = 404, description = "Device not registered")
    )
)]
pub async fn bulk_update(
    State(state): State<SharedState>,
    Json(request): Json<BulkUpdateRequest>,
) -> ApiResult<Json<BulkUpdateResponse>> {
    let mut guard = state.write().await;
    let state = &mut *guard;

    let outcome = state.gateway.bulk_report(
        &mut state.ledger,
        &mut state.medicines,
        &request.bot_id,
        &request.updates,
        Utc::now(),
    )?;

    Ok(Json(BulkUpdateResponse {
        success: true,
        succeeded: outcome.succeeded,
        failed: outcome.failed,
        results: outcome.items,
    }))
}

/// Bind a device to a user account.
#[utoipa::path(
    post,
    path = "/api/hardware/register",
    tag = "hardware",
    operation_id = "registerDevice",
    summary = "Register a device",
    description = "Binds a bot id to a user account, overwriting any prior \
        binding for that id (last-writer-wins).",
    request_body = RegisterDeviceRequest,
    responses(
        (status = 200, description = "Device registered", body = RegisterDeviceResponse),
        (status = 404, description = "User not found"),
        (status = 400, description = "Missing bot id")
    )
)]
pub async fn register_device(
    State(state): State<SharedState>,
    Json(request): Json<RegisterDeviceRequest>,
) -> ApiResult<Json<RegisterDeviceResponse>> {
    let mut guard = state.write().await;
    if !guard.accounts.exists(request.user_id) {
        return Err(pillbot_core::CoreError::UserNotFound.into());
    }
    guard
        .gateway
        .register_device(&request.bot_id, request.user_id)?;
    tracing::info!(bot_id = %request.bot_id, user_id = %request.user_id, "device registered");

    Ok(Json(RegisterDeviceResponse {
        success: true,
        message: "Device registered successfully".to_string(),
    }))
}

/// Hardware-facing health check.
#[utoipa::path(
    get,
    path = "/api/hardware/health",
    tag = "hardware",
    operation_id = "hardwareHealthCheck",
    summary = "Hardware health check",
    params(HardwareHealthQuery),
    responses(
        (status = 200, description = "API reachable", body = HardwareHealthResponse)
    )
)]
pub async fn hardware_health(
    State(state): State<SharedState>,
    Query(query): Query<HardwareHealthQuery>,
) -> ApiResult<Json<HardwareHealthResponse>> {
    let guard = state.read().await;
    let registered = query
        .bot_id
        .as_deref()
        .map(|bot_id| guard.gateway.binding(bot_id).is_some());

    Ok(Json(HardwareHealthResponse {
        success: true,
        message: "Hardware API is running".to_string(),
        timestamp: Utc::now(),
        registered,
    }))
}
