//! OpenAPI specification generation for the pillbot API.
//!
//! This module generates an OpenAPI 3.0 specification consumed by the
//! mobile client's generated API layer and by the Swagger UI mounted at
//! `/docs`. Descriptions are written for both human developers and the
//! dispenser firmware authors.

use axum::Json;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use pillbot_core::{
    AdherenceSummary, BulkItemOutcome, DailyAdherence, DayOfWeekAdherence, DoseLog, DoseStatus,
    Frequency, Gender, HealthResponse, Insight, InsightKind, InsightPriority, Medicine,
    MedicineAdherence, MedicineCategory, MedicinePatch, NewAccount, NewMedicine, OverviewStats,
    PatternAnalysis, Period, ProfilePatch, ReportedStatus, StatusReport, TimeSlot,
    TimeSlotAdherence, UserProfile,
};

use super::analytics::{AdherenceResponse, InsightsResponse, PatternsResponse};
use super::auth::{
    AuthData, AuthResponse, CompleteSetupRequest, LoginRequest, ProfileResponse, SetupData,
    SetupResponse,
};
use super::error::{ErrorResponse, FieldError};
use super::hardware::{
    BulkUpdateRequest, BulkUpdateResponse, HardwareDose, HardwareHealthResponse,
    HardwareScheduleResponse, RegisterDeviceRequest, RegisterDeviceResponse, SlotConfig,
    SlotsResponse, UpdateStatusRequest, UpdateStatusResponse,
};
use super::logs::{
    HistoryResponse, HistoryStats, LogListResponse, LogResponse, UpdateLogStatusRequest,
    UpdateLogStatusResponse,
};
use super::medicines::{DeleteMedicineResponse, MedicineListResponse, MedicineResponse};

/// Serve the OpenAPI specification as JSON.
///
/// This endpoint is available at `/api/openapi.json` and returns the
/// complete OpenAPI 3.0 specification for the pillbot API.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a string (for writing to file).
/// Used by the gen-openapi binary.
#[allow(dead_code)]
#[must_use]
pub fn get_openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialize OpenAPI spec")
}

/// Registers the bearer security scheme referenced by the handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Main OpenAPI document structure for pillbot.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "pillbot API",
        version = "0.1.0",
        description = r#"
# pillbot API

pillbot tracks medication adherence for patients using a hardware pill
dispenser alongside a mobile app.

## Overview

This API provides:

1. **Medicine Registry**: Register medicines with daily times, a dispenser
   slot and a stock counter. One active medicine per slot.
2. **Dose Schedule**: Each registration expands into per-dose log entries
   for a forward window; every dose moves through
   pending → taken/taken_late/snoozed/skipped/missed exactly once.
3. **Reconciliation**: The mobile app (bearer token) and the dispenser
   (bot id) report outcomes through the same transition logic - duplicate
   deliveries are acknowledged without double-counting stock or adherence.
4. **Analytics**: Adherence rates, streaks, time-of-day and day-of-week
   patterns, and rule-based insights.

## For dispenser firmware

- **getHardwareSchedule**: Poll the due schedule. Returned doses are marked
  synced; each healthy pull delivers a dose once.
- **updateStatusFromHardware**: Report `dispensed`, `snoozed`, `skipped` or
  `missed`. Include a monotonic `seq` so retries are ignored safely.
  The third snooze of a dose escalates it to `missed`.
- **bulkUpdateStatus**: Batch variant; items fail independently.
- **registerDevice**: Bind the bot id to a user before anything else.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local pillbot server")
    ),
    modifiers(&SecurityAddon),
    tags(
        (
            name = "system",
            description = "Health checks and system status"
        ),
        (
            name = "auth",
            description = "Patient accounts, sessions, profile and setup"
        ),
        (
            name = "medicines",
            description = "Medicine registry with slot exclusivity and stock tracking"
        ),
        (
            name = "logs",
            description = "Per-dose schedule entries and their status lifecycle"
        ),
        (
            name = "analytics",
            description = "Adherence statistics, insights and patterns"
        ),
        (
            name = "hardware",
            description = "Device-facing endpoints identified by bot id"
        )
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Auth endpoints
        super::auth::register,
        super::auth::login,
        super::auth::get_profile,
        super::auth::update_profile,
        super::auth::complete_setup,
        // Medicine endpoints
        super::medicines::add_medicine,
        super::medicines::list_medicines,
        super::medicines::get_medicine,
        super::medicines::update_medicine,
        super::medicines::delete_medicine,
        super::medicines::low_stock,
        // Log endpoints
        super::logs::get_logs,
        super::logs::get_today,
        super::logs::get_pending,
        super::logs::get_log_by_id,
        super::logs::update_log_status,
        super::logs::get_medicine_history,
        // Analytics endpoints
        super::analytics::get_adherence,
        super::analytics::get_insights,
        super::analytics::get_patterns,
        // Hardware endpoints
        super::hardware::get_schedule,
        super::hardware::get_slots,
        super::hardware::update_status,
        super::hardware::bulk_update,
        super::hardware::register_device,
        super::hardware::hardware_health,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            FieldError,
            // Health types
            HealthResponse,
            // Auth types
            NewAccount,
            LoginRequest,
            Gender,
            UserProfile,
            ProfilePatch,
            AuthData,
            AuthResponse,
            ProfileResponse,
            CompleteSetupRequest,
            SetupData,
            SetupResponse,
            // Medicine types
            Medicine,
            NewMedicine,
            MedicinePatch,
            Frequency,
            MedicineCategory,
            MedicineResponse,
            MedicineListResponse,
            DeleteMedicineResponse,
            // Log types
            DoseLog,
            DoseStatus,
            ReportedStatus,
            LogListResponse,
            LogResponse,
            UpdateLogStatusRequest,
            UpdateLogStatusResponse,
            HistoryStats,
            HistoryResponse,
            // Analytics types
            Period,
            OverviewStats,
            DailyAdherence,
            MedicineAdherence,
            AdherenceSummary,
            TimeSlot,
            TimeSlotAdherence,
            DayOfWeekAdherence,
            PatternAnalysis,
            Insight,
            InsightKind,
            InsightPriority,
            AdherenceResponse,
            InsightsResponse,
            PatternsResponse,
            // Hardware types
            StatusReport,
            BulkItemOutcome,
            HardwareDose,
            HardwareScheduleResponse,
            SlotConfig,
            SlotsResponse,
            UpdateStatusRequest,
            UpdateStatusResponse,
            BulkUpdateRequest,
            BulkUpdateResponse,
            RegisterDeviceRequest,
            RegisterDeviceResponse,
            HardwareHealthResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "pillbot API");
        assert!(!spec.paths.paths.is_empty());
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"pillbot API\""));
    }

    #[test]
    fn test_hardware_paths_present() {
        let spec = ApiDoc::openapi();
        assert!(spec.paths.paths.contains_key("/api/hardware/schedule"));
        assert!(spec.paths.paths.contains_key("/api/hardware/update-status"));
        assert!(spec.paths.paths.contains_key("/api/logs/{id}/status"));
    }
}
