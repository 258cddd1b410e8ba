//! Medicine API endpoints.
//!
//! Registering a medicine also triggers the schedule generator for the
//! configured forward window; the resulting dose entries land in the
//! ledger, which skips any (medicine, scheduled-time) pair that already
//! exists.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use pillbot_core::{
    expand_schedule, Medicine, MedicineCategory, MedicineFilter, MedicinePatch, NewMedicine,
};

use crate::api::auth::CurrentUser;
use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the medicines router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_medicines).post(add_medicine))
        .route(
            "/{id}",
            get(get_medicine).put(update_medicine).delete(delete_medicine),
        )
        .route("/alerts/low-stock", get(low_stock))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response carrying one medicine.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MedicineResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Medicine added successfully")]
    pub message: String,
    /// The medicine.
    pub data: Medicine,
}

/// Response carrying a list of medicines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MedicineListResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// Number of medicines returned.
    #[schema(example = 2)]
    pub count: usize,
    /// The medicines.
    pub data: Vec<Medicine>,
}

/// Response for deletion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteMedicineResponse {
    /// Always `true`.
    #[schema(example = true)]
    pub success: bool,
    /// What happened.
    #[schema(example = "Medicine deleted successfully")]
    pub message: String,
}

/// Query parameters for listing medicines.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct MedicineListQuery {
    /// Only medicines with this active flag.
    pub is_active: Option<bool>,
    /// Only medicines in this category.
    pub category: Option<MedicineCategory>,
}

/// Query parameters for the low-stock alert.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LowStockQuery {
    /// Alert threshold; defaults to the configured value.
    #[param(example = 7)]
    pub threshold: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new medicine and generate its forward schedule.
#[utoipa::path(
    post,
    path = "/api/medicines",
    tag = "medicines",
    operation_id = "addMedicine",
    summary = "Register a medicine",
    description = "Registers a medicine and expands its daily times into \
        pending dose entries for the configured forward window. Fails when \
        an active medicine of the caller already occupies the requested slot.",
    security(("bearer" = [])),
    request_body = NewMedicine,
    responses(
        (status = 201, description = "Medicine created", body = MedicineResponse),
        (status = 400, description = "Validation failed or slot in use"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn add_medicine(
    user: CurrentUser,
    State(state): State<SharedState>,
    Json(request): Json<NewMedicine>,
) -> ApiResult<(StatusCode, Json<MedicineResponse>)> {
    let mut guard = state.write().await;
    let medicine = guard.medicines.register(user.id, request)?;

    let window_days = guard.config.schedule_window_days;
    let tz = guard.config.timezone;
    let entries = expand_schedule(&medicine, Utc::now(), window_days, tz);
    let generated = guard.ledger.insert_new(entries)?;
    tracing::info!(
        medicine = %medicine.name,
        medicine_id = %medicine.id,
        generated,
        "medicine registered, schedule expanded"
    );

    Ok((
        StatusCode::CREATED,
        Json(MedicineResponse {
            success: true,
            message: "Medicine added successfully".to_string(),
            data: medicine,
        }),
    ))
}

/// List the caller's medicines.
#[utoipa::path(
    get,
    path = "/api/medicines",
    tag = "medicines",
    operation_id = "getMedicines",
    summary = "List medicines",
    security(("bearer" = [])),
    params(MedicineListQuery),
    responses(
        (status = 200, description = "Medicines retrieved", body = MedicineListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_medicines(
    user: CurrentUser,
    State(state): State<SharedState>,
    Query(query): Query<MedicineListQuery>,
) -> ApiResult<Json<MedicineListResponse>> {
    let guard = state.read().await;
    let filter = MedicineFilter {
        is_active: query.is_active,
        category: query.category,
    };
    let data: Vec<Medicine> = guard
        .medicines
        .list(user.id, filter)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(MedicineListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Get one medicine by id.
#[utoipa::path(
    get,
    path = "/api/medicines/{id}",
    tag = "medicines",
    operation_id = "getMedicineById",
    summary = "Get a medicine",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Medicine id")),
    responses(
        (status = 200, description = "Medicine retrieved", body = MedicineResponse),
        (status = 404, description = "Medicine not found"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_medicine(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MedicineResponse>> {
    let guard = state.read().await;
    let medicine = guard.medicines.get(user.id, id)?.clone();

    Ok(Json(MedicineResponse {
        success: true,
        message: "Medicine retrieved".to_string(),
        data: medicine,
    }))
}

/// Update a medicine.
#[utoipa::path(
    put,
    path = "/api/medicines/{id}",
    tag = "medicines",
    operation_id = "updateMedicine",
    summary = "Update a medicine",
    description = "Applies a partial update. When the slot changes, \
        exclusivity is re-validated against the caller's other active \
        medicines. Already-generated dose entries keep their snapshot of \
        the old name/dosage/slot.",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Medicine id")),
    request_body = MedicinePatch,
    responses(
        (status = 200, description = "Medicine updated", body = MedicineResponse),
        (status = 400, description = "Validation failed or slot in use"),
        (status = 404, description = "Medicine not found"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn update_medicine(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<MedicinePatch>,
) -> ApiResult<Json<MedicineResponse>> {
    let mut guard = state.write().await;
    let medicine = guard.medicines.update(user.id, id, patch)?;

    Ok(Json(MedicineResponse {
        success: true,
        message: "Medicine updated successfully".to_string(),
        data: medicine,
    }))
}

/// Soft-delete a medicine (clears the active flag).
#[utoipa::path(
    delete,
    path = "/api/medicines/{id}",
    tag = "medicines",
    operation_id = "deleteMedicine",
    summary = "Deactivate a medicine",
    description = "Soft delete: the medicine keeps its history and frees \
        its slot; existing dose entries are untouched.",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Medicine id")),
    responses(
        (status = 200, description = "Medicine deactivated", body = DeleteMedicineResponse),
        (status = 404, description = "Medicine not found"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn delete_medicine(
    user: CurrentUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteMedicineResponse>> {
    let mut guard = state.write().await;
    guard.medicines.deactivate(user.id, id)?;

    Ok(Json(DeleteMedicineResponse {
        success: true,
        message: "Medicine deleted successfully".to_string(),
    }))
}

/// List active medicines at or below the stock threshold.
#[utoipa::path(
    get,
    path = "/api/medicines/alerts/low-stock",
    tag = "medicines",
    operation_id = "getLowStockMedicines",
    summary = "Low-stock alert",
    security(("bearer" = [])),
    params(LowStockQuery),
    responses(
        (status = 200, description = "Low-stock medicines, ascending by remaining",
            body = MedicineListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn low_stock(
    user: CurrentUser,
    State(state): State<SharedState>,
    Query(query): Query<LowStockQuery>,
) -> ApiResult<Json<MedicineListResponse>> {
    let guard = state.read().await;
    let threshold = query.threshold.unwrap_or(guard.config.low_stock_threshold);
    let data: Vec<Medicine> = guard
        .medicines
        .list_low_stock(user.id, threshold)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(MedicineListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_accepts_bool_and_category() {
        let query: MedicineListQuery =
            serde_urlencoded::from_str("is_active=true&category=vitamin").unwrap();
        assert_eq!(query.is_active, Some(true));
        assert_eq!(query.category, Some(MedicineCategory::Vitamin));
    }

    #[test]
    fn test_low_stock_query_threshold_is_optional() {
        let query: LowStockQuery = serde_urlencoded::from_str("").unwrap();
        assert!(query.threshold.is_none());
    }
}
