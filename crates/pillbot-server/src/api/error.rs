//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers with
//! automatic conversion to the JSON error envelope
//! `{success: false, error, message, errors?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client (including slot conflicts).
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional field-level breakdown.
        errors: Option<Vec<FieldError>>,
    },

    /// 401 Unauthorized - Missing or invalid credentials.
    Unauthorized {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - Resource does not exist (or is not owned by the
    /// caller; the two are indistinguishable on purpose).
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - A terminal dose status rejected a later transition.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (not exposed to clients in production).
        details: Option<String>,
    },
}

/// One field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// The offending field.
    #[schema(example = "times")]
    pub field: String,
    /// What was wrong with it.
    #[schema(example = "at least one time is required")]
    pub message: String,
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": "slot_conflict",
    "message": "Slot 3 is already in use by Aspirin"
}))]
pub struct ErrorResponse {
    /// Always `false`.
    #[schema(example = false)]
    pub success: bool,

    /// Machine-readable error code (e.g., "slot_conflict").
    #[schema(example = "slot_conflict")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Slot 3 is already in use by Aspirin")]
    pub message: String,

    /// Field-level breakdown for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::BadRequest {
                error_code,
                message,
                errors,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    success: false,
                    error: error_code,
                    message,
                    errors,
                },
            ),

            Self::Unauthorized {
                error_code,
                message,
            } => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    success: false,
                    error: error_code,
                    message,
                    errors: None,
                },
            ),

            Self::NotFound {
                error_code,
                message,
            } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    success: false,
                    error: error_code,
                    message,
                    errors: None,
                },
            ),

            Self::Conflict {
                error_code,
                message,
            } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    success: false,
                    error: error_code,
                    message,
                    errors: None,
                },
            ),

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                // Log internal errors
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        success: false,
                        error: error_code,
                        message,
                        errors: None,
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Unauthorized { message, .. } => write!(f, "Unauthorized: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from pillbot_core errors using their status/code mapping.
impl From<pillbot_core::CoreError> for ApiError {
    fn from(err: pillbot_core::CoreError) -> Self {
        use pillbot_core::CoreError;

        let error_code = err.error_code().to_string();
        match err.http_status_code() {
            400 => {
                let errors = match &err {
                    CoreError::ValidationFailed { field, message } => Some(vec![FieldError {
                        field: (*field).to_string(),
                        message: message.clone(),
                    }]),
                    _ => None,
                };
                Self::BadRequest {
                    error_code,
                    message: err.to_string(),
                    errors,
                }
            }
            401 => Self::Unauthorized {
                error_code,
                message: err.to_string(),
            },
            404 => Self::NotFound {
                error_code,
                message: err.to_string(),
            },
            409 => Self::Conflict {
                error_code,
                message: err.to_string(),
            },
            _ => Self::InternalError {
                error_code,
                message: err.to_string(),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillbot_core::CoreError;

    #[test]
    fn test_error_envelope_serialization() {
        let response = ErrorResponse {
            success: false,
            error: "slot_conflict".to_string(),
            message: "Slot 3 is already in use".to_string(),
            errors: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("slot_conflict"));
        // Absent field-level errors are omitted entirely.
        assert!(!json.contains("\"errors\""));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::DoseLogNotFound.into();
        assert!(matches!(err, ApiError::NotFound { .. }));

        let err: ApiError = CoreError::SessionExpired.into();
        assert!(matches!(err, ApiError::Unauthorized { .. }));

        let err: ApiError = CoreError::SlotConflict {
            slot: "3".into(),
            medicine: "Aspirin".into(),
        }
        .into();
        assert!(matches!(err, ApiError::BadRequest { .. }));

        let err: ApiError = CoreError::TerminalStatus {
            current: pillbot_core::DoseStatus::Taken,
        }
        .into();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[test]
    fn test_validation_failure_carries_field_errors() {
        let err: ApiError = CoreError::ValidationFailed {
            field: "times",
            message: "at least one time is required".into(),
        }
        .into();
        match err {
            ApiError::BadRequest { errors, .. } => {
                let errors = errors.unwrap();
                assert_eq!(errors[0].field, "times");
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }
}
