//! Unified error types for the pillbot core library.
//!
//! This module provides a unified error type [`CoreError`] that covers all
//! failure modes across the pillbot system: input validation, authentication,
//! missing resources, hardware-slot collisions, unregistered devices,
//! terminal-status conflicts and persistence failures.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide callers toward resolution
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//! - **Non-leaking**: A resource that exists but belongs to another user is
//!   reported exactly like one that does not exist at all

use thiserror::Error;

use crate::dose::DoseStatus;

/// The unified error type for all pillbot operations.
#[derive(Debug, Error)]
pub enum CoreError {
    // =========================================================================
    // VALIDATION ERRORS
    // =========================================================================
    /// A time-of-day string was not in 24-hour `HH:MM` form.
    #[error("Invalid time format: '{0}'. Expected 24-hour 'HH:MM' (e.g., '08:30').")]
    InvalidTimeFormat(String),

    /// A reported status string was not recognised.
    #[error("Invalid status: '{0}'. Expected one of: taken, dispensed, snoozed, skipped, missed.")]
    InvalidStatus(String),

    /// Generic field-level validation failure.
    #[error("Validation failed for '{field}': {message}")]
    ValidationFailed {
        /// Field that failed validation.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    // =========================================================================
    // ACCOUNT & SESSION ERRORS
    // =========================================================================
    /// The requested username is already registered.
    #[error("Username '{0}' is already registered")]
    UsernameTaken(String),

    /// Login failed. Deliberately does not say whether the username or the
    /// password was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The presented bearer token is unknown or has expired.
    #[error("Session is invalid or has expired. Log in again.")]
    SessionExpired,

    // =========================================================================
    // RESOURCE ERRORS
    // =========================================================================
    /// No user with the given id exists.
    #[error("User not found")]
    UserNotFound,

    /// The medicine does not exist or belongs to a different user.
    #[error("Medicine not found")]
    MedicineNotFound,

    /// The dose log does not exist or belongs to a different user.
    #[error("Medicine log not found")]
    DoseLogNotFound,

    /// The hardware device has not been bound to a user account.
    #[error("Device '{0}' is not registered. POST /api/hardware/register first.")]
    DeviceNotRegistered(String),

    // =========================================================================
    // DOMAIN CONFLICTS
    // =========================================================================
    /// An active medicine of the same user already occupies the slot.
    #[error("Slot {slot} is already in use by {medicine}")]
    SlotConflict {
        /// The contested hardware slot.
        slot: String,
        /// Name of the medicine currently holding it.
        medicine: String,
    },

    /// The dose log already reached a terminal status; the attempted
    /// transition was rejected (first terminal transition wins).
    #[error("Dose is already {current} and cannot be updated again")]
    TerminalStatus {
        /// Status the log settled in.
        current: DoseStatus,
    },

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for pillbot operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Short alias used throughout the crate.
pub type Error = CoreError;

impl CoreError {
    /// Returns `true` if this error was caused by malformed caller input.
    #[inline]
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimeFormat(_)
                | Self::InvalidStatus(_)
                | Self::ValidationFailed { .. }
                | Self::UsernameTaken(_)
        )
    }

    /// Returns `true` if this error is an authentication failure.
    #[inline]
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::SessionExpired)
    }

    /// Returns `true` if this error reports a missing (or not-owned) resource.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound
                | Self::MedicineNotFound
                | Self::DoseLogNotFound
                | Self::DeviceNotRegistered(_)
        )
    }

    /// Returns `true` if this error represents an expected domain conflict
    /// rather than a system failure.
    #[inline]
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::SlotConflict { .. } | Self::TerminalStatus { .. })
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input and slot collisions
            Self::InvalidTimeFormat(_)
            | Self::InvalidStatus(_)
            | Self::ValidationFailed { .. }
            | Self::UsernameTaken(_)
            | Self::SlotConflict { .. } => 400,

            // 401 Unauthorized
            Self::InvalidCredentials | Self::SessionExpired => 401,

            // 404 Not Found - absence and non-ownership are indistinguishable
            Self::UserNotFound
            | Self::MedicineNotFound
            | Self::DoseLogNotFound
            | Self::DeviceNotRegistered(_) => 404,

            // 409 Conflict - concurrent terminal-state collision
            Self::TerminalStatus { .. } => 409,

            // 500 Internal Server Error - server-side issues
            Self::ConfigParseError(_)
            | Self::ConfigValidationError(_)
            | Self::PersistenceError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTimeFormat(_) => "invalid_time_format",
            Self::InvalidStatus(_) => "invalid_status",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::UsernameTaken(_) => "username_taken",
            Self::InvalidCredentials => "invalid_credentials",
            Self::SessionExpired => "session_expired",
            Self::UserNotFound => "user_not_found",
            Self::MedicineNotFound => "medicine_not_found",
            Self::DoseLogNotFound => "log_not_found",
            Self::DeviceNotRegistered(_) => "device_not_registered",
            Self::SlotConflict { .. } => "slot_conflict",
            Self::TerminalStatus { .. } => "status_conflict",
            Self::ConfigParseError(_) => "config_parse_error",
            Self::ConfigValidationError(_) => "config_validation_error",
            Self::PersistenceError(_) => "persistence_error",
            Self::IoError(_) => "io_error",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for CoreError {
    fn from(err: toml::ser::Error) -> Self {
        Self::ConfigParseError(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_validation_error_classification() {
        assert!(CoreError::InvalidTimeFormat("25:00".into()).is_validation_error());
        assert!(CoreError::InvalidStatus("eaten".into()).is_validation_error());
        assert!(CoreError::UsernameTaken("amina".into()).is_validation_error());

        assert!(!CoreError::InvalidCredentials.is_validation_error());
    }

    #[test]
    fn test_auth_error_classification() {
        assert!(CoreError::InvalidCredentials.is_auth_error());
        assert!(CoreError::SessionExpired.is_auth_error());

        assert!(!CoreError::UserNotFound.is_auth_error());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(CoreError::MedicineNotFound.is_not_found());
        assert!(CoreError::DoseLogNotFound.is_not_found());
        assert!(CoreError::DeviceNotRegistered("MD-BOT-01".into()).is_not_found());

        assert!(!CoreError::InvalidCredentials.is_not_found());
    }

    #[test]
    fn test_conflict_classification() {
        let slot = CoreError::SlotConflict {
            slot: "3".into(),
            medicine: "Aspirin".into(),
        };
        assert!(slot.is_conflict());
        assert!(CoreError::TerminalStatus {
            current: DoseStatus::Taken
        }
        .is_conflict());

        assert!(!CoreError::MedicineNotFound.is_conflict());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            CoreError::InvalidTimeFormat("bad".into()).http_status_code(),
            400
        );
        assert_eq!(
            CoreError::SlotConflict {
                slot: "1".into(),
                medicine: "Aspirin".into()
            }
            .http_status_code(),
            400
        );
        assert_eq!(CoreError::InvalidCredentials.http_status_code(), 401);
        assert_eq!(CoreError::DoseLogNotFound.http_status_code(), 404);
        assert_eq!(
            CoreError::DeviceNotRegistered("MD-BOT-77".into()).http_status_code(),
            404
        );
        assert_eq!(
            CoreError::TerminalStatus {
                current: DoseStatus::Skipped
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            CoreError::PersistenceError("disk full".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CoreError::DeviceNotRegistered("x".into()).error_code(),
            "device_not_registered"
        );
        assert_eq!(
            CoreError::TerminalStatus {
                current: DoseStatus::Missed
            }
            .error_code(),
            "status_conflict"
        );
        assert_eq!(CoreError::SessionExpired.error_code(), "session_expired");
    }

    #[test]
    fn test_error_display_messages() {
        let err = CoreError::SlotConflict {
            slot: "2".into(),
            medicine: "Metformin".into(),
        };
        assert!(format!("{err}").contains("Slot 2"));
        assert!(format!("{err}").contains("Metformin"));

        let err = CoreError::InvalidCredentials;
        assert_eq!(format!("{err}"), "Invalid username or password");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::IoError(_)));
        assert!(core_err.is_io_error());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<CoreError>();
        assert_sync::<CoreError>();
    }
}
