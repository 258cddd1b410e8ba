//! # pillbot-core
//!
//! Core business logic for the pillbot medication-adherence system.
//!
//! This crate provides:
//! - Medicine registration with hardware-slot exclusivity and stock tracking
//! - Forward schedule expansion into per-dose log entries
//! - The dose-log status lifecycle (pending, taken, snoozed, skipped, missed)
//! - Reconciliation of status reports from the mobile app and the dispenser
//! - Read-side adherence analytics (rates, streaks, patterns, insights)
//! - Patient accounts with password hashing and bearer sessions
//! - JSON-file persistence for all of the above
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`medicine`] - Medicine definitions, slot exclusivity, stock counters
//! - [`schedule`] - Expansion of recurring times into concrete dose entries
//! - [`dose`] - The dose-log entity, its state machine and the ledger
//! - [`reconcile`] - Device bindings and status-report reconciliation
//! - [`analytics`] - Adherence statistics, pattern analysis and insights
//! - [`accounts`] - Patient accounts, sessions and profile management
//! - [`storage`] - Persistent storage using JSON files
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod accounts;
pub mod analytics;
pub mod config;
pub mod dose;
pub mod error;
pub mod medicine;
pub mod reconcile;
pub mod schedule;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use accounts::{
    AccountManager, Gender, NewAccount, ProfilePatch, Session, UserAccount, UserProfile,
};
pub use analytics::{
    adherence_rate, adherence_summary, build_insights, current_streak, pattern_analysis,
    AdherenceSummary, DailyAdherence, DayOfWeekAdherence, Insight, InsightKind, InsightPriority,
    MedicineAdherence, OverviewStats, PatternAnalysis, Period, TimeSlot, TimeSlotAdherence,
};
pub use config::ServerConfig;
pub use dose::{
    DoseLedger, DoseLog, DoseStatus, LogQuery, SnoozePolicy, DEFAULT_SNOOZE_MINUTES,
    HARDWARE_SNOOZE_MINUTES, MAX_SNOOZE_COUNT, ON_TIME_WINDOW_MINUTES,
};
pub use error::{CoreError, Error, Result};
pub use medicine::{
    Frequency, Medicine, MedicineCategory, MedicineFilter, MedicinePatch, MedicineRegistry,
    NewMedicine,
};
pub use reconcile::{
    apply_transition, BulkItemOutcome, BulkReportOutcome, DeviceBinding, DeviceGateway,
    ReportOutcome, ReportedStatus, StatusReport, TransitionRequest,
};
pub use schedule::{day_bounds, expand_schedule, local_date_of};
pub use storage::Storage;
pub use types::{is_valid_time_string, HealthResponse, TimeOfDay};
