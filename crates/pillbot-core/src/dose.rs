//! The dose-log entity, its status lifecycle, and the ledger.
//!
//! A dose log is one scheduled occurrence of a medicine at a specific time.
//! It moves through a one-directional state machine:
//!
//! ```text
//! pending → taken | taken_late | snoozed | skipped | missed
//! snoozed → taken | taken_late | skipped | missed
//! ```
//!
//! `taken`, `taken_late`, `skipped` and `missed` are terminal. The first
//! terminal transition wins; any later transition attempt fails with
//! [`CoreError::TerminalStatus`] so that at-least-once delivery from the
//! dispenser can never regress a settled dose.
//!
//! Logs are never deleted; they form the permanent adherence history, and
//! they carry a snapshot of the medicine's name/dosage/slot taken at
//! creation time so later medicine edits do not rewrite history.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::medicine::Medicine;
use crate::schedule::day_bounds;
use crate::storage::Storage;

/// Taking a dose within this many minutes of the scheduled time (either
/// side) counts as on time.
pub const ON_TIME_WINDOW_MINUTES: i64 = 30;

/// Snoozes beyond this count escalate the dose to `missed` on the
/// hardware ingestion path. Fixed policy, not configurable per medicine.
pub const MAX_SNOOZE_COUNT: u32 = 2;

/// Default snooze duration for the mobile path.
pub const DEFAULT_SNOOZE_MINUTES: i64 = 15;

/// Default snooze duration for the hardware path.
pub const HARDWARE_SNOOZE_MINUTES: i64 = 30;

/// Lifecycle status of a dose log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    /// Scheduled, no outcome reported yet.
    Pending,
    /// Taken within the on-time window.
    Taken,
    /// Taken more than the on-time window after the scheduled time.
    TakenLate,
    /// Postponed; will be re-prompted at `snoozed_until`.
    Snoozed,
    /// Deliberately not taken.
    Skipped,
    /// Never taken; reached via snooze escalation or an explicit report.
    Missed,
}

impl DoseStatus {
    /// Whether this status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Taken | Self::TakenLate | Self::Skipped | Self::Missed
        )
    }

    /// Whether this status counts toward the adherence rate.
    #[must_use]
    pub const fn counts_as_taken(self) -> bool {
        matches!(self, Self::Taken | Self::TakenLate)
    }

    /// Wire name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Taken => "taken",
            Self::TakenLate => "taken_late",
            Self::Snoozed => "snoozed",
            Self::Skipped => "skipped",
            Self::Missed => "missed",
        }
    }
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "taken" => Ok(Self::Taken),
            "taken_late" => Ok(Self::TakenLate),
            "snoozed" => Ok(Self::Snoozed),
            "skipped" => Ok(Self::Skipped),
            "missed" => Ok(Self::Missed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Snooze escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoozePolicy {
    /// Mobile path: snoozing never escalates.
    Plain,
    /// Hardware path: the snooze after [`MAX_SNOOZE_COUNT`] lands `missed`.
    Escalating,
}

/// One scheduled occurrence of a medicine.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoseLog {
    /// Unique id.
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// The medicine this dose belongs to (weak reference; see snapshot
    /// fields below).
    pub medicine_id: Uuid,

    /// Medicine name, snapshotted at creation.
    #[schema(example = "Aspirin")]
    pub medicine_name: String,

    /// Dosage, snapshotted at creation.
    #[schema(example = "100mg")]
    pub dosage: String,

    /// Dispenser slot, snapshotted at creation.
    #[schema(example = "3")]
    pub slot: String,

    /// When this dose is due.
    pub scheduled_time: DateTime<Utc>,

    /// When it was actually taken, if it was.
    pub taken_time: Option<DateTime<Utc>>,

    /// Lifecycle status.
    pub status: DoseStatus,

    /// Free-text notes (skip reasons land here).
    #[serde(default)]
    pub notes: String,

    /// When the current snooze expires.
    pub snoozed_until: Option<DateTime<Utc>>,

    /// How many times this dose has been snoozed.
    pub snooze_count: u32,

    /// Whether the dose was taken on time. `None` until resolved.
    pub is_on_time: Option<bool>,

    /// Minutes late, zero when on time or early.
    pub delay_minutes: u32,

    /// Whether this entry has been handed to the dispenser.
    pub synced_to_hardware: bool,

    /// When the hardware handoff happened.
    pub hardware_sync_time: Option<DateTime<Utc>>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl DoseLog {
    /// Create a pending entry for `medicine` at `scheduled_time`,
    /// snapshotting the denormalized medicine fields.
    #[must_use]
    pub fn new(medicine: &Medicine, scheduled_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: medicine.user_id,
            medicine_id: medicine.id,
            medicine_name: medicine.name.clone(),
            dosage: medicine.dosage.clone(),
            slot: medicine.slot.clone(),
            scheduled_time,
            taken_time: None,
            status: DoseStatus::Pending,
            notes: String::new(),
            snoozed_until: None,
            snooze_count: 0,
            is_on_time: None,
            delay_minutes: 0,
            synced_to_hardware: false,
            hardware_sync_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the dose taken at `now`.
    ///
    /// Within ±[`ON_TIME_WINDOW_MINUTES`] of the scheduled time the status
    /// becomes `taken` and the dose is on time; later than that it becomes
    /// `taken_late` with the delay recorded.
    ///
    /// # Errors
    ///
    /// [`CoreError::TerminalStatus`] when the dose already settled.
    pub fn mark_taken(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        let diff_minutes = (now - self.scheduled_time).num_minutes();
        self.taken_time = Some(now);
        self.is_on_time = Some(diff_minutes.abs() <= ON_TIME_WINDOW_MINUTES);
        self.delay_minutes = u32::try_from(diff_minutes.max(0)).unwrap_or(u32::MAX);
        self.status = if diff_minutes > ON_TIME_WINDOW_MINUTES {
            DoseStatus::TakenLate
        } else {
            DoseStatus::Taken
        };
        self.snoozed_until = None;
        self.touch(now);
        Ok(())
    }

    /// Snooze the dose for `snooze_minutes` from `now`.
    ///
    /// Under [`SnoozePolicy::Escalating`] the snooze that pushes the count
    /// past [`MAX_SNOOZE_COUNT`] lands the dose in `missed` instead, with
    /// `snoozed_until` cleared. Returns the resulting status.
    ///
    /// # Errors
    ///
    /// [`CoreError::TerminalStatus`] when the dose already settled.
    pub fn mark_snoozed(
        &mut self,
        now: DateTime<Utc>,
        snooze_minutes: i64,
        policy: SnoozePolicy,
    ) -> Result<DoseStatus> {
        self.ensure_open()?;
        self.snooze_count += 1;
        if policy == SnoozePolicy::Escalating && self.snooze_count > MAX_SNOOZE_COUNT {
            self.status = DoseStatus::Missed;
            self.snoozed_until = None;
        } else {
            self.status = DoseStatus::Snoozed;
            self.snoozed_until = Some(now + Duration::minutes(snooze_minutes));
        }
        self.touch(now);
        Ok(self.status)
    }

    /// Mark the dose deliberately skipped. A non-empty `reason` replaces
    /// the notes; an empty one preserves them.
    ///
    /// # Errors
    ///
    /// [`CoreError::TerminalStatus`] when the dose already settled.
    pub fn mark_skipped(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.status = DoseStatus::Skipped;
        if !reason.trim().is_empty() {
            self.notes = reason.trim().to_string();
        }
        self.touch(now);
        Ok(())
    }

    /// Mark the dose missed (explicit device report).
    ///
    /// # Errors
    ///
    /// [`CoreError::TerminalStatus`] when the dose already settled.
    pub fn mark_missed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.status = DoseStatus::Missed;
        self.snoozed_until = None;
        self.touch(now);
        Ok(())
    }

    /// Record the hardware handoff.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.synced_to_hardware = true;
        self.hardware_sync_time = Some(now);
        self.touch(now);
    }

    /// Overwrite the local snooze counter with a device-reported value.
    pub fn override_snooze_count(&mut self, count: u32) {
        self.snooze_count = count;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalStatus {
                current: self.status,
            });
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Query over the ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogQuery {
    /// Inclusive lower bound on the scheduled time.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the scheduled time.
    pub end: Option<DateTime<Utc>>,
    /// Only logs with this status.
    pub status: Option<DoseStatus>,
}

/// Owns all dose logs and persists them write-through.
#[derive(Debug)]
pub struct DoseLedger {
    storage: Storage,
    logs: Vec<DoseLog>,
}

impl DoseLedger {
    /// Load the ledger from storage.
    pub fn load(storage: Storage) -> Result<Self> {
        let logs = storage.load_dose_logs()?;
        Ok(Self { storage, logs })
    }

    /// Insert generator output, skipping entries whose
    /// (medicine, scheduled-time) pair already exists. Returns how many
    /// entries were actually added; re-running the generator over an
    /// overlapping window is therefore safe.
    pub fn insert_new(&mut self, entries: Vec<DoseLog>) -> Result<usize> {
        let mut existing: HashSet<(Uuid, DateTime<Utc>)> = self
            .logs
            .iter()
            .map(|l| (l.medicine_id, l.scheduled_time))
            .collect();

        let mut added = 0;
        for entry in entries {
            if existing.insert((entry.medicine_id, entry.scheduled_time)) {
                self.logs.push(entry);
                added += 1;
            }
        }
        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    /// Get a log owned by `user_id`. Absence and foreign ownership are
    /// indistinguishable.
    pub fn get(&self, user_id: Uuid, log_id: Uuid) -> Result<&DoseLog> {
        self.logs
            .iter()
            .find(|l| l.id == log_id && l.user_id == user_id)
            .ok_or(CoreError::DoseLogNotFound)
    }

    /// Apply a mutation to a log owned by `user_id` and persist, returning
    /// the updated row.
    ///
    /// # Errors
    ///
    /// [`CoreError::DoseLogNotFound`] for unknown/foreign ids, or whatever
    /// the mutation itself returns.
    pub fn update<F>(&mut self, user_id: Uuid, log_id: Uuid, mutate: F) -> Result<DoseLog>
    where
        F: FnOnce(&mut DoseLog) -> Result<()>,
    {
        let log = self
            .logs
            .iter_mut()
            .find(|l| l.id == log_id && l.user_id == user_id)
            .ok_or(CoreError::DoseLogNotFound)?;
        mutate(log)?;
        let snapshot = log.clone();
        self.persist()?;
        Ok(snapshot)
    }

    /// Logs of a user filtered by `query`, ascending by scheduled time.
    #[must_use]
    pub fn query(&self, user_id: Uuid, query: LogQuery) -> Vec<&DoseLog> {
        let mut items: Vec<&DoseLog> = self
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter(|l| query.start.map_or(true, |s| l.scheduled_time >= s))
            .filter(|l| query.end.map_or(true, |e| l.scheduled_time <= e))
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .collect();
        items.sort_by_key(|l| l.scheduled_time);
        items
    }

    /// A user's schedule for the calendar day containing `date` in `tz`.
    #[must_use]
    pub fn for_day(&self, user_id: Uuid, date: NaiveDate, tz: Tz) -> Vec<&DoseLog> {
        let (start, end) = day_bounds(date, tz);
        self.query(
            user_id,
            LogQuery {
                start: Some(start),
                end: Some(end),
                status: None,
            },
        )
    }

    /// Pending doses whose scheduled time has already passed.
    #[must_use]
    pub fn pending_due(&self, user_id: Uuid, now: DateTime<Utc>) -> Vec<&DoseLog> {
        self.query(
            user_id,
            LogQuery {
                start: None,
                end: Some(now),
                status: Some(DoseStatus::Pending),
            },
        )
    }

    /// History of one medicine, newest first, capped at `limit` rows.
    #[must_use]
    pub fn history(&self, user_id: Uuid, medicine_id: Uuid, limit: usize) -> Vec<&DoseLog> {
        let mut items: Vec<&DoseLog> = self
            .logs
            .iter()
            .filter(|l| l.user_id == user_id && l.medicine_id == medicine_id)
            .collect();
        items.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
        items.truncate(limit);
        items
    }

    /// All logs of a user (analytics input).
    #[must_use]
    pub fn for_user(&self, user_id: Uuid) -> Vec<&DoseLog> {
        self.logs.iter().filter(|l| l.user_id == user_id).collect()
    }

    /// Hand the due schedule to the dispenser: logs in `[start, end]` with
    /// status pending or snoozed and the sync flag unset. The flag and sync
    /// timestamp are set before the rows are returned, so under normal
    /// operation every entry is delivered exactly once.
    pub fn pull_unsynced(
        &mut self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DoseLog>> {
        let mut pulled = Vec::new();
        for log in self.logs.iter_mut().filter(|l| {
            l.user_id == user_id
                && !l.synced_to_hardware
                && matches!(l.status, DoseStatus::Pending | DoseStatus::Snoozed)
                && l.scheduled_time >= start
                && l.scheduled_time <= end
        }) {
            log.mark_synced(now);
            pulled.push(log.clone());
        }
        if !pulled.is_empty() {
            self.persist()?;
        }
        pulled.sort_by_key(|l| l.scheduled_time);
        Ok(pulled)
    }

    fn persist(&self) -> Result<()> {
        self.storage.save_dose_logs(&self.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medicine::{Frequency, MedicineCategory};

    fn test_medicine(user_id: Uuid) -> Medicine {
        let now = Utc::now();
        Medicine {
            id: Uuid::new_v4(),
            user_id,
            name: "Aspirin".into(),
            dosage: "100mg".into(),
            times: vec!["08:00".parse().unwrap()],
            frequency: Frequency::Daily,
            slot: "1".into(),
            quantity: 30,
            remaining: 30,
            description: String::new(),
            side_effects: String::new(),
            instructions: String::new(),
            prescribed_by: String::new(),
            start_date: now,
            end_date: None,
            category: MedicineCategory::PainRelief,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn dose_at(scheduled: DateTime<Utc>) -> DoseLog {
        let medicine = test_medicine(Uuid::new_v4());
        DoseLog::new(&medicine, scheduled, scheduled - Duration::days(1))
    }

    #[test]
    fn test_taken_within_window_is_on_time() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);

        dose.mark_taken(scheduled + Duration::minutes(10)).unwrap();
        assert_eq!(dose.status, DoseStatus::Taken);
        assert_eq!(dose.is_on_time, Some(true));
        assert_eq!(dose.delay_minutes, 10);
    }

    #[test]
    fn test_taken_early_is_on_time_with_zero_delay() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);

        dose.mark_taken(scheduled - Duration::minutes(20)).unwrap();
        assert_eq!(dose.status, DoseStatus::Taken);
        assert_eq!(dose.is_on_time, Some(true));
        assert_eq!(dose.delay_minutes, 0);
    }

    #[test]
    fn test_taken_past_window_is_late() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);

        dose.mark_taken(scheduled + Duration::minutes(45)).unwrap();
        assert_eq!(dose.status, DoseStatus::TakenLate);
        assert_eq!(dose.is_on_time, Some(false));
        assert_eq!(dose.delay_minutes, 45);
    }

    #[test]
    fn test_exactly_thirty_minutes_is_still_on_time() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);

        dose.mark_taken(scheduled + Duration::minutes(30)).unwrap();
        assert_eq!(dose.status, DoseStatus::Taken);
        assert_eq!(dose.is_on_time, Some(true));
    }

    #[test]
    fn test_terminal_status_rejects_second_transition() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);
        dose.mark_taken(scheduled).unwrap();

        let err = dose.mark_skipped("changed my mind", scheduled).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TerminalStatus {
                current: DoseStatus::Taken
            }
        ));
        // The settled outcome is unchanged.
        assert_eq!(dose.status, DoseStatus::Taken);
    }

    #[test]
    fn test_third_escalating_snooze_lands_missed() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);

        let s1 = dose
            .mark_snoozed(scheduled + Duration::minutes(5), 30, SnoozePolicy::Escalating)
            .unwrap();
        assert_eq!(s1, DoseStatus::Snoozed);
        assert_eq!(dose.snooze_count, 1);
        assert!(dose.snoozed_until.is_some());

        let s2 = dose
            .mark_snoozed(scheduled + Duration::minutes(40), 30, SnoozePolicy::Escalating)
            .unwrap();
        assert_eq!(s2, DoseStatus::Snoozed);
        assert_eq!(dose.snooze_count, 2);

        let s3 = dose
            .mark_snoozed(scheduled + Duration::minutes(70), 30, SnoozePolicy::Escalating)
            .unwrap();
        assert_eq!(s3, DoseStatus::Missed);
        assert_eq!(dose.snooze_count, 3);
        assert!(dose.snoozed_until.is_none());
    }

    #[test]
    fn test_plain_snooze_never_escalates() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);

        for i in 1..=5 {
            let status = dose
                .mark_snoozed(scheduled, DEFAULT_SNOOZE_MINUTES, SnoozePolicy::Plain)
                .unwrap();
            assert_eq!(status, DoseStatus::Snoozed);
            assert_eq!(dose.snooze_count, i);
        }
    }

    #[test]
    fn test_snoozed_dose_can_still_be_taken() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);
        dose.mark_snoozed(scheduled, 15, SnoozePolicy::Plain).unwrap();

        dose.mark_taken(scheduled + Duration::minutes(20)).unwrap();
        assert_eq!(dose.status, DoseStatus::Taken);
        assert!(dose.snoozed_until.is_none());
    }

    #[test]
    fn test_skip_reason_lands_in_notes() {
        let scheduled = Utc::now();
        let mut dose = dose_at(scheduled);
        dose.notes = "take with food".into();

        dose.mark_skipped("", scheduled).unwrap();
        assert_eq!(dose.notes, "take with food");

        let mut dose = dose_at(scheduled);
        dose.mark_skipped("felt nauseous", scheduled).unwrap();
        assert_eq!(dose.notes, "felt nauseous");
        assert_eq!(dose.status, DoseStatus::Skipped);
    }

    fn ledger() -> (tempfile::TempDir, DoseLedger) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        (dir, DoseLedger::load(storage).unwrap())
    }

    #[test]
    fn test_insert_new_skips_duplicate_pairs() {
        let (_dir, mut ledger) = ledger();
        let medicine = test_medicine(Uuid::new_v4());
        let now = Utc::now();
        let t = now + Duration::hours(2);

        let first = vec![
            DoseLog::new(&medicine, t, now),
            DoseLog::new(&medicine, t + Duration::days(1), now),
        ];
        assert_eq!(ledger.insert_new(first).unwrap(), 2);

        // One duplicate (medicine, scheduled-time) pair, one new entry.
        let again = vec![
            DoseLog::new(&medicine, t, now),
            DoseLog::new(&medicine, t + Duration::days(2), now),
        ];
        assert_eq!(ledger.insert_new(again).unwrap(), 1);
    }

    #[test]
    fn test_get_hides_foreign_logs() {
        let (_dir, mut ledger) = ledger();
        let medicine = test_medicine(Uuid::new_v4());
        let now = Utc::now();
        ledger
            .insert_new(vec![DoseLog::new(&medicine, now, now)])
            .unwrap();
        let id = ledger.for_user(medicine.user_id)[0].id;

        let err = ledger.get(Uuid::new_v4(), id).unwrap_err();
        assert!(matches!(err, CoreError::DoseLogNotFound));
        assert!(ledger.get(medicine.user_id, id).is_ok());
    }

    #[test]
    fn test_pull_unsynced_delivers_once() {
        let (_dir, mut ledger) = ledger();
        let user = Uuid::new_v4();
        let medicine = test_medicine(user);
        let now = Utc::now();
        let due = now + Duration::hours(1);
        ledger
            .insert_new(vec![DoseLog::new(&medicine, due, now)])
            .unwrap();

        let window = (now, now + Duration::days(1));
        let first = ledger.pull_unsynced(user, window.0, window.1, now).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].synced_to_hardware);
        assert!(first[0].hardware_sync_time.is_some());

        // Sync flag persisted: a second pull in the same window is empty.
        let second = ledger.pull_unsynced(user, window.0, window.1, now).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_pull_unsynced_includes_snoozed_not_terminal() {
        let (_dir, mut ledger) = ledger();
        let user = Uuid::new_v4();
        let medicine = test_medicine(user);
        let now = Utc::now();

        let mut snoozed = DoseLog::new(&medicine, now + Duration::hours(1), now);
        snoozed
            .mark_snoozed(now, 15, SnoozePolicy::Plain)
            .unwrap();
        let mut taken = DoseLog::new(&medicine, now + Duration::hours(2), now);
        taken.mark_taken(now + Duration::hours(2)).unwrap();

        ledger.insert_new(vec![snoozed, taken]).unwrap();

        let pulled = ledger
            .pull_unsynced(user, now, now + Duration::days(1), now)
            .unwrap();
        assert_eq!(pulled.len(), 1);
        assert_eq!(pulled[0].status, DoseStatus::Snoozed);
    }

    #[test]
    fn test_query_filters_by_status_and_range() {
        let (_dir, mut ledger) = ledger();
        let user = Uuid::new_v4();
        let medicine = test_medicine(user);
        let now = Utc::now();

        let mut taken = DoseLog::new(&medicine, now - Duration::hours(3), now);
        taken.mark_taken(now - Duration::hours(3)).unwrap();
        let pending = DoseLog::new(&medicine, now + Duration::hours(3), now);
        ledger.insert_new(vec![taken, pending]).unwrap();

        let only_taken = ledger.query(
            user,
            LogQuery {
                status: Some(DoseStatus::Taken),
                ..LogQuery::default()
            },
        );
        assert_eq!(only_taken.len(), 1);

        let future_only = ledger.query(
            user,
            LogQuery {
                start: Some(now),
                ..LogQuery::default()
            },
        );
        assert_eq!(future_only.len(), 1);
        assert_eq!(future_only[0].status, DoseStatus::Pending);
    }

    #[test]
    fn test_pending_due_excludes_future_doses() {
        let (_dir, mut ledger) = ledger();
        let user = Uuid::new_v4();
        let medicine = test_medicine(user);
        let now = Utc::now();

        ledger
            .insert_new(vec![
                DoseLog::new(&medicine, now - Duration::hours(1), now - Duration::days(1)),
                DoseLog::new(&medicine, now + Duration::hours(1), now - Duration::days(1)),
            ])
            .unwrap();

        let due = ledger.pending_due(user, now);
        assert_eq!(due.len(), 1);
        assert!(due[0].scheduled_time < now);
    }

    #[test]
    fn test_history_is_newest_first_and_capped() {
        let (_dir, mut ledger) = ledger();
        let user = Uuid::new_v4();
        let medicine = test_medicine(user);
        let now = Utc::now();

        let entries: Vec<DoseLog> = (0..5)
            .map(|i| DoseLog::new(&medicine, now + Duration::hours(i), now))
            .collect();
        ledger.insert_new(entries).unwrap();

        let history = ledger.history(user, medicine.id, 3);
        assert_eq!(history.len(), 3);
        assert!(history[0].scheduled_time > history[1].scheduled_time);
    }
}
