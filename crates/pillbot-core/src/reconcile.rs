//! Device bindings and status-report reconciliation.
//!
//! Both the mobile app and the dispenser report dose outcomes through the
//! same transition logic ([`apply_transition`]), so stock side effects and
//! duplicate short-circuits exist in exactly one place. The dispenser is
//! identified by a bot id bound to a user account; bindings are
//! last-writer-wins and carry a monotonic sequence cursor so retried
//! deliveries are acknowledged without being re-applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dose::{
    DoseLedger, DoseLog, DoseStatus, SnoozePolicy, DEFAULT_SNOOZE_MINUTES,
    HARDWARE_SNOOZE_MINUTES,
};
use crate::error::{CoreError, Result};
use crate::medicine::MedicineRegistry;
use crate::storage::Storage;

/// A bot-id → user binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceBinding {
    /// Dispenser identifier (e.g. `MD-BOT-07`).
    pub bot_id: String,
    /// Account the dispenser reports for.
    pub user_id: Uuid,
    /// Highest sequence number processed from this device.
    pub last_seq: u64,
    /// When the binding was (last) registered.
    pub registered_at: DateTime<Utc>,
}

/// Dose outcome as reported by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    /// The patient took the dose (mobile wording).
    Taken,
    /// The dispenser released the dose (hardware wording; same transition).
    Dispensed,
    /// The dose was postponed.
    Snoozed,
    /// The dose was deliberately not taken.
    Skipped,
    /// The dose was never taken.
    Missed,
}

/// One status report from the dispenser.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusReport {
    /// The dose log being reported on.
    pub log_id: Uuid,
    /// Reported outcome.
    pub status: ReportedStatus,
    /// When the event happened on the device; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Device-side snooze counter; overrides the locally tracked one.
    #[serde(default)]
    pub snooze_count: Option<u32>,
    /// Monotonic per-device sequence number for duplicate suppression.
    #[serde(default)]
    pub seq: Option<u64>,
}

/// A transition request after caller-specific defaults are resolved.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    /// Requested outcome.
    pub status: ReportedStatus,
    /// Skip reason (mobile path).
    pub notes: Option<String>,
    /// Snooze duration; defaults per policy when absent.
    pub snooze_minutes: Option<i64>,
    /// Device-side snooze counter override.
    pub snooze_count_override: Option<u32>,
    /// Escalation policy of the calling path.
    pub policy: SnoozePolicy,
}

/// Result of applying one report.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    /// The log row after the report.
    pub log: DoseLog,
    /// `false` when the report was acknowledged as a duplicate/stale
    /// delivery and nothing changed.
    pub applied: bool,
    /// `true` when a taken report found the stock counter already at zero.
    pub out_of_stock: bool,
}

/// Per-item outcome of a bulk report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkItemOutcome {
    /// The dose log the item addressed.
    pub log_id: Uuid,
    /// Whether the item was processed without error.
    pub success: bool,
    /// Whether the item changed state (false for acknowledged duplicates).
    pub applied: bool,
    /// Error message for failed items.
    pub error: Option<String>,
}

/// Aggregate outcome of a bulk report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkReportOutcome {
    /// Per-item outcomes, in request order.
    pub items: Vec<BulkItemOutcome>,
    /// Items processed without error.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
}

/// Apply exactly one state-machine transition chosen by the reported
/// status, with the stock side effect for taken doses.
///
/// Duplicate semantics: a report matching the log's current terminal class
/// is acknowledged with `applied = false` and no side effects; a report
/// conflicting with a different terminal status fails with
/// [`CoreError::TerminalStatus`]. A duplicate taken report therefore never
/// decrements stock twice.
pub fn apply_transition(
    ledger: &mut DoseLedger,
    registry: &mut MedicineRegistry,
    user_id: Uuid,
    log_id: Uuid,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<ReportOutcome> {
    let current = ledger.get(user_id, log_id)?.clone();

    match request.status {
        ReportedStatus::Taken | ReportedStatus::Dispensed => {
            if current.status.counts_as_taken() {
                return Ok(ReportOutcome {
                    log: current,
                    applied: false,
                    out_of_stock: false,
                });
            }
            let log = ledger.update(user_id, log_id, |l| l.mark_taken(now))?;

            // Stock decrement is a tolerated partial failure: the dose was
            // physically dispensed whether or not the medicine row survives.
            let out_of_stock = match registry.decrement_stock(log.medicine_id) {
                Ok(moved) => {
                    if !moved {
                        tracing::warn!(
                            medicine_id = %log.medicine_id,
                            "taken dose reported with stock already at zero"
                        );
                    }
                    !moved
                }
                Err(CoreError::MedicineNotFound) => {
                    tracing::warn!(
                        medicine_id = %log.medicine_id,
                        log_id = %log.id,
                        "medicine missing during stock decrement; log transition kept"
                    );
                    false
                }
                Err(e) => return Err(e),
            };

            Ok(ReportOutcome {
                log,
                applied: true,
                out_of_stock,
            })
        }

        ReportedStatus::Snoozed => {
            let minutes = request.snooze_minutes.unwrap_or(match request.policy {
                SnoozePolicy::Plain => DEFAULT_SNOOZE_MINUTES,
                SnoozePolicy::Escalating => HARDWARE_SNOOZE_MINUTES,
            });
            let override_count = request.snooze_count_override;
            let policy = request.policy;
            let log = ledger.update(user_id, log_id, |l| {
                if let Some(count) = override_count {
                    // The device counts snoozes itself; its value replaces
                    // the local counter before the escalation check.
                    l.override_snooze_count(count.saturating_sub(1));
                }
                l.mark_snoozed(now, minutes, policy).map(|_| ())
            })?;
            Ok(ReportOutcome {
                log,
                applied: true,
                out_of_stock: false,
            })
        }

        ReportedStatus::Skipped => {
            if current.status == DoseStatus::Skipped {
                return Ok(ReportOutcome {
                    log: current,
                    applied: false,
                    out_of_stock: false,
                });
            }
            let reason = request.notes.clone().unwrap_or_default();
            let log = ledger.update(user_id, log_id, |l| l.mark_skipped(&reason, now))?;
            Ok(ReportOutcome {
                log,
                applied: true,
                out_of_stock: false,
            })
        }

        ReportedStatus::Missed => {
            if current.status == DoseStatus::Missed {
                return Ok(ReportOutcome {
                    log: current,
                    applied: false,
                    out_of_stock: false,
                });
            }
            let log = ledger.update(user_id, log_id, |l| l.mark_missed(now))?;
            Ok(ReportOutcome {
                log,
                applied: true,
                out_of_stock: false,
            })
        }
    }
}

/// Owns device bindings; the single entry point for dispenser traffic.
#[derive(Debug)]
pub struct DeviceGateway {
    storage: Storage,
    bindings: Vec<DeviceBinding>,
}

impl DeviceGateway {
    /// Load bindings from storage.
    pub fn load(storage: Storage) -> Result<Self> {
        let bindings = storage.load_device_bindings()?;
        Ok(Self { storage, bindings })
    }

    /// Bind `bot_id` to a user, overwriting any prior binding for that id
    /// (last-writer-wins; rebinding resets the sequence cursor).
    pub fn register_device(&mut self, bot_id: &str, user_id: Uuid) -> Result<()> {
        let bot_id = bot_id.trim();
        if bot_id.is_empty() {
            return Err(CoreError::ValidationFailed {
                field: "bot_id",
                message: "bot id is required".into(),
            });
        }
        let now = Utc::now();
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.bot_id == bot_id) {
            binding.user_id = user_id;
            binding.last_seq = 0;
            binding.registered_at = now;
        } else {
            self.bindings.push(DeviceBinding {
                bot_id: bot_id.to_string(),
                user_id,
                last_seq: 0,
                registered_at: now,
            });
        }
        self.persist()
    }

    /// Resolve a bot id to its user.
    ///
    /// # Errors
    ///
    /// [`CoreError::DeviceNotRegistered`] for unknown ids.
    pub fn resolve(&self, bot_id: &str) -> Result<Uuid> {
        self.bindings
            .iter()
            .find(|b| b.bot_id == bot_id)
            .map(|b| b.user_id)
            .ok_or_else(|| CoreError::DeviceNotRegistered(bot_id.to_string()))
    }

    /// The binding for a bot id, if any.
    #[must_use]
    pub fn binding(&self, bot_id: &str) -> Option<&DeviceBinding> {
        self.bindings.iter().find(|b| b.bot_id == bot_id)
    }

    /// Pull the due schedule for a device, marking returned rows synced.
    pub fn pull_schedule(
        &self,
        ledger: &mut DoseLedger,
        bot_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DoseLog>> {
        let user_id = self.resolve(bot_id)?;
        ledger.pull_unsynced(user_id, start, end, now)
    }

    /// Apply one status report from a device.
    ///
    /// Reports carrying a `seq` at or below the device's cursor are
    /// acknowledged without being applied.
    pub fn report_status(
        &mut self,
        ledger: &mut DoseLedger,
        registry: &mut MedicineRegistry,
        bot_id: &str,
        report: &StatusReport,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome> {
        let user_id = self.resolve(bot_id)?;

        if let Some(seq) = report.seq {
            // Sequence numbers start at 1; the cursor starts at 0.
            let cursor = self.binding(bot_id).map_or(0, |b| b.last_seq);
            if seq <= cursor {
                tracing::debug!(bot_id, seq, cursor, "stale device report acknowledged");
                return Ok(ReportOutcome {
                    log: ledger.get(user_id, report.log_id)?.clone(),
                    applied: false,
                    out_of_stock: false,
                });
            }
        }

        let event_time = report.timestamp.unwrap_or(now);
        let request = TransitionRequest {
            status: report.status,
            notes: None,
            snooze_minutes: None,
            snooze_count_override: report.snooze_count,
            policy: SnoozePolicy::Escalating,
        };
        let outcome = apply_transition(
            ledger,
            registry,
            user_id,
            report.log_id,
            &request,
            event_time,
        )?;

        if let Some(seq) = report.seq {
            if let Some(binding) = self.bindings.iter_mut().find(|b| b.bot_id == bot_id) {
                binding.last_seq = binding.last_seq.max(seq);
            }
            self.persist()?;
        }

        Ok(outcome)
    }

    /// Apply a batch of reports, isolating per-item failures.
    pub fn bulk_report(
        &mut self,
        ledger: &mut DoseLedger,
        registry: &mut MedicineRegistry,
        bot_id: &str,
        reports: &[StatusReport],
        now: DateTime<Utc>,
    ) -> Result<BulkReportOutcome> {
        // An unknown device fails the whole batch; per-item errors do not.
        self.resolve(bot_id)?;

        let mut items = Vec::with_capacity(reports.len());
        for report in reports {
            match self.report_status(ledger, registry, bot_id, report, now) {
                Ok(outcome) => items.push(BulkItemOutcome {
                    log_id: report.log_id,
                    success: true,
                    applied: outcome.applied,
                    error: None,
                }),
                Err(e) => items.push(BulkItemOutcome {
                    log_id: report.log_id,
                    success: false,
                    applied: false,
                    error: Some(e.to_string()),
                }),
            }
        }

        let succeeded = items.iter().filter(|i| i.success).count();
        let failed = items.len() - succeeded;
        Ok(BulkReportOutcome {
            items,
            succeeded,
            failed,
        })
    }

    fn persist(&self) -> Result<()> {
        self.storage.save_device_bindings(&self.bindings)
    }
}
