//! Expansion of recurring medicine times into concrete dose entries.
//!
//! The generator walks a forward window of calendar days in the configured
//! timezone and emits one pending [`DoseLog`] per (day, time-of-day) pair
//! whose timestamp is strictly in the future at generation time. Past slots
//! on the first day are skipped, not back-filled, and nothing is generated
//! past the medicine's validity end. Duplicate protection lives in
//! [`crate::dose::DoseLedger::insert_new`], which skips
//! (medicine, scheduled-time) pairs that already exist.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::dose::DoseLog;
use crate::medicine::Medicine;

/// The calendar date containing `ts` in `tz`.
#[must_use]
pub fn local_date_of(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// UTC bounds of the calendar day `date` in `tz`, inclusive on both ends.
#[must_use]
pub fn day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = first_instant_of(date, tz);
    let next = date
        .succ_opt()
        .map_or(start + chrono::Duration::days(1), |d| first_instant_of(d, tz));
    (start, next - chrono::Duration::milliseconds(1))
}

/// Expand `medicine.times` over `[today .. today + window_days)` local days.
///
/// Entries are sorted ascending by scheduled time. The caller feeds the
/// result to the ledger, which drops duplicates.
#[must_use]
pub fn expand_schedule(
    medicine: &Medicine,
    now: DateTime<Utc>,
    window_days: u32,
    tz: Tz,
) -> Vec<DoseLog> {
    let today = local_date_of(now, tz);
    let mut entries = Vec::new();

    for day_offset in 0..window_days {
        let Some(date) = today.checked_add_days(Days::new(u64::from(day_offset))) else {
            break;
        };
        for time in &medicine.times {
            let Some(naive) =
                NaiveTime::from_hms_opt(u32::from(time.hour()), u32::from(time.minute()), 0)
            else {
                continue;
            };
            // A slot that falls into a DST gap does not exist that day.
            let Some(scheduled) = local_instant(date, naive, tz) else {
                continue;
            };
            if scheduled <= now {
                continue;
            }
            if medicine.end_date.is_some_and(|end| scheduled > end) {
                continue;
            }
            entries.push(DoseLog::new(medicine, scheduled, now));
        }
    }

    entries.sort_by_key(|e| e.scheduled_time);
    entries
}

fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// First representable instant of `date` in `tz` (skips DST gaps at
/// midnight hour by hour).
fn first_instant_of(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    for hour in 0..24 {
        if let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) {
            if let Some(instant) = local_instant(date, time, tz) {
                return instant;
            }
        }
    }
    // A day with no representable instant does not occur in the tz database.
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
