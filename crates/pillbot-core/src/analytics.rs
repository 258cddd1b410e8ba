//! Read-side adherence analytics.
//!
//! Everything in this module is a pure function over a slice of dose logs;
//! nothing here mutates state or touches storage. Rates are whole-number
//! percentages, rounded, and defined as 0 when there is nothing scheduled.

use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dose::DoseLog;
use crate::schedule::local_date_of;

/// Reporting period for adherence statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Last 7 days.
    #[default]
    Week,
    /// Last 30 days.
    Month,
    /// Last 365 days.
    Year,
}

impl Period {
    /// Length of the period in days.
    #[must_use]
    pub const fn days(self) -> u64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }
}

/// Aggregate counters for a period.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverviewStats {
    /// Doses scheduled in the period.
    pub total_scheduled: usize,
    /// Doses taken (on time or late).
    pub taken: usize,
    /// Doses deliberately skipped.
    pub skipped: usize,
    /// Doses currently snoozed.
    pub snoozed: usize,
    /// Doses still pending.
    pub pending: usize,
    /// Doses missed.
    pub missed: usize,
    /// `round(taken / total * 100)`; 0 when nothing was scheduled.
    #[schema(minimum = 0, maximum = 100)]
    pub adherence_rate: u32,
    /// Doses taken within the on-time window.
    pub on_time: usize,
    /// Doses taken late.
    pub late: usize,
    /// Mean delay over doses with a positive delay, rounded minutes.
    pub average_delay_minutes: u32,
}

/// Adherence for one calendar day.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyAdherence {
    /// The day.
    #[schema(value_type = String, example = "2025-06-10")]
    pub date: NaiveDate,
    /// Rate over that day's doses.
    #[schema(minimum = 0, maximum = 100)]
    pub adherence_rate: u32,
    /// Doses scheduled that day.
    pub total: usize,
    /// Doses taken that day.
    pub taken: usize,
}

/// Adherence for one medicine.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MedicineAdherence {
    /// The medicine.
    pub medicine_id: Uuid,
    /// Its name, from the log snapshots.
    pub medicine_name: String,
    /// Doses scheduled.
    pub total: usize,
    /// Doses taken.
    pub taken: usize,
    /// Rate over this medicine's doses.
    #[schema(minimum = 0, maximum = 100)]
    pub adherence_rate: u32,
}

/// Full adherence summary for a period.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdherenceSummary {
    /// The requested period.
    pub period: Period,
    /// Period start.
    pub start_date: DateTime<Utc>,
    /// Period end.
    pub end_date: DateTime<Utc>,
    /// Aggregate counters.
    pub overview: OverviewStats,
    /// Per-day breakdown across the whole period.
    pub daily_data: Vec<DailyAdherence>,
    /// Per-medicine breakdown.
    pub medicine_breakdown: Vec<MedicineAdherence>,
}

/// Coarse time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    /// 05:00-11:59.
    Morning,
    /// 12:00-16:59.
    Afternoon,
    /// 17:00-20:59.
    Evening,
    /// 21:00-04:59.
    Night,
}

impl TimeSlot {
    /// All buckets, in display order.
    pub const ALL: [Self; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    /// Bucket for an hour of day.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Human-readable bucket name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Adherence within one time-of-day bucket.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimeSlotAdherence {
    /// The bucket.
    pub time_slot: TimeSlot,
    /// Rate over the bucket's doses.
    #[schema(minimum = 0, maximum = 100)]
    pub adherence_rate: u32,
    /// Doses scheduled in the bucket.
    pub total: usize,
    /// Doses taken in the bucket.
    pub taken: usize,
}

/// Adherence on one day of the week.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayOfWeekAdherence {
    /// Day name, Sunday through Saturday.
    #[schema(value_type = String, example = "Monday")]
    pub day: &'static str,
    /// Rate over that weekday's doses.
    #[schema(minimum = 0, maximum = 100)]
    pub adherence_rate: u32,
    /// Doses scheduled on that weekday.
    pub total: usize,
    /// Doses taken on that weekday.
    pub taken: usize,
}

/// Weekly and time-of-day pattern analysis.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PatternAnalysis {
    /// Per-weekday breakdown, Sunday first.
    pub day_analysis: Vec<DayOfWeekAdherence>,
    /// Weekday with the highest rate, when any dose exists.
    pub best_day: Option<DayOfWeekAdherence>,
    /// Weekday with the lowest rate, when any dose exists.
    pub worst_day: Option<DayOfWeekAdherence>,
    /// Per-bucket breakdown.
    pub time_analysis: Vec<TimeSlotAdherence>,
    /// Non-empty bucket with the highest rate.
    pub best_time: Option<TimeSlotAdherence>,
    /// Non-empty bucket with the lowest rate.
    pub worst_time: Option<TimeSlotAdherence>,
}

/// Kind of generated insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    /// Things are going well.
    Positive,
    /// Neutral observation.
    Neutral,
    /// Needs attention.
    Warning,
    /// Actionable suggestion.
    Tip,
    /// Speculative trend statement.
    Prediction,
}

/// Insight priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InsightPriority {
    /// Informational.
    Low,
    /// Worth a look.
    Medium,
    /// Act soon.
    High,
}

/// One rule-based insight.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Insight {
    /// Kind.
    #[serde(rename = "type")]
    pub kind: InsightKind,
    /// Icon hint for the mobile client.
    #[schema(value_type = String, example = "trending-up")]
    pub icon: &'static str,
    /// Short title.
    pub title: String,
    /// Full message.
    pub description: String,
    /// Priority.
    pub priority: InsightPriority,
}

/// `round(taken / total * 100)`, 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn adherence_rate(taken: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((taken as f64 / total as f64) * 100.0).round() as u32
}

/// Compute the full adherence summary over `[start, end]`.
#[must_use]
pub fn adherence_summary(
    logs: &[&DoseLog],
    period: Period,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> AdherenceSummary {
    let in_range: Vec<&DoseLog> = logs
        .iter()
        .filter(|l| l.scheduled_time >= start && l.scheduled_time <= end)
        .copied()
        .collect();

    AdherenceSummary {
        period,
        start_date: start,
        end_date: end,
        overview: overview(&in_range),
        daily_data: daily_breakdown(&in_range, start, end, tz),
        medicine_breakdown: medicine_breakdown(&in_range),
    }
}

fn overview(logs: &[&DoseLog]) -> OverviewStats {
    use crate::dose::DoseStatus;

    let total_scheduled = logs.len();
    let taken = logs.iter().filter(|l| l.status.counts_as_taken()).count();
    let skipped = logs.iter().filter(|l| l.status == DoseStatus::Skipped).count();
    let snoozed = logs.iter().filter(|l| l.status == DoseStatus::Snoozed).count();
    let pending = logs.iter().filter(|l| l.status == DoseStatus::Pending).count();
    let missed = logs.iter().filter(|l| l.status == DoseStatus::Missed).count();
    let on_time = logs.iter().filter(|l| l.is_on_time == Some(true)).count();
    let late = logs
        .iter()
        .filter(|l| l.status == DoseStatus::TakenLate)
        .count();

    let delays: Vec<u32> = logs
        .iter()
        .filter(|l| l.delay_minutes > 0)
        .map(|l| l.delay_minutes)
        .collect();
    #[allow(clippy::cast_possible_truncation)]
    let average_delay_minutes = if delays.is_empty() {
        0
    } else {
        (f64::from(delays.iter().sum::<u32>()) / delays.len() as f64).round() as u32
    };

    OverviewStats {
        total_scheduled,
        taken,
        skipped,
        snoozed,
        pending,
        missed,
        adherence_rate: adherence_rate(taken, total_scheduled),
        on_time,
        late,
        average_delay_minutes,
    }
}

fn daily_breakdown(
    logs: &[&DoseLog],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> Vec<DailyAdherence> {
    let first = local_date_of(start, tz);
    let last = local_date_of(end, tz);
    let mut days = Vec::new();

    let mut date = first;
    while date <= last {
        let day_logs: Vec<&&DoseLog> = logs
            .iter()
            .filter(|l| local_date_of(l.scheduled_time, tz) == date)
            .collect();
        let total = day_logs.len();
        let taken = day_logs
            .iter()
            .filter(|l| l.status.counts_as_taken())
            .count();
        days.push(DailyAdherence {
            date,
            adherence_rate: adherence_rate(taken, total),
            total,
            taken,
        });
        let Some(next) = date.checked_add_days(Days::new(1)) else {
            break;
        };
        date = next;
    }
    days
}

fn medicine_breakdown(logs: &[&DoseLog]) -> Vec<MedicineAdherence> {
    let mut breakdown: Vec<MedicineAdherence> = Vec::new();
    for log in logs {
        if let Some(entry) = breakdown.iter_mut().find(|e| e.medicine_id == log.medicine_id) {
            entry.total += 1;
            if log.status.counts_as_taken() {
                entry.taken += 1;
            }
        } else {
            breakdown.push(MedicineAdherence {
                medicine_id: log.medicine_id,
                medicine_name: log.medicine_name.clone(),
                total: 1,
                taken: usize::from(log.status.counts_as_taken()),
                adherence_rate: 0,
            });
        }
    }
    for entry in &mut breakdown {
        entry.adherence_rate = adherence_rate(entry.taken, entry.total);
    }
    breakdown
}

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Weekly and time-of-day pattern analysis over `logs`.
#[must_use]
pub fn pattern_analysis(logs: &[&DoseLog], tz: Tz) -> PatternAnalysis {
    // Day-of-week analysis, 0 = Sunday.
    let mut day_totals = [(0usize, 0usize); 7];
    for log in logs {
        let local = log.scheduled_time.with_timezone(&tz);
        let idx = local.weekday().num_days_from_sunday() as usize;
        day_totals[idx].0 += 1;
        if log.status.counts_as_taken() {
            day_totals[idx].1 += 1;
        }
    }
    let day_analysis: Vec<DayOfWeekAdherence> = day_totals
        .iter()
        .enumerate()
        .map(|(idx, &(total, taken))| DayOfWeekAdherence {
            day: DAY_NAMES[idx],
            adherence_rate: adherence_rate(taken, total),
            total,
            taken,
        })
        .collect();

    let best_day = if logs.is_empty() {
        None
    } else {
        day_analysis
            .iter()
            .max_by_key(|d| d.adherence_rate)
            .cloned()
    };
    let worst_day = if logs.is_empty() {
        None
    } else {
        day_analysis
            .iter()
            .min_by_key(|d| d.adherence_rate)
            .cloned()
    };

    // Time-of-day analysis.
    let time_analysis: Vec<TimeSlotAdherence> = TimeSlot::ALL
        .iter()
        .map(|&slot| {
            let slot_logs: Vec<&&DoseLog> = logs
                .iter()
                .filter(|l| {
                    TimeSlot::from_hour(l.scheduled_time.with_timezone(&tz).hour()) == slot
                })
                .collect();
            let total = slot_logs.len();
            let taken = slot_logs
                .iter()
                .filter(|l| l.status.counts_as_taken())
                .count();
            TimeSlotAdherence {
                time_slot: slot,
                adherence_rate: adherence_rate(taken, total),
                total,
                taken,
            }
        })
        .collect();

    let non_empty = || time_analysis.iter().filter(|t| t.total > 0);
    let best_time = non_empty().max_by_key(|t| t.adherence_rate).cloned();
    let worst_time = non_empty().min_by_key(|t| t.adherence_rate).cloned();

    PatternAnalysis {
        day_analysis,
        best_day,
        worst_day,
        time_analysis,
        best_time,
        worst_time,
    }
}

/// Consecutive days ending today on which every scheduled dose was taken.
///
/// A day counts only when it has at least one log and all of that day's
/// logs are taken; a day with no logs terminates the streak rather than
/// passing through it.
#[must_use]
pub fn current_streak(logs: &[&DoseLog], tz: Tz, now: DateTime<Utc>) -> u32 {
    let mut streak = 0;
    let mut date = local_date_of(now, tz);

    loop {
        let day_logs: Vec<&&DoseLog> = logs
            .iter()
            .filter(|l| local_date_of(l.scheduled_time, tz) == date)
            .collect();
        if day_logs.is_empty() || !day_logs.iter().all(|l| l.status.counts_as_taken()) {
            break;
        }
        streak += 1;
        let Some(prev) = date.pred_opt() else {
            break;
        };
        date = prev;
    }
    streak
}

/// Evaluate the ordered insight rules. All rules are independent; several
/// can fire at once.
#[must_use]
pub fn build_insights(
    logs: &[&DoseLog],
    low_stock_count: usize,
    tz: Tz,
    now: DateTime<Utc>,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    let total = logs.len();
    let taken = logs.iter().filter(|l| l.status.counts_as_taken()).count();
    let rate = adherence_rate(taken, total);

    // Rule 1: overall adherence band.
    if rate >= 90 {
        insights.push(Insight {
            kind: InsightKind::Positive,
            icon: "trending-up",
            title: "Excellent Adherence!".into(),
            description: format!(
                "Your adherence rate of {rate}% is outstanding. Keep up the great work!"
            ),
            priority: InsightPriority::Low,
        });
    } else if rate >= 80 {
        insights.push(Insight {
            kind: InsightKind::Neutral,
            icon: "information-circle",
            title: "Good Progress".into(),
            description: format!(
                "Your {rate}% adherence is good, but there's room for improvement."
            ),
            priority: InsightPriority::Medium,
        });
    } else {
        insights.push(Insight {
            kind: InsightKind::Warning,
            icon: "alert-circle",
            title: "Adherence Needs Attention".into(),
            description: format!(
                "Your {rate}% adherence is below optimal. Consider setting more reminders."
            ),
            priority: InsightPriority::High,
        });
    }

    // Rule 2: weakest time of day, when one stands out below perfect.
    let patterns = pattern_analysis(logs, tz);
    if let Some(worst) = patterns.worst_time.filter(|t| t.adherence_rate < 100) {
        insights.push(Insight {
            kind: InsightKind::Tip,
            icon: "time",
            title: "Time Pattern Detected".into(),
            description: format!(
                "You tend to miss more doses in the {}. Consider adjusting your schedule \
                 or setting stronger reminders.",
                worst.time_slot.label()
            ),
            priority: InsightPriority::Medium,
        });
    }

    // Rule 3: streak celebration.
    let streak = current_streak(logs, tz, now);
    if streak >= 7 {
        insights.push(Insight {
            kind: InsightKind::Positive,
            icon: "flame",
            title: format!("{streak}-Day Streak!"),
            description: format!(
                "You've maintained consistency for {streak} days. Excellent discipline!"
            ),
            priority: InsightPriority::Low,
        });
    }

    // Rule 4: trend prediction.
    if rate >= 85 {
        insights.push(Insight {
            kind: InsightKind::Prediction,
            icon: "analytics",
            title: "Prediction".into(),
            description: "If current trend continues, you'll reach 95% adherence by next month."
                .into(),
            priority: InsightPriority::Low,
        });
    }

    // Rule 5: low stock.
    if low_stock_count > 0 {
        insights.push(Insight {
            kind: InsightKind::Warning,
            icon: "warning",
            title: "Low Stock Alert".into(),
            description: format!(
                "{low_stock_count} medicine(s) are running low. Consider refilling soon."
            ),
            priority: InsightPriority::High,
        });
    }

    insights
}
