//! Week window computation and per-day task bucketing.
//!
//! The reporting week is the 6-day work week, local Monday 00:00:00 through
//! Saturday 23:59:59 in a fixed-offset timezone (IST by default). The window
//! is derived once per run from "now": weekday-based subtraction always lands
//! on the Monday on or before "now", so a run on Sunday reports on the week
//! that just ended rather than the one about to start.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Asia/Kolkata, which has no DST, expressed in minutes east of UTC.
pub const DEFAULT_TZ_OFFSET_MINUTES: i32 = 330;

/// Wire format the CRM uses for due dates and query boundaries.
const CRM_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The Monday-aligned 6-day reporting window for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow {
    pub from_utc: DateTime<Utc>,
    pub to_utc: DateTime<Utc>,
    pub start_local: NaiveDate,
    pub end_local: NaiveDate,
    offset: FixedOffset,
}

impl WeekWindow {
    /// Compute the window enclosing `now_utc` in the given local offset.
    pub fn compute(now_utc: DateTime<Utc>, offset: FixedOffset) -> Self {
        let now_local = now_utc.with_timezone(&offset);
        let start_local = now_local.date_naive()
            - Duration::days(i64::from(now_local.weekday().num_days_from_monday()));
        let end_local = start_local + Duration::days(5);

        let start_naive = start_local.and_hms_opt(0, 0, 0).unwrap_or_default();
        let end_naive = end_local.and_hms_opt(23, 59, 59).unwrap_or_default();

        let from_utc = DateTime::<Utc>::from_naive_utc_and_offset(
            start_naive - Duration::seconds(i64::from(offset.local_minus_utc())),
            Utc,
        );
        let to_utc = DateTime::<Utc>::from_naive_utc_and_offset(
            end_naive - Duration::seconds(i64::from(offset.local_minus_utc())),
            Utc,
        );

        Self {
            from_utc,
            to_utc,
            start_local,
            end_local,
            offset,
        }
    }

    pub fn current(offset: FixedOffset) -> Self {
        Self::compute(Utc::now(), offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// UTC lower bound in the CRM's datetime format.
    pub fn from_date_str(&self) -> String {
        self.from_utc.format(CRM_DATETIME_FORMAT).to_string()
    }

    /// UTC upper bound in the CRM's datetime format.
    pub fn to_date_str(&self) -> String {
        self.to_utc.format(CRM_DATETIME_FORMAT).to_string()
    }

    /// Every local calendar date in the window, Monday first.
    pub fn local_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let end = self.end_local;
        self.start_local.iter_days().take_while(move |d| *d <= end)
    }

    /// Convert a CRM due date (UTC, optional fractional seconds) to the local
    /// calendar date it falls on.
    pub fn local_due_date(&self, raw: &str) -> Result<NaiveDate, chrono::ParseError> {
        let truncated = raw.split('.').next().unwrap_or(raw).trim();
        let due_utc = NaiveDateTime::parse_from_str(truncated, CRM_DATETIME_FORMAT)?;
        let due_local = DateTime::<Utc>::from_naive_utc_and_offset(due_utc, Utc)
            .with_timezone(&self.offset);
        Ok(due_local.date_naive())
    }

    pub fn contains_local_date(&self, date: NaiveDate) -> bool {
        date >= self.start_local && date <= self.end_local
    }
}

/// Per-day task counts for one user, seeded with every window date at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTaskCounts {
    window: WeekWindow,
    counts: BTreeMap<NaiveDate, u32>,
}

impl DailyTaskCounts {
    pub fn new(window: &WeekWindow) -> Self {
        let counts = window.local_dates().map(|date| (date, 0)).collect();
        Self {
            window: window.clone(),
            counts,
        }
    }

    /// Bucket one due date. Returns `Ok(true)` when the task landed inside
    /// the window, `Ok(false)` when it fell outside, and the parse error for
    /// an unusable due date (the caller logs and moves on).
    pub fn record(&mut self, due_date_utc: &str) -> Result<bool, chrono::ParseError> {
        let local_date = self.window.local_due_date(due_date_utc)?;
        if !self.window.contains_local_date(local_date) {
            return Ok(false);
        }
        *self.counts.entry(local_date).or_insert(0) += 1;
        Ok(true)
    }

    pub fn get(&self, date: NaiveDate) -> u32 {
        self.counts.get(&date).copied().unwrap_or(0)
    }

    /// Counts in window order, Monday first.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.counts.values().copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
