//! Point-in-time counts for one entity type.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Counts returned by the statistics aggregator.
///
/// `total`, `active` and `inactive` (and the time windows) exclude trashed
/// rows; `trashed` counts only trashed rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub trashed: i64,
    pub this_month: i64,
    pub this_week: i64,
    pub today: i64,
}

/// Start instants of the creation-time windows, computed at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatWindows {
    pub month_start: DateTime<Utc>,
    /// Weeks start on Monday.
    pub week_start: DateTime<Utc>,
    pub day_start: DateTime<Utc>,
}

impl StatWindows {
    pub fn at(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let midnight = |date: chrono::NaiveDate| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));

        let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let month_start = today.with_day(1).unwrap_or(today);

        Self {
            month_start: midnight(month_start),
            week_start: midnight(week_start),
            day_start: midnight(today),
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}
