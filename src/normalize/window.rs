use crate::model::Timestamp;
use chrono::{DateTime, Duration, Utc};

/// Sampling period for every metric query, in seconds
pub const METRIC_PERIOD_SECONDS: i64 = 300;

/// Longest window a query may cover, 31 days
pub const MAX_WINDOW_HOURS: u32 = 24 * 31;

/// The `[now - hours, now]` range a query covers
///
/// The period is fixed regardless of window length, so a one hour window
/// holds up to twelve buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    pub hours: u32,
}

impl TimeWindow {
    /// Window of `hours` ending at `now`, capped at [`MAX_WINDOW_HOURS`]
    pub fn ending_at(now: Timestamp, hours: u32) -> Self {
        let hours = hours.min(MAX_WINDOW_HOURS);
        let start = now
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            start,
            end: now,
            hours,
        }
    }

    /// Window of `hours` ending at the current time
    pub fn last_hours(hours: u32) -> Self {
        Self::ending_at(Utc::now(), hours)
    }

    pub fn period() -> Duration {
        Duration::seconds(METRIC_PERIOD_SECONDS)
    }

    /// Number of sampling buckets in the window
    pub fn bucket_count(&self) -> usize {
        (i64::from(self.hours) * 3600 / METRIC_PERIOD_SECONDS) as usize
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::ending_at(now, 3);

        assert_eq!(window.end, now);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        assert_eq!(window.end_millis() - window.start_millis(), 3 * 3_600_000);
    }

    #[test]
    fn test_bucket_count_uses_fixed_period() {
        let now = Utc::now();
        assert_eq!(TimeWindow::ending_at(now, 1).bucket_count(), 12);
        assert_eq!(TimeWindow::ending_at(now, 24).bucket_count(), 288);
        assert_eq!(TimeWindow::ending_at(now, 0).bucket_count(), 0);
        assert_eq!(TimeWindow::period(), Duration::minutes(5));
    }

    #[test]
    fn test_oversized_window_is_capped() {
        let window = TimeWindow::last_hours(u32::MAX);
        assert_eq!(window.hours, MAX_WINDOW_HOURS);
        assert_eq!(window.bucket_count(), 8928);
        assert_eq!(
            window.end - window.start,
            Duration::hours(i64::from(MAX_WINDOW_HOURS))
        );

        // Near the lower edge of the calendar the start saturates
        let early = DateTime::<Utc>::MIN_UTC + Duration::hours(1);
        let window = TimeWindow::ending_at(early, 5);
        assert_eq!(window.start, DateTime::<Utc>::MIN_UTC);
    }
}
