use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use serde::Deserialize;

/// Broadcast hours during which spins are reported, in whole UTC hours.
///
/// The window may wrap past midnight (`start_hour > end_hour`). Equal hours
/// mean the window is open all day.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScheduleWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ScheduleWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            return true;
        }
        if self.start_hour < self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    /// Seconds from `now` until the next `start_hour:00:00` UTC, rolling to
    /// the next day when that time has already passed today.
    pub fn seconds_until_start(&self, now: DateTime<Utc>) -> Duration {
        let today_start = now
            .date_naive()
            .and_hms_opt(self.start_hour, 0, 0)
            .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap())
            .and_utc();
        let next = if today_start <= now {
            today_start + Days::new(1)
        } else {
            today_start
        };
        Duration::from_secs((next - now).num_seconds().max(0) as u64)
    }

    pub fn is_open_all_day(&self) -> bool {
        self.start_hour == self.end_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn overnight_window_wraps_past_midnight() {
        let window = ScheduleWindow {
            start_hour: 22,
            end_hour: 6,
        };
        assert!(window.contains(23));
        assert!(window.contains(2));
        assert!(!window.contains(10));
        assert!(window.contains(22));
        assert!(!window.contains(6));
    }

    #[test]
    fn daytime_window_excludes_night_hours() {
        let window = ScheduleWindow {
            start_hour: 6,
            end_hour: 22,
        };
        assert!(!window.contains(23));
        assert!(window.contains(10));
        assert!(window.contains(6));
        assert!(!window.contains(22));
    }

    #[test]
    fn equal_hours_mean_open_all_day() {
        let window = ScheduleWindow {
            start_hour: 9,
            end_hour: 9,
        };
        for hour in 0..24 {
            assert!(window.contains(hour), "hour {hour} should be inside");
        }
        assert!(window.is_open_all_day());
    }

    #[test]
    fn seconds_until_start_rolls_to_next_day() {
        let window = ScheduleWindow {
            start_hour: 6,
            end_hour: 22,
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap();
        assert_eq!(
            window.seconds_until_start(now),
            Duration::from_secs(23 * 3600 + 1800)
        );
    }

    #[test]
    fn seconds_until_start_later_today() {
        let window = ScheduleWindow {
            start_hour: 22,
            end_hour: 6,
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        assert_eq!(window.seconds_until_start(now), Duration::from_secs(2 * 3600));
    }
}
