use core::fmt::{Display, Formatter};
use core::time::Duration;
use serde::{Deserialize, Serialize};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Expression fired on every second, used for sub-second intervals.
const EVERY_SECOND: &str = "* * * * * *";

/// A recurring-execution schedule understood by the queue's trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(Box<str>);

impl Schedule {
    #[must_use]
    pub fn new(expression: impl Into<Box<str>>) -> Self {
        Self(expression.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Schedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a re-scan interval into a recurring schedule.
///
/// The interval is split into days, hours, minutes and seconds, each taken modulo
/// its parent unit. The coarsest non-zero unit repeats (`1/N`) while finer units
/// become fixed offsets within it, so a 127 minute interval fires every second hour
/// at minute 7 rather than every 2 hours and every 7 minutes.
///
/// Intervals over a day cannot be expressed exactly. The day count is rounded up
/// to compensate for truncation, so 30 hours becomes every second day at 06:00.
#[must_use]
pub fn format_schedule(interval: Duration) -> Schedule {
    let total = interval.as_secs();
    if total == 0 {
        return Schedule::new(EVERY_SECOND);
    }

    let days = total / SECS_PER_DAY;
    let hours = (total / SECS_PER_HOUR) % 24;
    let mins = (total / SECS_PER_MINUTE) % 60;
    let secs = total % SECS_PER_MINUTE;

    let day = if days >= 1 { format!("1/{}", days + 1) } else { "*".to_string() };

    let hour = match (hours, days) {
        (0, _) => "*".to_string(),
        (h, 0) => format!("1/{h}"),
        (h, _) => h.to_string(),
    };

    let minute = match (mins, hours) {
        (0, _) => "0".to_string(),
        (m, 0) => format!("1/{m}"),
        (m, _) => m.to_string(),
    };

    let second = if secs >= 1 { format!("1/{secs}") } else { "0".to_string() };

    Schedule::new(format!("{second} {minute} {hour} {day} * *"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirty_minutes() {
        assert_eq!(format_schedule(Duration::from_mins(30)).as_str(), "0 1/30 * * * *");
    }

    #[test]
    fn test_minutes_beyond_an_hour() {
        assert_eq!(format_schedule(Duration::from_mins(127)).as_str(), "0 7 1/2 * * *");
    }

    #[test]
    fn test_one_hour() {
        assert_eq!(format_schedule(Duration::from_hours(1)).as_str(), "0 0 1/1 * * *");
    }

    #[test]
    fn test_twelve_hours() {
        assert_eq!(format_schedule(Duration::from_hours(12)).as_str(), "0 0 1/12 * * *");
    }

    #[test]
    fn test_over_a_day_rounds_days_up() {
        // effectively every 48h
        assert_eq!(format_schedule(Duration::from_hours(30)).as_str(), "0 0 6 1/2 * *");
    }

    #[test]
    fn test_whole_days_leave_hour_unrestricted() {
        assert_eq!(format_schedule(Duration::from_hours(24)).as_str(), "0 0 * 1/2 * *");
        assert_eq!(format_schedule(Duration::from_hours(48)).as_str(), "0 0 * 1/3 * *");
    }

    #[test]
    fn test_hours_and_minutes() {
        let interval = Duration::from_hours(3) + Duration::from_mins(30);
        assert_eq!(format_schedule(interval).as_str(), "0 30 1/3 * * *");
    }

    #[test]
    fn test_seconds_repeat() {
        assert_eq!(format_schedule(Duration::from_secs(45)).as_str(), "1/45 0 * * * *");
    }

    #[test]
    fn test_sub_second_degrades_to_every_second() {
        assert_eq!(format_schedule(Duration::ZERO).as_str(), "* * * * * *");
        assert_eq!(format_schedule(Duration::from_millis(999)).as_str(), "* * * * * *");
    }

    #[test]
    fn test_always_six_fields() {
        let samples = (0..200_000).step_by(997).map(Duration::from_secs);
        for interval in samples {
            let schedule = format_schedule(interval);
            assert_eq!(
                schedule.as_str().split(' ').count(),
                6,
                "unexpected shape for {interval:?}: {schedule}"
            );
        }
    }

    #[test]
    fn test_display_matches_as_str() {
        let schedule = format_schedule(Duration::from_hours(2));
        assert_eq!(schedule.to_string(), schedule.as_str());
    }
}
