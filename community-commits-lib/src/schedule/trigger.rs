use super::Schedule;
use crate::Result;
use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Timelike, Utc};
use ohno::{IntoAppError, bail};

/// How far ahead [`Trigger::next_after`] searches before giving up.
const MAX_LOOKAHEAD_DAYS: i64 = 5 * 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    Fixed(u32),
    Repeat { start: u32, step: u32 },
}

impl Field {
    fn parse(text: &str, name: &str, min: u32, max: u32) -> Result<Self> {
        if text == "*" {
            return Ok(Self::Any);
        }

        let parse_value = |s: &str| -> Result<u32> {
            let value = s.parse::<u32>().into_app_err_with(|| format!("invalid {name} value '{s}'"))?;
            if !(min..=max).contains(&value) {
                bail!("{name} value {value} is outside {min}..={max}");
            }
            Ok(value)
        };

        if let Some((start, step)) = text.split_once('/') {
            let start = if start == "*" { min } else { parse_value(start)? };
            let step = step.parse::<u32>().into_app_err_with(|| format!("invalid {name} step '{step}'"))?;
            if step == 0 {
                bail!("{name} step must be greater than zero");
            }
            return Ok(Self::Repeat { start, step });
        }

        Ok(Self::Fixed(parse_value(text)?))
    }

    const fn matches(self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Fixed(v) => v == value,
            Self::Repeat { start, step } => value >= start && (value - start) % step == 0,
        }
    }
}

/// A parsed [`Schedule`] that can compute its upcoming fire times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    second: Field,
    minute: Field,
    hour: Field,
    day: Field,
    month: Field,
    weekday: Field,
}

impl Trigger {
    pub fn parse(schedule: &Schedule) -> Result<Self> {
        let fields: Vec<_> = schedule.as_str().split_whitespace().collect();
        let [second, minute, hour, day, month, weekday] = fields.as_slice() else {
            bail!("schedule '{schedule}' must have 6 fields, found {}", fields.len());
        };

        Ok(Self {
            second: Field::parse(second, "second", 0, 59)?,
            minute: Field::parse(minute, "minute", 0, 59)?,
            hour: Field::parse(hour, "hour", 0, 23)?,
            day: Field::parse(day, "day", 1, 31)?,
            month: Field::parse(month, "month", 1, 12)?,
            weekday: Field::parse(weekday, "weekday", 0, 6)?,
        })
    }

    /// Returns the first whole second strictly after `after` matching every field.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let limit = after + TimeDelta::days(MAX_LOOKAHEAD_DAYS);
        let mut t = after.with_nanosecond(0)? + TimeDelta::seconds(1);

        while t <= limit {
            if !self.month.matches(t.month()) {
                t = start_of_next_month(t)?;
                continue;
            }

            if !self.day.matches(t.day()) || !self.weekday.matches(t.weekday().num_days_from_sunday()) {
                t = t.date_naive().and_hms_opt(0, 0, 0)?.and_utc() + TimeDelta::days(1);
                continue;
            }

            if !self.hour.matches(t.hour()) {
                t = t.with_minute(0)?.with_second(0)? + TimeDelta::hours(1);
                continue;
            }

            if !self.minute.matches(t.minute()) {
                t = t.with_second(0)? + TimeDelta::minutes(1);
                continue;
            }

            if !self.second.matches(t.second()) {
                t += TimeDelta::seconds(1);
                continue;
            }

            return Some(t);
        }

        None
    }
}

fn start_of_next_month(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if t.month() == 12 { (t.year() + 1, 1) } else { (t.year(), t.month() + 1) };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}
