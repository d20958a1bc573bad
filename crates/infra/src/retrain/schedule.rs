//! Cron expressions: `minute hour day-of-month month day-of-week`, with an
//! optional leading seconds field.
//!
//! Each field accepts `*`, single values, ranges (`1-5`), steps (`*/6`,
//! `0-30/10`, `5/15`) and comma lists of those. Months and weekdays also
//! take three-letter names; weekday `7` is Sunday. A time fires when every
//! field matches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone};
use thiserror::Error;

/// Covers the 28-year cycle after which dates fall on the same weekdays.
const SEARCH_DAYS: u64 = 28 * 366;

const DAYS_IN_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error(
        "expected five fields (minute hour day-of-month month day-of-week) \
         or six with leading seconds, got {0}"
    )]
    FieldCount(usize),

    #[error("invalid {field} {value:?}")]
    Field { field: &'static str, value: String },

    #[error("schedule {0:?} never fires")]
    Never(String),
}

/// Set of allowed values for one field, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Values(u64);

impl Values {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1u64 << value) != 0
    }

    fn iter(self, unit: &'static Unit) -> impl Iterator<Item = u32> {
        (unit.min..=unit.max).filter(move |v| self.contains(*v))
    }
}

struct Unit {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const SECOND: Unit = Unit { name: "second", min: 0, max: 59, names: &[] };
const MINUTE: Unit = Unit { name: "minute", min: 0, max: 59, names: &[] };
const HOUR: Unit = Unit { name: "hour", min: 0, max: 23, names: &[] };
const DAY: Unit = Unit { name: "day-of-month", min: 1, max: 31, names: &[] };
const MONTH: Unit = Unit {
    name: "month",
    min: 1,
    max: 12,
    names: &[
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ],
};
const WEEKDAY: Unit = Unit {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &["sun", "mon", "tue", "wed", "thu", "fri", "sat"],
};

impl Unit {
    fn parse(&self, raw: &str) -> Result<Values, ScheduleError> {
        let invalid = || ScheduleError::Field {
            field: self.name,
            value: raw.to_string(),
        };

        let mut bits = 0u64;
        for part in raw.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step = step.parse::<u32>().ok().filter(|s| *s > 0);
                    (range, Some(step.ok_or_else(invalid)?))
                }
                None => (part, None),
            };
            let (lo, hi) = if range == "*" {
                (self.min, self.max)
            } else if let Some((lo, hi)) = range.split_once('-') {
                (self.value(lo).ok_or_else(invalid)?, self.value(hi).ok_or_else(invalid)?)
            } else {
                let v = self.value(range).ok_or_else(invalid)?;
                (v, if step.is_some() { self.max } else { v })
            };
            if lo > hi {
                return Err(invalid());
            }
            for v in (lo..=hi).step_by(step.unwrap_or(1) as usize) {
                bits |= 1u64 << v;
            }
        }
        Ok(Values(bits))
    }

    fn value(&self, raw: &str) -> Option<u32> {
        let value = match raw.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                let lower = raw.to_ascii_lowercase();
                let index = self.names.iter().position(|n| *n == lower)?;
                self.min + u32::try_from(index).ok()?
            }
        };
        (self.min..=self.max).contains(&value).then_some(value)
    }
}

/// A parsed cron expression, evaluated against local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    seconds: Values,
    minutes: Values,
    hours: Values,
    days: Values,
    months: Values,
    weekdays: Values,
}

impl CronSchedule {
    /// Once a day at `hour:minute`.
    pub fn daily_at(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        format!("{minute} {hour} * * *").parse()
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// First fire time strictly after `now`, in `now`'s time zone.
    ///
    /// Wall-clock times that do not exist (DST gaps) are skipped; ambiguous
    /// ones fire at their earlier instant.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let today = now.date_naive();

        (0..=SEARCH_DAYS)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter(|day| self.fires_on(*day))
            .find_map(|day| {
                self.times()
                    .filter_map(|time| tz.from_local_datetime(&day.and_time(time)).earliest())
                    .find(|candidate| candidate > now)
            })
    }

    fn fires_on(&self, day: NaiveDate) -> bool {
        self.months.contains(day.month())
            && self.days.contains(day.day())
            && self.weekdays.contains(day.weekday().num_days_from_sunday())
    }

    /// Fire times within a matching day, ascending.
    fn times(&self) -> impl Iterator<Item = NaiveTime> + '_ {
        self.hours.iter(&HOUR).flat_map(move |h| {
            self.minutes.iter(&MINUTE).flat_map(move |m| {
                self.seconds
                    .iter(&SECOND)
                    .filter_map(move |s| NaiveTime::from_hms_opt(h, m, s))
            })
        })
    }
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let (second, rest) = match fields.as_slice() {
            [second, rest @ ..] if rest.len() == 5 => (Some(*second), rest),
            rest if rest.len() == 5 => (None, rest),
            _ => return Err(ScheduleError::FieldCount(fields.len())),
        };
        let &[minute, hour, day, month, weekday] = rest else {
            return Err(ScheduleError::FieldCount(fields.len()));
        };

        let mut weekdays = WEEKDAY.parse(weekday)?;
        if weekdays.contains(7) {
            weekdays = Values((weekdays.0 | 1) & !(1u64 << 7));
        }
        let schedule = Self {
            expr: fields.join(" "),
            seconds: match second {
                Some(raw) => SECOND.parse(raw)?,
                None => Values(1),
            },
            minutes: MINUTE.parse(minute)?,
            hours: HOUR.parse(hour)?,
            days: DAY.parse(day)?,
            months: MONTH.parse(month)?,
            weekdays,
        };

        let reachable = schedule.months.iter(&MONTH).any(|m| {
            let last = DAYS_IN_MONTH[(m - 1) as usize];
            schedule.days.iter(&DAY).any(|d| d <= last)
        });
        if !reachable {
            return Err(ScheduleError::Never(schedule.expr));
        }
        Ok(schedule)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn next(expr: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        expr.parse::<CronSchedule>().unwrap().next_after(&now).unwrap()
    }

    #[test]
    fn parses_default_expression() {
        let s: CronSchedule = "0  2 * * *".parse().unwrap();
        assert_eq!(s, CronSchedule::daily_at(2, 0).unwrap());
        assert_eq!(s.to_string(), "0 2 * * *");
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!("0 2 * *".parse::<CronSchedule>(), Err(ScheduleError::FieldCount(4)));
        assert_eq!(
            "0 0 0 2 * * *".parse::<CronSchedule>(),
            Err(ScheduleError::FieldCount(7))
        );
        for (expr, field) in [
            ("0 24 * * *", "hour"),
            ("*/0 2 * * *", "minute"),
            ("0 2 0 * *", "day-of-month"),
            ("0 2 * 13 *", "month"),
            ("0 2 * * fun", "day-of-week"),
            ("30-10 2 * * *", "minute"),
            ("0 2,x * * *", "hour"),
        ] {
            assert!(
                matches!(
                    expr.parse::<CronSchedule>(),
                    Err(ScheduleError::Field { field: f, .. }) if f == field
                ),
                "{expr}"
            );
        }
        assert!(matches!(
            "0 0 30 feb *".parse::<CronSchedule>(),
            Err(ScheduleError::Never(_))
        ));
    }

    #[test]
    fn daily_fire_is_later_today_or_tomorrow() {
        let s = CronSchedule::daily_at(2, 30).unwrap();
        assert_eq!(s.next_after(&utc(2024, 4, 1, 1, 0)), Some(utc(2024, 4, 1, 2, 30)));
        assert_eq!(s.next_after(&utc(2024, 4, 1, 2, 30)), Some(utc(2024, 4, 2, 2, 30)));
    }

    #[test]
    fn steps_fire_every_n_hours() {
        assert_eq!(next("0 */6 * * *", utc(2024, 4, 1, 0, 0)), utc(2024, 4, 1, 6, 0));
        assert_eq!(next("0 */6 * * *", utc(2024, 4, 1, 13, 5)), utc(2024, 4, 1, 18, 0));
        assert_eq!(next("0 */6 * * *", utc(2024, 4, 1, 18, 0)), utc(2024, 4, 2, 0, 0));
        assert_eq!(next("15/20 * * * *", utc(2024, 4, 1, 9, 40)), utc(2024, 4, 1, 9, 55));
    }

    #[test]
    fn weekday_restricts_the_day() {
        // 2024-04-03 is a Wednesday.
        let wednesday = utc(2024, 4, 3, 12, 0);
        assert_eq!(next("0 2 * * 1", wednesday), utc(2024, 4, 8, 2, 0));
        assert_eq!(next("0 2 * * mon", wednesday), utc(2024, 4, 8, 2, 0));
        assert_eq!(next("0 2 * * 0", wednesday), utc(2024, 4, 7, 2, 0));
        assert_eq!(next("0 2 * * 7", wednesday), utc(2024, 4, 7, 2, 0));
        assert_eq!(next("0 9 * * 1-5", utc(2024, 4, 5, 10, 0)), utc(2024, 4, 8, 9, 0));
    }

    #[test]
    fn lists_ranges_and_months() {
        assert_eq!(next("30 8,20 * * *", utc(2024, 4, 1, 9, 0)), utc(2024, 4, 1, 20, 30));
        assert_eq!(next("0 3 1 */3 *", utc(2024, 4, 1, 4, 0)), utc(2024, 7, 1, 3, 0));
        assert_eq!(next("0 0 29 feb *", utc(2025, 1, 1, 0, 0)), utc(2028, 2, 29, 0, 0));
        // Day-of-month and weekday must both match: Friday the 13th.
        assert_eq!(next("0 12 13 * fri", utc(2024, 1, 1, 0, 0)), utc(2024, 9, 13, 12, 0));
    }

    #[test]
    fn leading_seconds_field() {
        let s: CronSchedule = "30 0 2 * * *".parse().unwrap();
        let fire = s.next_after(&utc(2024, 4, 1, 1, 0)).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2024, 4, 1, 2, 0, 30).unwrap());
    }

    #[test]
    fn next_fire_uses_the_local_wall_clock() {
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        let s = CronSchedule::daily_at(2, 0).unwrap();
        let now = jakarta.with_ymd_and_hms(2024, 4, 1, 23, 15, 0).unwrap();

        let next = s.next_after(&now).unwrap();
        assert_eq!(next, jakarta.with_ymd_and_hms(2024, 4, 2, 2, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&Utc), utc(2024, 4, 1, 19, 0));
    }

    proptest! {
        #[test]
        fn daily_fire_is_within_a_day_and_on_schedule(
            hour in 0u32..24,
            minute in 0u32..60,
            secs in 0i64..(366 * 86_400),
        ) {
            let s = CronSchedule::daily_at(hour, minute).unwrap();
            let now = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
            let next = s.next_after(&now).unwrap();

            prop_assert!(next > now);
            prop_assert!(next - now <= chrono::Duration::days(1));
            prop_assert_eq!(next.format("%H:%M").to_string(), format!("{hour:02}:{minute:02}"));
        }

        #[test]
        fn stepped_hours_fire_on_a_multiple(
            step in 1u32..12,
            secs in 0i64..(366 * 86_400),
        ) {
            let s: CronSchedule = format!("0 */{step} * * *").parse().unwrap();
            let now = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
            let next = s.next_after(&now).unwrap();

            prop_assert!(next > now);
            prop_assert!(next - now <= chrono::Duration::days(1));
            prop_assert_eq!(next.hour() % step, 0);
            prop_assert_eq!(next.minute(), 0);
        }
    }
}
