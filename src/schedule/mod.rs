//! Recurring check schedule
//!
//! This module computes when the next batch of checks is due:
//! - Every N hours
//! - Once per calendar day at a fixed time
//! - Weekly or biweekly on a fixed weekday
//! - Monthly on a fixed day of the month
//!
//! All computations work on naive local date-times; the caller decides which
//! clock `now` comes from.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

/// How often scheduled checks repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    Hours,
    #[default]
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

/// The `[schedule]` section of the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub interval: IntervalKind,

    /// Hours between runs for the `hours` interval
    #[serde(rename = "interval-value", default = "default_interval_value")]
    pub interval_value: u32,

    /// Time of day as `HH:MM`
    #[serde(rename = "run-time", default = "default_run_time")]
    pub run_time: String,

    /// ISO weekday (1 = Monday) for weekly intervals, day of month for monthly
    #[serde(rename = "run-day", default = "default_run_day")]
    pub run_day: u32,
}

fn default_interval_value() -> u32 {
    24
}

fn default_run_time() -> String {
    "09:00".to_string()
}

fn default_run_day() -> u32 {
    1
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: IntervalKind::default(),
            interval_value: default_interval_value(),
            run_time: default_run_time(),
            run_day: default_run_day(),
        }
    }
}

impl ScheduleConfig {
    /// Parses `run-time`, `None` when it is not a valid `HH:MM`
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.run_time.trim(), "%H:%M").ok()
    }

    /// Checks the fields that cannot be expressed in the types
    pub fn check(&self) -> Result<(), String> {
        if self.time_of_day().is_none() {
            return Err(format!(
                "schedule run-time must be HH:MM, got '{}'",
                self.run_time
            ));
        }

        match self.interval {
            IntervalKind::Hours if self.interval_value < 1 => Err(format!(
                "schedule interval-value must be >= 1 hour, got {}",
                self.interval_value
            )),
            IntervalKind::Weekly | IntervalKind::Biweekly if !(1..=7).contains(&self.run_day) => {
                Err(format!(
                    "schedule run-day must be a weekday between 1 and 7, got {}",
                    self.run_day
                ))
            }
            IntervalKind::Monthly if !(1..=28).contains(&self.run_day) => Err(format!(
                "schedule run-day must be a day between 1 and 28, got {}",
                self.run_day
            )),
            _ => Ok(()),
        }
    }

    /// The next instant a run should start
    ///
    /// The returned instant may lie before `now`, meaning a run is overdue.
    /// Returns `None` when the schedule is disabled or misconfigured.
    pub fn next_run_after(
        &self,
        now: NaiveDateTime,
        last_run: Option<NaiveDateTime>,
    ) -> Option<NaiveDateTime> {
        if !self.enabled || self.check().is_err() {
            return None;
        }
        let at = self.time_of_day()?;

        match self.interval {
            IntervalKind::Hours => match last_run {
                Some(last) => Some(last + Duration::hours(i64::from(self.interval_value))),
                None => Some(now.date().and_time(at)),
            },
            IntervalKind::Daily => match last_run {
                Some(last) if last.date() >= now.date() => {
                    Some(now.date().succ_opt()?.and_time(at))
                }
                _ => Some(now.date().and_time(at)),
            },
            IntervalKind::Weekly => self.next_weekday(now, last_run, 6, at),
            IntervalKind::Biweekly => self.next_weekday(now, last_run, 13, at),
            IntervalKind::Monthly => {
                let (year, month) = match last_run {
                    Some(last) => next_month(last.year(), last.month()),
                    None => (now.year(), now.month()),
                };
                Some(NaiveDate::from_ymd_opt(year, month, self.run_day)?.and_time(at))
            }
        }
    }

    /// True when a run should start at `now`
    pub fn is_due(&self, now: NaiveDateTime, last_run: Option<NaiveDateTime>) -> bool {
        self.next_run_after(now, last_run)
            .map(|next| next <= now)
            .unwrap_or(false)
    }

    /// How long to sleep before the next run, zero when one is overdue
    pub fn wait_time(
        &self,
        now: NaiveDateTime,
        last_run: Option<NaiveDateTime>,
    ) -> Option<std::time::Duration> {
        let next = self.next_run_after(now, last_run)?;
        Some((next - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    fn next_weekday(
        &self,
        now: NaiveDateTime,
        last_run: Option<NaiveDateTime>,
        min_gap_days: i64,
        at: NaiveTime,
    ) -> Option<NaiveDateTime> {
        let mut date = match last_run {
            Some(last) => (last + Duration::days(min_gap_days)).date(),
            None => now.date(),
        };

        for _ in 0..7 {
            if date.weekday().number_from_monday() == self.run_day {
                return Some(date.and_time(at));
            }
            date = date.succ_opt()?;
        }
        None
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
