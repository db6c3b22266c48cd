//! Workflow schedules and offsets
//!
//! A schedule is either a well-known alias (`hourly`, `@daily`, `weeks`, …) or
//! a 5-field cron expression. This module only validates expressions
//! structurally; computing fire times is the dequeuing scheduler's concern.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing schedule expressions and offsets
#[derive(Debug, Clone, Error)]
pub enum ScheduleError {
    /// The expression is neither a well-known alias nor a cron expression
    #[error("unable to parse schedule expression '{0}'")]
    InvalidExpression(String),

    /// The offset is not an ISO-8601 period
    #[error("unable to parse offset period '{0}'")]
    InvalidPeriod(String),
}

/// The well-known schedule frequencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum WellKnownSchedule {
    /// Once per hour
    Hourly,
    /// Once per day
    Daily,
    /// Once per week
    Weekly,
    /// Once per month
    Monthly,
    /// Once per year
    Yearly,
}

/// A workflow schedule expression
///
/// Holds the raw expression as written in the configuration. Use
/// [`Schedule::well_known`] to resolve aliases and [`Schedule::is_valid`] for
/// the structural check the workflow validator applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Schedule(String);

impl Schedule {
    /// Wrap a raw schedule expression
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Schedule for the `@hourly` alias
    pub fn hourly() -> Self {
        Self::new("@hourly")
    }

    /// Schedule for the `@daily` alias
    pub fn daily() -> Self {
        Self::new("@daily")
    }

    /// The raw expression
    pub fn expression(&self) -> &str {
        &self.0
    }

    /// Resolve the expression to a well-known frequency, if it is an alias
    ///
    /// Recognized: `hourly`/`daily`/`weekly`/`monthly`/`yearly`/`annually`,
    /// the unit forms `hours`/`days`/`weeks`/`months`/`years`, and any of
    /// those with an `@` prefix.
    pub fn well_known(&self) -> Option<WellKnownSchedule> {
        let name = self.0.strip_prefix('@').unwrap_or(&self.0);
        match name.to_ascii_lowercase().as_str() {
            "hourly" | "hours" => Some(WellKnownSchedule::Hourly),
            "daily" | "days" => Some(WellKnownSchedule::Daily),
            "weekly" | "weeks" => Some(WellKnownSchedule::Weekly),
            "monthly" | "months" => Some(WellKnownSchedule::Monthly),
            "yearly" | "years" | "annually" => Some(WellKnownSchedule::Yearly),
            _ => None,
        }
    }

    /// Check that the expression is a recognized alias or parses as cron
    pub fn is_valid(&self) -> bool {
        self.well_known().is_some() || validate_cron(&self.0).is_ok()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structurally validate a 5-field cron expression
///
/// Fields are minute, hour, day-of-month, month, day-of-week. Each field is a
/// comma-separated list of `*`, single values, ranges, or any of those with a
/// `/step` suffix. Month and day-of-week accept their conventional names.
pub fn validate_cron(expression: &str) -> Result<(), ScheduleError> {
    let invalid = || ScheduleError::InvalidExpression(expression.to_string());
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid());
    }

    const MONTH_NAMES: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

    let specs: [(u32, u32, &[&str]); 5] = [
        (0, 59, &[]),          // minute
        (0, 23, &[]),          // hour
        (1, 31, &[]),          // day of month
        (1, 12, &MONTH_NAMES), // month
        (0, 7, &DAY_NAMES),    // day of week, 0 and 7 both Sunday
    ];

    for (field, (min, max, names)) in fields.iter().zip(specs.iter()) {
        for item in field.split(',') {
            validate_cron_item(item, *min, *max, names).map_err(|_| invalid())?;
        }
    }
    Ok(())
}

fn validate_cron_item(item: &str, min: u32, max: u32, names: &[&str]) -> Result<(), ()> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    if let Some(step) = step {
        let step: u32 = step.parse().map_err(|_| ())?;
        if step == 0 {
            return Err(());
        }
    }
    if base == "*" {
        return Ok(());
    }
    let value = |s: &str| -> Result<u32, ()> {
        if let Some(pos) = names.iter().position(|n| n.eq_ignore_ascii_case(s)) {
            // Month names are 1-based, day names 0-based; min tells which
            return Ok(pos as u32 + min.min(1));
        }
        let v: u32 = s.parse().map_err(|_| ())?;
        if v < min || v > max {
            return Err(());
        }
        Ok(v)
    };
    match base.split_once('-') {
        Some((lo, hi)) => {
            let lo = value(lo)?;
            let hi = value(hi)?;
            if lo > hi {
                return Err(());
            }
        }
        None => {
            value(base)?;
        }
    }
    Ok(())
}

/// An ISO-8601 period, the parsed form of a schedule offset
///
/// Examples: `P1D` (one day), `PT6H` (six hours), `P1M2DT3H30M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Period {
    /// Calendar years
    pub years: u32,
    /// Calendar months
    pub months: u32,
    /// Weeks
    pub weeks: u32,
    /// Days
    pub days: u32,
    /// Hours
    pub hours: u32,
    /// Minutes
    pub minutes: u32,
    /// Seconds
    pub seconds: u32,
}

/// Parse an ISO-8601 period such as `P1D` or `PT6H30M`
pub fn parse_offset(text: &str) -> Result<Period, ScheduleError> {
    let invalid = || ScheduleError::InvalidPeriod(text.to_string());

    let rest = text
        .strip_prefix('P')
        .or_else(|| text.strip_prefix('p'))
        .ok_or_else(invalid)?;
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut period = Period::default();
    let mut in_time = false;
    let mut saw_component = false;
    let mut digits = String::new();

    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if (c == 'T' || c == 't') && !in_time {
            if !digits.is_empty() {
                return Err(invalid());
            }
            in_time = true;
            continue;
        }
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let slot = match (c.to_ascii_uppercase(), in_time) {
            ('Y', false) => &mut period.years,
            ('M', false) => &mut period.months,
            ('W', false) => &mut period.weeks,
            ('D', false) => &mut period.days,
            ('H', true) => &mut period.hours,
            ('M', true) => &mut period.minutes,
            ('S', true) => &mut period.seconds,
            _ => return Err(invalid()),
        };
        *slot = value;
        saw_component = true;
    }

    if !digits.is_empty() || !saw_component {
        return Err(invalid());
    }
    Ok(period)
}
