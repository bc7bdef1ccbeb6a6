// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! 5-field cron expression parsing and per-instant matching.
//!
//! Fields are minute, hour, day-of-month, month, day-of-week (0 = Sunday).
//! Each field is `*`, a literal, an `a,b,c` list, an `a-b` range, or
//! `base/step` where base is `*` or an integer. Anything else is a parse
//! error; the scheduler treats unparseable expressions as never due.

use chrono::{Datelike, Timelike};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronParseError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid cron field '{0}'")]
    InvalidField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    Value(u32),
    List(Vec<u32>),
    Range(u32, u32),
    /// Matches when `value >= base` and `(value - base) % step == 0`.
    /// A `*` base means 0.
    Step { base: u32, step: u32 },
}

impl CronField {
    fn parse(text: &str) -> Result<Self, CronParseError> {
        let invalid = || CronParseError::InvalidField(text.to_string());

        if text == "*" {
            return Ok(Self::Any);
        }

        if let Some((base, step)) = text.split_once('/') {
            let base = if base == "*" {
                0
            } else {
                base.parse::<u32>().map_err(|_| invalid())?
            };
            let step = step.parse::<u32>().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            return Ok(Self::Step { base, step });
        }

        if text.contains(',') {
            let values = text
                .split(',')
                .map(|v| v.parse::<u32>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::List(values));
        }

        if let Some((lo, hi)) = text.split_once('-') {
            let lo = lo.parse::<u32>().map_err(|_| invalid())?;
            let hi = hi.parse::<u32>().map_err(|_| invalid())?;
            if lo > hi {
                return Err(invalid());
            }
            return Ok(Self::Range(lo, hi));
        }

        text.parse::<u32>().map(Self::Value).map_err(|_| invalid())
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Value(v) => value == *v,
            Self::List(values) => values.contains(&value),
            Self::Range(lo, hi) => value >= *lo && value <= *hi,
            Self::Step { base, step } => value >= *base && (value - base) % step == 0,
        }
    }
}

/// A parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpr {
    pub fn parse(text: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }
        Ok(Self {
            minute: CronField::parse(fields[0])?,
            hour: CronField::parse(fields[1])?,
            day_of_month: CronField::parse(fields[2])?,
            month: CronField::parse(fields[3])?,
            day_of_week: CronField::parse(fields[4])?,
        })
    }

    /// True when every field matches the given wall-clock instant.
    /// Day-of-week uses 0 = Sunday.
    pub fn matches<T: Datelike + Timelike>(&self, instant: &T) -> bool {
        self.minute.matches(instant.minute())
            && self.hour.matches(instant.hour())
            && self.day_of_month.matches(instant.day())
            && self.month.matches(instant.month())
            && self
                .day_of_week
                .matches(instant.weekday().num_days_from_sunday())
    }
}
