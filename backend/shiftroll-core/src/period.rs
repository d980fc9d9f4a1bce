// src/period.rs
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

pub const PERIOD_START_DAY: u32 = 21;
pub const PERIOD_END_DAY: u32 = 20;
pub const SUBMISSION_DEADLINE_DAY: u32 = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("Period {year}-{month:02} is outside the supported calendar range")]
    OutOfRange { year: i32, month: u32 },
}

/// The (year, month) immediately before the given one, rolling January back to December.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Pay period (year, month): the 21st of the previous calendar month through the
/// 20th of `month`. Self-service time-off submissions close at 23:59:59 on the 18th
/// of that previous month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayPeriod {
    year: i32,
    month: u32,
    first_day: NaiveDate,
    last_day: NaiveDate,
    deadline: NaiveDateTime,
}

impl PayPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        let out_of_range = || PeriodError::OutOfRange { year, month };

        let (prev_year, prev_month) = previous_month(year, month);
        let first_day = NaiveDate::from_ymd_opt(prev_year, prev_month, PERIOD_START_DAY)
            .ok_or_else(out_of_range)?;
        let last_day =
            NaiveDate::from_ymd_opt(year, month, PERIOD_END_DAY).ok_or_else(out_of_range)?;
        let deadline = NaiveDate::from_ymd_opt(prev_year, prev_month, SUBMISSION_DEADLINE_DAY)
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .ok_or_else(out_of_range)?;

        Ok(Self {
            year,
            month,
            first_day,
            last_day,
            deadline,
        })
    }

    /// The period a calendar day falls into: days up to the 20th belong to their own
    /// month, days from the 21st onward belong to the next one.
    pub fn containing(date: NaiveDate) -> Result<Self, PeriodError> {
        if date.day() >= PERIOD_START_DAY {
            let (year, month) = next_month(date.year(), date.month());
            Self::new(year, month)
        } else {
            Self::new(date.year(), date.month())
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    pub fn deadline(&self) -> NaiveDateTime {
        self.deadline
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }

    /// Every date of the period, ascending. Always 28-31 entries.
    pub fn window(&self) -> Vec<NaiveDate> {
        self.first_day
            .iter_days()
            .take_while(|d| *d <= self.last_day)
            .collect()
    }

    /// True iff `now` is strictly after the submission deadline.
    pub fn is_submission_closed(&self, now: NaiveDateTime) -> bool {
        now > self.deadline
    }
}

pub fn compute_window(year: i32, month: u32) -> Result<Vec<NaiveDate>, PeriodError> {
    Ok(PayPeriod::new(year, month)?.window())
}

pub fn is_submission_closed(
    year: i32,
    month: u32,
    now: NaiveDateTime,
) -> Result<bool, PeriodError> {
    Ok(PayPeriod::new(year, month)?.is_submission_closed(now))
}
