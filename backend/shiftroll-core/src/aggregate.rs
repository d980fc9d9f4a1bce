// src/aggregate.rs
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::records::{Employee, EmployeeId};
use crate::reconcile::RecordIndex;

/// Day that opens a new week group.
pub const WEEK_ANCHOR: Weekday = Weekday::Sun;

/// Splits the window into runs that each start on a Sunday. The first date always
/// opens the first run whatever its weekday, so the first and last runs can be short.
pub fn partition_into_weeks(window: &[NaiveDate]) -> Vec<&[NaiveDate]> {
    let mut weeks = Vec::new();
    let mut start = 0;
    for (i, date) in window.iter().enumerate() {
        if i > 0 && date.weekday() == WEEK_ANCHOR {
            weeks.push(&window[start..i]);
            start = i;
        }
    }
    if start < window.len() {
        weeks.push(&window[start..]);
    }
    weeks
}

pub fn weekly_total(index: &RecordIndex, employee: &Employee, week: &[NaiveDate]) -> Decimal {
    week.iter()
        .map(|date| index.resolve(employee, *date).worked_hours())
        .sum()
}

/// Period total, folded from the weekly figures.
pub fn monthly_total(index: &RecordIndex, employee: &Employee, window: &[NaiveDate]) -> Decimal {
    partition_into_weeks(window)
        .into_iter()
        .map(|week| weekly_total(index, employee, week))
        .sum()
}

// --- Hours Summary ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoursSummary {
    pub employee_id: EmployeeId,
    pub weekly: Vec<Decimal>,
    pub total: Decimal,
    /// Indexes into `weekly` whose total exceeds the attention threshold.
    pub over_threshold_weeks: Vec<usize>,
}

pub fn summarize(
    index: &RecordIndex,
    employee: &Employee,
    window: &[NaiveDate],
    weekly_threshold: Decimal,
) -> HoursSummary {
    let weekly: Vec<Decimal> = partition_into_weeks(window)
        .into_iter()
        .map(|week| weekly_total(index, employee, week))
        .collect();
    let total = weekly.iter().copied().sum();
    let over_threshold_weeks = weekly
        .iter()
        .enumerate()
        .filter(|(_, hours)| **hours > weekly_threshold)
        .map(|(i, _)| i)
        .collect();
    HoursSummary {
        employee_id: employee.id,
        weekly,
        total,
        over_threshold_weeks,
    }
}
