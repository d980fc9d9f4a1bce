// src/reconcile.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::records::{Employee, EmployeeId, Shift, ShiftStatus, Task, TimeOffRequest};
use crate::time_grid::{grid_slots, hours_between, ClockTime};

// --- Effective Day State ---

/// What a single (employee, date) resolves to once shifts, requests and the
/// employee's defaults have been merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EffectiveDayState {
    WorkingExplicit {
        start: ClockTime,
        end: ClockTime,
        task: String,
        breaks: BTreeSet<ClockTime>,
    },
    OffRequested,
    WorkingDefault {
        start: ClockTime,
        end: ClockTime,
        task: String,
    },
    OffNoData,
}

impl EffectiveDayState {
    pub fn span(&self) -> Option<(ClockTime, ClockTime)> {
        match self {
            Self::WorkingExplicit { start, end, .. } | Self::WorkingDefault { start, end, .. } => {
                Some((*start, *end))
            }
            Self::OffRequested | Self::OffNoData => None,
        }
    }

    pub fn is_working(&self) -> bool {
        self.span().is_some()
    }

    /// Signed span of a working day, zero otherwise. Break slots are not deducted.
    pub fn worked_hours(&self) -> Decimal {
        self.span()
            .map(|(start, end)| hours_between(start, end))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn breaks(&self) -> Option<&BTreeSet<ClockTime>> {
        match self {
            Self::WorkingExplicit { breaks, .. } => Some(breaks),
            _ => None,
        }
    }
}

/// First match wins: shift, then request, then complete defaults, then nothing.
pub fn resolve_day(
    employee: &Employee,
    date: NaiveDate,
    shift: Option<&Shift>,
    request: Option<&TimeOffRequest>,
) -> EffectiveDayState {
    if let Some(shift) = shift {
        if request.is_some() {
            debug!(
                "Employee {} has both a shift and a request on {}; shift wins",
                employee.id, date
            );
        }
        return EffectiveDayState::WorkingExplicit {
            start: shift.start_time,
            end: shift.end_time,
            task: shift.assigned_task.clone(),
            breaks: shift.break_times.clone(),
        };
    }
    if request.is_some() {
        return EffectiveDayState::OffRequested;
    }
    match employee.default_span() {
        Some((start, end)) => EffectiveDayState::WorkingDefault {
            start,
            end,
            task: employee.base_task.clone(),
        },
        None => EffectiveDayState::OffNoData,
    }
}

// --- Break Toggling ---

/// The shift to write back after a break slot was flipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakToggle {
    pub start: ClockTime,
    pub end: ClockTime,
    pub task: String,
    pub breaks: BTreeSet<ClockTime>,
    /// True when the slot became a break, false when it was released.
    pub added: bool,
}

impl BreakToggle {
    pub fn into_shift(self, employee_id: EmployeeId, date: NaiveDate) -> Shift {
        Shift {
            employee_id,
            date,
            start_time: self.start,
            end_time: self.end,
            assigned_task: self.task,
            break_times: self.breaks,
            status: ShiftStatus::Published,
        }
    }
}

/// Flips `slot` in the day's break set. `None` when the day is off or the slot lies
/// outside `[start, end)`.
///
/// An explicit shift keeps its own label, even a blank one; it is not replaced by the
/// base task here. A default day is written out with the base task.
pub fn toggle_break(state: &EffectiveDayState, slot: ClockTime) -> Option<BreakToggle> {
    let (start, end, task, current) = match state {
        EffectiveDayState::WorkingExplicit {
            start,
            end,
            task,
            breaks,
        } => (*start, *end, task, breaks.clone()),
        // Defaults get materialized into an explicit shift.
        EffectiveDayState::WorkingDefault { start, end, task } => {
            (*start, *end, task, BTreeSet::new())
        }
        EffectiveDayState::OffRequested | EffectiveDayState::OffNoData => return None,
    };
    if !(start <= slot && slot < end) {
        return None;
    }

    let mut breaks = current;
    let added = breaks.insert(slot);
    if !added {
        breaks.remove(&slot);
    }
    Some(BreakToggle {
        start,
        end,
        task: task.clone(),
        breaks,
        added,
    })
}

// --- Task Labels ---

/// Label shown in the task view: the shift's own label, blank on a requested day,
/// otherwise the employee's base task.
pub fn display_task(employee: &Employee, state: &EffectiveDayState) -> String {
    match state {
        EffectiveDayState::WorkingExplicit { task, .. } => task.clone(),
        EffectiveDayState::OffRequested => String::new(),
        EffectiveDayState::WorkingDefault { .. } | EffectiveDayState::OffNoData => {
            employee.base_task.clone()
        }
    }
}

/// Master-list names in order, plus `current` at the end when it is a label the list
/// no longer knows about.
pub fn task_options(master: &[Task], current: &str) -> Vec<String> {
    let mut options: Vec<String> = master.iter().map(|t| t.name.clone()).collect();
    if !current.is_empty() && !options.iter().any(|name| name == current) {
        options.push(current.to_string());
    }
    options
}

// --- Daily Grid ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySlot {
    pub time: ClockTime,
    pub working: bool,
    pub on_break: bool,
}

/// The full grid for one day, each slot flagged as working (inside `[start, end)`)
/// and, for explicit shifts, as a break.
pub fn working_slots(state: &EffectiveDayState) -> Vec<DaySlot> {
    let span = state.span();
    let breaks = state.breaks();
    grid_slots()
        .into_iter()
        .map(|time| {
            let working = span.is_some_and(|(start, end)| start <= time && time < end);
            DaySlot {
                time,
                working,
                on_break: working && breaks.is_some_and(|b| b.contains(&time)),
            }
        })
        .collect()
}

// --- Record Index ---

/// Shifts and requests of one fetched window, keyed for O(1) lookup while the
/// views walk every (employee, date) pair.
#[derive(Debug, Default)]
pub struct RecordIndex {
    shifts: HashMap<(EmployeeId, NaiveDate), Shift>,
    requests: HashMap<(EmployeeId, NaiveDate), TimeOffRequest>,
}

impl RecordIndex {
    pub fn new(shifts: Vec<Shift>, requests: Vec<TimeOffRequest>) -> Self {
        Self {
            shifts: shifts.into_iter().map(|s| (s.key(), s)).collect(),
            requests: requests.into_iter().map(|r| (r.key(), r)).collect(),
        }
    }

    pub fn shift(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<&Shift> {
        self.shifts.get(&(employee_id, date))
    }

    pub fn request(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<&TimeOffRequest> {
        self.requests.get(&(employee_id, date))
    }

    pub fn resolve(&self, employee: &Employee, date: NaiveDate) -> EffectiveDayState {
        resolve_day(
            employee,
            date,
            self.shift(employee.id, date),
            self.request(employee.id, date),
        )
    }
}
