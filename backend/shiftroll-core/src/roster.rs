// src/roster.rs
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{partition_into_weeks, summarize, HoursSummary};
use crate::clock::Clock;
use crate::export::{hours_csv, ExportError};
use crate::period::{PayPeriod, PeriodError};
use crate::reconcile::{
    display_task, resolve_day, task_options, toggle_break, working_slots, DaySlot,
    EffectiveDayState, RecordIndex,
};
use crate::records::{
    Employee, EmployeeId, NewEmployee, Shift, ShiftStatus, Task, TaskId,
};
use crate::store::{RecordStore, StoreError};
use crate::time_grid::{grid_slots, ClockTime, FALLBACK_SHIFT_END, FALLBACK_SHIFT_START};

// --- Errors ---

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown employee {0}")]
    UnknownEmployee(EmployeeId),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

// --- Mutation Outcomes ---

/// Who is acting. Staff self-service is gated by the submission deadline, admin
/// edits are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UiMode {
    Admin,
    Staff { employee_id: EmployeeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RefusalReason {
    SubmissionClosed { deadline: NaiveDateTime },
    NotOwnRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    Applied,
    NoOp,
    Refused(RefusalReason),
}

/// Fields an admin may supply when assigning a shift. Missing fields fall back to the
/// existing shift, then the employee's defaults, then 09:00-17:00 and a blank task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShiftPatch {
    pub start: Option<ClockTime>,
    pub end: Option<ClockTime>,
    /// `Some("")` clears the label; `None` keeps the fallback chain.
    pub task: Option<String>,
}

// --- Views ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodOverview {
    pub year: i32,
    pub month: u32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub deadline: NaiveDateTime,
    pub submission_closed: bool,
    pub weeks: Vec<Vec<NaiveDate>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayEntry {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub state: EffectiveDayState,
    pub hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRoster {
    pub employee: Employee,
    pub days: Vec<DayEntry>,
    pub summary: HoursSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterView {
    pub period: PeriodOverview,
    pub employees: Vec<EmployeeRoster>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCell {
    pub date: NaiveDate,
    pub task: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeTasks {
    pub employee_id: EmployeeId,
    pub name: String,
    pub days: Vec<TaskCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardRow {
    pub employee_id: EmployeeId,
    pub name: String,
    pub task: String,
    pub task_options: Vec<String>,
    #[serde(flatten)]
    pub state: EffectiveDayState,
    pub slots: Vec<DaySlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBoard {
    pub date: NaiveDate,
    pub grid: Vec<ClockTime>,
    pub rows: Vec<BoardRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffDay {
    pub date: NaiveDate,
    /// Only an explicit shift is shown to staff; defaults stay an admin concern.
    pub shift: Option<(ClockTime, ClockTime)>,
    pub requested_off: bool,
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffCalendar {
    pub employee_id: EmployeeId,
    pub name: String,
    pub deadline: NaiveDateTime,
    pub submission_closed: bool,
    pub days: Vec<StaffDay>,
}

/// Everything a period view needs, fetched in one go.
pub struct PeriodSnapshot {
    pub period: PayPeriod,
    pub window: Vec<NaiveDate>,
    pub employees: Vec<Employee>,
    pub tasks: Vec<Task>,
    pub index: RecordIndex,
}

// --- Service ---

pub struct RosterService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    weekly_threshold: Decimal,
}

impl RosterService {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, weekly_threshold: Decimal) -> Self {
        Self {
            store,
            clock,
            weekly_threshold,
        }
    }

    /// The period today's date belongs to.
    pub fn current_period(&self) -> Result<PayPeriod, RosterError> {
        Ok(PayPeriod::containing(self.clock.today())?)
    }

    pub async fn load_period(&self, year: i32, month: u32) -> Result<PeriodSnapshot, RosterError> {
        let period = PayPeriod::new(year, month)?;
        let (first, last) = (period.first_day(), period.last_day());
        let (employees, shifts, requests, tasks) = tokio::try_join!(
            self.store.fetch_employees(),
            self.store.fetch_shifts(first, last),
            self.store.fetch_requests(first, last),
            self.store.fetch_tasks(),
        )?;
        debug!(
            "Loaded period {}-{:02}: {} employees, {} shifts, {} requests, {} tasks",
            year,
            month,
            employees.len(),
            shifts.len(),
            requests.len(),
            tasks.len()
        );
        Ok(PeriodSnapshot {
            window: period.window(),
            period,
            employees,
            tasks,
            index: RecordIndex::new(shifts, requests),
        })
    }

    fn overview(&self, period: &PayPeriod, window: &[NaiveDate]) -> PeriodOverview {
        PeriodOverview {
            year: period.year(),
            month: period.month(),
            first_day: period.first_day(),
            last_day: period.last_day(),
            deadline: period.deadline(),
            submission_closed: period.is_submission_closed(self.clock.now()),
            weeks: partition_into_weeks(window)
                .into_iter()
                .map(<[NaiveDate]>::to_vec)
                .collect(),
        }
    }

    pub fn period_overview(&self, year: i32, month: u32) -> Result<PeriodOverview, RosterError> {
        let period = PayPeriod::new(year, month)?;
        Ok(self.overview(&period, &period.window()))
    }

    pub async fn roster_view(&self, year: i32, month: u32) -> Result<RosterView, RosterError> {
        let snapshot = self.load_period(year, month).await?;
        let employees = snapshot
            .employees
            .iter()
            .map(|employee| {
                let days = snapshot
                    .window
                    .iter()
                    .map(|date| {
                        let state = snapshot.index.resolve(employee, *date);
                        DayEntry {
                            date: *date,
                            hours: state.worked_hours(),
                            state,
                        }
                    })
                    .collect();
                EmployeeRoster {
                    employee: employee.clone(),
                    days,
                    summary: summarize(
                        &snapshot.index,
                        employee,
                        &snapshot.window,
                        self.weekly_threshold,
                    ),
                }
            })
            .collect();
        Ok(RosterView {
            period: self.overview(&snapshot.period, &snapshot.window),
            employees,
        })
    }

    pub async fn task_view(&self, year: i32, month: u32) -> Result<Vec<EmployeeTasks>, RosterError> {
        let snapshot = self.load_period(year, month).await?;
        Ok(snapshot
            .employees
            .iter()
            .map(|employee| EmployeeTasks {
                employee_id: employee.id,
                name: employee.name.clone(),
                days: snapshot
                    .window
                    .iter()
                    .map(|date| {
                        let state = snapshot.index.resolve(employee, *date);
                        let task = display_task(employee, &state);
                        TaskCell {
                            date: *date,
                            options: task_options(&snapshot.tasks, &task),
                            task,
                        }
                    })
                    .collect(),
            })
            .collect())
    }

    pub async fn hours_summaries(
        &self,
        year: i32,
        month: u32,
    ) -> Result<(Vec<NaiveDate>, Vec<(Employee, HoursSummary)>), RosterError> {
        let snapshot = self.load_period(year, month).await?;
        let week_starts = partition_into_weeks(&snapshot.window)
            .into_iter()
            .filter_map(|week| week.first().copied())
            .collect();
        let rows = snapshot
            .employees
            .into_iter()
            .map(|employee| {
                let summary = summarize(
                    &snapshot.index,
                    &employee,
                    &snapshot.window,
                    self.weekly_threshold,
                );
                (employee, summary)
            })
            .collect();
        Ok((week_starts, rows))
    }

    pub async fn hours_csv(&self, year: i32, month: u32) -> Result<String, RosterError> {
        let (week_starts, rows) = self.hours_summaries(year, month).await?;
        Ok(hours_csv(&week_starts, &rows)?)
    }

    pub async fn daily_board(&self, date: NaiveDate) -> Result<DailyBoard, RosterError> {
        let (employees, shifts, requests, tasks) = tokio::try_join!(
            self.store.fetch_employees(),
            self.store.fetch_shifts(date, date),
            self.store.fetch_requests(date, date),
            self.store.fetch_tasks(),
        )?;
        let index = RecordIndex::new(shifts, requests);
        let rows = employees
            .iter()
            .map(|employee| {
                let state = index.resolve(employee, date);
                let task = board_task(employee, &state);
                BoardRow {
                    employee_id: employee.id,
                    name: employee.name.clone(),
                    task_options: task_options(&tasks, &task),
                    task,
                    slots: working_slots(&state),
                    state,
                }
            })
            .collect();
        Ok(DailyBoard {
            date,
            grid: grid_slots(),
            rows,
        })
    }

    pub async fn staff_calendar(
        &self,
        year: i32,
        month: u32,
        employee_id: EmployeeId,
    ) -> Result<StaffCalendar, RosterError> {
        let snapshot = self.load_period(year, month).await?;
        let employee = snapshot
            .employees
            .iter()
            .find(|e| e.id == employee_id)
            .ok_or(RosterError::UnknownEmployee(employee_id))?;
        let days = snapshot
            .window
            .iter()
            .map(|date| {
                let shift = snapshot.index.shift(employee_id, *date);
                let task = match shift {
                    Some(s) if !s.assigned_task.is_empty() => s.assigned_task.clone(),
                    _ => employee.base_task.clone(),
                };
                StaffDay {
                    date: *date,
                    shift: shift.map(|s| (s.start_time, s.end_time)),
                    requested_off: snapshot.index.request(employee_id, *date).is_some(),
                    task,
                }
            })
            .collect();
        Ok(StaffCalendar {
            employee_id,
            name: employee.name.clone(),
            deadline: snapshot.period.deadline(),
            submission_closed: snapshot.period.is_submission_closed(self.clock.now()),
            days,
        })
    }

    // --- Shift mutations ---

    async fn find_employee(&self, employee_id: EmployeeId) -> Result<Employee, RosterError> {
        self.store
            .fetch_employees()
            .await?
            .into_iter()
            .find(|e| e.id == employee_id)
            .ok_or(RosterError::UnknownEmployee(employee_id))
    }

    async fn existing_shift(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<Option<Shift>, RosterError> {
        Ok(self
            .store
            .fetch_shifts(date, date)
            .await?
            .into_iter()
            .find(|s| s.employee_id == employee_id))
    }

    /// Upserts the shift for (employee, date), filling unsupplied fields from the
    /// existing shift, then the employee, then the fixed fallbacks. Breaks carry over.
    pub async fn assign_shift(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
        patch: ShiftPatch,
    ) -> Result<Shift, RosterError> {
        check_on_grid([patch.start, patch.end])?;
        let employee = self.find_employee(employee_id).await?;
        let existing = self.existing_shift(employee_id, date).await?;

        let start_time = patch
            .start
            .or(existing.as_ref().map(|s| s.start_time))
            .or(employee.default_start_time)
            .unwrap_or(FALLBACK_SHIFT_START);
        let end_time = patch
            .end
            .or(existing.as_ref().map(|s| s.end_time))
            .or(employee.default_end_time)
            .unwrap_or(FALLBACK_SHIFT_END);
        check_span(start_time, end_time)?;
        let assigned_task = match patch.task {
            Some(task) => task,
            None => existing
                .as_ref()
                .map(|s| s.assigned_task.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| employee.base_task.clone()),
        };
        // Breaks the new span no longer covers are dropped.
        let break_times = existing
            .map(|s| {
                s.break_times
                    .into_iter()
                    .filter(|b| start_time <= *b && *b < end_time)
                    .collect()
            })
            .unwrap_or_default();

        let shift = Shift {
            employee_id,
            date,
            start_time,
            end_time,
            assigned_task,
            break_times,
            status: ShiftStatus::Published,
        };
        self.store.upsert_shift(shift.clone()).await?;
        info!(
            "Assigned shift for employee {} on {}: {}-{} '{}'",
            employee_id, date, shift.start_time, shift.end_time, shift.assigned_task
        );
        Ok(shift)
    }

    pub async fn clear_shift(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<MutationOutcome, RosterError> {
        if self.existing_shift(employee_id, date).await?.is_none() {
            debug!("No shift to clear for employee {} on {}", employee_id, date);
            return Ok(MutationOutcome::NoOp);
        }
        self.store.delete_shift(employee_id, date).await?;
        info!("Cleared shift for employee {} on {}", employee_id, date);
        Ok(MutationOutcome::Applied)
    }

    pub async fn toggle_break(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
        slot: ClockTime,
    ) -> Result<MutationOutcome, RosterError> {
        if !slot.is_on_grid() {
            return Err(RosterError::InvalidInput(format!(
                "{} is not a grid slot",
                slot
            )));
        }
        let employee = self.find_employee(employee_id).await?;
        let (shifts, requests) = tokio::try_join!(
            self.store.fetch_shifts(date, date),
            self.store.fetch_requests(date, date),
        )?;
        let shift = shifts.iter().find(|s| s.employee_id == employee_id);
        let request = requests.iter().find(|r| r.employee_id == employee_id);
        let state = resolve_day(&employee, date, shift, request);

        let Some(toggle) = toggle_break(&state, slot) else {
            warn!(
                "Break toggle at {} ignored for employee {} on {}: not a working slot",
                slot, employee_id, date
            );
            return Ok(MutationOutcome::NoOp);
        };
        let added = toggle.added;
        self.store
            .upsert_shift(toggle.into_shift(employee_id, date))
            .await?;
        info!(
            "Break at {} {} for employee {} on {}",
            slot,
            if added { "added" } else { "removed" },
            employee_id,
            date
        );
        Ok(MutationOutcome::Applied)
    }

    // --- Time-off requests ---

    /// Deletes the request for (employee, date) if there is one, otherwise records it.
    /// Staff may only touch their own days and only until the period's deadline.
    pub async fn toggle_time_off(
        &self,
        mode: UiMode,
        year: i32,
        month: u32,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<MutationOutcome, RosterError> {
        let period = PayPeriod::new(year, month)?;
        if !period.contains(date) {
            return Err(RosterError::InvalidInput(format!(
                "{} is outside period {}-{:02} ({} - {})",
                date,
                year,
                month,
                period.first_day(),
                period.last_day()
            )));
        }
        if let UiMode::Staff { employee_id: acting } = mode {
            if acting != employee_id {
                warn!(
                    "Staff {} tried to change time off for employee {}",
                    acting, employee_id
                );
                return Ok(MutationOutcome::Refused(RefusalReason::NotOwnRecord));
            }
            if period.is_submission_closed(self.clock.now()) {
                warn!(
                    "Time-off change for employee {} on {} refused: submissions closed at {}",
                    employee_id,
                    date,
                    period.deadline()
                );
                return Ok(MutationOutcome::Refused(RefusalReason::SubmissionClosed {
                    deadline: period.deadline(),
                }));
            }
        }
        self.find_employee(employee_id).await?;

        let existing = self
            .store
            .fetch_requests(date, date)
            .await?
            .into_iter()
            .find(|r| r.employee_id == employee_id);
        match existing {
            Some(request) => {
                self.store.delete_request(request.id).await?;
                info!("Withdrew time-off request for employee {} on {}", employee_id, date);
            }
            None => {
                let request = self.store.insert_request(employee_id, date).await?;
                info!(
                    "Recorded time-off request {} for employee {} on {}",
                    request.id, employee_id, date
                );
            }
        }
        Ok(MutationOutcome::Applied)
    }

    // --- Master data ---

    pub async fn list_employees(&self) -> Result<Vec<Employee>, RosterError> {
        Ok(self.store.fetch_employees().await?)
    }

    pub async fn add_employee(&self, fields: NewEmployee) -> Result<Employee, RosterError> {
        if fields.name.trim().is_empty() {
            return Err(RosterError::InvalidInput("employee name is empty".to_string()));
        }
        check_on_grid([fields.default_start_time, fields.default_end_time])?;
        if let (Some(start), Some(end)) = (fields.default_start_time, fields.default_end_time) {
            check_span(start, end)?;
        }
        let employee = self.store.insert_employee(fields).await?;
        info!("Added employee {} ({})", employee.id, employee.name);
        Ok(employee)
    }

    pub async fn remove_employee(&self, employee_id: EmployeeId) -> Result<(), RosterError> {
        self.find_employee(employee_id).await?;
        self.store.delete_employee(employee_id).await?;
        info!("Removed employee {} with their shifts and requests", employee_id);
        Ok(())
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, RosterError> {
        Ok(self.store.fetch_tasks().await?)
    }

    pub async fn add_task(&self, name: &str) -> Result<Task, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::InvalidInput("task name is empty".to_string()));
        }
        let task = self.store.insert_task(name.to_string()).await?;
        info!("Added task {} ({})", task.id, task.name);
        Ok(task)
    }

    pub async fn remove_task(&self, task_id: TaskId) -> Result<(), RosterError> {
        self.store.delete_task(task_id).await?;
        info!("Removed task {}", task_id);
        Ok(())
    }
}

fn check_on_grid(times: [Option<ClockTime>; 2]) -> Result<(), RosterError> {
    for time in times.into_iter().flatten() {
        if !time.is_on_grid() {
            return Err(RosterError::InvalidInput(format!(
                "{} is not a half-hour slot between 08:00 and 20:00",
                time
            )));
        }
    }
    Ok(())
}

fn check_span(start: ClockTime, end: ClockTime) -> Result<(), RosterError> {
    if end <= start {
        return Err(RosterError::InvalidInput(format!(
            "shift must end after it starts ({} - {})",
            start, end
        )));
    }
    Ok(())
}

/// Daily board label: a non-empty shift label, else the employee's base task.
fn board_task(employee: &Employee, state: &EffectiveDayState) -> String {
    match state {
        EffectiveDayState::WorkingExplicit { task, .. } if !task.is_empty() => task.clone(),
        _ => employee.base_task.clone(),
    }
}
