// src/records.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::time_grid::ClockTime;

// --- Identifiers ---

pub type EmployeeId = u64;
pub type RequestId = u64;
pub type TaskId = u64;

// --- Employee Data ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub base_task: String,
    pub default_start_time: Option<ClockTime>,
    pub default_end_time: Option<ClockTime>,
}

impl Employee {
    /// Both defaults are needed before a day can fall back to them.
    pub fn default_span(&self) -> Option<(ClockTime, ClockTime)> {
        self.default_start_time.zip(self.default_end_time)
    }
}

/// Fields supplied when an admin adds an employee; the store assigns the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub base_task: String,
    pub default_start_time: Option<ClockTime>,
    pub default_end_time: Option<ClockTime>,
}

// --- Shifts ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    #[default]
    Published,
}

/// An explicit assignment. At most one exists per (employee, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    /// Free-form label. Not a reference into the task list.
    #[serde(default)]
    pub assigned_task: String,
    #[serde(default)]
    pub break_times: BTreeSet<ClockTime>,
    #[serde(default)]
    pub status: ShiftStatus,
}

impl Shift {
    pub fn key(&self) -> (EmployeeId, NaiveDate) {
        (self.employee_id, self.date)
    }
}

// --- Time-off Requests ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    #[default]
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    #[serde(default)]
    pub request_type: RequestType,
}

impl TimeOffRequest {
    pub fn key(&self) -> (EmployeeId, NaiveDate) {
        (self.employee_id, self.date)
    }
}

// --- Task Master List ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
}
