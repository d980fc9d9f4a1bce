// src/store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::records::{
    Employee, EmployeeId, NewEmployee, RequestId, RequestType, Shift, Task, TaskId,
    TimeOffRequest,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),
}

fn io_context<S: Into<String>>(source: std::io::Error, context: S) -> StoreError {
    StoreError::Io {
        source,
        context: context.into(),
    }
}

/// The persistence collaborator: four collections keyed by store-assigned ids,
/// with shifts and requests additionally unique per (employee, date).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All employees in creation order.
    async fn fetch_employees(&self) -> Result<Vec<Employee>, StoreError>;

    /// Shifts dated within `from..=to`.
    async fn fetch_shifts(&self, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Shift>, StoreError>;

    /// Requests dated within `from..=to`.
    async fn fetch_requests(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeOffRequest>, StoreError>;

    /// All tasks in creation order.
    async fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Insert or replace the shift for its (employee, date) key.
    async fn upsert_shift(&self, shift: Shift) -> Result<(), StoreError>;

    async fn delete_shift(&self, employee_id: EmployeeId, date: NaiveDate)
        -> Result<(), StoreError>;

    /// Returns the existing request when one is already recorded for the key.
    async fn insert_request(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<TimeOffRequest, StoreError>;

    async fn delete_request(&self, id: RequestId) -> Result<(), StoreError>;

    async fn insert_employee(&self, fields: NewEmployee) -> Result<Employee, StoreError>;

    /// Also drops the employee's shifts and requests.
    async fn delete_employee(&self, id: EmployeeId) -> Result<(), StoreError>;

    async fn insert_task(&self, name: String) -> Result<Task, StoreError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;
}

// --- In-memory implementation ---

type RecordKey = (EmployeeId, NaiveDate);

#[derive(Debug, Default, Clone)]
struct Collections {
    next_id: u64,
    employees: Vec<Employee>,
    shifts: BTreeMap<RecordKey, Shift>,
    requests: BTreeMap<RecordKey, TimeOffRequest>,
    tasks: Vec<Task>,
}

impl Collections {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_employee(&self, id: EmployeeId) -> bool {
        self.employees.iter().any(|e| e.id == id)
    }
}

/// On-disk form of the store. Maps keyed by tuples do not survive JSON, so shifts
/// and requests are written as flat lists.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    next_id: u64,
    employees: Vec<Employee>,
    shifts: Vec<Shift>,
    requests: Vec<TimeOffRequest>,
    tasks: Vec<Task>,
}

impl From<&Collections> for StoreSnapshot {
    fn from(c: &Collections) -> Self {
        Self {
            next_id: c.next_id,
            employees: c.employees.clone(),
            shifts: c.shifts.values().cloned().collect(),
            requests: c.requests.values().cloned().collect(),
            tasks: c.tasks.clone(),
        }
    }
}

impl From<StoreSnapshot> for Collections {
    fn from(s: StoreSnapshot) -> Self {
        Self {
            next_id: s.next_id,
            employees: s.employees,
            shifts: s.shifts.into_iter().map(|x| (x.key(), x)).collect(),
            requests: s.requests.into_iter().map(|x| (x.key(), x)).collect(),
            tasks: s.tasks,
        }
    }
}

/// Record store held in memory, optionally mirrored to a JSON snapshot file.
/// Mutations are applied to a copy, written out, and only then committed, so a failed
/// write leaves the live records untouched.
#[derive(Clone)]
pub struct InMemoryStore {
    data: Arc<Mutex<Collections>>,
    snapshot_path: Option<PathBuf>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(Collections::default())),
            snapshot_path: None,
        }
    }

    /// Opens a store backed by `path`, loading the snapshot if the file exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let collections = match Self::load_snapshot(path)? {
            Some(snapshot) => {
                info!(
                    "Loaded store snapshot from {} ({} employees, {} shifts, {} requests, {} tasks)",
                    path.display(),
                    snapshot.employees.len(),
                    snapshot.shifts.len(),
                    snapshot.requests.len(),
                    snapshot.tasks.len()
                );
                Collections::from(snapshot)
            }
            None => {
                info!("No store snapshot at {}. Starting empty.", path.display());
                Collections::default()
            }
        };
        Ok(Self {
            data: Arc::new(Mutex::new(collections)),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    fn load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(path)
            .map_err(|e| io_context(e, format!("Failed to read store snapshot: {:?}", path)))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&json_string)?;
        Ok(Some(snapshot))
    }

    async fn persist(&self, collections: &Collections) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                io_context(e, format!("Failed to create snapshot directory: {:?}", parent))
            })?;
        }
        let json_string = serde_json::to_string_pretty(&StoreSnapshot::from(collections))?;
        tokio::fs::write(path, json_string)
            .await
            .map_err(|e| io_context(e, format!("Failed to write snapshot file: {:?}", path)))?;
        debug!("Store snapshot written to {}", path.display());
        Ok(())
    }

    /// Writes `next` out and swaps it in. On error `current` is left as it was.
    async fn commit(
        &self,
        current: &mut Collections,
        next: Collections,
    ) -> Result<(), StoreError> {
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }
}

fn in_range(date: NaiveDate, from: NaiveDate, to: NaiveDate) -> bool {
    from <= date && date <= to
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn fetch_employees(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(self.data.lock().await.employees.clone())
    }

    async fn fetch_shifts(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError> {
        let data = self.data.lock().await;
        Ok(data
            .shifts
            .values()
            .filter(|s| in_range(s.date, from, to))
            .cloned()
            .collect())
    }

    async fn fetch_requests(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeOffRequest>, StoreError> {
        let data = self.data.lock().await;
        Ok(data
            .requests
            .values()
            .filter(|r| in_range(r.date, from, to))
            .cloned()
            .collect())
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.data.lock().await.tasks.clone())
    }

    async fn upsert_shift(&self, shift: Shift) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        if !data.has_employee(shift.employee_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "shift references unknown employee {}",
                shift.employee_id
            )));
        }
        let mut next = data.clone();
        next.shifts.insert(shift.key(), shift);
        self.commit(&mut data, next).await
    }

    async fn delete_shift(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        if next.shifts.remove(&(employee_id, date)).is_none() {
            debug!("No shift to delete for employee {} on {}", employee_id, date);
            return Ok(());
        }
        self.commit(&mut data, next).await
    }

    async fn insert_request(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> Result<TimeOffRequest, StoreError> {
        let mut data = self.data.lock().await;
        if !data.has_employee(employee_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "request references unknown employee {}",
                employee_id
            )));
        }
        if let Some(existing) = data.requests.get(&(employee_id, date)) {
            warn!(
                "Request already recorded for employee {} on {}; keeping id {}",
                employee_id, date, existing.id
            );
            return Ok(existing.clone());
        }
        let mut next = data.clone();
        let request = TimeOffRequest {
            id: next.allocate_id(),
            employee_id,
            date,
            request_type: RequestType::Off,
        };
        next.requests.insert(request.key(), request.clone());
        self.commit(&mut data, next).await?;
        Ok(request)
    }

    async fn delete_request(&self, id: RequestId) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.requests.retain(|_, r| r.id != id);
        if next.requests.len() == data.requests.len() {
            debug!("No request with id {} to delete", id);
            return Ok(());
        }
        self.commit(&mut data, next).await
    }

    async fn insert_employee(&self, fields: NewEmployee) -> Result<Employee, StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let employee = Employee {
            id: next.allocate_id(),
            name: fields.name,
            role: fields.role,
            base_task: fields.base_task,
            default_start_time: fields.default_start_time,
            default_end_time: fields.default_end_time,
        };
        next.employees.push(employee.clone());
        self.commit(&mut data, next).await?;
        Ok(employee)
    }

    async fn delete_employee(&self, id: EmployeeId) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.employees.retain(|e| e.id != id);
        next.shifts.retain(|(emp, _), _| *emp != id);
        next.requests.retain(|(emp, _), _| *emp != id);
        self.commit(&mut data, next).await
    }

    async fn insert_task(&self, name: String) -> Result<Task, StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let task = Task {
            id: next.allocate_id(),
            name,
        };
        next.tasks.push(task.clone());
        self.commit(&mut data, next).await?;
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.tasks.retain(|t| t.id != id);
        self.commit(&mut data, next).await
    }
}
