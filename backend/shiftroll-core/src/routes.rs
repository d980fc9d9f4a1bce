// src/routes.rs
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::period::PayPeriod;
use crate::records::{EmployeeId, NewEmployee, TaskId};
use crate::roster::{MutationOutcome, RosterService, ShiftPatch, UiMode};
use crate::time_grid::{ClockTime, OFF_MARKER};
use crate::AppError;

// --- App State ---

#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<RosterService>,
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/periods/current", get(handle_current_period))
        .route("/periods/{year}/{month}", get(handle_period))
        .route("/periods/{year}/{month}/roster", get(handle_roster))
        .route("/periods/{year}/{month}/tasks", get(handle_task_view))
        .route("/periods/{year}/{month}/hours.csv", get(handle_hours_csv))
        .route(
            "/periods/{year}/{month}/staff/{employee_id}",
            get(handle_staff_calendar),
        )
        .route("/days/{date}", get(handle_daily_board))
        .route(
            "/shifts/{employee_id}/{date}",
            put(handle_assign_shift).delete(handle_clear_shift),
        )
        .route("/shifts/{employee_id}/{date}/breaks", post(handle_toggle_break))
        .route("/requests/{employee_id}/{date}", post(handle_toggle_time_off))
        .route("/employees", get(handle_list_employees).post(handle_add_employee))
        .route("/employees/{id}", delete(handle_remove_employee))
        .route("/tasks", get(handle_list_tasks).post(handle_add_task))
        .route("/tasks/{id}", delete(handle_remove_task));

    Router::new()
        .route("/health", get(handle_health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Request Bodies ---

/// Shift edit as sent by the roster grid. A start of `"off"` clears the day.
#[derive(Debug, Default, Deserialize)]
pub struct ShiftUpdateBody {
    pub start: Option<String>,
    pub end: Option<String>,
    pub task: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BreakToggleBody {
    pub slot: ClockTime,
}

/// Time-off toggle. The period defaults to the one containing the date.
#[derive(Debug, Deserialize)]
pub struct TimeOffBody {
    #[serde(flatten)]
    pub mode: UiMode,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NewTaskBody {
    pub name: String,
}

fn parse_time(raw: Option<String>) -> Result<Option<ClockTime>, AppError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<ClockTime>())
        .transpose()
        .map_err(AppError::from)
}

fn outcome_response(outcome: MutationOutcome) -> Response {
    let status = match outcome {
        MutationOutcome::Refused(_) => StatusCode::CONFLICT,
        MutationOutcome::Applied | MutationOutcome::NoOp => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

// --- Handlers ---

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_current_period(State(state): State<AppState>) -> Result<Response, AppError> {
    let period = state.roster.current_period()?;
    let overview = state
        .roster
        .period_overview(period.year(), period.month())?;
    Ok(Json(overview).into_response())
}

async fn handle_period(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Response, AppError> {
    Ok(Json(state.roster.period_overview(year, month)?).into_response())
}

async fn handle_roster(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Response, AppError> {
    Ok(Json(state.roster.roster_view(year, month).await?).into_response())
}

async fn handle_task_view(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Response, AppError> {
    Ok(Json(state.roster.task_view(year, month).await?).into_response())
}

async fn handle_hours_csv(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Response, AppError> {
    let csv = state.roster.hours_csv(year, month).await?;
    let disposition = format!("attachment; filename=\"hours-{}-{:02}.csv\"", year, month);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn handle_staff_calendar(
    State(state): State<AppState>,
    Path((year, month, employee_id)): Path<(i32, u32, EmployeeId)>,
) -> Result<Response, AppError> {
    Ok(Json(state.roster.staff_calendar(year, month, employee_id).await?).into_response())
}

async fn handle_daily_board(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Response, AppError> {
    Ok(Json(state.roster.daily_board(date).await?).into_response())
}

async fn handle_assign_shift(
    State(state): State<AppState>,
    Path((employee_id, date)): Path<(EmployeeId, NaiveDate)>,
    Json(body): Json<ShiftUpdateBody>,
) -> Result<Response, AppError> {
    if body.start.as_deref() == Some(OFF_MARKER) {
        info!("Start set to off for employee {} on {}", employee_id, date);
        let outcome = state.roster.clear_shift(employee_id, date).await?;
        return Ok(outcome_response(outcome));
    }
    let patch = ShiftPatch {
        start: parse_time(body.start)?,
        end: parse_time(body.end)?,
        task: body.task,
    };
    let shift = state.roster.assign_shift(employee_id, date, patch).await?;
    Ok(Json(shift).into_response())
}

async fn handle_clear_shift(
    State(state): State<AppState>,
    Path((employee_id, date)): Path<(EmployeeId, NaiveDate)>,
) -> Result<Response, AppError> {
    let outcome = state.roster.clear_shift(employee_id, date).await?;
    Ok(outcome_response(outcome))
}

async fn handle_toggle_break(
    State(state): State<AppState>,
    Path((employee_id, date)): Path<(EmployeeId, NaiveDate)>,
    Json(body): Json<BreakToggleBody>,
) -> Result<Response, AppError> {
    let outcome = state
        .roster
        .toggle_break(employee_id, date, body.slot)
        .await?;
    Ok(outcome_response(outcome))
}

async fn handle_toggle_time_off(
    State(state): State<AppState>,
    Path((employee_id, date)): Path<(EmployeeId, NaiveDate)>,
    Json(body): Json<TimeOffBody>,
) -> Result<Response, AppError> {
    let (year, month) = match (body.year, body.month) {
        (Some(year), Some(month)) => (year, month),
        _ => {
            let period = PayPeriod::containing(date)?;
            (period.year(), period.month())
        }
    };
    let outcome = state
        .roster
        .toggle_time_off(body.mode, year, month, employee_id, date)
        .await?;
    Ok(outcome_response(outcome))
}

async fn handle_list_employees(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(Json(state.roster.list_employees().await?).into_response())
}

async fn handle_add_employee(
    State(state): State<AppState>,
    Json(fields): Json<NewEmployee>,
) -> Result<Response, AppError> {
    let employee = state.roster.add_employee(fields).await?;
    Ok((StatusCode::CREATED, Json(employee)).into_response())
}

async fn handle_remove_employee(
    State(state): State<AppState>,
    Path(id): Path<EmployeeId>,
) -> Result<Response, AppError> {
    state.roster.remove_employee(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn handle_list_tasks(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(Json(state.roster.list_tasks().await?).into_response())
}

async fn handle_add_task(
    State(state): State<AppState>,
    Json(body): Json<NewTaskBody>,
) -> Result<Response, AppError> {
    let task = state.roster.add_task(&body.name).await?;
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

async fn handle_remove_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<Response, AppError> {
    state.roster.remove_task(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
