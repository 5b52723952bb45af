use crate::aggregate::fetch_aggregate;
use crate::devices::{self, Device, DeviceSelection};
use crate::errors::AppError;
use crate::models::{
    GoalResponse, PeriodType, RawPayload, SeriesQuery, SeriesResponse, ValueBody,
};
use crate::series::{days_in_month, derive_daily_for_month, derive_monthly};
use crate::state::AppState;
use crate::stats::{build_summary, cost_series, goal_savings, last_three_months, peak_hours};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Local, NaiveDate};
use tracing::info;

pub async fn list_devices() -> Json<Vec<Device>> {
    Json(devices::catalog().to_vec())
}

/// Drops every cached upstream payload so the next read refetches.
pub async fn refresh(State(state): State<AppState>) -> StatusCode {
    state.api.invalidate_all();
    info!("consumption cache invalidated");
    StatusCode::NO_CONTENT
}

pub async fn get_series(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, AppError> {
    let selection = parse_device(&device)?;
    let period = match query.period.as_deref() {
        Some(period) => parse_period(period)?,
        None => PeriodType::Monthly,
    };
    let today = Local::now().date_naive();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());
    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("month must be between 1 and 12"));
    }

    let (raw, errors) = load_payload(&state, selection).await;
    Ok(Json(build_response(
        &state,
        selection,
        period,
        &raw,
        year,
        month,
        today,
        query.index,
        errors,
    )))
}

pub async fn get_meta(
    State(state): State<AppState>,
    Path((device, period, index)): Path<(String, String, usize)>,
) -> Result<Json<ValueBody>, AppError> {
    let (selection, period) = parse_target(&device, &period)?;
    let value = state.metas.load_meta(selection, period, index);
    Ok(Json(ValueBody { value }))
}

pub async fn put_meta(
    State(state): State<AppState>,
    Path((device, period, index)): Path<(String, String, usize)>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ValueBody>, AppError> {
    let (selection, period) = parse_target(&device, &period)?;
    state
        .metas
        .save_meta(selection, period, index, body.value)
        .await?;
    Ok(Json(ValueBody { value: body.value }))
}

pub async fn get_activation_meta(
    State(state): State<AppState>,
    Path((device, period, index)): Path<(String, String, usize)>,
) -> Result<Json<ValueBody>, AppError> {
    let (selection, period) = parse_target(&device, &period)?;
    let value = state.metas.load_activation_meta(selection, period, index);
    Ok(Json(ValueBody { value }))
}

pub async fn put_activation_meta(
    State(state): State<AppState>,
    Path((device, period, index)): Path<(String, String, usize)>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ValueBody>, AppError> {
    let (selection, period) = parse_target(&device, &period)?;
    state
        .metas
        .save_activation_meta(selection, period, index, body.value)
        .await?;
    Ok(Json(ValueBody { value: body.value }))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> Result<Json<GoalResponse>, AppError> {
    let selection = parse_device(&device)?;
    Ok(Json(GoalResponse {
        value: state.metas.load_goal(selection),
    }))
}

pub async fn put_goal(
    State(state): State<AppState>,
    Path(device): Path<String>,
    Json(body): Json<ValueBody>,
) -> Result<Json<GoalResponse>, AppError> {
    let selection = parse_device(&device)?;
    state.metas.save_goal(selection, body.value).await?;
    Ok(Json(GoalResponse {
        value: Some(body.value),
    }))
}

async fn load_payload(state: &AppState, selection: DeviceSelection) -> (RawPayload, Vec<String>) {
    match selection {
        DeviceSelection::Device(id) => {
            let outcome = state.api.fetch_or_default(id, true).await;
            let errors = outcome.error.iter().map(|err| err.to_string()).collect();
            (outcome.payload.as_ref().clone(), errors)
        }
        DeviceSelection::All => {
            let outcome = fetch_aggregate(&state.api, &devices::all_device_ids(), true).await;
            let errors = outcome
                .failures
                .iter()
                .map(|(id, err)| format!("device {id}: {err}"))
                .collect();
            (outcome.payload, errors)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_response(
    state: &AppState,
    selection: DeviceSelection,
    period: PeriodType,
    raw: &RawPayload,
    year: i32,
    month: u32,
    today: NaiveDate,
    index: Option<usize>,
    errors: Vec<String>,
) -> SeriesResponse {
    let is_current_month = year == today.year() && month == today.month();
    let (series, default_index) = match period {
        PeriodType::Monthly => {
            let metas = state
                .metas
                .load_metas(selection, period, raw.monthly_consumption.len());
            (derive_monthly(raw, &metas), month as usize - 1)
        }
        PeriodType::Daily => {
            let count = if is_current_month {
                raw.daily_consumption.len()
            } else {
                days_in_month(year, month) as usize
            };
            let metas = state.metas.load_metas(selection, period, count);
            let default_index = if is_current_month { today.day0() as usize } else { 0 };
            (derive_daily_for_month(raw, year, month, today, &metas), default_index)
        }
    };

    let selected_index = index.unwrap_or(default_index);
    let activation_meta = state
        .metas
        .load_activation_meta(selection, period, selected_index);
    // Downtime and power samples are only reported for the current month.
    let estimated_raw = RawPayload::default();
    let measured = if series.estimated { &estimated_raw } else { raw };
    let summary = build_summary(measured, &series, selected_index, activation_meta);
    let goal = state.metas.load_goal(selection);
    let recent_months = match period {
        PeriodType::Monthly => last_three_months(&series).to_vec(),
        PeriodType::Daily => Vec::new(),
    };
    let device_name = match selection {
        DeviceSelection::Device(id) => devices::find(id).map(|device| device.name),
        DeviceSelection::All => None,
    };

    SeriesResponse {
        device: selection.to_string(),
        device_name,
        costs: cost_series(&series),
        recent_months,
        peak_hours: peak_hours(&measured.power_samples, &Local),
        goal_savings: goal_savings(summary.total_consumption, goal),
        goal,
        series,
        summary,
        errors,
    }
}

fn parse_device(device: &str) -> Result<DeviceSelection, AppError> {
    device.parse().map_err(AppError::bad_request)
}

fn parse_period(period: &str) -> Result<PeriodType, AppError> {
    period.parse().map_err(AppError::bad_request)
}

fn parse_target(device: &str, period: &str) -> Result<(DeviceSelection, PeriodType), AppError> {
    Ok((parse_device(device)?, parse_period(period)?))
}
