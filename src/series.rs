//! Derivation of comparable consumption series from the raw upstream arrays.
//!
//! Everything here is pure: the same payload and metas always produce the
//! same series.

use crate::meta::DEFAULT_META;
use crate::models::{ConsumptionSeries, PeriodType, RawPayload, SeriesPoint};
use chrono::{Datelike, NaiveDate};

/// Share of the baseline consumption still used with the efficiency system
/// installed. Unvalidated business assumption: the "without system" baseline is
/// `with / WITH_SYSTEM_FACTOR` whenever the upstream does not measure it.
pub const WITH_SYSTEM_FACTOR: f64 = 0.8;

/// Heuristic "expected if optimized further" projection. Not a measured value.
pub const PREDICTED_FACTOR: f64 = 0.85;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

pub fn derive_monthly(raw: &RawPayload, metas: &[f64]) -> ConsumptionSeries {
    derive_points(
        PeriodType::Monthly,
        &raw.monthly_consumption,
        raw.monthly_without_system.as_deref(),
        metas,
    )
}

pub fn derive_daily(raw: &RawPayload, metas: &[f64]) -> ConsumptionSeries {
    derive_points(
        PeriodType::Daily,
        &raw.daily_consumption,
        raw.daily_without_system.as_deref(),
        metas,
    )
}

/// Daily series for `month` (1-based) of `year`.
///
/// The upstream only measures the current month day by day. For any other
/// month the monthly total is spread evenly across the calendar days and the
/// result is flagged `estimated`: it keeps charts the same shape but it is
/// not a measured daily curve.
pub fn derive_daily_for_month(
    raw: &RawPayload,
    year: i32,
    month: u32,
    today: NaiveDate,
    metas: &[f64],
) -> ConsumptionSeries {
    if year == today.year() && month == today.month() {
        return derive_daily(raw, metas);
    }

    let days = days_in_month(year, month) as usize;
    let month_index = month.saturating_sub(1) as usize;
    let total = raw
        .monthly_consumption
        .get(month_index)
        .copied()
        .map(clamp_non_negative)
        .unwrap_or(0.0);
    let total_without = raw
        .monthly_without_system
        .as_ref()
        .and_then(|values| values.get(month_index).copied())
        .filter(|value| value.is_finite() && *value > 0.0);

    let per_day = if days == 0 { 0.0 } else { total / days as f64 };
    let with_system = vec![per_day; days];
    let without_system = total_without.map(|value| vec![value / days as f64; days]);

    let mut series = derive_points(
        PeriodType::Daily,
        &with_system,
        without_system.as_deref(),
        metas,
    );
    series.estimated = true;
    series
}

/// Number of calendar days in `month` (1-based); 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|next| (next - first).num_days() as u32).unwrap_or(0)
}

pub fn period_label(period: PeriodType, index: usize) -> String {
    match period {
        PeriodType::Monthly => MONTH_LABELS
            .get(index)
            .map(|label| label.to_string())
            .unwrap_or_else(|| format!("M{}", index + 1)),
        PeriodType::Daily => format!("D{}", index + 1),
    }
}

/// Baseline consumption for one period: the measured value when it is
/// positive, otherwise derived from the with-system value.
pub fn without_system_value(with_system: f64, measured: Option<f64>) -> f64 {
    match measured {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => with_system / WITH_SYSTEM_FACTOR,
    }
}

pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

fn derive_points(
    period: PeriodType,
    with_system: &[f64],
    without_system: Option<&[f64]>,
    metas: &[f64],
) -> ConsumptionSeries {
    let mut accumulated = 0.0;
    let points = with_system
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let consumed = clamp_non_negative(*raw);
            let measured = without_system.and_then(|values| values.get(index).copied());
            let baseline = without_system_value(consumed, measured);
            let meta = metas.get(index).copied().unwrap_or(DEFAULT_META);
            let deviation = meta - consumed;
            accumulated += consumed;

            SeriesPoint {
                label: period_label(period, index),
                index,
                consumed_with_system: consumed,
                consumed_without_system: baseline,
                accumulated,
                predicted: consumed * PREDICTED_FACTOR,
                economy: (baseline - consumed).max(0.0),
                meta,
                deviation,
                deviation_percent: percent_of(deviation, meta),
            }
        })
        .collect();

    ConsumptionSeries {
        period,
        estimated: false,
        points,
    }
}

fn clamp_non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
