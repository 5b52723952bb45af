use crate::models::{
    ConsumptionSeries, CostPoint, GoalSavings, HourlyPower, PeriodComparison, PeriodType,
    RawPayload, SeriesPoint, SeriesSummary,
};
use crate::series::percent_of;
use chrono::{TimeZone, Timelike};
use std::collections::BTreeMap;

/// Price per kWh behind the cost chart.
pub const CHART_TARIFF: f64 = 0.80;

/// Price per kWh used for the estimated bill and the savings against a goal.
/// Not the same figure as [`CHART_TARIFF`]; both are business assumptions.
pub const GOAL_TARIFF: f64 = 0.87;

/// Reference line drawn on the monthly cost chart, in kWh.
pub const MONTHLY_CHART_TARGET: f64 = 3000.0;

/// Monthly reference spread over a 31-day month.
pub const DAILY_CHART_TARGET: f64 = 4200.0 / 31.0;

const WATTS_PER_KILOWATT: f64 = 1000.0;
const HOURS_PER_DAY: f64 = 24.0;
/// Thirty days of activation; the upstream reports monthly downtime against it.
const HOURS_PER_MONTH: f64 = 720.0;

pub fn build_summary(
    raw: &RawPayload,
    series: &ConsumptionSeries,
    selected_index: usize,
    activation_meta: f64,
) -> SeriesSummary {
    let total_consumption = total_consumption(series, selected_index);
    let total_economy = total_economy(series);

    SeriesSummary {
        selected_index,
        total_consumption,
        total_economy,
        economy_rate: economy_rate(total_economy, total_consumption),
        comparison: comparison_with_previous(series, selected_index),
        activation_hours: activation_hours(raw, series.period, selected_index),
        activation_meta,
    }
}

/// Daily series sum the whole month; monthly series report the selected month.
pub fn total_consumption(series: &ConsumptionSeries, selected_index: usize) -> f64 {
    match series.period {
        PeriodType::Daily => series.points.iter().map(|p| p.consumed_with_system).sum(),
        PeriodType::Monthly => series
            .points
            .get(selected_index)
            .map(|p| p.consumed_with_system)
            .unwrap_or(0.0),
    }
}

pub fn total_economy(series: &ConsumptionSeries) -> f64 {
    let without: f64 = series.points.iter().map(|p| p.consumed_without_system).sum();
    let with: f64 = series.points.iter().map(|p| p.consumed_with_system).sum();
    (without - with).max(0.0)
}

pub fn economy_rate(total_economy: f64, total_consumption: f64) -> f64 {
    if total_consumption <= 0.0 {
        return 0.0;
    }
    percent_of(total_economy, total_consumption).min(100.0)
}

/// Positive percent change means consumption dropped against the previous
/// period.
pub fn comparison_with_previous(series: &ConsumptionSeries, index: usize) -> PeriodComparison {
    let none = PeriodComparison {
        percent_change: 0.0,
        current_value: 0.0,
        previous_value: 0.0,
    };
    if series.len() < 2 {
        return none;
    }

    let current_index = index.min(series.len() - 1);
    if current_index == 0 {
        return none;
    }

    let current_value = series.points[current_index].consumed_with_system;
    let previous_value = series.points[current_index - 1].consumed_with_system;
    PeriodComparison {
        percent_change: percent_of(previous_value - current_value, previous_value),
        current_value,
        previous_value,
    }
}

pub fn activation_hours(raw: &RawPayload, period: PeriodType, index: usize) -> f64 {
    let (available, downtime) = match period {
        PeriodType::Daily => (HOURS_PER_DAY, &raw.daily_downtime_minutes),
        PeriodType::Monthly => (HOURS_PER_MONTH, &raw.monthly_downtime_minutes),
    };
    let minutes = downtime
        .get(index)
        .copied()
        .filter(|m| m.is_finite())
        .unwrap_or(0.0);
    (available - minutes / 60.0).max(0.0)
}

pub fn last_three_months(series: &ConsumptionSeries) -> &[SeriesPoint] {
    let start = series.points.len().saturating_sub(3);
    &series.points[start..]
}

pub fn cost_series(series: &ConsumptionSeries) -> Vec<CostPoint> {
    let target = match series.period {
        PeriodType::Monthly => MONTHLY_CHART_TARGET,
        PeriodType::Daily => DAILY_CHART_TARGET,
    };
    series
        .points
        .iter()
        .map(|point| CostPoint {
            label: point.label.clone(),
            consumption: point.consumed_with_system,
            cost: point.consumed_with_system * CHART_TARIFF,
            target,
        })
        .collect()
}

/// Estimated bill for `consumption` and what staying under `goal` saves.
/// Without a goal there is nothing to save against.
pub fn goal_savings(consumption: f64, goal: Option<f64>) -> GoalSavings {
    let estimated_cost = consumption * GOAL_TARIFF;
    let Some(goal) = goal.filter(|goal| goal.is_finite() && *goal > 0.0) else {
        return GoalSavings {
            estimated_cost,
            savings: 0.0,
            savings_percent: 0.0,
        };
    };
    let savings = ((goal - consumption) * GOAL_TARIFF).max(0.0);
    GoalSavings {
        estimated_cost,
        savings,
        savings_percent: percent_of(savings, goal * GOAL_TARIFF),
    }
}

/// Average power per hour of day in whole kW, for hours that have samples.
///
/// Samples are `(watts, unix_seconds)`; the hour is taken in `tz`.
pub fn peak_hours<Tz: TimeZone>(samples: &[(f64, f64)], tz: &Tz) -> Vec<HourlyPower> {
    let mut buckets: BTreeMap<u32, (f64, u32)> = BTreeMap::new();
    for &(watts, timestamp) in samples {
        let Some(at) = tz.timestamp_opt(timestamp.floor() as i64, 0).single() else {
            continue;
        };
        let bucket = buckets.entry(at.hour()).or_insert((0.0, 0));
        bucket.0 += watts;
        bucket.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(hour, (total, count))| HourlyPower {
            hour,
            label: format!("{hour}h"),
            average_kw: (total / f64::from(count) / WATTS_PER_KILOWATT).round(),
        })
        .collect()
}
