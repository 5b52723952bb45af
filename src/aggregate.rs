use crate::errors::FetchError;
use crate::fetcher::ConsumptionApi;
use crate::models::{MAX_DAYS_PER_MONTH, MONTHS_PER_YEAR, RawPayload};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    pub payload: RawPayload,
    pub included: Vec<u32>,
    pub failures: Vec<(u32, FetchError)>,
}

/// Pointwise sum of every device's arrays into fixed-length outputs.
///
/// Entries past the fixed length are ignored; a device without a field
/// contributes zero to it. For a mixed fleet this undercounts the composite
/// economy: a device without a measured "without system" baseline adds its
/// consumption but no baseline, so the summed baseline can fall below the
/// summed consumption even though each device saves on its own.
///
/// Power samples are not combined; the aggregate has none.
pub fn aggregate(payloads: &BTreeMap<u32, RawPayload>) -> RawPayload {
    let mut total = RawPayload {
        monthly_without_system: Some(vec![0.0; MONTHS_PER_YEAR]),
        daily_without_system: Some(vec![0.0; MAX_DAYS_PER_MONTH]),
        ..RawPayload::zeroed()
    };

    for payload in payloads.values() {
        add_into(&mut total.monthly_consumption, &payload.monthly_consumption);
        add_into(&mut total.daily_consumption, &payload.daily_consumption);
        add_optional_into(&mut total.monthly_without_system, &payload.monthly_without_system);
        add_optional_into(&mut total.daily_without_system, &payload.daily_without_system);
        add_into(&mut total.monthly_downtime_minutes, &payload.monthly_downtime_minutes);
        add_into(&mut total.daily_downtime_minutes, &payload.daily_downtime_minutes);
    }

    total
}

/// Fetches every device concurrently and sums whatever arrived.
///
/// The sum is built only after all requests settled; failed devices are
/// reported and left out.
pub async fn fetch_aggregate(
    api: &ConsumptionApi,
    device_ids: &[u32],
    include_history: bool,
) -> AggregateOutcome {
    let requests = device_ids.iter().map(|&device_id| async move {
        (device_id, api.fetch(device_id, include_history).await)
    });
    let results = join_all(requests).await;

    let mut payloads = BTreeMap::new();
    let mut failures = Vec::new();
    for (device_id, result) in results {
        match result {
            Ok(payload) => {
                payloads.insert(device_id, payload.as_ref().clone());
            }
            Err(err) => {
                warn!(device_id, "leaving device out of aggregate: {err}");
                failures.push((device_id, err));
            }
        }
    }

    info!(
        included = payloads.len(),
        failed = failures.len(),
        "aggregated consumption"
    );

    AggregateOutcome {
        payload: aggregate(&payloads),
        included: payloads.keys().copied().collect(),
        failures,
    }
}

fn add_into(total: &mut [f64], values: &[f64]) {
    for (slot, value) in total.iter_mut().zip(values) {
        if value.is_finite() {
            *slot += value;
        }
    }
}

fn add_optional_into(total: &mut Option<Vec<f64>>, values: &Option<Vec<f64>>) {
    if let (Some(total), Some(values)) = (total.as_mut(), values.as_ref()) {
        add_into(total, values);
    }
}
