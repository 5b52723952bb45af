use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

pub const MONTHS_PER_YEAR: usize = 12;
pub const MAX_DAYS_PER_MONTH: usize = 31;

/// Body of the upstream `GET ?device_id=&historico=` response.
///
/// Missing arrays come back empty. Entries are read leniently: numeric strings
/// count as numbers and `null` or anything else non-numeric becomes `0.0`, so
/// the derivation code never has to care about holes in the upstream data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    #[serde(rename = "consumo_mensal", default, deserialize_with = "lenient_series")]
    pub monthly_consumption: Vec<f64>,
    #[serde(
        rename = "consumo_diario_mes_corrente",
        default,
        deserialize_with = "lenient_series"
    )]
    pub daily_consumption: Vec<f64>,
    #[serde(
        rename = "consumo_sem_sistema_mensal",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_optional_series"
    )]
    pub monthly_without_system: Option<Vec<f64>>,
    #[serde(
        rename = "consumo_sem_sistema_diario",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_optional_series"
    )]
    pub daily_without_system: Option<Vec<f64>>,
    #[serde(
        rename = "minutos_desligado_mensal",
        default,
        deserialize_with = "lenient_series"
    )]
    pub monthly_downtime_minutes: Vec<f64>,
    #[serde(
        rename = "minutos_desligado_diario",
        default,
        deserialize_with = "lenient_series"
    )]
    pub daily_downtime_minutes: Vec<f64>,
    /// `[watts, unix_seconds]` samples of instantaneous power.
    #[serde(
        rename = "potencias",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient_samples"
    )]
    pub power_samples: Vec<(f64, f64)>,
}

impl RawPayload {
    /// Fallback used whenever the upstream cannot be reached.
    pub fn zeroed() -> Self {
        Self {
            monthly_consumption: vec![0.0; MONTHS_PER_YEAR],
            daily_consumption: vec![0.0; MAX_DAYS_PER_MONTH],
            monthly_without_system: None,
            daily_without_system: None,
            monthly_downtime_minutes: vec![0.0; MONTHS_PER_YEAR],
            daily_downtime_minutes: vec![0.0; MAX_DAYS_PER_MONTH],
            power_samples: Vec::new(),
        }
    }
}

fn lenient_series<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_series(deserializer)?.unwrap_or_default())
}

fn lenient_optional_series<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<LenientNumber>> = Option::deserialize(deserializer)?;
    Ok(values.map(|values| values.into_iter().map(LenientNumber::value).collect()))
}

/// Malformed samples are dropped rather than zeroed: a zero timestamp would
/// land in a real hour bucket.
fn lenient_samples<'de, D>(deserializer: D) -> Result<Vec<(f64, f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let samples: Option<Vec<Option<(LenientNumber, LenientNumber)>>> =
        Option::deserialize(deserializer)?;
    Ok(samples
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(|(power, timestamp)| Some((power.finite()?, timestamp.finite()?)))
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl LenientNumber {
    fn finite(self) -> Option<f64> {
        let value = match self {
            LenientNumber::Number(value) => value,
            LenientNumber::Text(text) => text.trim().parse().ok()?,
            LenientNumber::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    fn value(self) -> f64 {
        self.finite().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Monthly,
    Daily,
}

impl PeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::Monthly => "monthly",
            PeriodType::Daily => "daily",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "monthly" => Ok(PeriodType::Monthly),
            "daily" => Ok(PeriodType::Daily),
            other => Err(format!("period must be 'monthly' or 'daily', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub index: usize,
    pub consumed_with_system: f64,
    pub consumed_without_system: f64,
    pub accumulated: f64,
    pub predicted: f64,
    pub economy: f64,
    pub meta: f64,
    pub deviation: f64,
    pub deviation_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionSeries {
    pub period: PeriodType,
    /// Set when the points were spread evenly from a monthly total instead of
    /// coming from measured daily values.
    pub estimated: bool,
    pub points: Vec<SeriesPoint>,
}

impl ConsumptionSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub percent_change: f64,
    pub current_value: f64,
    pub previous_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub selected_index: usize,
    pub total_consumption: f64,
    pub total_economy: f64,
    pub economy_rate: f64,
    pub comparison: PeriodComparison,
    pub activation_hours: f64,
    pub activation_meta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostPoint {
    pub label: String,
    pub consumption: f64,
    pub cost: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalSavings {
    pub estimated_cost: f64,
    pub savings: f64,
    pub savings_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPower {
    pub hour: u32,
    pub label: String,
    pub average_kw: f64,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub device: String,
    /// Catalog name; `None` for the aggregate and for unknown ids.
    pub device_name: Option<&'static str>,
    pub series: ConsumptionSeries,
    pub summary: SeriesSummary,
    pub costs: Vec<CostPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_months: Vec<SeriesPoint>,
    pub peak_hours: Vec<HourlyPower>,
    pub goal: Option<f64>,
    pub goal_savings: GoalSavings,
    /// Upstream failures that were masked by the zero fallback.
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub period: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub index: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueBody {
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GoalResponse {
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tolerates_missing_fields_and_nulls() {
        let payload: RawPayload = serde_json::from_str(
            r#"{"consumo_mensal": [100, null, 50], "consumo_sem_sistema_mensal": null}"#,
        )
        .unwrap();

        assert_eq!(payload.monthly_consumption, vec![100.0, 0.0, 50.0]);
        assert!(payload.daily_consumption.is_empty());
        assert_eq!(payload.monthly_without_system, None);
        assert!(payload.monthly_downtime_minutes.is_empty());
    }

    #[test]
    fn payload_reads_numeric_strings() {
        let payload: RawPayload = serde_json::from_str(
            r#"{"consumo_mensal": ["100", 200, " 12.5 ", "n/a", true],
                "potencias": [[4000, 1700000000], ["2500", "1700003600"], [1, null], null]}"#,
        )
        .unwrap();

        assert_eq!(payload.monthly_consumption, vec![100.0, 200.0, 12.5, 0.0, 0.0]);
        assert_eq!(
            payload.power_samples,
            vec![(4000.0, 1_700_000_000.0), (2500.0, 1_700_003_600.0)]
        );
    }

    #[test]
    fn payload_keeps_wire_names() {
        let payload = RawPayload {
            monthly_without_system: Some(vec![1.0]),
            ..RawPayload::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("consumo_mensal").is_some());
        assert!(json.get("consumo_sem_sistema_mensal").is_some());
        assert!(json.get("consumo_sem_sistema_diario").is_none());
    }

    #[test]
    fn zeroed_payload_has_fixed_lengths() {
        let payload = RawPayload::zeroed();
        assert_eq!(payload.monthly_consumption.len(), 12);
        assert_eq!(payload.daily_consumption.len(), 31);
        assert!(payload.monthly_consumption.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn period_type_parses() {
        assert_eq!("monthly".parse::<PeriodType>(), Ok(PeriodType::Monthly));
        assert_eq!(" daily".parse::<PeriodType>(), Ok(PeriodType::Daily));
        assert!("weekly".parse::<PeriodType>().is_err());
    }
}
