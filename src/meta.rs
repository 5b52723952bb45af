//! User-defined consumption targets ("metas") and per-device goals.

use crate::devices::DeviceSelection;
use crate::errors::MetaError;
use crate::models::PeriodType;
use crate::storage::KeyValueStore;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_META: f64 = 10_000.0;
pub const DEFAULT_DAILY_ACTIVATION_HOURS: f64 = 24.0;
pub const DEFAULT_MONTHLY_ACTIVATION_HOURS: f64 = 720.0;

pub fn meta_key(device: DeviceSelection, period: PeriodType, index: usize) -> String {
    format!("meta_device_{device}_{period}_{index}")
}

pub fn activation_meta_key(device: DeviceSelection, period: PeriodType, index: usize) -> String {
    format!("activation_meta_device_{device}_{period}_{index}")
}

pub fn goal_key(device: DeviceSelection) -> String {
    format!("goal_{device}")
}

/// Parses user input the way the dashboard form does: surrounding whitespace
/// is ignored and anything that is not a number is a parse error.
pub fn parse_value(input: &str) -> Result<f64, MetaError> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|_| MetaError::Parse(input.to_string()))
}

pub fn validate(value: f64) -> Result<f64, MetaError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MetaError::Validation(value))
    }
}

#[derive(Clone)]
pub struct MetaStore {
    store: Arc<dyn KeyValueStore>,
}

impl MetaStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load_meta(&self, device: DeviceSelection, period: PeriodType, index: usize) -> f64 {
        self.read(&meta_key(device, period, index)).unwrap_or(DEFAULT_META)
    }

    /// Invalid values are rejected and the stored meta is left untouched.
    pub async fn save_meta(
        &self,
        device: DeviceSelection,
        period: PeriodType,
        index: usize,
        value: f64,
    ) -> Result<(), MetaError> {
        self.write(&meta_key(device, period, index), value).await
    }

    pub fn load_metas(&self, device: DeviceSelection, period: PeriodType, count: usize) -> Vec<f64> {
        (0..count)
            .map(|index| self.load_meta(device, period, index))
            .collect()
    }

    pub fn load_activation_meta(
        &self,
        device: DeviceSelection,
        period: PeriodType,
        index: usize,
    ) -> f64 {
        self.read(&activation_meta_key(device, period, index))
            .unwrap_or(match period {
                PeriodType::Daily => DEFAULT_DAILY_ACTIVATION_HOURS,
                PeriodType::Monthly => DEFAULT_MONTHLY_ACTIVATION_HOURS,
            })
    }

    pub async fn save_activation_meta(
        &self,
        device: DeviceSelection,
        period: PeriodType,
        index: usize,
        hours: f64,
    ) -> Result<(), MetaError> {
        self.write(&activation_meta_key(device, period, index), hours)
            .await
    }

    pub fn load_goal(&self, device: DeviceSelection) -> Option<f64> {
        self.read(&goal_key(device))
    }

    pub async fn save_goal(&self, device: DeviceSelection, value: f64) -> Result<(), MetaError> {
        self.write(&goal_key(device), value).await
    }

    fn read(&self, key: &str) -> Option<f64> {
        let stored = self.store.get(key)?;
        match stored.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                warn!(key, stored = %stored, "ignoring unparsable stored value");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: f64) -> Result<(), MetaError> {
        let value = validate(value).inspect_err(|err| warn!(key, "rejected value: {err}"))?;
        self.store.set(key, value.to_string()).await?;
        info!(key, value, "saved target");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditState {
    Viewing,
    Editing { staging: String },
}

/// Edit/save/cancel interaction around a single meta.
///
/// The displayed value only changes after a successful save.
pub struct MetaEditor {
    metas: MetaStore,
    device: DeviceSelection,
    period: PeriodType,
    index: usize,
    displayed: f64,
    state: EditState,
}

impl MetaEditor {
    pub fn open(metas: MetaStore, device: DeviceSelection, period: PeriodType, index: usize) -> Self {
        let displayed = metas.load_meta(device, period, index);
        Self {
            metas,
            device,
            period,
            index,
            displayed,
            state: EditState::Viewing,
        }
    }

    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn begin_edit(&mut self) {
        self.state = EditState::Editing {
            staging: self.displayed.to_string(),
        };
    }

    /// Replaces the staging text. Ignored unless editing.
    pub fn input(&mut self, text: &str) {
        if let EditState::Editing { staging } = &mut self.state {
            *staging = text.to_string();
        }
    }

    /// Commits the staging value. On error the editor stays in `Editing`
    /// with the previous value displayed.
    pub async fn save(&mut self) -> Result<f64, MetaError> {
        let EditState::Editing { staging } = &self.state else {
            return Ok(self.displayed);
        };
        let value = validate(parse_value(staging)?)?;
        self.metas
            .save_meta(self.device, self.period, self.index, value)
            .await?;
        self.displayed = value;
        self.state = EditState::Viewing;
        Ok(value)
    }

    pub fn cancel(&mut self) {
        self.state = EditState::Viewing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const DEVICE: DeviceSelection = DeviceSelection::Device(33);

    fn store() -> MetaStore {
        MetaStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn unset_meta_returns_default() {
        assert_eq!(store().load_meta(DEVICE, PeriodType::Monthly, 0), 10000.0);
    }

    #[tokio::test]
    async fn saved_meta_is_loaded_back() {
        let metas = store();
        metas.save_meta(DEVICE, PeriodType::Monthly, 0, 5000.0).await.unwrap();
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 0), 5000.0);
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 1), DEFAULT_META);
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Daily, 0), DEFAULT_META);
    }

    #[tokio::test]
    async fn round_trips_awkward_values() {
        let metas = store();
        for value in [0.1, 1e-9, 1234.5678, 3.0e12, f64::MAX] {
            metas.save_meta(DEVICE, PeriodType::Daily, 4, value).await.unwrap();
            assert_eq!(metas.load_meta(DEVICE, PeriodType::Daily, 4), value);
        }
    }

    #[tokio::test]
    async fn invalid_meta_leaves_store_unchanged() {
        let metas = store();
        assert!(matches!(
            metas.save_meta(DEVICE, PeriodType::Monthly, 0, -5.0).await,
            Err(MetaError::Validation(_))
        ));
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 0), DEFAULT_META);

        metas.save_meta(DEVICE, PeriodType::Monthly, 0, 700.0).await.unwrap();
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(metas.save_meta(DEVICE, PeriodType::Monthly, 0, bad).await.is_err());
        }
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 0), 700.0);
    }

    #[tokio::test]
    async fn garbage_in_store_reads_as_default() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .set(&meta_key(DEVICE, PeriodType::Monthly, 2), "abc".into())
            .await
            .unwrap();
        let metas = MetaStore::new(backing);
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 2), DEFAULT_META);
    }

    #[test]
    fn keys_follow_storage_layout() {
        assert_eq!(meta_key(DEVICE, PeriodType::Monthly, 0), "meta_device_33_monthly_0");
        assert_eq!(
            meta_key(DeviceSelection::All, PeriodType::Daily, 14),
            "meta_device_all_daily_14"
        );
        assert_eq!(goal_key(DEVICE), "goal_33");
        assert_eq!(
            activation_meta_key(DEVICE, PeriodType::Daily, 3),
            "activation_meta_device_33_daily_3"
        );
    }

    #[tokio::test]
    async fn activation_meta_defaults_by_period() {
        let metas = store();
        assert_eq!(metas.load_activation_meta(DEVICE, PeriodType::Daily, 0), 24.0);
        assert_eq!(metas.load_activation_meta(DEVICE, PeriodType::Monthly, 0), 720.0);
        metas.save_activation_meta(DEVICE, PeriodType::Daily, 0, 18.0).await.unwrap();
        assert_eq!(metas.load_activation_meta(DEVICE, PeriodType::Daily, 0), 18.0);
    }

    #[tokio::test]
    async fn goal_is_absent_until_saved() {
        let metas = store();
        assert_eq!(metas.load_goal(DEVICE), None);
        metas.save_goal(DEVICE, 4200.0).await.unwrap();
        assert_eq!(metas.load_goal(DEVICE), Some(4200.0));
        assert!(metas.save_goal(DEVICE, 0.0).await.is_err());
        assert_eq!(metas.load_goal(DEVICE), Some(4200.0));
    }

    #[tokio::test]
    async fn editor_commits_on_save() {
        let metas = store();
        let mut editor = MetaEditor::open(metas.clone(), DEVICE, PeriodType::Monthly, 3);
        assert_eq!(editor.state(), &EditState::Viewing);

        editor.begin_edit();
        assert_eq!(
            editor.state(),
            &EditState::Editing { staging: "10000".into() }
        );
        editor.input(" 7500 ");
        assert_eq!(editor.displayed(), DEFAULT_META);

        assert_eq!(editor.save().await.unwrap(), 7500.0);
        assert_eq!(editor.state(), &EditState::Viewing);
        assert_eq!(editor.displayed(), 7500.0);
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 3), 7500.0);
    }

    #[test]
    fn editor_cancel_discards_staging() {
        let metas = store();
        let mut editor = MetaEditor::open(metas.clone(), DEVICE, PeriodType::Monthly, 0);
        editor.begin_edit();
        editor.input("1");
        editor.cancel();

        assert_eq!(editor.state(), &EditState::Viewing);
        assert_eq!(editor.displayed(), DEFAULT_META);
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 0), DEFAULT_META);
    }

    #[tokio::test]
    async fn editor_rejects_bad_input_and_keeps_editing() {
        let metas = store();
        let mut editor = MetaEditor::open(metas.clone(), DEVICE, PeriodType::Monthly, 0);
        editor.begin_edit();

        editor.input("lots");
        assert!(matches!(editor.save().await, Err(MetaError::Parse(_))));
        editor.input("-20");
        assert!(matches!(editor.save().await, Err(MetaError::Validation(_))));

        assert!(matches!(editor.state(), EditState::Editing { .. }));
        assert_eq!(editor.displayed(), DEFAULT_META);
        assert_eq!(metas.load_meta(DEVICE, PeriodType::Monthly, 0), DEFAULT_META);
    }

    #[tokio::test]
    async fn input_outside_editing_is_ignored() {
        let mut editor = MetaEditor::open(store(), DEVICE, PeriodType::Daily, 0);
        editor.input("5");
        assert_eq!(editor.state(), &EditState::Viewing);
        assert_eq!(editor.save().await.unwrap(), DEFAULT_META);
    }
}
