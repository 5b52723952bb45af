use crate::fetcher::ConsumptionApi;
use crate::meta::MetaStore;
use crate::storage::KeyValueStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub api: ConsumptionApi,
    pub metas: MetaStore,
}

impl AppState {
    pub fn new(api: ConsumptionApi, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            metas: MetaStore::new(store),
        }
    }
}
