use std::sync::Arc;

use super::{
    config::Config,
    store::{self, Store, StoreError},
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl State {
    /// Connects to the configured store and seeds the catalog if it is empty.
    pub async fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store = store::connect(&config).await?;

        store::seed_catalog(store.as_ref(), &config).await?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }
}
