//! # Storage
//!
//! Persistent home of the plant catalog and user preferences.
//!
//! Exactly one backend is active per process, picked by `STORE_BACKEND`.
//!
//! ## Requirements
//!
//! - Catalog is tiny and read-mostly, seeded once into an empty store
//! - One preference record per user id, created on first write
//! - Two concurrent favorite toggles for one user must both land
//! - Projects are replaced wholesale, last write wins
//!
//! ## Backends
//!
//! - **MongoDB**: `$addToSet` / `$pull` with `upsert`, resolved server side in one round trip
//! - **Postgres**: `INSERT .. ON CONFLICT DO UPDATE` with `array_append` / `array_remove`,
//!   the conflicting row is locked for the duration of the statement
//! - **Memory**: no atomic set primitive, so load/modify/save runs under a per-user lock
//!   ([`locks::UserLocks`]). Nothing survives a restart.
//!
//! ## Write results
//!
//! Every preference write reports whether it created the record or updated an existing one
//! ([`Upsert`]). Handlers only log it.
use std::sync::Arc;

use async_trait::async_trait;
use catalog::{CatalogError, PlantRecord};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub mod locks;
pub mod memory;
pub mod mongo;
pub mod postgres;

use crate::{
    config::{Backend, Config},
    user::UserPreference,
};
use memory::MemoryStore;
use mongo::MongoStore;
use postgres::PostgresStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON encoding error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

impl Upsert {
    pub fn from_created(created: bool) -> Self {
        if created {
            Upsert::Created
        } else {
            Upsert::Updated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    Inserted(usize),
    /// Holds the number of records already present.
    AlreadySeeded(usize),
}

#[async_trait]
pub trait PlantCatalog: Send + Sync {
    /// All plants ordered by id.
    async fn list_plants(&self) -> Result<Vec<PlantRecord>, StoreError>;

    /// Inserts `plants` only when the catalog is empty.
    async fn seed_plants(&self, plants: &[PlantRecord]) -> Result<Seed, StoreError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Missing records come back as the empty default.
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreference, StoreError>;

    async fn set_favorite(
        &self,
        user_id: &str,
        plant_id: i64,
        is_favorite: bool,
    ) -> Result<Upsert, StoreError>;

    async fn replace_projects(&self, user_id: &str, projects: Vec<Value>)
    -> Result<Upsert, StoreError>;
}

#[async_trait]
pub trait Store: PlantCatalog + PreferenceStore {
    async fn close(&self) {}
}

pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    info!("Connecting to {} store...", config.backend);

    let store: Arc<dyn Store> = match config.backend {
        Backend::Mongo => Arc::new(MongoStore::connect(&config.mongo_uri, &config.mongo_db).await?),
        Backend::Postgres => Arc::new(PostgresStore::connect(&config.database_url).await?),
        Backend::Memory => Arc::new(MemoryStore::default()),
    };

    Ok(store)
}

/// Seeds from `CATALOG_PATH` or the bundled demo set.
pub async fn seed_catalog(store: &dyn Store, config: &Config) -> Result<Seed, StoreError> {
    let plants = catalog::load_catalog(config.catalog_path.as_deref())?;
    let seed = store.seed_plants(&plants).await?;

    match seed {
        Seed::Inserted(count) => info!("Seeded {count} plants"),
        Seed::AlreadySeeded(count) => info!("Catalog already holds {count} plants, skipping seed"),
    }

    Ok(seed)
}
