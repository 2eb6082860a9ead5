use std::collections::HashMap;

use async_trait::async_trait;
use catalog::PlantRecord;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{PlantCatalog, PreferenceStore, Seed, Store, StoreError, Upsert, locks::UserLocks};
use crate::user::UserPreference;

/// Process-local store. Records are loaded and saved whole, so every
/// preference write goes through [`UserLocks`].
#[derive(Default)]
pub struct MemoryStore {
    plants: RwLock<Vec<PlantRecord>>,
    users: RwLock<HashMap<String, UserPreference>>,
    locks: UserLocks,
}

impl MemoryStore {
    async fn load(&self, user_id: &str) -> Option<UserPreference> {
        self.users.read().await.get(user_id).cloned()
    }

    async fn save(&self, user_id: &str, preference: UserPreference) -> Upsert {
        let previous = self
            .users
            .write()
            .await
            .insert(user_id.to_string(), preference);

        Upsert::from_created(previous.is_none())
    }

    /// Runs `update` on the user's record between a load and a save, with no
    /// other writer for that user in between. `update` returns whether it
    /// changed the record; an existing record that did not change is not saved.
    async fn modify<F>(&self, user_id: &str, update: F) -> Upsert
    where
        F: FnOnce(&mut UserPreference) -> bool,
    {
        let _guard = self.locks.lock(user_id).await;

        let Some(mut preference) = self.load(user_id).await else {
            let mut preference = UserPreference::default();
            update(&mut preference);

            return self.save(user_id, preference).await;
        };

        if update(&mut preference) {
            self.save(user_id, preference).await
        } else {
            Upsert::Updated
        }
    }
}

#[async_trait]
impl PlantCatalog for MemoryStore {
    async fn list_plants(&self) -> Result<Vec<PlantRecord>, StoreError> {
        let mut plants = self.plants.read().await.clone();
        plants.sort_by_key(|plant| plant.id);

        Ok(plants)
    }

    async fn seed_plants(&self, plants: &[PlantRecord]) -> Result<Seed, StoreError> {
        let mut stored = self.plants.write().await;

        if !stored.is_empty() {
            return Ok(Seed::AlreadySeeded(stored.len()));
        }

        stored.extend_from_slice(plants);

        Ok(Seed::Inserted(plants.len()))
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreference, StoreError> {
        Ok(self.load(user_id).await.unwrap_or_default())
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        plant_id: i64,
        is_favorite: bool,
    ) -> Result<Upsert, StoreError> {
        Ok(self
            .modify(user_id, |preference| {
                preference.set_favorite(plant_id, is_favorite)
            })
            .await)
    }

    async fn replace_projects(
        &self,
        user_id: &str,
        projects: Vec<Value>,
    ) -> Result<Upsert, StoreError> {
        // Locked as well: saving the whole record must not drop a favorite
        // toggled concurrently.
        Ok(self
            .modify(user_id, |preference| {
                preference.projects = projects;
                true
            })
            .await)
    }
}

#[async_trait]
impl Store for MemoryStore {}
