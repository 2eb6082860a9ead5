//! # MongoDB
//!
//! Document backend.
//!
//! ## Collections
//! - `plants`: one document per [`PlantRecord`], unique index on `id`
//! - `users`: `{ _id: userId, favorites: [plantId], projects: [...] }`
//!
//! ## Atomicity
//! Favorites are never read back before writing. A toggle is a single
//! `update_one` with `$addToSet` or `$pull` and `upsert: true`, so the server
//! resolves set membership and two toggles for one user cannot overwrite each
//! other. A `$pull` upsert on a missing user creates `{ _id }` alone, missing
//! arrays deserialize as empty.
//!
//! ## Seeding
//! Instances starting together may all see an empty catalog. The insert is
//! unordered and duplicate key errors from the `id` index mean another
//! instance got there first.
use async_trait::async_trait;
use catalog::PlantRecord;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection, IndexModel,
    bson::{Bson, Document, doc, to_bson},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{PlantCatalog, PreferenceStore, Seed, Store, StoreError, Upsert};
use crate::user::UserPreference;

pub const PLANT_COLLECTION: &str = "plants";
pub const USER_COLLECTION: &str = "users";

const TIMEOUTS: &str = "serverSelectionTimeoutMS=3000&connectTimeoutMS=3000";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Serialize, Deserialize, Debug)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,

    #[serde(default)]
    favorites: Vec<i64>,

    #[serde(default)]
    projects: Vec<Value>,
}

impl From<UserDocument> for UserPreference {
    fn from(document: UserDocument) -> Self {
        Self {
            favorites: document.favorites,
            projects: document.projects,
        }
    }
}

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    plants: Collection<PlantRecord>,
    users: Collection<UserDocument>,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(with_timeouts(uri)).await?;
        let database = client.database(db_name);

        // Fails fast when the server is unreachable instead of on first request.
        database.run_command(doc! { "ping": 1 }).await?;
        info!("Connected to MongoDB database '{db_name}'");

        let store = Self {
            plants: database.collection(PLANT_COLLECTION),
            users: database.collection(USER_COLLECTION),
            client,
        };
        store.apply_indexes().await?;

        Ok(store)
    }

    async fn apply_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("plant_id_unique".to_string())
                    .build(),
            ))
            .build();

        self.plants.create_index(index).await?;

        Ok(())
    }
}

fn with_timeouts(uri: &str) -> String {
    if uri.contains("serverSelectionTimeoutMS") {
        return uri.to_string();
    }

    if uri.contains('?') {
        return format!("{uri}&{TIMEOUTS}");
    }

    // Options need the slash after the host list.
    let hosts = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    if hosts.contains('/') {
        format!("{uri}?{TIMEOUTS}")
    } else {
        format!("{uri}/?{TIMEOUTS}")
    }
}

fn user_filter(user_id: &str) -> Document {
    doc! { "_id": user_id }
}

fn favorite_update(plant_id: i64, is_favorite: bool) -> Document {
    if is_favorite {
        doc! { "$addToSet": { "favorites": plant_id } }
    } else {
        doc! { "$pull": { "favorites": plant_id } }
    }
}

fn projects_update(projects: Bson) -> Document {
    doc! { "$set": { "projects": projects } }
}

#[async_trait]
impl PlantCatalog for MongoStore {
    async fn list_plants(&self) -> Result<Vec<PlantRecord>, StoreError> {
        let plants: Vec<PlantRecord> = self
            .plants
            .find(doc! {})
            .sort(doc! { "id": 1 })
            .await?
            .try_collect()
            .await?;

        Ok(plants)
    }

    async fn seed_plants(&self, plants: &[PlantRecord]) -> Result<Seed, StoreError> {
        let existing = self.plants.count_documents(doc! {}).await?;

        if existing > 0 {
            return Ok(Seed::AlreadySeeded(existing as usize));
        }

        // insert_many rejects an empty batch.
        if plants.is_empty() {
            return Ok(Seed::Inserted(0));
        }

        // Unordered, so plants another instance has not inserted yet still land.
        match self.plants.insert_many(plants).ordered(false).await {
            Ok(_) => Ok(Seed::Inserted(plants.len())),
            Err(e) if is_duplicate_key(&e) => {
                let existing = self.plants.count_documents(doc! {}).await?;
                info!("Catalog seeded concurrently by another instance");

                Ok(Seed::AlreadySeeded(existing as usize))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// True when every write error is a unique index violation.
fn is_duplicate_key(error: &MongoError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::InsertMany(failure) => {
            failure.write_concern_error.is_none()
                && failure.write_errors.as_ref().is_some_and(|errors| {
                    errors.iter().all(|error| error.code == DUPLICATE_KEY)
                })
        }
        ErrorKind::Write(WriteFailure::WriteError(error)) => error.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl PreferenceStore for MongoStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreference, StoreError> {
        let document = self.users.find_one(user_filter(user_id)).await?;

        Ok(document.map(UserPreference::from).unwrap_or_default())
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        plant_id: i64,
        is_favorite: bool,
    ) -> Result<Upsert, StoreError> {
        let result = self
            .users
            .update_one(user_filter(user_id), favorite_update(plant_id, is_favorite))
            .upsert(true)
            .await?;

        Ok(Upsert::from_created(result.upserted_id.is_some()))
    }

    async fn replace_projects(
        &self,
        user_id: &str,
        projects: Vec<Value>,
    ) -> Result<Upsert, StoreError> {
        let projects = to_bson(&projects)?;

        let result = self
            .users
            .update_one(user_filter(user_id), projects_update(projects))
            .upsert(true)
            .await?;

        Ok(Upsert::from_created(result.upserted_id.is_some()))
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::from_document;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_timeouts_appended() {
        assert_eq!(
            with_timeouts("mongodb://localhost:27017"),
            format!("mongodb://localhost:27017/?{TIMEOUTS}")
        );
        assert_eq!(
            with_timeouts("mongodb+srv://user:pw@cluster.example.net/plants"),
            format!("mongodb+srv://user:pw@cluster.example.net/plants?{TIMEOUTS}")
        );
        assert_eq!(
            with_timeouts("mongodb://localhost/?retryWrites=true"),
            format!("mongodb://localhost/?retryWrites=true&{TIMEOUTS}")
        );
    }

    #[test]
    fn test_timeouts_not_duplicated() {
        let uri = "mongodb://localhost/?serverSelectionTimeoutMS=500";

        assert_eq!(with_timeouts(uri), uri);
    }

    #[test]
    fn test_favorite_updates_are_set_operations() {
        assert_eq!(
            favorite_update(3, true),
            doc! { "$addToSet": { "favorites": 3_i64 } }
        );
        assert_eq!(
            favorite_update(3, false),
            doc! { "$pull": { "favorites": 3_i64 } }
        );
    }

    #[test]
    fn test_projects_update_is_full_set() {
        let projects = to_bson(&vec![json!({ "name": "orchard", "plants": [1, 2] })]).unwrap();

        let update = projects_update(projects);
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["projects"]);
        assert_eq!(
            set.get_array("projects").unwrap()[0]
                .as_document()
                .unwrap()
                .get_str("name")
                .unwrap(),
            "orchard"
        );
    }

    #[test]
    fn test_sparse_document_defaults() {
        let document: UserDocument = from_document(doc! { "_id": "alice" }).unwrap();

        assert_eq!(UserPreference::from(document), UserPreference::default());
    }

    #[test]
    fn test_document_projects_round_trip() {
        let document: UserDocument = from_document(doc! {
            "_id": "alice",
            "favorites": [1_i32, 5_i32],
            "projects": [{ "name": "herbs", "beds": 2_i32 }],
        })
        .unwrap();

        let preference = UserPreference::from(document);

        assert_eq!(preference.favorites, vec![1, 5]);
        assert_eq!(preference.projects, vec![json!({ "name": "herbs", "beds": 2 })]);
    }
}
