//! # Postgres
//!
//! Relational backend, works against a hosted Postgres (Supabase) or a local one.
//!
//! ## Tables
//! - `plants`: one row per [`PlantRecord`], list attributes as `TEXT[]`
//! - `user_preferences`: `user_id` primary key, `favorites BIGINT[]`, `projects JSONB`
//!
//! Tables are created on connect if missing. There is no migration tooling.
//!
//! ## Atomicity
//! Every preference write is one `INSERT .. ON CONFLICT (user_id) DO UPDATE`.
//! The conflicting row stays locked until the statement finishes, so the
//! membership check and the `array_append` / `array_remove` cannot interleave
//! with another toggle for the same user.
//!
//! `RETURNING (xmax = 0)` is true only for a freshly inserted row, which gives
//! the created/updated tag without a second query.
use async_trait::async_trait;
use catalog::PlantRecord;
use serde_json::Value;
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
    types::Json,
};
use tracing::info;

use super::{PlantCatalog, PreferenceStore, Seed, Store, StoreError, Upsert};
use crate::user::UserPreference;

const MAX_CONNECTIONS: u32 = 10;

const CREATE_PLANTS: &str = r#"
    CREATE TABLE IF NOT EXISTS plants (
        id BIGINT PRIMARY KEY,
        name_ru TEXT NOT NULL,
        name_lat TEXT NOT NULL,
        kind TEXT NOT NULL,
        foliage TEXT NOT NULL,
        height TEXT NOT NULL,
        zone TEXT NOT NULL,
        soil TEXT[] NOT NULL DEFAULT '{}',
        light TEXT NOT NULL,
        purpose TEXT[] NOT NULL DEFAULT '{}',
        relevance INTEGER NOT NULL,
        description TEXT NOT NULL,
        images TEXT[] NOT NULL DEFAULT '{}'
    )
"#;

const CREATE_USER_PREFERENCES: &str = r#"
    CREATE TABLE IF NOT EXISTS user_preferences (
        user_id TEXT PRIMARY KEY,
        favorites BIGINT[] NOT NULL DEFAULT '{}',
        projects JSONB NOT NULL DEFAULT '[]'
    )
"#;

const INSERT_PLANT: &str = r#"
    INSERT INTO plants (
        id, name_ru, name_lat, kind, foliage, height, zone,
        soil, light, purpose, relevance, description, images
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    ON CONFLICT (id) DO NOTHING
"#;

const SELECT_PLANTS: &str = r#"
    SELECT id, name_ru, name_lat, kind, foliage, height, zone,
           soil, light, purpose, relevance, description, images
    FROM plants
    ORDER BY id
"#;

const SELECT_PREFERENCES: &str =
    "SELECT favorites, projects FROM user_preferences WHERE user_id = $1";

const ADD_FAVORITE: &str = r#"
    INSERT INTO user_preferences (user_id, favorites)
    VALUES ($1, ARRAY[$2::BIGINT])
    ON CONFLICT (user_id) DO UPDATE
    SET favorites = CASE
        WHEN $2::BIGINT = ANY(user_preferences.favorites) THEN user_preferences.favorites
        ELSE array_append(user_preferences.favorites, $2::BIGINT)
    END
    RETURNING (xmax = 0) AS created
"#;

const REMOVE_FAVORITE: &str = r#"
    INSERT INTO user_preferences (user_id)
    VALUES ($1)
    ON CONFLICT (user_id) DO UPDATE
    SET favorites = array_remove(user_preferences.favorites, $2::BIGINT)
    RETURNING (xmax = 0) AS created
"#;

const REPLACE_PROJECTS: &str = r#"
    INSERT INTO user_preferences (user_id, projects)
    VALUES ($1, $2)
    ON CONFLICT (user_id) DO UPDATE
    SET projects = EXCLUDED.projects
    RETURNING (xmax = 0) AS created
"#;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");

        let store = Self { pool };
        store.create_tables().await?;

        Ok(store)
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_PLANTS).execute(&self.pool).await?;
        sqlx::query(CREATE_USER_PREFERENCES)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn favorite_statement(is_favorite: bool) -> &'static str {
    if is_favorite {
        ADD_FAVORITE
    } else {
        REMOVE_FAVORITE
    }
}

fn plant_from_row(row: &PgRow) -> Result<PlantRecord, sqlx::Error> {
    Ok(PlantRecord {
        id: row.try_get("id")?,
        name_ru: row.try_get("name_ru")?,
        name_lat: row.try_get("name_lat")?,
        kind: row.try_get("kind")?,
        foliage: row.try_get("foliage")?,
        height: row.try_get("height")?,
        zone: row.try_get("zone")?,
        soil: row.try_get("soil")?,
        light: row.try_get("light")?,
        purpose: row.try_get("purpose")?,
        relevance: row.try_get("relevance")?,
        description: row.try_get("description")?,
        images: row.try_get("images")?,
    })
}

#[async_trait]
impl PlantCatalog for PostgresStore {
    async fn list_plants(&self) -> Result<Vec<PlantRecord>, StoreError> {
        let rows = sqlx::query(SELECT_PLANTS).fetch_all(&self.pool).await?;

        let plants = rows
            .iter()
            .map(plant_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(plants)
    }

    async fn seed_plants(&self, plants: &[PlantRecord]) -> Result<Seed, StoreError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plants")
            .fetch_one(&self.pool)
            .await?;

        if existing > 0 {
            return Ok(Seed::AlreadySeeded(existing as usize));
        }

        let mut tx = self.pool.begin().await?;

        for plant in plants {
            sqlx::query(INSERT_PLANT)
                .bind(plant.id)
                .bind(&plant.name_ru)
                .bind(&plant.name_lat)
                .bind(&plant.kind)
                .bind(&plant.foliage)
                .bind(&plant.height)
                .bind(&plant.zone)
                .bind(&plant.soil)
                .bind(&plant.light)
                .bind(&plant.purpose)
                .bind(plant.relevance)
                .bind(&plant.description)
                .bind(&plant.images)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Seed::Inserted(plants.len()))
    }
}

#[async_trait]
impl PreferenceStore for PostgresStore {
    async fn get_preferences(&self, user_id: &str) -> Result<UserPreference, StoreError> {
        let row: Option<(Vec<i64>, Json<Vec<Value>>)> = sqlx::query_as(SELECT_PREFERENCES)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|(favorites, Json(projects))| UserPreference {
                favorites,
                projects,
            })
            .unwrap_or_default())
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        plant_id: i64,
        is_favorite: bool,
    ) -> Result<Upsert, StoreError> {
        let created: bool = sqlx::query_scalar(favorite_statement(is_favorite))
            .bind(user_id)
            .bind(plant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Upsert::from_created(created))
    }

    async fn replace_projects(
        &self,
        user_id: &str,
        projects: Vec<Value>,
    ) -> Result<Upsert, StoreError> {
        let created: bool = sqlx::query_scalar(REPLACE_PROJECTS)
            .bind(user_id)
            .bind(Json(projects))
            .fetch_one(&self.pool)
            .await?;

        Ok(Upsert::from_created(created))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn close(&self) {
        self.pool.close().await;
        info!("Postgres pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favorite_statements_are_single_upserts() {
        for statement in [favorite_statement(true), favorite_statement(false)] {
            assert!(statement.contains("ON CONFLICT (user_id) DO UPDATE"));
            assert!(statement.contains("RETURNING (xmax = 0) AS created"));
        }
    }

    #[test]
    fn test_add_guards_duplicates() {
        let add = favorite_statement(true);

        assert!(add.contains("= ANY(user_preferences.favorites)"));
        assert!(add.contains("array_append"));
        assert!(favorite_statement(false).contains("array_remove"));
    }

    #[test]
    fn test_projects_replace_not_merge() {
        assert!(REPLACE_PROJECTS.contains("SET projects = EXCLUDED.projects"));
        assert!(!REPLACE_PROJECTS.contains("||"));
    }

    #[test]
    fn test_plant_columns_match() {
        let columns = [
            "id",
            "name_ru",
            "name_lat",
            "kind",
            "foliage",
            "height",
            "zone",
            "soil",
            "light",
            "purpose",
            "relevance",
            "description",
            "images",
        ];

        for column in columns {
            assert!(CREATE_PLANTS.contains(&format!("{column} ")));
            assert!(INSERT_PLANT.contains(column));
            assert!(SELECT_PLANTS.contains(column));
        }
    }
}
