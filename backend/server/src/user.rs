//! # User Preferences
//!
//! Per-user favorites and saved projects.
//!
//! ## Payloads
//!
//! Fetch
//! - `GET /users/{id}`: `{ favorites: [plantId], projects: [...] }`
//! - A user that never wrote anything gets the empty record, not a 404
//!
//! Toggle favorite
//! - `POST /users/{id}/favorites`: `{ plantId, isFavorite }`
//! - `isFavorite: true` adds, `false` removes; both are idempotent
//!
//! Save projects
//! - `PUT /users/{id}/projects`: `{ projects: [...] }`
//! - Projects are opaque to the backend and overwritten wholesale
//!
//! ## Notes
//! - Favorites are a set. Stores happen to keep insertion order, clients must not rely on it.
//! - Plant ids are not checked against the catalog.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserPreference {
    #[serde(default)]
    pub favorites: Vec<i64>,

    #[serde(default)]
    pub projects: Vec<Value>,
}

impl UserPreference {
    /// Returns whether the set changed.
    pub fn set_favorite(&mut self, plant_id: i64, is_favorite: bool) -> bool {
        let present = self.favorites.contains(&plant_id);

        match (is_favorite, present) {
            (true, false) => {
                self.favorites.push(plant_id);
                true
            }
            (false, true) => {
                self.favorites.retain(|&id| id != plant_id);
                true
            }
            _ => false,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub plant_id: i64,
    pub is_favorite: bool,
}

#[derive(Deserialize, Debug)]
pub struct ProjectsRequest {
    pub projects: Vec<Value>,
}

#[derive(Serialize, Debug)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
