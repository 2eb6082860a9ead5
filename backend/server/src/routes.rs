use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State as AxumState, rejection::JsonRejection},
    response::IntoResponse,
};
use catalog::PlantRecord;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::AppError,
    state::State,
    user::{Ack, FavoriteRequest, ProjectsRequest, UserPreference},
};

type SharedState = AxumState<Arc<State>>;

pub async fn plants_handler(
    AxumState(state): SharedState,
) -> Result<Json<Vec<PlantRecord>>, AppError> {
    Ok(Json(state.store.list_plants().await?))
}

pub async fn user_handler(
    AxumState(state): SharedState,
    Path(user_id): Path<String>,
) -> Result<Json<UserPreference>, AppError> {
    Ok(Json(state.store.get_preferences(&user_id).await?))
}

pub async fn favorites_handler(
    AxumState(state): SharedState,
    Path(user_id): Path<String>,
    payload: Result<Json<FavoriteRequest>, JsonRejection>,
) -> Result<Json<Ack>, AppError> {
    let Json(request) = payload?;

    let upsert = state
        .store
        .set_favorite(&user_id, request.plant_id, request.is_favorite)
        .await?;

    debug!(
        "Favorite {} for {user_id} set to {}: {upsert:?}",
        request.plant_id, request.is_favorite
    );

    Ok(Json(Ack::ok()))
}

pub async fn projects_handler(
    AxumState(state): SharedState,
    Path(user_id): Path<String>,
    payload: Result<Json<ProjectsRequest>, JsonRejection>,
) -> Result<Json<Ack>, AppError> {
    let Json(request) = payload?;
    let count = request.projects.len();

    let upsert = state
        .store
        .replace_projects(&user_id, request.projects)
        .await?;

    debug!("Saved {count} projects for {user_id}: {upsert:?}");

    Ok(Json(Ack::ok()))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn not_found_handler() -> impl IntoResponse {
    AppError::NotFound
}
