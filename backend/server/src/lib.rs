//! Documentation of a garden planning backend: a plant catalog plus per-user favorites and projects.
//!
//!
//!
//! # General Infrastructure
//! - Single stateless HTTP service, JSON in and out
//! - All state lives in the store, any number of instances can run side by side
//! - Store is picked at startup: MongoDB, Postgres (Supabase) or in-memory for local work
//! - Unreachable store at startup is fatal, at request time it is a 500
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | GET | `/plants` | | catalog, ordered by id |
//! | GET | `/users/{id}` | | `{ favorites, projects }`, empty if unknown |
//! | POST | `/users/{id}/favorites` | `{ plantId, isFavorite }` | `{ ok: true }` |
//! | PUT | `/users/{id}/projects` | `{ projects }` | `{ ok: true }` |
//! | GET | `/health` | | `{ status: "ok", timestamp }` |
//!
//! Every route is also served under `/api`, the prefix older clients use.
//! Anything else is `404 { error: "Route not found" }`. Store failures are
//! `500 { error }`, bodies that do not parse are `400 { error }`.
//!
//!
//!
//! # Notes
//!
//! ## Favorites
//! Favorites used to be toggled by reading the array, editing it in the
//! handler and writing it back. Two quick taps on different plants could then
//! lose one of them. Now the store resolves membership itself, see [`store`].
//!
//! ## Catalog
//! The catalog is seeded from the bundled demo set on startup, only into an
//! empty store, so restarts never duplicate plants. `seed` does the same from
//! the command line.
//!
//!
//!
//! # Setup
//!
//! Environment, also read from `.env`:
//! - `PORT` (3000)
//! - `STORE_BACKEND`: `mongo` (default), `postgres` or `memory`
//! - `MONGODB_URI`, `MONGODB_DB` (`plants_db`)
//! - `DATABASE_URL` for Postgres
//! - `CATALOG_PATH`: JSON file to seed from instead of the demo set
//! - `RUST_LOG` (`info`)
//!
//! `MONGODB_URI` and `DATABASE_URL` are read from `/run/secrets/` first when mounted.
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//!
//!
//! # Just
//!
//! Run locally without a database.
//! ```sh
//! just dev
//! ```
//!
//! Run against a local MongoDB.
//! ```sh
//! just mongo
//! just run
//! ```
//!
//! Tests.
//! ```sh
//! just test
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod user;

use config::Config;
use routes::{
    favorites_handler, health_handler, not_found_handler, plants_handler, projects_handler,
    user_handler,
};
use state::State;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).init();
}

pub async fn start_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    state.store.close().await;

    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let routes = routes();

    // Served at the root and, for older clients, under `/api`.
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .fallback(not_found_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn routes() -> Router<Arc<State>> {
    // Unmatched methods on known paths answer like unknown paths.
    Router::new()
        .route("/plants", get(plants_handler).fallback(not_found_handler))
        .route("/users/{user_id}", get(user_handler).fallback(not_found_handler))
        .route(
            "/users/{user_id}/favorites",
            post(favorites_handler).fallback(not_found_handler),
        )
        .route(
            "/users/{user_id}/projects",
            put(projects_handler).fallback(not_found_handler),
        )
        .route("/health", get(health_handler).fallback(not_found_handler))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
