//! HTTP surface
//!
//! Routes:
//! - `GET /get-complete-characters`: run one collection and return the records
//! - `GET /health`: liveness check
//!
//! The feed source is built once at startup and shared through
//! `AppState`; every request gets its own subscription and result set.

pub mod errors;

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::get};
use log::info;
use tokio::net::TcpListener;

use crate::{
    collector::collect_complete_characters,
    feed::FeedSource,
    metrics::{incr, METRICS},
    schema::{CharactersResponse, TopicId},
};

pub use errors::AppError;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<dyn FeedSource>,
    pub topic_id: TopicId,
    pub collect_timeout: Duration,
}

/// Creates the router with all application routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/get-complete-characters", get(get_complete_characters))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Serves the router on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Server running on {}", addr);
    info!(
        "Complete character endpoint: http://{}/get-complete-characters",
        addr
    );

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

/// `GET /get-complete-characters`
///
/// Runs one bounded collection against the configured topic. No retries;
/// a subscription failure becomes a 500 with a JSON error body.
async fn get_complete_characters(
    State(state): State<AppState>,
) -> Result<Json<CharactersResponse>, AppError> {
    incr(&METRICS.requests);

    let collection =
        collect_complete_characters(&state.topic_id, state.feed.as_ref(), state.collect_timeout)
            .await?;

    Ok(Json(CharactersResponse {
        topic_id: collection.topic_id.to_string(),
        complete_character_count: collection.count(),
        characters: collection.characters,
    }))
}
