mod presence;
mod time;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use voicetally_core::{PresenceEvent, PresenceRegistry, Tracker};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Tracker,
    pub registry: Arc<PresenceRegistry>,
    pub events: mpsc::Sender<PresenceEvent>,
    pub top_size: usize,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/voice-states",
            axum::routing::post(presence::update_voice_state).put(presence::replace_voice_states),
        )
        .route("/api/time/top", get(time::get_top))
        .route("/api/time/{member}", get(time::get_member_time))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
