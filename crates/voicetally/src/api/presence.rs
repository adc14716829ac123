use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use voicetally_core::{PresenceEvent, VoiceStateUpdate};

use super::AppState;

/// Record one member's voice state and forward any activity transition.
pub async fn update_voice_state(
    State(state): State<AppState>,
    Json(update): Json<VoiceStateUpdate>,
) -> Result<StatusCode, (StatusCode, String)> {
    if let Some(event) = state.registry.update(update) {
        forward(&state, event).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

/// Replace the whole presence picture, e.g. after the bot reconnects.
pub async fn replace_voice_states(
    State(state): State<AppState>,
    Json(updates): Json<Vec<VoiceStateUpdate>>,
) -> Result<StatusCode, (StatusCode, String)> {
    let event = state.registry.replace(updates);
    forward(&state, event).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn forward(state: &AppState, event: PresenceEvent) -> Result<(), (StatusCode, String)> {
    state.events.send(event).await.map_err(|_| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Tracker is shutting down".to_string(),
        )
    })
}
