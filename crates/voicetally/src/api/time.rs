use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use voicetally_core::MemberId;

use super::AppState;
use crate::board::{self, LeaderboardEntry, MemberTime};

#[derive(Debug, Deserialize)]
pub struct TopParams {
    pub n: Option<usize>,
}

pub async fn get_member_time(
    State(state): State<AppState>,
    Path(member): Path<MemberId>,
) -> Result<Json<MemberTime>, (StatusCode, String)> {
    let name = state.registry.display_name(member);

    match state.tracker.member_time(member) {
        Some(duration) => Ok(Json(MemberTime::new(member, name, duration))),
        None => Err((StatusCode::NOT_FOUND, board::not_seen(&name))),
    }
}

pub async fn get_top(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Json<Vec<LeaderboardEntry>> {
    let n = params.n.unwrap_or(state.top_size);
    let rows = state.tracker.top(n);

    Json(board::entries(rows, |m| state.registry.display_name(m)))
}
