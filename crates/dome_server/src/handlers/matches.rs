//! `/matches/*` handlers (§6).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use dome_core::domain::GameStatus;
use dome_core::{GameId, LiveMatchState};
use serde::Serialize;

#[derive(Serialize)]
pub struct LiveMatchSummary {
    #[serde(flatten)]
    game: dome_core::domain::Game,
    tick: u32,
}

/// `GET /matches/live`: every IN_PROGRESS game, annotated with its current
/// tick from the live-match registry when a worker is actually running it
/// (a game can be IN_PROGRESS for one tick after step 7 flips it before the
/// worker's first `registry.publish` call).
pub async fn list_live(State(state): State<AppState>) -> Result<Json<Vec<LiveMatchSummary>>, ApiError> {
    let games = state.store.list_games_by_status(GameStatus::InProgress).await.map_err(ApiError::from)?;
    let registry = state.live_matches();
    let summaries = games
        .into_iter()
        .map(|game| {
            let tick = registry.get(game.id).map(|s| s.tick).unwrap_or(game.game_time);
            LiveMatchSummary { game, tick }
        })
        .collect();
    Ok(Json(summaries))
}

#[derive(Serialize)]
pub struct EnhancedMatchData {
    game: dome_core::domain::Game,
    live_state: Option<LiveMatchState>,
}

/// `GET /matches/:id/enhanced-data`: persisted row plus the in-flight
/// [`LiveMatchState`] (possession, events, revenue snapshots) when a worker
/// is currently running the match. 404 if the game doesn't exist at all.
pub async fn enhanced_data(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<EnhancedMatchData>, ApiError> {
    let game_id = GameId(id);
    let game = state.store.get_game(game_id).await.map_err(ApiError::from)?;
    let live_state = state.live_matches().get(game_id);
    Ok(Json(EnhancedMatchData { game, live_state }))
}

/// `POST /matches/:id/force-start`: admin-only move from SCHEDULED straight
/// to IN_PROGRESS (§6: "200 / 409").
pub async fn force_start(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<dome_core::domain::Game>, ApiError> {
    let game = state.coordinator.force_start_match(GameId(id)).await.map_err(ApiError::from)?;
    Ok(Json(game))
}
