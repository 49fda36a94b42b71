//! `/tournaments/*` handlers (§6).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use dome_core::domain::{Game, Tournament, TournamentEntry};
use dome_core::{TeamId, TournamentId};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct TournamentView {
    tournament: Tournament,
    entries: Vec<TournamentEntry>,
    /// Bracket games grouped by round, in creation order within each round.
    bracket: Vec<BracketRound>,
}

#[derive(Serialize)]
pub struct BracketRound {
    round: u32,
    games: Vec<Game>,
}

/// `GET /tournaments/:id`: tournament + entries + bracket (§6: "200 / 404").
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TournamentView>, ApiError> {
    let tournament_id = TournamentId(id);
    let tournament = state.store.get_tournament(tournament_id).await.map_err(ApiError::from)?;
    let entries = state.store.list_entries(tournament_id).await.map_err(ApiError::from)?;
    let mut games = state.store.list_games_by_tournament(tournament_id).await.map_err(ApiError::from)?;
    games.sort_by_key(|g| (g.round.unwrap_or(0), g.id.0));

    let mut bracket: Vec<BracketRound> = Vec::new();
    for game in games {
        let round = game.round.unwrap_or(0);
        match bracket.last_mut() {
            Some(r) if r.round == round => r.games.push(game),
            _ => bracket.push(BracketRound { round, games: vec![game] }),
        }
    }

    Ok(Json(TournamentView { tournament, entries, bracket }))
}

#[derive(Deserialize)]
pub struct EnterRequest {
    team_id: u64,
    #[serde(default)]
    has_entry_item: bool,
}

/// `POST /tournaments/:id/enter`: registers the caller's team (§6:
/// "200 / 402 / 409", mapped from [`dome_core::NotEligibleReason`] by
/// [`crate::error::ApiError`]).
pub async fn enter(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<EnterRequest>,
) -> Result<Json<TournamentEntry>, ApiError> {
    let entry_id = state
        .tournament_engine
        .enter(TournamentId(id), TeamId(request.team_id), request.has_entry_item)
        .await
        .map_err(ApiError::from)?;
    let entries = state.store.list_entries(TournamentId(id)).await.map_err(ApiError::from)?;
    let entry = entries
        .into_iter()
        .find(|e| e.id == entry_id)
        .ok_or_else(|| ApiError(dome_core::CoreError::NotFound(format!("TournamentEntry {entry_id}"))))?;
    Ok(Json(entry))
}
