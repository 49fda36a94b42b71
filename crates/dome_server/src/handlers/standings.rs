//! `GET /standings` (§6).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use dome_core::TeamId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Deserialize)]
pub struct StandingsQuery {
    division: u32,
    subdivision: Option<String>,
}

#[derive(Serialize)]
pub struct StandingRow {
    team_id: TeamId,
    name: String,
    wins: u32,
    losses: u32,
    draws: u32,
    points: u32,
    goals_for: i64,
    goals_against: i64,
    goal_difference: i64,
}

/// Replays completed league games to fold goals-for/against per team, the
/// same accumulation [`dome_core::coordinator`]'s standings rebuild does
/// internally — the stored `Team` row carries W/D/L/points (invariant I1)
/// but not goal totals, so this view recomputes them instead of persisting a
/// second derived field.
fn goal_tally(games: &[dome_core::domain::Game]) -> HashMap<TeamId, (i64, i64)> {
    let mut tally: HashMap<TeamId, (i64, i64)> = HashMap::new();
    for game in games {
        let home = tally.entry(game.home_team_id).or_default();
        home.0 += game.home_score as i64;
        home.1 += game.away_score as i64;
        let away = tally.entry(game.away_team_id).or_default();
        away.0 += game.away_score as i64;
        away.1 += game.home_score as i64;
    }
    tally
}

/// `GET /standings?division=&subdivision=`: points desc, goal-difference
/// desc, wins desc, losses asc, name asc (§6).
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<StandingsQuery>,
) -> Result<Json<Vec<StandingRow>>, ApiError> {
    let teams = match &query.subdivision {
        Some(sub) => state.store.list_teams_by_subdivision(query.division, sub).await.map_err(ApiError::from)?,
        None => state.store.list_teams_by_division(query.division).await.map_err(ApiError::from)?,
    };

    let games = state.store.list_completed_league_games_for_season().await.map_err(ApiError::from)?;
    let tally = goal_tally(&games);

    let mut rows: Vec<StandingRow> = teams
        .into_iter()
        .map(|team| {
            let (goals_for, goals_against) = tally.get(&team.id).copied().unwrap_or((0, 0));
            StandingRow {
                team_id: team.id,
                name: team.name,
                wins: team.wins,
                losses: team.losses,
                draws: team.draws,
                points: team.points,
                goals_for,
                goals_against,
                goal_difference: goals_for - goals_against,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference.cmp(&a.goal_difference))
            .then(b.wins.cmp(&a.wins))
            .then(a.losses.cmp(&b.losses))
            .then(a.name.cmp(&b.name))
    });

    Ok(Json(rows))
}
