//! `GET /season/current` (§6).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use dome_core::domain::Season;

/// `GET /season/current`: the active season, its phase and current day
/// (§3: exactly one active season at a time, mutated only by C7).
pub async fn current(State(state): State<AppState>) -> Result<Json<Season>, ApiError> {
    let season = state.store.get_season(state.season_id).await.map_err(ApiError::from)?;
    Ok(Json(season))
}
