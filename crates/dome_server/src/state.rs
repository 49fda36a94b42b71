//! Shared application state for API handlers (§6), grounded on
//! `proerror77-ploy`'s `api::state::AppState`: one `Clone`-able struct of
//! `Arc`s handed to every route via `axum::extract::State`.

use dome_core::{
    Config, EventBus, LiveMatchRegistry, MatchTickPayload, SeasonCoordinator, SeasonId, SeasonPhaseEvent, Store,
    TournamentEngine, TournamentMatchCompleted,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub match_bus: Arc<EventBus<MatchTickPayload>>,
    pub tournament_bus: Arc<EventBus<TournamentMatchCompleted>>,
    pub season_phase_bus: Arc<EventBus<SeasonPhaseEvent>>,
    pub tournament_engine: Arc<TournamentEngine>,
    pub coordinator: Arc<SeasonCoordinator>,
    pub config: Config,
    pub season_id: SeasonId,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn live_matches(&self) -> Arc<LiveMatchRegistry> {
        self.coordinator.live_matches()
    }

    pub fn uptime_seconds(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}
