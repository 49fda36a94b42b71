//! Router wiring (§6), grounded on `proerror77-ploy`'s `api::routes::create_router`:
//! CORS + trace layers wrapped around a flat route table, state injected once
//! at the bottom.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{matches, season, standings, tournaments, ws};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/matches/live", get(matches::list_live))
        .route("/matches/:id/enhanced-data", get(matches::enhanced_data))
        .route("/matches/:id/force-start", post(matches::force_start))
        .route("/tournaments/:id", get(tournaments::get_tournament))
        .route("/tournaments/:id/enter", post(tournaments::enter))
        .route("/standings", get(standings::list))
        .route("/season/current", get(season::current))
        .route("/ws/matches/:id", get(ws::match_events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dome_core::{Config, InMemoryStore, SeasonCoordinator, SeasonId, Store, TournamentEngine};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn test_state() -> AppState {
        let store = InMemoryStore::new();
        store.seed_season(dome_core::domain::Season::new(SeasonId(1), chrono::Utc::now()));
        let store: Arc<dyn Store> = Arc::new(store);
        let match_bus = Arc::new(dome_core::EventBus::new());
        let tournament_bus = Arc::new(dome_core::EventBus::new());
        let season_phase_bus = Arc::new(dome_core::EventBus::new());
        let live_matches = Arc::new(dome_core::LiveMatchRegistry::new());
        let tournament_engine = Arc::new(TournamentEngine::new(store.clone(), tournament_bus.clone(), Config::default()));
        let coordinator = Arc::new(SeasonCoordinator::new(
            store.clone(),
            match_bus.clone(),
            tournament_bus.clone(),
            season_phase_bus.clone(),
            tournament_engine.clone(),
            live_matches,
            Config::default(),
            SeasonId(1),
        ));
        AppState {
            store,
            match_bus,
            tournament_bus,
            season_phase_bus,
            tournament_engine,
            coordinator,
            config: Config::default(),
            season_id: SeasonId(1),
            started_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn health_check_returns_200() {
        let app = create_router(test_state());
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn season_current_returns_the_seeded_season() {
        let app = create_router(test_state());
        let response =
            app.oneshot(Request::builder().uri("/season/current").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn enhanced_data_for_unknown_match_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/matches/999/enhanced-data").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
