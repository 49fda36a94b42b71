//! Async driver for a single live match (§4.4).
//!
//! Wraps [`super::engine::MatchEngine`] with the I/O the pure engine can't
//! do itself: pulling rosters from the [`crate::store::Store`], publishing
//! tick/lifecycle events on the [`crate::bus::EventBus`], checkpointing every
//! 60 ticks, and running the completion-hook transaction. Modeled on the
//! `CompetitionWatcher`-style tokio loop used elsewhere in this engine: a
//! `tokio::select!` between the tick timer and a cancellation signal.

use super::engine::{MatchEngine, OnFieldPlayer};
use super::registry::LiveMatchRegistry;
use crate::bus::{match_lifecycle_topic, match_tick_topic, EventBus, TOURNAMENT_LIFECYCLE_TOPIC};
use crate::config::Config;
use crate::domain::{Game, GameStatus, MatchType, Player};
use crate::error::{CoreError, Result};
use crate::events::{MatchEvent, MatchTickPayload, TournamentMatchCompleted};
use crate::ids::{GameId, TeamId};
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MatchWorkerError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("match {0} stalled past the tick-production timeout and was force-completed")]
    ForceCompleted(GameId),
}

const TICK_PRODUCTION_TIMEOUT_SECS: u64 = 30;

async fn load_roster(store: &dyn Store, team_id: TeamId) -> Result<Vec<OnFieldPlayer>> {
    let mut players = store.list_players_by_team(team_id).await?;
    players.retain(Player::eligible_to_play);
    players.sort_by(|a, b| b.attributes_rank().cmp(&a.attributes_rank()));
    let chosen: Vec<OnFieldPlayer> =
        players.into_iter().take(6).map(|p| OnFieldPlayer::new(p.id, p.attributes)).collect();
    if chosen.len() < 6 {
        return Err(CoreError::Integrity(format!("team {team_id} has fewer than 6 eligible players")));
    }
    Ok(chosen)
}

/// Runs one match to completion: loads rosters, drives the tick engine in
/// real time (sleeping `simulation_tick_period_ms` between ticks), publishes
/// every event to the match's tick topic, checkpoints every 60 ticks, and
/// performs the completion-hook transaction. Cooperatively cancellable via
/// `cancel`.
pub async fn run_match(
    store: Arc<dyn Store>,
    bus: Arc<EventBus<MatchTickPayload>>,
    tournament_bus: Arc<EventBus<TournamentMatchCompleted>>,
    registry: Arc<LiveMatchRegistry>,
    config: &Config,
    game: Game,
    cancel: CancellationToken,
) -> std::result::Result<(), MatchWorkerError> {
    let home_players = load_roster(store.as_ref(), game.home_team_id).await?;
    let away_players = load_roster(store.as_ref(), game.away_team_id).await?;

    let mut engine = if game.game_time > 0 {
        // The persisted Game row doesn't carry possession (not part of the
        // data model, §3); resuming always hands the kickoff back to the
        // home side rather than reconstructing exact mid-drive state.
        MatchEngine::resume_from_checkpoint(
            game.id,
            game.home_team_id,
            game.away_team_id,
            game.match_type,
            home_players,
            away_players,
            1.0,
            game.game_time,
            game.home_score,
            game.away_score,
            game.home_team_id,
        )
    } else {
        MatchEngine::new(game.id, game.home_team_id, game.away_team_id, game.match_type, home_players, away_players, 1.0)
    };

    let tick_topic = match_tick_topic(game.id.0);
    let lifecycle_topic = match_lifecycle_topic(game.id.0);
    let tick_period = Duration::from_millis(config.simulation_tick_period_ms);
    let mut last_progress = Instant::now();

    registry.publish(&engine.state);

    loop {
        if cancel.is_cancelled() {
            info!(game_id = %game.id, "match worker cancelled before completion");
            registry.remove(game.id);
            return Ok(());
        }

        let stalled = Instant::now().duration_since(last_progress) > Duration::from_secs(TICK_PRODUCTION_TIMEOUT_SECS);
        if stalled {
            warn!(game_id = %game.id, "tick production stalled, force-completing");
            force_complete(store.as_ref(), &bus, &tournament_bus, &lifecycle_topic, &game, &engine).await?;
            registry.remove(game.id);
            return Err(MatchWorkerError::ForceCompleted(game.id));
        }

        tokio::select! {
            _ = tokio::time::sleep(tick_period) => {
                let events = engine.step();
                last_progress = Instant::now();
                // A snapshot is appended on the same cadence as the checkpoint
                // (every 60 ticks, §4.4 step 6), so only that tick's payload
                // carries `revenue`.
                let revenue = if engine.is_checkpoint_tick() {
                    engine.state.revenue_snapshots.last().cloned()
                } else {
                    None
                };
                for event in events {
                    bus.publish(
                        &tick_topic,
                        MatchTickPayload {
                            match_id: game.id.0,
                            tick: engine.state.tick,
                            game_time: engine.state.tick,
                            home_score: engine.state.home_score,
                            away_score: engine.state.away_score,
                            event,
                            revenue: revenue.clone(),
                        },
                    );
                }
                registry.publish(&engine.state);
                if engine.is_checkpoint_tick() {
                    checkpoint(store.as_ref(), &game, &engine).await?;
                }
                if engine.completed {
                    break;
                }
            }
            _ = cancel.cancelled() => {
                info!(game_id = %game.id, "match worker cancelled mid-tick");
                registry.remove(game.id);
                return Ok(());
            }
        }
    }

    if game.match_type == MatchType::Tournament && engine.state.home_score == engine.state.away_score {
        resolve_tournament_tie(&mut engine, game.id);
        registry.publish(&engine.state);
    }

    let result = complete_match(store.as_ref(), &bus, &tournament_bus, &lifecycle_topic, &game, &engine, false).await;
    registry.remove(game.id);
    result
}

/// §4.6: one 300-sim-second sudden-death block (scoring-only), then a
/// `(matchId)`-seeded coin flip if still tied.
fn resolve_tournament_tie(engine: &mut MatchEngine, game_id: GameId) {
    if engine.run_sudden_death().is_some() {
        return;
    }
    use rand::{Rng, SeedableRng};
    let mut coin = rand_chacha::ChaCha8Rng::seed_from_u64(game_id.0);
    if coin.gen_bool(0.5) {
        engine.state.home_score += 1;
    } else {
        engine.state.away_score += 1;
    }
}

async fn checkpoint(store: &dyn Store, game: &Game, engine: &MatchEngine) -> Result<()> {
    let current = store.get_game(game.id).await?;
    let mut next = current.clone();
    next.game_time = engine.state.tick;
    next.home_score = engine.state.home_score;
    next.away_score = engine.state.away_score;
    store.cas_update_game(&current, next).await
}

async fn force_complete(
    store: &dyn Store,
    bus: &EventBus<MatchTickPayload>,
    tournament_bus: &EventBus<TournamentMatchCompleted>,
    lifecycle_topic: &str,
    game: &Game,
    engine: &MatchEngine,
) -> Result<()> {
    complete_match(store, bus, tournament_bus, lifecycle_topic, game, engine, true).await
}

/// The completion-hook transaction (§4.4): CAS the game to Completed, fold
/// the result into League team records, emit the lifecycle event. Tournament
/// matches additionally publish on the global tournament-lifecycle topic —
/// C6 discovers completion by subscribing there, never by a direct call,
/// per the "no in-memory back-pointers" rule.
async fn complete_match(
    store: &dyn Store,
    bus: &EventBus<MatchTickPayload>,
    tournament_bus: &EventBus<TournamentMatchCompleted>,
    lifecycle_topic: &str,
    game: &Game,
    engine: &MatchEngine,
    recovered: bool,
) -> Result<()> {
    let current = store.get_game(game.id).await?;
    if current.status == GameStatus::Completed {
        // Already completed by a prior worker attempt; duplicate-completion
        // is blocked by CAS, not by this check, but short-circuit to avoid
        // double-applying the standings update below.
        return Ok(());
    }

    let mut completed = current.clone();
    completed.status = GameStatus::Completed;
    completed.home_score = engine.state.home_score;
    completed.away_score = engine.state.away_score;
    completed.game_time = engine.state.tick;
    completed.recovered = recovered;
    store.cas_update_game(&current, completed.clone()).await?;

    if completed.match_type == MatchType::League {
        apply_league_result(store, &completed).await?;
    }

    let lifecycle_event = MatchEvent::new(crate::events::EventType::FinalWhistle, 100.0, engine.state.tick, None);
    bus.publish(
        lifecycle_topic,
        MatchTickPayload {
            match_id: completed.id.0,
            tick: engine.state.tick,
            game_time: completed.game_time,
            home_score: completed.home_score,
            away_score: completed.away_score,
            event: lifecycle_event,
            revenue: None,
        },
    );

    if completed.match_type == MatchType::Tournament {
        if let (Some(tournament_id), Some(round)) = (completed.tournament_id, completed.round) {
            let winner_team_id =
                if completed.home_score >= completed.away_score { completed.home_team_id } else { completed.away_team_id };
            tournament_bus.publish(
                TOURNAMENT_LIFECYCLE_TOPIC,
                TournamentMatchCompleted {
                    tournament_id: tournament_id.0,
                    game_id: completed.id.0,
                    round,
                    winner_team_id: winner_team_id.0,
                },
            );
        }
    }
    Ok(())
}

async fn apply_league_result(store: &dyn Store, game: &Game) -> Result<()> {
    let home = store.get_team(game.home_team_id).await?;
    let away = store.get_team(game.away_team_id).await?;
    let mut new_home = home.clone();
    let mut new_away = away.clone();
    use std::cmp::Ordering;
    match game.home_score.cmp(&game.away_score) {
        Ordering::Greater => {
            new_home.record_win();
            new_away.record_loss();
        }
        Ordering::Less => {
            new_home.record_loss();
            new_away.record_win();
        }
        Ordering::Equal => {
            new_home.record_draw();
            new_away.record_draw();
        }
    }
    store.cas_update_team(&home, new_home).await?;
    store.cas_update_team(&away, new_away).await?;
    Ok(())
}

impl Player {
    /// Coarse fitness ranking used only to pick a starting six; not part of
    /// the persisted data model.
    fn attributes_rank(&self) -> u32 {
        let a = &self.attributes;
        a.speed as u32 + a.power as u32 + a.throwing as u32 + a.catching as u32 + a.kicking as u32 + a.agility as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::domain::{Attributes, Game, MatchType as DomainMatchType};
    use crate::ids::TeamId;
    use crate::store::InMemoryStore;

    fn seed_roster(store: &InMemoryStore, team_id: TeamId, start: u64) {
        for i in 0..8u64 {
            let attrs = Attributes {
                speed: 20,
                power: 20,
                throwing: 20,
                catching: 20,
                kicking: 20,
                stamina: 20,
                leadership: 20,
                agility: 20,
            };
            store.seed_player(crate::domain::Player::new(crate::ids::PlayerId(start + i), team_id, 24, attrs));
        }
    }

    /// §8 scenario 2: a game checkpointed at tick 840 (just before halftime)
    /// resumes from that checkpoint and reaches COMPLETED exactly once, even
    /// if the completion hook is invoked twice (duplicate-completion guard).
    #[tokio::test]
    async fn a_game_resumes_from_its_last_checkpoint_and_completes_exactly_once() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_team(crate::domain::Team::new(TeamId(1), "Alpha", 3));
        store.seed_team(crate::domain::Team::new(TeamId(2), "Beta", 3));
        seed_roster(&store, TeamId(1), 100);
        seed_roster(&store, TeamId(2), 200);

        let mut game = Game::new_scheduled(GameId(0), TeamId(1), TeamId(2), DomainMatchType::League, chrono::Utc::now());
        let id = store.create_game(game.clone()).await.unwrap();
        game.id = id;
        game.status = GameStatus::InProgress;
        game.game_time = 840; // last checkpoint before halftime at 900
        game.home_score = 1;
        game.away_score = 0;
        store.cas_update_game(&store.get_game(id).await.unwrap(), game.clone()).await.unwrap();

        let match_bus = Arc::new(EventBus::new());
        let tournament_bus = Arc::new(EventBus::new());
        let registry = Arc::new(LiveMatchRegistry::new());
        let mut config = Config::default();
        config.simulation_tick_period_ms = 0;
        let cancel = CancellationToken::new();

        run_match(store.clone(), match_bus, tournament_bus, registry, &config, game.clone(), cancel).await.unwrap();

        let completed = store.get_game(id).await.unwrap();
        assert_eq!(completed.status, GameStatus::Completed);
        assert_eq!(completed.game_time, 1800);

        // A second completion attempt (e.g. a retried worker after the first
        // one crashed right after committing) must be a no-op, not an error.
        let bus2 = Arc::new(EventBus::new());
        let tbus2 = Arc::new(EventBus::new());
        let lifecycle_topic = crate::bus::match_lifecycle_topic(id.0);
        let engine = MatchEngine::new(
            id,
            TeamId(1),
            TeamId(2),
            DomainMatchType::League,
            (0..6)
                .map(|i| OnFieldPlayer::new(crate::ids::PlayerId(100 + i), Attributes {
                    speed: 20, power: 20, throwing: 20, catching: 20, kicking: 20, stamina: 20, leadership: 20, agility: 20,
                }))
                .collect(),
            (0..6)
                .map(|i| OnFieldPlayer::new(crate::ids::PlayerId(200 + i), Attributes {
                    speed: 20, power: 20, throwing: 20, catching: 20, kicking: 20, stamina: 20, leadership: 20, agility: 20,
                }))
                .collect(),
            1.0,
        );
        complete_match(store.as_ref(), &bus2, &tbus2, &lifecycle_topic, &game, &engine, true).await.unwrap();

        let still_completed = store.get_game(id).await.unwrap();
        assert_eq!(still_completed.home_score, completed.home_score);
        assert_eq!(still_completed.away_score, completed.away_score);
    }
}
