//! In-memory registry of running matches' [`LiveMatchState`] (SPEC_FULL
//! §6: `GET /matches/live` and `GET /matches/:id/enhanced-data` need to
//! read state owned by a worker task without holding a reference into it).
//!
//! Same `dashmap`-backed shape as `store.rs`'s per-entity maps: the worker
//! publishes a clone of its state after every tick and on completion
//! removes its own entry, so the registry never outlives the match it
//! describes.

use super::engine::LiveMatchState;
use crate::ids::GameId;
use dashmap::DashMap;

#[derive(Default)]
pub struct LiveMatchRegistry {
    states: DashMap<u64, LiveMatchState>,
}

impl LiveMatchRegistry {
    pub fn new() -> Self {
        Self { states: DashMap::new() }
    }

    pub fn publish(&self, state: &LiveMatchState) {
        self.states.insert(state.game_id.0, state.clone());
    }

    pub fn remove(&self, game_id: GameId) {
        self.states.remove(&game_id.0);
    }

    pub fn get(&self, game_id: GameId) -> Option<LiveMatchState> {
        self.states.get(&game_id.0).map(|s| s.clone())
    }

    pub fn list_ids(&self) -> Vec<u64> {
        self.states.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchType;
    use crate::ids::TeamId;
    use crate::live_match::{MatchEngine, OnFieldPlayer};
    use crate::domain::Attributes;

    fn roster() -> Vec<OnFieldPlayer> {
        let attrs = Attributes { speed: 20, power: 20, throwing: 20, catching: 20, kicking: 20, stamina: 20, leadership: 20, agility: 20 };
        (1..=6).map(|n| OnFieldPlayer::new(crate::ids::PlayerId(n), attrs)).collect()
    }

    #[test]
    fn publish_then_get_round_trips_the_snapshot() {
        let registry = LiveMatchRegistry::new();
        let engine = MatchEngine::new(GameId(7), TeamId(1), TeamId(2), MatchType::League, roster(), roster(), 1.0);
        registry.publish(&engine.state);

        let fetched = registry.get(GameId(7)).unwrap();
        assert_eq!(fetched.game_id, GameId(7));
        assert_eq!(registry.list_ids(), vec![7]);

        registry.remove(GameId(7));
        assert!(registry.get(GameId(7)).is_none());
    }
}
