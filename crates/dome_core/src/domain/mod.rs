//! Data model (§3): the persisted entities every component reads and writes.

mod game;
mod player;
mod season;
mod team;
mod tournament;

pub use game::{Game, GameStatus, MatchType};
pub use player::{AttributeKey, Attributes, Player};
pub use season::Season;
pub use team::Team;
pub use tournament::{Tournament, TournamentEntry, TournamentKind, TournamentStatus};

use crate::clock::Phase;
use serde::{Deserialize, Serialize};

impl From<Phase> for SeasonPhase {
    fn from(p: Phase) -> Self {
        match p {
            Phase::Regular => SeasonPhase::Regular,
            Phase::Playoffs => SeasonPhase::Playoffs,
            Phase::Offseason => SeasonPhase::Offseason,
        }
    }
}

/// Re-exported under the domain's own name so `dome_core::domain::SeasonPhase`
/// reads naturally alongside `Season`, while `clock::Phase` stays the pure
/// computation's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeasonPhase {
    Regular,
    Playoffs,
    Offseason,
}
