use crate::ids::{GameId, TeamId, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    League,
    Exhibition,
    Tournament,
}

impl MatchType {
    /// Duration in sim-seconds (§4.4): 1800 for League/Tournament, 1200 for
    /// Exhibition.
    pub fn duration_seconds(&self) -> u32 {
        match self {
            MatchType::League | MatchType::Tournament => 1800,
            MatchType::Exhibition => 1200,
        }
    }

    pub fn half_time_tick(&self) -> u32 {
        self.duration_seconds() / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub match_type: MatchType,
    pub status: GameStatus,
    pub game_date: DateTime<Utc>,
    pub home_score: u32,
    pub away_score: u32,
    /// Elapsed sim-seconds; checkpointed every 60 ticks (§4.4).
    pub game_time: u32,
    pub tournament_id: Option<TournamentId>,
    pub round: Option<u32>,
    /// Set when force-completed after a worker crash (SPEC_FULL §3.1).
    pub recovered: bool,
}

impl Game {
    pub fn new_scheduled(
        id: GameId,
        home_team_id: TeamId,
        away_team_id: TeamId,
        match_type: MatchType,
        game_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            home_team_id,
            away_team_id,
            match_type,
            status: GameStatus::Scheduled,
            game_date,
            home_score: 0,
            away_score: 0,
            game_time: 0,
            tournament_id: None,
            round: None,
            recovered: false,
        }
    }

    /// Invariant I2: a game never transitions COMPLETED -> IN_PROGRESS.
    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        match (self.status, next) {
            (GameStatus::Completed, GameStatus::InProgress) => false,
            (GameStatus::Completed, GameStatus::Scheduled) => false,
            _ => true,
        }
    }
}
