//! Persistence gateway (C2, §4.2).
//!
//! `spec.md` treats the real store as an external collaborator (a
//! transactional key-value/relational store). This module defines the
//! contract every other component programs against as the [`Store`] trait,
//! and ships [`InMemoryStore`] — a `dashmap`-backed reference implementation
//! sufficient to run the whole engine and the end-to-end scenarios in §8.
//! A production deployment swaps in a SQL-backed `Store` without touching
//! C4/C6/C7.

use crate::domain::{Game, GameStatus, Player, Season, SeasonPhase, Team, Tournament, TournamentEntry};
use crate::error::{CoreError, Result};
use crate::ids::{GameId, IdSequence, PlayerId, SeasonId, TeamId, TournamentEntryId, TournamentId};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Every mutation performed by core components runs through one of these
/// CAS-guarded methods; there is no raw "set" that skips the check (§4.2).
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_season(&self, id: SeasonId) -> Result<Season>;
    async fn cas_update_season(&self, expected: &Season, new: Season) -> Result<()>;

    async fn get_team(&self, id: TeamId) -> Result<Team>;
    async fn list_teams_by_division(&self, division: u32) -> Result<Vec<Team>>;
    async fn list_teams_by_subdivision(&self, division: u32, subdivision: &str) -> Result<Vec<Team>>;
    async fn cas_update_team(&self, expected: &Team, new: Team) -> Result<()>;
    /// Bulk standings rebuild for one subdivision, applied as a single
    /// transaction (§4.2: "Bulk updates... run in a single transaction per
    /// subdivision").
    async fn apply_subdivision_rebuild(
        &self,
        division: u32,
        subdivision: &str,
        updates: Vec<Team>,
    ) -> Result<()>;

    async fn get_player(&self, id: PlayerId) -> Result<Player>;
    async fn list_players_by_team(&self, team_id: TeamId) -> Result<Vec<Player>>;
    async fn list_non_retired_players(&self) -> Result<Vec<Player>>;
    async fn cas_update_player(&self, expected: &Player, new: Player) -> Result<()>;

    async fn get_game(&self, id: GameId) -> Result<Game>;
    async fn create_game(&self, game: Game) -> Result<GameId>;
    async fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>>;
    async fn list_games_by_tournament_round(&self, tournament_id: TournamentId, round: u32) -> Result<Vec<Game>>;
    /// Every game across every round of one tournament, for bracket views.
    async fn list_games_by_tournament(&self, tournament_id: TournamentId) -> Result<Vec<Game>>;
    async fn list_completed_league_games_for_season(&self) -> Result<Vec<Game>>;
    async fn cas_update_game(&self, expected: &Game, new: Game) -> Result<()>;

    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament>;
    async fn create_tournament(&self, tournament: Tournament) -> Result<TournamentId>;
    async fn list_tournaments_by_status(&self, status: crate::domain::tournament::TournamentStatus) -> Result<Vec<Tournament>>;
    async fn cas_update_tournament(&self, expected: &Tournament, new: Tournament) -> Result<()>;

    async fn create_entry(&self, entry: TournamentEntry) -> Result<TournamentEntryId>;
    async fn list_entries(&self, tournament_id: TournamentId) -> Result<Vec<TournamentEntry>>;
    async fn cas_update_entry(&self, expected: &TournamentEntry, new: TournamentEntry) -> Result<()>;

    /// "At most once per day" markers for C7 step 3 (§4.7, invariant I7).
    /// Returns `true` if this call is the one that claimed the marker.
    async fn claim_daily_marker(&self, marker: &str, game_day: u32) -> Result<bool>;
}

fn cas<T: Clone + PartialEq>(map: &DashMap<u64, T>, key: u64, expected: &T, new: T, entity: &str) -> Result<()> {
    let mut slot = map
        .get_mut(&key)
        .ok_or_else(|| CoreError::NotFound(format!("{entity} {key}")))?;
    if *slot != *expected {
        return Err(CoreError::Conflict { entity: entity.to_string() });
    }
    *slot = new;
    Ok(())
}

pub struct InMemoryStore {
    seasons: DashMap<u64, Season>,
    teams: DashMap<u64, Team>,
    players: DashMap<u64, Player>,
    games: DashMap<u64, Game>,
    tournaments: DashMap<u64, Tournament>,
    entries: DashMap<u64, TournamentEntry>,
    daily_markers: Mutex<HashMap<(String, u32), bool>>,
    subdivision_locks: DashMap<(u32, String), Arc<Mutex<()>>>,

    game_ids: IdSequence,
    entry_ids: IdSequence,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            seasons: DashMap::new(),
            teams: DashMap::new(),
            players: DashMap::new(),
            games: DashMap::new(),
            tournaments: DashMap::new(),
            entries: DashMap::new(),
            daily_markers: Mutex::new(HashMap::new()),
            subdivision_locks: DashMap::new(),
            game_ids: IdSequence::new(),
            entry_ids: IdSequence::new(),
        }
    }

    pub fn seed_season(&self, season: Season) {
        self.seasons.insert(season.id.0, season);
    }

    pub fn seed_team(&self, team: Team) {
        self.teams.insert(team.id.0, team);
    }

    pub fn seed_player(&self, player: Player) {
        self.players.insert(player.id.0, player);
    }

    fn subdivision_lock(&self, division: u32, subdivision: &str) -> Arc<Mutex<()>> {
        self.subdivision_locks
            .entry((division, subdivision.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_season(&self, id: SeasonId) -> Result<Season> {
        self.seasons.get(&id.0).map(|s| s.clone()).ok_or_else(|| CoreError::NotFound(format!("Season {id}")))
    }

    async fn cas_update_season(&self, expected: &Season, new: Season) -> Result<()> {
        cas(&self.seasons, expected.id.0, expected, new, "Season")
    }

    async fn get_team(&self, id: TeamId) -> Result<Team> {
        self.teams.get(&id.0).map(|t| t.clone()).ok_or_else(|| CoreError::NotFound(format!("Team {id}")))
    }

    async fn list_teams_by_division(&self, division: u32) -> Result<Vec<Team>> {
        Ok(self.teams.iter().filter(|t| t.division == division).map(|t| t.clone()).collect())
    }

    async fn list_teams_by_subdivision(&self, division: u32, subdivision: &str) -> Result<Vec<Team>> {
        Ok(self
            .teams
            .iter()
            .filter(|t| t.division == division && t.subdivision == subdivision)
            .map(|t| t.clone())
            .collect())
    }

    async fn cas_update_team(&self, expected: &Team, new: Team) -> Result<()> {
        cas(&self.teams, expected.id.0, expected, new, "Team")
    }

    async fn apply_subdivision_rebuild(&self, division: u32, subdivision: &str, updates: Vec<Team>) -> Result<()> {
        let lock = self.subdivision_lock(division, subdivision);
        let _guard = lock.lock();
        for team in updates {
            self.teams.insert(team.id.0, team);
        }
        Ok(())
    }

    async fn get_player(&self, id: PlayerId) -> Result<Player> {
        self.players.get(&id.0).map(|p| p.clone()).ok_or_else(|| CoreError::NotFound(format!("Player {id}")))
    }

    async fn list_players_by_team(&self, team_id: TeamId) -> Result<Vec<Player>> {
        Ok(self.players.iter().filter(|p| p.team_id == team_id).map(|p| p.clone()).collect())
    }

    async fn list_non_retired_players(&self) -> Result<Vec<Player>> {
        Ok(self.players.iter().filter(|p| !p.is_retired).map(|p| p.clone()).collect())
    }

    async fn cas_update_player(&self, expected: &Player, new: Player) -> Result<()> {
        cas(&self.players, expected.id.0, expected, new, "Player")
    }

    async fn get_game(&self, id: GameId) -> Result<Game> {
        self.games.get(&id.0).map(|g| g.clone()).ok_or_else(|| CoreError::NotFound(format!("Game {id}")))
    }

    async fn create_game(&self, mut game: Game) -> Result<GameId> {
        let id = GameId(self.game_ids.next());
        game.id = id;
        self.games.insert(id.0, game);
        Ok(id)
    }

    async fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>> {
        Ok(self.games.iter().filter(|g| g.status == status).map(|g| g.clone()).collect())
    }

    async fn list_games_by_tournament_round(&self, tournament_id: TournamentId, round: u32) -> Result<Vec<Game>> {
        Ok(self
            .games
            .iter()
            .filter(|g| g.tournament_id == Some(tournament_id) && g.round == Some(round))
            .map(|g| g.clone())
            .collect())
    }

    async fn list_games_by_tournament(&self, tournament_id: TournamentId) -> Result<Vec<Game>> {
        Ok(self.games.iter().filter(|g| g.tournament_id == Some(tournament_id)).map(|g| g.clone()).collect())
    }

    async fn list_completed_league_games_for_season(&self) -> Result<Vec<Game>> {
        Ok(self
            .games
            .iter()
            .filter(|g| g.status == GameStatus::Completed && g.match_type == crate::domain::MatchType::League)
            .map(|g| g.clone())
            .collect())
    }

    async fn cas_update_game(&self, expected: &Game, new: Game) -> Result<()> {
        if !expected.can_transition_to(new.status) {
            return Err(CoreError::Integrity(format!(
                "illegal Game status transition {:?} -> {:?}",
                expected.status, new.status
            )));
        }
        cas(&self.games, expected.id.0, expected, new, "Game")
    }

    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament> {
        self.tournaments.get(&id.0).map(|t| t.clone()).ok_or_else(|| CoreError::NotFound(format!("Tournament {id}")))
    }

    async fn create_tournament(&self, mut tournament: Tournament) -> Result<TournamentId> {
        // Tournament ids double as the bracket-shuffle RNG seed (§4.6), so
        // allocate from the same sequence as games keeps things simple and
        // collision-free without a dedicated counter.
        let id = TournamentId(self.game_ids.next() + (1 << 32));
        tournament.id = id;
        self.tournaments.insert(id.0, tournament);
        Ok(id)
    }

    async fn list_tournaments_by_status(&self, status: crate::domain::tournament::TournamentStatus) -> Result<Vec<Tournament>> {
        Ok(self.tournaments.iter().filter(|t| t.status == status).map(|t| t.clone()).collect())
    }

    async fn cas_update_tournament(&self, expected: &Tournament, new: Tournament) -> Result<()> {
        cas(&self.tournaments, expected.id.0, expected, new, "Tournament")
    }

    async fn create_entry(&self, mut entry: TournamentEntry) -> Result<TournamentEntryId> {
        let id = TournamentEntryId(self.entry_ids.next());
        entry.id = id;
        self.entries.insert(id.0, entry);
        Ok(id)
    }

    async fn list_entries(&self, tournament_id: TournamentId) -> Result<Vec<TournamentEntry>> {
        Ok(self.entries.iter().filter(|e| e.tournament_id == tournament_id).map(|e| e.clone()).collect())
    }

    async fn cas_update_entry(&self, expected: &TournamentEntry, new: TournamentEntry) -> Result<()> {
        cas(&self.entries, expected.id.0, expected, new, "TournamentEntry")
    }

    async fn claim_daily_marker(&self, marker: &str, game_day: u32) -> Result<bool> {
        let mut markers = self.daily_markers.lock();
        let key = (marker.to_string(), game_day);
        if markers.contains_key(&key) {
            Ok(false)
        } else {
            markers.insert(key, true);
            Ok(true)
        }
    }
}
