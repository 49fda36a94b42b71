use crate::ids::{TeamId, TournamentEntryId, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tagged-variant dispatch instead of a tournament-type class hierarchy, per
/// the Design Notes. [`TournamentKind::params`] is the single resolver every
/// other component queries for type-specific shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentKind {
    DailyDivisionalCup,
    /// Serializes as `"MID_SEASON_CLASSIC"`; the source oscillated between
    /// that and `MID_SEASON_CUP` (§9 Open Questions) — treated as one entity.
    #[serde(rename = "MID_SEASON_CLASSIC")]
    MidSeason,
}

#[derive(Debug, Clone, Copy)]
pub struct TournamentParams {
    pub max_participants: usize,
    pub entry_fee_credits: u64,
    pub entry_fee_gems: u64,
    pub requires_entry_item: bool,
    /// `None` means any division is eligible (Mid-Season Classic).
    pub fixed_division: Option<u32>,
    pub rounds: u32,
}

impl TournamentKind {
    pub fn params(&self) -> TournamentParams {
        match self {
            TournamentKind::DailyDivisionalCup => TournamentParams {
                max_participants: 8,
                entry_fee_credits: 0,
                entry_fee_gems: 0,
                requires_entry_item: true,
                fixed_division: None, // caller pins a specific division per cup instance
                rounds: 3,
            },
            TournamentKind::MidSeason => TournamentParams {
                max_participants: 64,
                entry_fee_credits: 10_000,
                entry_fee_gems: 20,
                requires_entry_item: false,
                fixed_division: None,
                rounds: 6,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentStatus {
    RegistrationOpen,
    InProgress,
    Completed,
    /// Not named in §3's field list but required by §4.6's "cancel+refund"
    /// path; has no Non-goal excluding it.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub kind: TournamentKind,
    /// Division this instance is scoped to; `None` for Mid-Season Classic.
    pub division: Option<u32>,
    pub max_participants: usize,
    pub status: TournamentStatus,
    pub registration_deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub prize_pool_credits: u64,
    pub requires_entry_item: bool,
    pub entry_fee_credits: u64,
    pub entry_fee_gems: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentEntry {
    pub id: TournamentEntryId,
    pub tournament_id: TournamentId,
    pub team_id: TeamId,
    pub final_rank: Option<u32>,
    pub paid: bool,
    pub registered_at: DateTime<Utc>,
}
