use super::SeasonPhase;
use crate::ids::SeasonId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exactly one active season exists at a time (§3). `current_day` is kept in
/// sync with [`crate::clock::resolve`] by C7's per-tick step 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub start_date_utc: DateTime<Utc>,
    pub current_day: u32,
    pub phase: SeasonPhase,
}

impl Season {
    pub fn new(id: SeasonId, start_date_utc: DateTime<Utc>) -> Self {
        Self { id, start_date_utc, current_day: 1, phase: SeasonPhase::Regular }
    }
}
