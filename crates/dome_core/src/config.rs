//! Enumerated configuration (§6), validated as a single struct passed to
//! [`crate::coordinator::SeasonCoordinator::start`] per the Design Notes.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Wall-clock ms per sim-second during match playback production.
    #[validate(range(min = 1))]
    pub simulation_tick_period_ms: u64,

    #[validate(range(min = 1))]
    pub max_concurrent_matches: usize,

    #[validate(range(min = 0.0, max = 1.0))]
    pub progression_base_rate: f64,

    #[validate(range(min = 1))]
    pub age_decline_start: u32,
    #[validate(range(min = 1))]
    pub retirement_start: u32,
    #[validate(range(min = 1))]
    pub mandatory_retire: u32,

    /// Divisions that run a Daily Divisional Cup, e.g. `2..=8`.
    pub daily_cup_divisions: Vec<u32>,
    #[validate(range(min = 2))]
    pub daily_cup_size: usize,
    #[validate(range(min = 2))]
    pub mid_season_cup_size: usize,
    #[validate(range(min = 1, max = 17))]
    pub mid_season_cup_day: u32,

    /// Must sum to 1.0 and have exactly 3 entries (1st/2nd/3rd).
    pub prize_distribution: [f64; 3],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation_tick_period_ms: 100,
            max_concurrent_matches: 64,
            progression_base_rate: 0.15,
            age_decline_start: 31,
            retirement_start: 40,
            mandatory_retire: 45,
            daily_cup_divisions: (2..=8).collect(),
            daily_cup_size: 8,
            mid_season_cup_size: 64,
            mid_season_cup_day: 7,
            prize_distribution: [0.5, 0.3, 0.2],
        }
    }
}

impl Config {
    /// Validates range constraints plus the cross-field invariant `validator`
    /// can't express declaratively: the prize split must sum to 1.0.
    pub fn validate_all(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())?;
        let sum: f64 = self.prize_distribution.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("prize_distribution must sum to 1.0, got {sum}"));
        }
        let mut strictly_decreasing = true;
        for pair in self.prize_distribution.windows(2) {
            if pair[0] <= pair[1] {
                strictly_decreasing = false;
            }
        }
        if !strictly_decreasing {
            return Err("prize_distribution must be strictly decreasing".to_string());
        }
        Ok(())
    }
}
