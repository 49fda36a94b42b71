//! Clock & Game-Day resolver (C1, §4.1).
//!
//! Pure: `resolve(now, season_start, season_day_count)` always returns the
//! same [`Resolution`] for the same inputs. No I/O, no fallible paths.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

pub const SEASON_LENGTH_DAYS: u32 = 17;
const DAY_BOUNDARY_HOUR: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Regular,
    Playoffs,
    Offseason,
}

impl Phase {
    /// Days 1–14 → Regular, day 15 → Playoffs, days 16–17 → Offseason (§4.1).
    pub fn for_game_day(game_day: u32) -> Phase {
        match game_day {
            1..=14 => Phase::Regular,
            15 => Phase::Playoffs,
            16..=17 => Phase::Offseason,
            other => panic!("game_day {other} out of [1,17] range"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub game_day: u32,
    pub phase: Phase,
    pub seconds_to_next_boundary: i64,
}

/// Converts `now` (UTC) to `America/New_York`, applies the 03:00 day-boundary
/// shift, and maps the resulting effective day onto the 17-day season cycle
/// that started on `season_start` (also UTC).
///
/// The shifted-boundary computation is the one `spec.md`'s Open Questions
/// section instructs us to adopt over the competing raw-UTC-diff variant
/// found in the original source.
pub fn resolve(now: DateTime<Utc>, season_start: DateTime<Utc>) -> Resolution {
    let now_local = now.with_timezone(&New_York);
    let start_local = season_start.with_timezone(&New_York);

    let effective_day = if now_local.hour() < DAY_BOUNDARY_HOUR {
        now_local.date_naive().pred_opt().expect("date underflow")
    } else {
        now_local.date_naive()
    };
    let start_day = start_local.date_naive();

    let days_since = (effective_day - start_day).num_days();
    let game_day = (days_since.rem_euclid(SEASON_LENGTH_DAYS as i64)) as u32 + 1;
    let game_day = game_day.clamp(1, SEASON_LENGTH_DAYS);

    let next_boundary_naive =
        effective_day.succ_opt().expect("date overflow").and_hms_opt(3, 0, 0).unwrap();
    let next_boundary_local =
        New_York.from_local_datetime(&next_boundary_naive).single().expect("unambiguous boundary instant");

    let seconds_to_next_boundary =
        (next_boundary_local.with_timezone(&Utc) - now).num_seconds().max(0);

    Resolution {
        game_day,
        phase: Phase::for_game_day(game_day),
        seconds_to_next_boundary,
    }
}
