//! # dome_core - season timing, tournament and live-match simulation core
//!
//! Drives a fantasy-sports league's 17-day season through its phases,
//! simulates matches as deterministic tick-driven state machines, and rolls
//! results back into persistent standings — all under at-most-once
//! execution semantics for the daily automation steps.

// Allow unused code for components still under active development.
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod bus;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod events;
pub mod ids;
pub mod live_match;
pub mod playback;
pub mod store;
pub mod tournament;

pub use bus::EventBus;
pub use clock::{resolve, Phase, Resolution};
pub use config::Config;
pub use coordinator::SeasonCoordinator;
pub use error::{CoreError, NotEligibleReason, Result};
pub use events::{
    EventType, MatchEvent, MatchTickPayload, Priority, RevenueSnapshot, SeasonPhaseEvent, TournamentMatchCompleted,
};
pub use ids::{GameId, PlayerId, SeasonId, TeamId, TournamentEntryId, TournamentId};
pub use live_match::{LiveMatchRegistry, LiveMatchState};
pub use playback::{PlaybackController, PlaybackOutput, Speed};
pub use store::{InMemoryStore, Store};
pub use tournament::TournamentEngine;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SCHEMA_VERSION: u8 = 1;
