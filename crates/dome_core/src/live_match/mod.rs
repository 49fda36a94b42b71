//! C4: live-match simulator (§4.4).
//!
//! [`engine`] is the pure, synchronously-steppable tick engine; [`worker`] is
//! the async shell that drives it against the store and event bus, handling
//! checkpointing and crash recovery.

mod engine;
mod registry;
mod worker;

pub use engine::{LiveMatchState, MatchEngine, OnFieldPlayer, Side};
pub use registry::LiveMatchRegistry;
pub use worker::{run_match, MatchWorkerError};
