//! Opaque integer identifiers for every entity in the data model.
//!
//! Per the Design Notes, cyclic ownership between tournaments, games and
//! teams is resolved by holding typed ids instead of in-memory
//! back-pointers; a component that needs a related entity queries for it
//! through [`crate::store::Store`] rather than following a pointer.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(SeasonId);
opaque_id!(TeamId);
opaque_id!(PlayerId);
opaque_id!(GameId);
opaque_id!(TournamentId);
opaque_id!(TournamentEntryId);

/// Monotonic id allocator. Each [`crate::store::InMemoryStore`] owns one per
/// entity kind; never shared across entity kinds so ids from different
/// tables never collide even though they're all plain `u64`s underneath.
#[derive(Debug, Default)]
pub struct IdSequence(std::sync::atomic::AtomicU64);

impl IdSequence {
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}
