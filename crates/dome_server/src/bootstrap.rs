//! First-boot seeding: "Season created once at install; mutated only by C7"
//! (spec.md §3). Nothing else is seeded here — teams, players and games are
//! an external collaborator's concern (§1's "out of scope" list), reached
//! through [`dome_core::Store`] the same way C7 reaches them at runtime.

use chrono::{DateTime, Utc};
use dome_core::domain::Season;
use dome_core::{InMemoryStore, SeasonId};

/// Seeds the singleton season if the store doesn't already have one. Only
/// meaningful for [`InMemoryStore`], which starts empty every process
/// launch; a real C2 backend would run this once at install time instead.
pub fn ensure_season(store: &InMemoryStore, season_id: SeasonId, start_date_utc: DateTime<Utc>) {
    store.seed_season(Season::new(season_id, start_date_utc));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dome_core::Store;

    #[tokio::test]
    async fn ensure_season_makes_the_season_readable() {
        let store = InMemoryStore::new();
        ensure_season(&store, SeasonId(1), Utc::now());
        let season = store.get_season(SeasonId(1)).await.unwrap();
        assert_eq!(season.current_day, 1);
    }
}
