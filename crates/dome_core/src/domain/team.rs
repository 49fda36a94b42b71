use crate::ids::TeamId;
use serde::{Deserialize, Serialize};

/// §3. Invariant I1: `points == 3*wins + 1*draws`, enforced by every writer
/// (never recomputed lazily) so a stored row is always self-consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub division: u32,
    pub subdivision: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points: u32,
    pub credits: u64,
    pub gems: u64,
    /// AI-generated fill team used to pad a bracket (SPEC_FULL §3.1).
    pub ai_controlled: bool,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>, division: u32) -> Self {
        Self {
            id,
            name: name.into(),
            division,
            subdivision: "main".to_string(),
            wins: 0,
            losses: 0,
            draws: 0,
            points: 0,
            credits: 0,
            gems: 0,
            ai_controlled: false,
        }
    }

    pub fn record_win(&mut self) {
        self.wins += 1;
        self.recompute_points();
    }

    pub fn record_loss(&mut self) {
        self.losses += 1;
        self.recompute_points();
    }

    pub fn record_draw(&mut self) {
        self.draws += 1;
        self.recompute_points();
    }

    fn recompute_points(&mut self) {
        self.points = 3 * self.wins + self.draws;
    }

    /// I1 as a callable assertion, used both by tests and by the standings
    /// rebuild's "compare and correct" step (§4.7 step 2).
    pub fn satisfies_points_invariant(&self) -> bool {
        self.points == 3 * self.wins + self.draws
    }

    pub fn goal_difference(&self, goals_for: i64, goals_against: i64) -> i64 {
        goals_for - goals_against
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_invariant_after_each_result() {
        let mut t = Team::new(TeamId(1), "Testers", 3);
        t.record_win();
        t.record_draw();
        t.record_loss();
        assert!(t.satisfies_points_invariant());
        assert_eq!(t.points, 4);
    }

    proptest::proptest! {
        /// I1 holds after any sequence of results, not just the one above.
        #[test]
        fn points_invariant_holds_for_any_result_sequence(
            results in proptest::collection::vec(0u8..3, 0..200),
        ) {
            let mut t = Team::new(TeamId(1), "Testers", 3);
            for r in results {
                match r {
                    0 => t.record_win(),
                    1 => t.record_loss(),
                    _ => t.record_draw(),
                }
            }
            proptest::prop_assert!(t.satisfies_points_invariant());
        }
    }
}
