//! Match event vocabulary shared by the live-match simulator (C4), the
//! playback controller (C5) and the event-bus payload shape (§6).

use serde::{Deserialize, Serialize};

#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Score,
    Injury,
    MajorTackle,
    Interception,
    ScoreAttempt,
    Halftime,
    FinalWhistle,
    SuccessfulPassScoring,
    DefensiveStop,
    PassAttempt,
    Scrum,
    Substitution,
    RoutinePlay,
    RegularPass,
    StandardMovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical = 1,
    Important = 2,
    Standard = 3,
    Downtime = 4,
}

impl EventType {
    /// §4.5's priority table. "anything else" (Downtime) is the catch-all arm.
    pub fn priority(&self) -> Priority {
        match self {
            EventType::Score
            | EventType::Injury
            | EventType::MajorTackle
            | EventType::Interception
            | EventType::ScoreAttempt
            | EventType::Halftime
            | EventType::FinalWhistle => Priority::Critical,

            EventType::SuccessfulPassScoring
            | EventType::DefensiveStop
            | EventType::PassAttempt
            | EventType::Scrum
            | EventType::Substitution => Priority::Important,

            EventType::RoutinePlay | EventType::RegularPass | EventType::StandardMovement => {
                Priority::Standard
            }
        }
    }
}

/// Wire-serializes as `{ type, priority, actorPlayerId?, fieldPos, timestamp }`
/// (§6's event-bus payload shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub priority: Priority,
    pub actor_player_id: Option<u64>,
    pub field_pos: f32,
    /// Sim-seconds from match start; lets C5 "ramp to 1x" on foreknowledge of
    /// a critical event up to 3 sim-seconds ahead (§4.5).
    pub timestamp: u32,
}

impl MatchEvent {
    pub fn new(event_type: EventType, field_pos: f32, timestamp: u32, actor_player_id: Option<u64>) -> Self {
        Self { priority: event_type.priority(), event_type, actor_player_id, field_pos, timestamp }
    }
}

/// Published on the global tournament-lifecycle topic whenever a
/// `TOURNAMENT`-typed [`crate::domain::Game`] completes, so C6 can advance
/// the bracket without C4 calling into it directly (§4.4: "for TOURNAMENT
/// matches notify C6 (event only; C6 advances)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TournamentMatchCompleted {
    pub tournament_id: u64,
    pub game_id: u64,
    pub round: u32,
    pub winner_team_id: u64,
}

/// Published on [`crate::bus::SEASON_PHASE_TOPIC`] whenever C7's day-rollover
/// step (§4.7 step 1) moves `Season.currentDay` forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeasonPhaseEvent {
    pub game_day: u32,
    pub phase: crate::domain::SeasonPhase,
}

/// The actual `match.<id>.tick` wire payload (§6): the envelope a subscriber
/// (e.g. a WebSocket client) receives, carrying the match context around the
/// single [`MatchEvent`] produced that tick. `revenue` is only `Some` on the
/// tick a 60-tick snapshot was just appended (§4.4 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTickPayload {
    pub match_id: u64,
    pub tick: u32,
    pub game_time: u32,
    pub home_score: u32,
    pub away_score: u32,
    pub event: MatchEvent,
    pub revenue: Option<RevenueSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueSnapshot {
    pub tick: u32,
    pub ticket: u64,
    pub concession: u64,
    pub parking: u64,
    pub vip: u64,
    pub merch: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_table_matches_spec_exactly() {
        let critical = [
            EventType::Score,
            EventType::Injury,
            EventType::MajorTackle,
            EventType::Interception,
            EventType::ScoreAttempt,
            EventType::Halftime,
            EventType::FinalWhistle,
        ];
        for e in critical {
            assert_eq!(e.priority(), Priority::Critical);
        }

        let important = [
            EventType::SuccessfulPassScoring,
            EventType::DefensiveStop,
            EventType::PassAttempt,
            EventType::Scrum,
            EventType::Substitution,
        ];
        for e in important {
            assert_eq!(e.priority(), Priority::Important);
        }

        let standard = [EventType::RoutinePlay, EventType::RegularPass, EventType::StandardMovement];
        for e in standard {
            assert_eq!(e.priority(), Priority::Standard);
        }
    }

    #[test]
    fn priority_ordering_puts_critical_lowest() {
        assert!(Priority::Critical < Priority::Important);
        assert!(Priority::Important < Priority::Standard);
        assert!(Priority::Standard < Priority::Downtime);
    }

    #[test]
    fn every_event_type_variant_resolves_to_a_priority_without_panicking() {
        use strum::IntoEnumIterator;
        let mut seen = std::collections::HashSet::new();
        for event in EventType::iter() {
            seen.insert(event.priority());
        }
        // The table has no Downtime-producing variant (§4.5's "anything else"
        // catch-all exists for events this engine doesn't currently emit).
        assert_eq!(seen, [Priority::Critical, Priority::Important, Priority::Standard].into_iter().collect());
    }

    /// §6: `{ matchId, tick, gameTime, homeScore, awayScore, event: { type,
    /// priority, actorPlayerId?, fieldPos, timestamp }, revenue? }`.
    #[test]
    fn tick_payload_serializes_to_the_spec_wire_shape() {
        let payload = MatchTickPayload {
            match_id: 7,
            tick: 42,
            game_time: 42,
            home_score: 1,
            away_score: 0,
            event: MatchEvent::new(EventType::Score, 100.0, 42, Some(9)),
            revenue: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["matchId"], 7);
        assert_eq!(json["tick"], 42);
        assert_eq!(json["gameTime"], 42);
        assert_eq!(json["homeScore"], 1);
        assert_eq!(json["awayScore"], 0);
        assert_eq!(json["event"]["type"], "Score");
        assert_eq!(json["event"]["actorPlayerId"], 9);
        assert_eq!(json["event"]["fieldPos"], 100.0);
        assert!(json.get("revenue").is_none() || json["revenue"].is_null());
    }
}
