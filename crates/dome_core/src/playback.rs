//! Playback controller (C5, §4.5).
//!
//! Subscriber-side only: this never touches the store or the bus directly,
//! it just turns a stream of [`MatchEvent`]s a subscriber has already
//! received into a (speed, visuals) pair. Pure and synchronous, in the same
//! style as `engine.rs`'s bounded-monotone probability functions — no
//! teacher precedent for this exact shape, so it follows the corpus's
//! general preference for small pure evaluators over stateful objects with
//! hidden behavior.

use crate::events::{MatchEvent, Priority};
use std::collections::VecDeque;

const WINDOW_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    X1,
    X2,
    X4,
    X8,
}

impl Speed {
    pub fn multiplier(&self) -> u32 {
        match self {
            Speed::X1 => 1,
            Speed::X2 => 2,
            Speed::X4 => 4,
            Speed::X8 => 8,
        }
    }

    fn from_priority(priority: Priority) -> Self {
        match priority {
            Priority::Critical => Speed::X1,
            Priority::Important => Speed::X2,
            Priority::Standard | Priority::Downtime => Speed::X8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackOutput {
    pub speed: Speed,
    pub visuals: bool,
}

impl PlaybackOutput {
    fn for_priority(priority: Priority) -> Self {
        let speed = Speed::from_priority(priority);
        let visuals = matches!(priority, Priority::Critical | Priority::Important);
        Self { speed, visuals }
    }

    fn for_speed(speed: Speed) -> Self {
        let visuals = matches!(speed, Speed::X1 | Speed::X2);
        Self { speed, visuals }
    }
}

/// Rolling window of the last three events plus an optional manual override.
/// Empty window defaults to 1x/on — the safest "don't miss anything" state
/// (§8 scenario 4: "clear window; returns to 1x on default").
#[derive(Debug, Default)]
pub struct PlaybackController {
    window: VecDeque<MatchEvent>,
    manual_override: Option<Speed>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self { window: VecDeque::with_capacity(WINDOW_SIZE), manual_override: None }
    }

    pub fn push_event(&mut self, event: MatchEvent) {
        if self.window.len() == WINDOW_SIZE {
            self.window.pop_front();
        }
        self.window.push_back(event);
    }

    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    /// User-requested speed suspends automatic priority-based selection
    /// until [`Self::clear_override`] is called.
    pub fn set_manual_override(&mut self, speed: Speed) {
        self.manual_override = Some(speed);
    }

    pub fn clear_override(&mut self) {
        self.manual_override = None;
    }

    /// Chooses the lowest-numbered (most critical) priority present in the
    /// window, regardless of how far in the past or how close each event's
    /// own `timestamp` is: a priority-1 event entering the window ramps
    /// playback to 1x immediately rather than waiting for the subscriber's
    /// own render position to catch up to that timestamp — that's the
    /// "foreknowledge" the spec describes, satisfied by definition once the
    /// event is in the window.
    pub fn evaluate(&self) -> PlaybackOutput {
        if let Some(speed) = self.manual_override {
            return PlaybackOutput::for_speed(speed);
        }

        let worst = self.window.iter().map(|e| e.priority).min();
        match worst {
            Some(priority) => PlaybackOutput::for_priority(priority),
            None => PlaybackOutput::for_priority(Priority::Critical),
        }
    }
}
