//! Testing utilities for gamebook stories.
//!
//! This module provides tools for unit and integration tests:
//! - `SAMPLE_STORY`, a small story touching every feature of the format
//! - `TestHarness` for scripted play-throughs
//! - Assertion helpers for verifying session state

use crate::session::{GameSession, SessionError};
use crate::story::{StoryGraph, UnitId};
use std::sync::Arc;

/// A small story with a cycle, tied scores, markup in text and labels, and
/// an ending.
pub const SAMPLE_STORY: &str = r#"# Sample story used by tests.
start gate

unit gate
You stand before a "locked" gate--the old one.
@
A <raven> watches you from the wall.
reaction gate-wait 1 gate: Wait a while
reaction gate-knock 5 hall: Knock on the <gate>
reaction gate-climb 5 garden: Climb over
reaction gate-leave 0 road: Leave
end

unit hall
The hall is dark. ^Visited the hall|
reaction hall-back 2 gate: Go back outside
reaction hall-stairs 3 tower: Climb the stairs
end

unit garden
Roses everywhere, and a door into the {house}.
reaction garden-hall 1 hall: house
end

unit tower
You see the whole valley. ~The end|
end

unit road
The road goes ever on.
reaction road-return 0 gate: Turn back
end
"#;

/// Parse [`SAMPLE_STORY`] into a shared graph.
pub fn sample_graph() -> Arc<StoryGraph> {
    Arc::new(StoryGraph::parse(SAMPLE_STORY).expect("sample story is valid"))
}

/// Test harness for scripted play-throughs.
pub struct TestHarness {
    /// The session being driven.
    pub session: GameSession,
}

impl TestHarness {
    /// Create a harness over the sample story.
    pub fn new() -> Self {
        Self::with_graph(sample_graph())
    }

    /// Create a harness over a custom story.
    pub fn with_graph(graph: Arc<StoryGraph>) -> Self {
        Self {
            session: GameSession::new(graph),
        }
    }

    /// Pick a reaction, panicking if it is not offered.
    #[track_caller]
    pub fn choose(&mut self, reaction: &str) -> &mut Self {
        if let Err(e) = self.session.move_to_reaction(reaction) {
            panic!("Expected reaction {reaction:?} to be available: {e}");
        }
        self
    }

    /// Undo the last move, panicking if there is none.
    #[track_caller]
    pub fn back(&mut self) -> &mut Self {
        if let Err(e) = self.session.undo() {
            panic!("Expected undo to succeed: {e}");
        }
        self
    }

    /// Try a reaction without panicking.
    pub fn try_choose(&mut self, reaction: &str) -> Result<(), SessionError> {
        self.session.move_to_reaction(reaction).map(|_| ())
    }

    pub fn current(&self) -> &str {
        self.session.current_id().as_str()
    }

    pub fn history(&self) -> Vec<&str> {
        self.session.history().iter().map(UnitId::as_str).collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the session is at the given unit.
#[track_caller]
pub fn assert_at(harness: &TestHarness, unit: &str) {
    assert_eq!(
        harness.current(),
        unit,
        "Expected to be at unit '{unit}', but at '{}'",
        harness.current()
    );
}

/// Assert the undo history, oldest first.
#[track_caller]
pub fn assert_history(harness: &TestHarness, expected: &[&str]) {
    assert_eq!(harness.history(), expected, "Unexpected undo history");
}

/// Assert whether undo is available.
#[track_caller]
pub fn assert_can_undo(harness: &TestHarness, expected: bool) {
    assert_eq!(
        harness.session.can_undo(),
        expected,
        "Expected can_undo() to be {expected}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_story_parses() {
        let graph = sample_graph();
        assert_eq!(graph.len(), 5);
    }

    #[test]
    fn test_harness_scripted_walk() {
        let mut harness = TestHarness::new();
        assert_at(&harness, "gate");
        assert_can_undo(&harness, false);

        harness.choose("Climb over").choose("house").choose("Climb the stairs");
        assert_at(&harness, "tower");
        assert_history(&harness, &["gate", "garden", "hall"]);

        harness.back().back();
        assert_at(&harness, "garden");
        assert_history(&harness, &["gate"]);
        assert_can_undo(&harness, true);
    }

    #[test]
    fn test_try_choose_reports_missing_reaction() {
        let mut harness = TestHarness::new();
        assert!(harness.try_choose("Fly away").is_err());
        assert_at(&harness, "gate");
    }

    #[test]
    #[should_panic(expected = "Expected reaction")]
    fn test_choose_panics_on_missing_reaction() {
        TestHarness::new().choose("Fly away");
    }
}
