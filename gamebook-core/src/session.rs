//! GameSession - one player's position in a story.
//!
//! A session is a small state machine over a shared, read-only
//! [`StoryGraph`]: the unit the player is at and a linear undo history.
//! It holds only ids into the graph and owns none of it.

use crate::story::{ReactionArrow, StoryGraph, Unit, UnitId};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from GameSession operations.
///
/// A failed operation never changes the session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no reaction {text:?} at unit {unit}")]
    ReactionNotFound { text: String, unit: UnitId },

    #[error("undo called with empty history")]
    UndoWithEmptyHistory,
}

/// A player's progress through a story.
#[derive(Clone)]
pub struct GameSession {
    graph: Arc<StoryGraph>,
    current: UnitId,
    /// Previously visited units, most recent last.
    history: Vec<UnitId>,
}

impl GameSession {
    /// Start a fresh session at the story's first unit.
    pub fn new(graph: Arc<StoryGraph>) -> Self {
        let current = graph.first_unit_id().clone();
        Self {
            graph,
            current,
            history: Vec::new(),
        }
    }

    /// Rebuild a session from ids already checked against `graph`.
    pub(crate) fn from_parts(graph: Arc<StoryGraph>, current: UnitId, history: Vec<UnitId>) -> Self {
        Self {
            graph,
            current,
            history,
        }
    }

    pub fn graph(&self) -> &Arc<StoryGraph> {
        &self.graph
    }

    pub fn current_id(&self) -> &UnitId {
        &self.current
    }

    pub fn current_unit(&self) -> &Unit {
        &self.graph[&self.current]
    }

    /// Previously visited units, oldest first.
    pub fn history(&self) -> &[UnitId] {
        &self.history
    }

    /// The current unit's raw action text. Rendering is left to
    /// [`markup`](crate::markup).
    pub fn action_text(&self) -> &str {
        &self.current_unit().action_text
    }

    /// The current unit's arrows, highest score first.
    ///
    /// Arrows with equal scores keep their authoring order.
    pub fn reactions_by_score(&self) -> Vec<&ReactionArrow> {
        let mut arrows: Vec<&ReactionArrow> = self.graph.reactions(self.current_unit()).collect();
        // Scores are finite, so partial_cmp only returns None for NaN. sort_by
        // is stable, which keeps ties (including -0 and 0) in authoring order.
        arrows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        arrows
    }

    /// Display texts of the current reactions, highest score first.
    pub fn reaction_texts_by_score(&self) -> Vec<&str> {
        self.reactions_by_score()
            .into_iter()
            .map(|arrow| arrow.display_text.as_str())
            .collect()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Follow the reaction whose display text equals `reaction_text`.
    ///
    /// If several reactions share the text, the first one in authoring order
    /// wins. Returns the unit moved to.
    pub fn move_to_reaction(&mut self, reaction_text: &str) -> Result<&Unit, SessionError> {
        let target = self
            .graph
            .reactions(self.current_unit())
            .find(|arrow| arrow.display_text == reaction_text)
            .map(|arrow| arrow.target.clone())
            .ok_or_else(|| SessionError::ReactionNotFound {
                text: reaction_text.to_string(),
                unit: self.current.clone(),
            })?;

        tracing::debug!(from = %self.current, to = %target, reaction = reaction_text, "Move");

        let previous = std::mem::replace(&mut self.current, target);
        self.history.push(previous);
        Ok(self.current_unit())
    }

    /// Step back to the previously visited unit. Returns the unit moved to.
    pub fn undo(&mut self) -> Result<&Unit, SessionError> {
        let previous = self.history.pop().ok_or(SessionError::UndoWithEmptyHistory)?;

        tracing::debug!(from = %self.current, to = %previous, "Undo");

        self.current = previous;
        Ok(self.current_unit())
    }

    /// Go back to the first unit and forget the history, as if the session
    /// had just been created.
    pub fn restart(&mut self) {
        tracing::debug!(from = %self.current, "Restart");
        self.current = self.graph.first_unit_id().clone();
        self.history.clear();
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("current", &self.current)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_graph;

    #[test]
    fn test_new_session_at_first_unit() {
        let session = GameSession::new(sample_graph());
        assert_eq!(session.current_id().as_str(), "gate");
        assert!(session.history().is_empty());
        assert!(!session.can_undo());
    }

    #[test]
    fn test_action_text_is_raw() {
        let session = GameSession::new(sample_graph());
        assert!(session.action_text().contains("\"locked\" gate--the old one."));
    }

    #[test]
    fn test_reactions_sorted_with_stable_ties() {
        let session = GameSession::new(sample_graph());
        assert_eq!(
            session.reaction_texts_by_score(),
            vec!["Knock on the <gate>", "Climb over", "Wait a while", "Leave"]
        );
    }

    #[test]
    fn test_negative_zero_ties_with_zero() {
        let source = "unit a\nA\nreaction r1 -0 a: First\nreaction r2 0 a: Second\nreaction r3 -0.0 a: Third\nend\n";
        let session = GameSession::new(Arc::new(StoryGraph::parse(source).unwrap()));
        assert_eq!(session.reaction_texts_by_score(), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_move_pushes_history() {
        let mut session = GameSession::new(sample_graph());
        let unit = session.move_to_reaction("Knock on the <gate>").unwrap();
        assert_eq!(unit.id.as_str(), "hall");
        assert_eq!(session.history(), &[UnitId::new("gate")]);
        assert!(session.can_undo());
    }

    #[test]
    fn test_move_around_cycle() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Wait a while").unwrap();
        session.move_to_reaction("Wait a while").unwrap();
        assert_eq!(session.current_id().as_str(), "gate");
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_unknown_reaction_leaves_session_unchanged() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Climb over").unwrap();

        let err = session.move_to_reaction("Knock on the <gate>").unwrap_err();
        assert_eq!(
            err,
            SessionError::ReactionNotFound {
                text: "Knock on the <gate>".to_string(),
                unit: UnitId::new("garden"),
            }
        );
        assert_eq!(session.current_id().as_str(), "garden");
        assert_eq!(session.history(), &[UnitId::new("gate")]);
    }

    #[test]
    fn test_match_is_exact() {
        let mut session = GameSession::new(sample_graph());
        assert!(session.move_to_reaction("leave").is_err());
        assert!(session.move_to_reaction(" Leave").is_err());
        assert!(session.move_to_reaction("Leave").is_ok());
    }

    #[test]
    fn test_undo_restores_previous_unit() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Climb over").unwrap();
        session.move_to_reaction("house").unwrap();

        let unit = session.undo().unwrap();
        assert_eq!(unit.id.as_str(), "garden");
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_undo_with_empty_history() {
        let mut session = GameSession::new(sample_graph());
        assert_eq!(session.undo().unwrap_err(), SessionError::UndoWithEmptyHistory);
        assert_eq!(session.current_id().as_str(), "gate");
    }

    #[test]
    fn test_duplicate_display_text_first_wins() {
        let graph = StoryGraph::parse(
            "unit a\nA\nreaction one 1 b: Go\nreaction two 9 c: Go\nend\nunit b\nB\nend\nunit c\nC\nend\n",
        )
        .unwrap();
        let mut session = GameSession::new(Arc::new(graph));
        session.move_to_reaction("Go").unwrap();
        assert_eq!(session.current_id().as_str(), "b");
    }

    #[test]
    fn test_ending_has_no_reactions() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Knock on the <gate>").unwrap();
        session.move_to_reaction("Climb the stairs").unwrap();
        assert!(session.current_unit().is_ending());
        assert!(session.reaction_texts_by_score().is_empty());
    }

    #[test]
    fn test_restart() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Leave").unwrap();
        session.restart();
        assert_eq!(session.current_id().as_str(), "gate");
        assert!(!session.can_undo());
    }

    #[test]
    fn test_debug_omits_graph() {
        let session = GameSession::new(sample_graph());
        let debug = format!("{session:?}");
        assert!(debug.contains("gate"));
        assert!(!debug.contains("Roses"));
    }
}
