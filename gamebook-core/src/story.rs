//! The story graph: units, reaction arrows and the ids that link them.
//!
//! A [`StoryGraph`] is built once by the [`loader`](crate::loader) and never
//! mutated afterwards. Units and arrows live in flat maps keyed by id; arrows
//! refer to their target unit by id, so cycles and many-to-one links need no
//! special handling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

/// Marker separating paragraphs inside a unit's action text.
pub const PARAGRAPH_BREAK: char = '@';

/// Identifier of a unit within a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of a reaction arrow within a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrowId(String);

impl ArrowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArrowId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A narrative node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Raw text with embedded control markers, paragraphs split by `@`.
    pub action_text: String,
    /// Outgoing arrows in authoring order.
    pub reactions: Vec<ArrowId>,
}

impl Unit {
    /// Iterate over the raw paragraph segments of the action text.
    ///
    /// A leading empty segment (text starting with `@`) is skipped.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.action_text
            .split(PARAGRAPH_BREAK)
            .enumerate()
            .filter(|(i, p)| !(*i == 0 && p.is_empty()))
            .map(|(_, p)| p)
    }

    /// Whether the story ends here.
    pub fn is_ending(&self) -> bool {
        self.reactions.is_empty()
    }
}

/// A scored, labelled edge from one unit to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionArrow {
    pub id: ArrowId,
    /// Label markup shown to the player; also the key used to pick it.
    pub display_text: String,
    pub score: f64,
    pub target: UnitId,
}

/// The complete, immutable story.
#[derive(Debug, Clone)]
pub struct StoryGraph {
    first_unit: UnitId,
    units: HashMap<UnitId, Unit>,
    arrows: HashMap<ArrowId, ReactionArrow>,
}

impl StoryGraph {
    /// Assemble a graph from already validated parts.
    ///
    /// Only the loader calls this; it guarantees that `first_unit` and every
    /// arrow target resolve and that every listed reaction exists.
    pub(crate) fn from_parts(
        first_unit: UnitId,
        units: HashMap<UnitId, Unit>,
        arrows: HashMap<ArrowId, ReactionArrow>,
    ) -> Self {
        Self {
            first_unit,
            units,
            arrows,
        }
    }

    /// The id of the unit every new session starts at.
    pub fn first_unit_id(&self) -> &UnitId {
        &self.first_unit
    }

    /// The unit every new session starts at.
    pub fn first_unit(&self) -> &Unit {
        &self[&self.first_unit]
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn arrow(&self, id: &ArrowId) -> Option<&ReactionArrow> {
        self.arrows.get(id)
    }

    /// Look up a unit by its string id.
    pub fn unit_by_str(&self, id: &str) -> Option<&Unit> {
        self.units.get(&UnitId::new(id))
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn arrows(&self) -> impl Iterator<Item = &ReactionArrow> {
        self.arrows.values()
    }

    /// A unit's outgoing arrows in authoring order.
    pub fn reactions<'a>(&'a self, unit: &'a Unit) -> impl Iterator<Item = &'a ReactionArrow> + 'a {
        unit.reactions.iter().map(move |id| &self[id])
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn arrow_count(&self) -> usize {
        self.arrows.len()
    }
}

/// Panics if the id is not part of this graph. Ids obtained from the graph
/// itself always resolve.
impl Index<&UnitId> for StoryGraph {
    type Output = Unit;

    fn index(&self, id: &UnitId) -> &Unit {
        &self.units[id]
    }
}

/// Panics if the id is not part of this graph.
impl Index<&ArrowId> for StoryGraph {
    type Output = ReactionArrow;

    fn index(&self, id: &ArrowId) -> &ReactionArrow {
        &self.arrows[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_graph;

    #[test]
    fn test_first_unit() {
        let graph = sample_graph();
        assert_eq!(graph.first_unit_id().as_str(), "gate");
        assert_eq!(graph.first_unit().id, UnitId::new("gate"));
    }

    #[test]
    fn test_reactions_in_authoring_order() {
        let graph = sample_graph();
        let gate = graph.first_unit();
        let ids: Vec<_> = graph.reactions(gate).map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["gate-wait", "gate-knock", "gate-climb", "gate-leave"]);
    }

    #[test]
    fn test_lookup_missing() {
        let graph = sample_graph();
        assert!(graph.unit(&UnitId::new("nowhere")).is_none());
        assert!(graph.arrow(&ArrowId::new("nothing")).is_none());
        assert!(graph.unit_by_str("hall").is_some());
    }

    #[test]
    fn test_paragraphs_skip_leading_break() {
        let unit = Unit {
            id: UnitId::new("u"),
            action_text: "@First.@Second.".to_string(),
            reactions: vec![],
        };
        let paragraphs: Vec<_> = unit.paragraphs().collect();
        assert_eq!(paragraphs, vec!["First.", "Second."]);
        assert!(unit.is_ending());
    }

    #[test]
    fn test_paragraphs_keep_inner_empty_segments() {
        let unit = Unit {
            id: UnitId::new("u"),
            action_text: "One.@@Two.".to_string(),
            reactions: vec![],
        };
        assert_eq!(unit.paragraphs().count(), 3);
    }

    #[test]
    fn test_graph_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoryGraph>();
    }
}
