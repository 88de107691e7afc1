//! Page assembly: everything a front end shows for the current unit.
//!
//! Paragraphs come from the unit's action text, reactions are ranked by
//! score, and an undo control is offered when there is history.

use crate::markup::{self, Markup};
use crate::session::GameSession;
use serde::Serialize;

/// Label of the undo control.
pub const UNDO_LABEL: &str = "Go back";

/// What the player sees at one point of a session.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    /// Id of the current unit.
    pub unit: String,
    pub paragraphs: Vec<Markup>,
    /// Ranked reactions, each a single reaction span keyed by the raw display
    /// text so that picking it matches the arrow exactly.
    pub reactions: Vec<Markup>,
    pub can_undo: bool,
}

impl PageView {
    pub fn from_session(session: &GameSession) -> Self {
        let paragraphs = session
            .current_unit()
            .paragraphs()
            .map(markup::parse)
            .collect();

        let reactions = session
            .reaction_texts_by_score()
            .into_iter()
            .map(|text| Markup::reaction(text, markup::parse(text)))
            .collect();

        Self {
            unit: session.current_id().to_string(),
            paragraphs,
            reactions,
            can_undo: session.can_undo(),
        }
    }

    /// Assemble the page body as HTML.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for paragraph in &self.paragraphs {
            html.push_str("<p>");
            html.push_str(&paragraph.to_html());
            html.push_str("</p>");
        }

        html.push_str("<ul>");
        for reaction in &self.reactions {
            html.push_str("<li>");
            html.push_str(&reaction.to_html());
            html.push_str("</li>");
        }
        html.push_str("</ul>");

        if self.can_undo {
            html.push_str("<a href='ignore' onclick='return onUndo();'>");
            html.push_str(UNDO_LABEL);
            html.push_str("</a>");
        }
        html
    }
}

/// Render the session's current page as HTML.
pub fn render_page(session: &GameSession) -> String {
    PageView::from_session(session).to_html()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_graph;

    #[test]
    fn test_page_paragraphs_and_reactions() {
        let session = GameSession::new(sample_graph());
        let page = PageView::from_session(&session);

        assert_eq!(page.unit, "gate");
        assert_eq!(page.paragraphs.len(), 2);
        assert_eq!(
            page.paragraphs[0].to_plain_text(),
            "You stand before a \u{201C}locked\u{201D} gate\u{2014}the old one."
        );
        assert_eq!(page.reactions.len(), 4);
        assert_eq!(page.reactions[0].to_plain_text(), "[Knock on the *gate*]");
        assert!(!page.can_undo);
    }

    #[test]
    fn test_reaction_keys_are_raw_display_text() {
        let session = GameSession::new(sample_graph());
        let page = PageView::from_session(&session);
        let keys: Vec<_> = page.reactions.iter().flat_map(|r| r.reaction_keys()).collect();
        assert_eq!(keys, session.reaction_texts_by_score());
    }

    #[test]
    fn test_html_has_undo_only_with_history() {
        let mut session = GameSession::new(sample_graph());
        let html = render_page(&session);
        assert!(html.starts_with("<p>"));
        assert!(html.contains("<ul><li>"));
        assert!(!html.contains(UNDO_LABEL));

        session.move_to_reaction("Leave").unwrap();
        let html = render_page(&session);
        assert!(html.ends_with("onUndo();'>Go back</a>"));
    }

    #[test]
    fn test_ending_renders_empty_list() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Knock on the <gate>").unwrap();
        session.move_to_reaction("Climb the stairs").unwrap();
        let html = render_page(&session);
        assert!(html.contains("<ul></ul>"));
        assert!(html.contains("<b class='debug-negative'>The end</b>"));
    }

    #[test]
    fn test_in_text_link_key_matches_reaction() {
        let mut session = GameSession::new(sample_graph());
        session.move_to_reaction("Climb over").unwrap();
        let page = PageView::from_session(&session);
        let key = page.paragraphs[0].reaction_keys()[0].to_string();
        assert!(session.move_to_reaction(&key).is_ok());
        assert_eq!(session.current_id().as_str(), "hall");
    }
}
