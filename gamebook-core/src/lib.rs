//! Branching gamebook engine.
//!
//! This crate provides:
//! - An immutable story graph loaded once from an authored story file
//! - Per-player sessions with ranked reactions and linear undo
//! - A lenient markup renderer for unit and reaction text
//! - Line-based session records and a directory-backed session store
//!
//! # Quick Start
//!
//! ```ignore
//! use gamebook_core::{markup, persist, GameSession, StoryGraph};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graph = Arc::new(StoryGraph::load_file("books/castle.gb").await?);
//!     let mut session = GameSession::new(Arc::clone(&graph));
//!
//!     println!("{}", markup::render(session.action_text()));
//!     let first = session.reaction_texts_by_score()[0].to_string();
//!     session.move_to_reaction(&first)?;
//!
//!     let record = persist::save(&session);
//!     let restored = persist::load(record.as_bytes(), &graph)?;
//!     assert_eq!(restored.current_id(), session.current_id());
//!     Ok(())
//! }
//! ```

pub mod headless;
pub mod loader;
pub mod markup;
pub mod page;
pub mod persist;
pub mod session;
pub mod story;
pub mod testing;

// Primary public API
pub use headless::{HeadlessConfig, HeadlessError, HeadlessGame};
pub use loader::{ParseErrorKind, StoryLoadError, StoryParseError};
pub use markup::{Markup, Node, Polarity};
pub use page::PageView;
pub use persist::{PersistError, SessionStore};
pub use session::{GameSession, SessionError};
pub use story::{ArrowId, ReactionArrow, StoryGraph, Unit, UnitId};
