//! Headless game interface for programmatic use.
//!
//! This module provides a simplified interface for playing a gamebook
//! without any particular front end. It's designed for:
//! - The terminal player
//! - Automated play-throughs in tests
//! - Script-driven sessions
//!
//! # Example
//!
//! ```ignore
//! use gamebook_core::headless::{HeadlessConfig, HeadlessGame};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HeadlessConfig::new("books/castle.gb").with_save_dir("saves");
//!     let mut game = HeadlessGame::new(config).await?;
//!
//!     for paragraph in &game.view().paragraphs {
//!         println!("{}", paragraph.to_plain_text());
//!     }
//!
//!     // Pick the highest ranked reaction; progress is saved automatically
//!     game.choose(1).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::loader::StoryLoadError;
use crate::page::PageView;
use crate::persist::{self, PersistError, SessionStore};
use crate::session::{GameSession, SessionError};
use crate::story::StoryGraph;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

/// Errors from the headless driver.
#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error(transparent)]
    Story(#[from] StoryLoadError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("No reaction number {choice} (there are {available})")]
    NoSuchChoice { choice: usize, available: usize },
}

/// Configuration for a headless game.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Story file to load.
    pub story: PathBuf,
    /// Directory for autosaved session records. No autosave when unset.
    pub save_dir: Option<PathBuf>,
    /// Session to resume or create. A fresh id is generated when unset.
    pub session_id: Option<String>,
    /// Ignore any stored record and start at the first unit.
    pub fresh_start: bool,
}

impl HeadlessConfig {
    pub fn new(story: impl Into<PathBuf>) -> Self {
        Self {
            story: story.into(),
            save_dir: None,
            session_id: None,
            fresh_start: false,
        }
    }

    /// Autosave into this directory after every move.
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    /// Resume (or create) this session.
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Start over even if a record exists.
    pub fn with_fresh_start(mut self, fresh: bool) -> Self {
        self.fresh_start = fresh;
        self
    }
}

/// A gamebook session that can be driven programmatically.
///
/// This wraps `GameSession` with numbered choices, page views and optional
/// autosave.
pub struct HeadlessGame {
    session: GameSession,
    store: Option<SessionStore>,
    session_id: String,
    resumed: bool,
}

impl HeadlessGame {
    /// Load the story from the configured file and start or resume a session.
    pub async fn new(config: HeadlessConfig) -> Result<Self, HeadlessError> {
        let graph = Arc::new(StoryGraph::load_file(&config.story).await?);
        Self::with_graph(graph, config).await
    }

    /// Start or resume a session over an already loaded story.
    ///
    /// The configured story path is ignored.
    pub async fn with_graph(graph: Arc<StoryGraph>, config: HeadlessConfig) -> Result<Self, HeadlessError> {
        let session_id = config
            .session_id
            .unwrap_or_else(SessionStore::new_session_id);
        let store = config.save_dir.map(|dir| SessionStore::new(dir));

        let stored = match (&store, config.fresh_start) {
            (Some(store), false) => store.load(&session_id, &graph).await?,
            _ => None,
        };
        let resumed = stored.is_some();
        let session = stored.unwrap_or_else(|| GameSession::new(graph));

        tracing::info!(
            session = %session_id,
            resumed,
            unit = %session.current_id(),
            "Started headless game"
        );

        Ok(Self {
            session,
            store,
            session_id,
            resumed,
        })
    }

    /// What to show for the current unit.
    pub fn view(&self) -> PageView {
        PageView::from_session(&self.session)
    }

    /// Ranked reaction texts; `choose` numbers them from 1.
    pub fn reactions(&self) -> Vec<&str> {
        self.session.reaction_texts_by_score()
    }

    /// Pick the `choice`-th ranked reaction (1-based).
    pub async fn choose(&mut self, choice: usize) -> Result<PageView, HeadlessError> {
        let reactions = self.reactions();
        let text = choice
            .checked_sub(1)
            .and_then(|i| reactions.get(i))
            .map(|text| text.to_string())
            .ok_or(HeadlessError::NoSuchChoice {
                choice,
                available: reactions.len(),
            })?;
        self.react(&text).await
    }

    /// Pick a reaction by its exact display text.
    pub async fn react(&mut self, text: &str) -> Result<PageView, HeadlessError> {
        let mut next = self.session.clone();
        next.move_to_reaction(text)?;
        self.commit(next).await
    }

    pub async fn undo(&mut self) -> Result<PageView, HeadlessError> {
        let mut next = self.session.clone();
        next.undo()?;
        self.commit(next).await
    }

    pub async fn restart(&mut self) -> Result<PageView, HeadlessError> {
        let mut next = self.session.clone();
        next.restart();
        self.commit(next).await
    }

    /// Write the session record to an explicit file.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<(), HeadlessError> {
        fs::write(path.as_ref(), persist::save(&self.session))
            .await
            .map_err(PersistError::from)?;
        Ok(())
    }

    /// Replace the session with one read from an explicit file.
    ///
    /// On error the current session is kept.
    pub async fn load_from(&mut self, path: impl AsRef<Path>) -> Result<PageView, HeadlessError> {
        let record = fs::read(path.as_ref()).await.map_err(PersistError::from)?;
        let next = persist::load(&record, self.session.graph())?;
        self.commit(next).await
    }

    /// Autosave `next` and only then make it the current session, so a failed
    /// save leaves the game where it was.
    async fn commit(&mut self, next: GameSession) -> Result<PageView, HeadlessError> {
        if let Some(store) = &self.store {
            store.save(&self.session_id, &next).await?;
        }
        self.session = next;
        Ok(self.view())
    }

    // ========================================================================
    // Game State Queries
    // ========================================================================

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the session was restored from a stored record.
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    /// Whether autosave is on.
    pub fn autosaves(&self) -> bool {
        self.store.is_some()
    }

    /// Whether the current unit has no reactions.
    pub fn is_over(&self) -> bool {
        self.session.current_unit().is_ending()
    }

    /// Number of moves that can be undone.
    pub fn depth(&self) -> usize {
        self.session.history().len()
    }

    /// Get the underlying session for advanced use.
    pub fn session(&self) -> &GameSession {
        &self.session
    }
}
