//! Session persistence.
//!
//! A session record is plain text: the current unit id on the first line,
//! followed by the undo history, oldest first, one id per line. Loading
//! resolves every id against the story graph and refuses records that name
//! units the story no longer has.
//!
//! [`SessionStore`] keeps one record per session in a directory.

use crate::session::GameSession;
use crate::story::{StoryGraph, UnitId};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session record: {0}")]
    InvalidFormat(String),

    #[error("Unknown unit id {id:?} at line {line} of session record")]
    UnknownUnitId { id: String, line: usize },

    #[error("Invalid session id {0:?}")]
    InvalidSessionId(String),
}

/// File extension of session records.
const RECORD_EXTENSION: &str = "session";

/// Serialize a session into its text record.
pub fn save(session: &GameSession) -> String {
    let mut record = String::new();
    record.push_str(session.current_id().as_str());
    record.push('\n');
    for id in session.history() {
        record.push_str(id.as_str());
        record.push('\n');
    }
    record
}

/// Write a session record to `writer`.
pub fn write_to(session: &GameSession, mut writer: impl Write) -> io::Result<()> {
    writer.write_all(save(session).as_bytes())?;
    writer.flush()
}

/// Rebuild a session from its text record.
///
/// Blank lines are ignored. An id the graph does not know is an error; the
/// session is never silently reset to the first unit.
pub fn load(record: &[u8], graph: &Arc<StoryGraph>) -> Result<GameSession, PersistError> {
    let text = std::str::from_utf8(record)
        .map_err(|e| PersistError::InvalidFormat(format!("not UTF-8: {e}")))?;

    let mut ids = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = UnitId::new(line);
        if graph.unit(&id).is_none() {
            tracing::warn!(unit = line, line = index + 1, "Session record references unknown unit");
            return Err(PersistError::UnknownUnitId {
                id: line.to_string(),
                line: index + 1,
            });
        }
        ids.push(id);
    }

    if ids.is_empty() {
        return Err(PersistError::InvalidFormat("empty record".to_string()));
    }
    let current = ids.remove(0);

    tracing::debug!(current = %current, history = ids.len(), "Loaded session record");
    Ok(GameSession::from_parts(Arc::clone(graph), current, ids))
}

/// A directory of session records keyed by session id.
pub struct SessionStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generate a fresh session id.
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Path of the record for a session id.
    ///
    /// Session ids name files directly, so only ASCII letters, digits, `-` and
    /// `_` are accepted. Anything else is `InvalidSessionId`; ids are never
    /// rewritten, which keeps two different ids from sharing one record.
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf, PersistError> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.{RECORD_EXTENSION}")))
    }

    /// Write a session's record, replacing any previous one.
    ///
    /// The record is written to a temporary file first and renamed into
    /// place, so a crash never leaves half a record behind.
    pub async fn save(&self, session_id: &str, session: &GameSession) -> Result<(), PersistError> {
        let path = self.path_for(session_id)?;
        fs::create_dir_all(&self.dir).await?;

        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        fs::write(&tmp, save(session)).await?;
        fs::rename(&tmp, &path).await?;

        tracing::info!(session = session_id, unit = %session.current_id(), "Saved session");
        Ok(())
    }

    /// Load a session's record. `Ok(None)` means the session has never been
    /// saved.
    pub async fn load(
        &self,
        session_id: &str,
        graph: &Arc<StoryGraph>,
    ) -> Result<Option<GameSession>, PersistError> {
        let path = self.path_for(session_id)?;
        let record = match fs::read(&path).await {
            Ok(record) => record,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        load(&record, graph).map(Some)
    }

    /// Load a session, or start a fresh one if it has never been saved.
    pub async fn load_or_new(
        &self,
        session_id: &str,
        graph: &Arc<StoryGraph>,
    ) -> Result<GameSession, PersistError> {
        Ok(self
            .load(session_id, graph)
            .await?
            .unwrap_or_else(|| GameSession::new(Arc::clone(graph))))
    }

    /// Delete a session's record. Returns whether there was one.
    pub async fn remove(&self, session_id: &str) -> Result<bool, PersistError> {
        let path = self.path_for(session_id)?;
        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        prune_idle(&mut *self.locks.lock().await);
        Ok(removed)
    }

    /// Ids of all stored sessions, sorted.
    pub async fn list(&self) -> Result<Vec<String>, PersistError> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == RECORD_EXTENSION).unwrap_or(false) {
                let stem = path.file_stem().and_then(|stem| stem.to_str());
                if let Some(id) = stem.filter(|id| validate_session_id(id).is_ok()) {
                    ids.push(id.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Take the per-session lock.
    ///
    /// Hold the guard across load, mutate and save so that two requests for
    /// the same session cannot overwrite each other's moves. Locks nobody
    /// holds or waits on are dropped from the table as new ones are taken.
    pub async fn lock(&self, session_id: &str) -> Result<OwnedMutexGuard<()>, PersistError> {
        validate_session_id(session_id)?;
        let lock = {
            let mut locks = self.locks.lock().await;
            prune_idle(&mut locks);
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}

fn validate_session_id(session_id: &str) -> Result<(), PersistError> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PersistError::InvalidSessionId(session_id.to_string()))
    }
}

/// Forget locks that only the table itself still references.
fn prune_idle(locks: &mut HashMap<String, Arc<Mutex<()>>>) {
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
}
