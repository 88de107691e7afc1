//! Story loading: turns an authored story file into a [`StoryGraph`].
//!
//! # Text format
//!
//! The authored format is line based. Leading and trailing whitespace on each
//! line is ignored, as are blank lines.
//!
//! ```text
//! # A comment (only allowed outside a unit body)
//! start gate
//!
//! unit gate
//! You stand before a "locked" gate--the old one.
//! @
//! A <raven> watches you.
//! reaction gate-knock 5 hall: Knock on the <gate>
//! reaction gate-leave 0 road: Leave
//! end
//! ```
//!
//! - `start <unit-id>` names the entry unit. Without it the first unit declared
//!   is the entry.
//! - `unit <unit-id>` opens a unit body, `end` closes it.
//! - Inside a body, every line that is not a directive is action text. Text
//!   lines are joined with single spaces. A line holding only `@` inserts a
//!   paragraph break.
//! - `reaction <arrow-id> <score> <target-unit-id>: <display text>` adds an
//!   outgoing arrow. Reactions keep the order they are written in.
//! - Ids may not be empty and may not contain whitespace or `:`.
//! - `unit`, `reaction` and `end` are reserved as the first word of a body line.
//!
//! # JSON format
//!
//! The same story can be written as a JSON document:
//!
//! ```json
//! {
//!   "start": "gate",
//!   "units": [
//!     { "id": "gate", "text": "You stand before a gate.",
//!       "reactions": [{ "id": "gate-leave", "score": 0, "target": "road", "text": "Leave" }] },
//!     { "id": "road", "text": "The road goes ever on." }
//!   ]
//! }
//! ```
//!
//! Both formats are validated the same way: duplicate ids, dangling arrow
//! targets, an unknown start unit and an empty story are rejected.

use crate::story::{ArrowId, ReactionArrow, StoryGraph, Unit, UnitId, PARAGRAPH_BREAK};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// A malformed story source.
///
/// `line` is 1-based; it is 0 for problems that belong to the whole document.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("story parse error at line {line}: {kind}")]
pub struct StoryParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl StoryParseError {
    fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

/// What exactly is wrong with a story source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("story source is not valid UTF-8")]
    InvalidUtf8,
    #[error("text outside a unit body: {0:?}")]
    TextOutsideUnit(String),
    #[error("unit {inner} opened inside the body of unit {outer}")]
    NestedUnit { outer: String, inner: String },
    #[error("`{0}` outside a unit body")]
    OutsideUnit(&'static str),
    #[error("malformed `{directive}` line: {line:?}")]
    MalformedDirective {
        directive: &'static str,
        line: String,
    },
    #[error("malformed reaction: {0:?}")]
    MalformedReaction(String),
    #[error("invalid score {0:?}")]
    InvalidScore(String),
    #[error("invalid id {0:?}")]
    InvalidId(String),
    #[error("duplicate unit id {0}")]
    DuplicateUnit(String),
    #[error("duplicate reaction id {0}")]
    DuplicateArrow(String),
    #[error("reaction {arrow} targets unknown unit {target}")]
    DanglingTarget { arrow: String, target: String },
    #[error("start unit {0} does not exist")]
    UnknownStart(String),
    #[error("start unit declared more than once")]
    DuplicateStart,
    #[error("unit {0} is never closed with `end`")]
    UnterminatedUnit(String),
    #[error("story defines no units")]
    EmptyStory,
    #[error("invalid story document: {0}")]
    Json(String),
}

/// Errors from loading a story file from disk.
#[derive(Debug, Error)]
pub enum StoryLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] StoryParseError),
}

/// Parse an authored story from raw bytes.
pub fn load(source: &[u8]) -> Result<StoryGraph, StoryParseError> {
    match std::str::from_utf8(source) {
        Ok(text) => load_str(text),
        Err(e) => {
            let valid = &source[..e.valid_up_to()];
            let line = valid.iter().filter(|&&b| b == b'\n').count() + 1;
            Err(StoryParseError::new(line, ParseErrorKind::InvalidUtf8))
        }
    }
}

/// Parse an authored story from text.
pub fn load_str(source: &str) -> Result<StoryGraph, StoryParseError> {
    let mut builder = GraphBuilder::default();
    let mut open: Option<OpenUnit> = None;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match open.as_mut() {
            Some(unit) => match word {
                "end" if rest.is_empty() => {
                    if let Some(unit) = open.take() {
                        builder.add_unit(unit.finish(), line_no)?;
                    }
                }
                "unit" => {
                    return Err(StoryParseError::new(
                        line_no,
                        ParseErrorKind::NestedUnit {
                            outer: unit.id.to_string(),
                            inner: rest.to_string(),
                        },
                    ));
                }
                "reaction" => {
                    let arrow = parse_reaction(rest).map_err(|k| StoryParseError::new(line_no, k))?;
                    unit.reactions.push(arrow.id.clone());
                    builder.add_arrow(arrow, line_no)?;
                }
                _ => unit.push_text(line),
            },
            None => match word {
                _ if line.starts_with('#') => {}
                "start" => {
                    let id = single_id("start", rest).map_err(|k| StoryParseError::new(line_no, k))?;
                    builder.set_start(UnitId::new(id), line_no)?;
                }
                "unit" => {
                    let id = single_id("unit", rest).map_err(|k| StoryParseError::new(line_no, k))?;
                    let id = UnitId::new(id);
                    if builder.units.contains_key(&id) {
                        return Err(StoryParseError::new(
                            line_no,
                            ParseErrorKind::DuplicateUnit(id.to_string()),
                        ));
                    }
                    open = Some(OpenUnit::new(id, line_no));
                }
                "reaction" => {
                    return Err(StoryParseError::new(line_no, ParseErrorKind::OutsideUnit("reaction")));
                }
                "end" => {
                    return Err(StoryParseError::new(line_no, ParseErrorKind::OutsideUnit("end")));
                }
                _ => {
                    return Err(StoryParseError::new(
                        line_no,
                        ParseErrorKind::TextOutsideUnit(line.to_string()),
                    ));
                }
            },
        }
    }

    if let Some(unit) = open {
        return Err(StoryParseError::new(
            unit.line,
            ParseErrorKind::UnterminatedUnit(unit.id.to_string()),
        ));
    }

    builder.finish()
}

/// A unit whose body is still being read.
struct OpenUnit {
    id: UnitId,
    line: usize,
    text: String,
    reactions: Vec<ArrowId>,
}

impl OpenUnit {
    fn new(id: UnitId, line: usize) -> Self {
        Self {
            id,
            line,
            text: String::new(),
            reactions: Vec::new(),
        }
    }

    fn push_text(&mut self, line: &str) {
        if line.len() == 1 && line.starts_with(PARAGRAPH_BREAK) {
            self.text.push(PARAGRAPH_BREAK);
            return;
        }
        if !self.text.is_empty() && !self.text.ends_with(PARAGRAPH_BREAK) {
            self.text.push(' ');
        }
        self.text.push_str(line);
    }

    fn finish(self) -> Unit {
        Unit {
            id: self.id,
            action_text: self.text,
            reactions: self.reactions,
        }
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(|c: char| c.is_whitespace() || c == ':')
}

fn single_id(directive: &'static str, rest: &str) -> Result<String, ParseErrorKind> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(id), None) if valid_id(id) => Ok(id.to_string()),
        (Some(id), None) => Err(ParseErrorKind::InvalidId(id.to_string())),
        _ => Err(ParseErrorKind::MalformedDirective {
            directive,
            line: rest.to_string(),
        }),
    }
}

fn parse_score(raw: &str) -> Result<f64, ParseErrorKind> {
    match raw.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(score),
        _ => Err(ParseErrorKind::InvalidScore(raw.to_string())),
    }
}

/// Parse the part of a reaction line after the `reaction` keyword.
fn parse_reaction(rest: &str) -> Result<ReactionArrow, ParseErrorKind> {
    let malformed = || ParseErrorKind::MalformedReaction(rest.to_string());

    let (header, display) = rest.split_once(':').ok_or_else(malformed)?;
    let display = display.trim();
    if display.is_empty() {
        return Err(malformed());
    }

    let fields: Vec<&str> = header.split_whitespace().collect();
    let [id, score, target] = fields.as_slice() else {
        return Err(malformed());
    };

    for id in [id, target] {
        if !valid_id(id) {
            return Err(ParseErrorKind::InvalidId(id.to_string()));
        }
    }

    Ok(ReactionArrow {
        id: ArrowId::new(*id),
        display_text: display.to_string(),
        score: parse_score(score)?,
        target: UnitId::new(*target),
    })
}

/// Collects units and arrows and checks cross references at the end.
#[derive(Default)]
struct GraphBuilder {
    units: HashMap<UnitId, Unit>,
    arrows: HashMap<ArrowId, ReactionArrow>,
    /// Line each arrow was declared on, for dangling target reports.
    arrow_lines: Vec<(ArrowId, usize)>,
    first_declared: Option<UnitId>,
    start: Option<(UnitId, usize)>,
}

impl GraphBuilder {
    fn set_start(&mut self, id: UnitId, line: usize) -> Result<(), StoryParseError> {
        if self.start.is_some() {
            return Err(StoryParseError::new(line, ParseErrorKind::DuplicateStart));
        }
        self.start = Some((id, line));
        Ok(())
    }

    fn add_unit(&mut self, unit: Unit, line: usize) -> Result<(), StoryParseError> {
        if self.units.contains_key(&unit.id) {
            return Err(StoryParseError::new(
                line,
                ParseErrorKind::DuplicateUnit(unit.id.to_string()),
            ));
        }
        if self.first_declared.is_none() {
            self.first_declared = Some(unit.id.clone());
        }
        self.units.insert(unit.id.clone(), unit);
        Ok(())
    }

    fn add_arrow(&mut self, arrow: ReactionArrow, line: usize) -> Result<(), StoryParseError> {
        if self.arrows.contains_key(&arrow.id) {
            return Err(StoryParseError::new(
                line,
                ParseErrorKind::DuplicateArrow(arrow.id.to_string()),
            ));
        }
        self.arrow_lines.push((arrow.id.clone(), line));
        self.arrows.insert(arrow.id.clone(), arrow);
        Ok(())
    }

    fn finish(self) -> Result<StoryGraph, StoryParseError> {
        for (id, line) in &self.arrow_lines {
            let arrow = &self.arrows[id];
            if !self.units.contains_key(&arrow.target) {
                return Err(StoryParseError::new(
                    *line,
                    ParseErrorKind::DanglingTarget {
                        arrow: arrow.id.to_string(),
                        target: arrow.target.to_string(),
                    },
                ));
            }
        }

        let first_unit = match (self.start, self.first_declared) {
            (Some((start, line)), _) => {
                if !self.units.contains_key(&start) {
                    return Err(StoryParseError::new(
                        line,
                        ParseErrorKind::UnknownStart(start.to_string()),
                    ));
                }
                start
            }
            (None, Some(first)) => first,
            (None, None) => return Err(StoryParseError::new(0, ParseErrorKind::EmptyStory)),
        };

        tracing::info!(
            units = self.units.len(),
            reactions = self.arrows.len(),
            first_unit = %first_unit,
            "Loaded story"
        );

        Ok(StoryGraph::from_parts(first_unit, self.units, self.arrows))
    }
}

/// JSON form of a story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub units: Vec<UnitDocument>,
}

/// JSON form of a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDocument {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reactions: Vec<ReactionDocument>,
}

/// JSON form of a reaction arrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionDocument {
    pub id: String,
    #[serde(default)]
    pub score: f64,
    pub target: String,
    pub text: String,
}

impl StoryDocument {
    /// Validate the document and build the graph.
    ///
    /// Problems are reported at line 0 since the document has no line
    /// structure of its own.
    pub fn into_graph(self) -> Result<StoryGraph, StoryParseError> {
        let doc_error = |kind| StoryParseError::new(0, kind);
        let mut builder = GraphBuilder::default();

        if let Some(start) = self.start {
            if !valid_id(&start) {
                return Err(doc_error(ParseErrorKind::InvalidId(start)));
            }
            builder.set_start(UnitId::new(start), 0)?;
        }

        for unit in self.units {
            if !valid_id(&unit.id) {
                return Err(doc_error(ParseErrorKind::InvalidId(unit.id)));
            }
            let mut reactions = Vec::with_capacity(unit.reactions.len());
            for reaction in unit.reactions {
                for id in [&reaction.id, &reaction.target] {
                    if !valid_id(id) {
                        return Err(doc_error(ParseErrorKind::InvalidId(id.clone())));
                    }
                }
                if !reaction.score.is_finite() {
                    return Err(doc_error(ParseErrorKind::InvalidScore(reaction.score.to_string())));
                }
                if reaction.text.trim().is_empty() {
                    return Err(doc_error(ParseErrorKind::MalformedReaction(reaction.id)));
                }
                let arrow = ReactionArrow {
                    id: ArrowId::new(reaction.id),
                    display_text: reaction.text,
                    score: reaction.score,
                    target: UnitId::new(reaction.target),
                };
                reactions.push(arrow.id.clone());
                builder.add_arrow(arrow, 0)?;
            }
            builder.add_unit(
                Unit {
                    id: UnitId::new(unit.id),
                    action_text: unit.text,
                    reactions,
                },
                0,
            )?;
        }

        builder.finish()
    }
}

impl StoryGraph {
    /// Parse the authored text format.
    pub fn parse(source: &str) -> Result<Self, StoryParseError> {
        load_str(source)
    }

    /// Parse a JSON story document.
    pub fn from_json(source: &str) -> Result<Self, StoryParseError> {
        let document: StoryDocument = serde_json::from_str(source)
            .map_err(|e| StoryParseError::new(e.line(), ParseErrorKind::Json(e.to_string())))?;
        document.into_graph()
    }

    /// Load a story file. Files ending in `.json` use the JSON format, all
    /// others the authored text format.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, StoryLoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let is_json = path.extension().map(|e| e == "json").unwrap_or(false);

        tracing::debug!(path = %path.display(), json = is_json, "Reading story file");

        let graph = if is_json {
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| StoryParseError::new(0, ParseErrorKind::InvalidUtf8))?;
            Self::from_json(text)?
        } else {
            load(&bytes)?
        };
        Ok(graph)
    }
}
