//! Parsing of external list lines.
//!
//! Each line has the form `<First> <Last> <WorldId> <Reason>`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use ptrack_types::{player_key, VisibilityType, WorldId};

use crate::error::VisibilityError;

/// One of the two external lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListKind {
    Void,
    White,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::Void, ListKind::White];

    /// The classification a player on this list carries.
    pub fn classification(self) -> VisibilityType {
        match self {
            ListKind::Void => VisibilityType::Void,
            ListKind::White => VisibilityType::White,
        }
    }

    /// The list a classification maps to, if any.
    pub fn for_classification(classification: VisibilityType) -> Option<Self> {
        match classification {
            VisibilityType::None => None,
            VisibilityType::Void => Some(ListKind::Void),
            VisibilityType::White => Some(ListKind::White),
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Void => f.write_str("void"),
            ListKind::White => f.write_str("white"),
        }
    }
}

/// One parsed list line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityEntry {
    pub name: String,
    pub world_id: WorldId,
    pub reason: String,
    pub key: String,
}

impl VisibilityEntry {
    /// True when the entry was added by the tool tagging with `reason`.
    pub fn is_tagged(&self, reason: &str) -> bool {
        self.reason.eq_ignore_ascii_case(reason)
    }
}

impl FromStr for VisibilityEntry {
    type Err = VisibilityError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| VisibilityError::Parse {
            line: line.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = line.split(' ').collect();
        let [first, last, world, reason] = parts[..] else {
            return Err(malformed("expected 4 space-separated fields"));
        };
        let world_id: WorldId = world
            .parse()
            .map_err(|_| malformed("world id is not a number"))?;
        let name = format!("{first} {last}");
        Ok(Self {
            key: player_key(&name, world_id),
            name,
            world_id,
            reason: reason.to_string(),
        })
    }
}

/// A parsed list, with the lines that could not be parsed.
#[derive(Debug, Default)]
pub struct ParsedList {
    pub entries: Vec<VisibilityEntry>,
    /// Zero-based line index and the parse error.
    pub rejected: Vec<(usize, VisibilityError)>,
}

/// Parse every line, keeping the rejects with their zero-based index.
pub fn parse_lines<I, S>(lines: I) -> ParsedList
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = ParsedList::default();
    for (index, line) in lines.into_iter().enumerate() {
        match line.as_ref().parse::<VisibilityEntry>() {
            Ok(entry) => parsed.entries.push(entry),
            Err(e) => parsed.rejected.push((index, e)),
        }
    }
    parsed
}

/// Entries keyed by player key. Malformed lines are logged and skipped; a
/// repeated key keeps its first entry.
pub fn entries_by_key(list: ListKind, lines: &[String]) -> HashMap<String, VisibilityEntry> {
    let parsed = parse_lines(lines);
    for (index, e) in &parsed.rejected {
        warn!(%list, line = index, error = %e, "skipping malformed visibility entry");
    }
    let mut by_key = HashMap::with_capacity(parsed.entries.len());
    for entry in parsed.entries {
        by_key.entry(entry.key.clone()).or_insert(entry);
    }
    by_key
}
