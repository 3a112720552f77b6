//! Positional cache keys.
//!
//! Every cached item snapshot lives under `"{item_id}:{project_id}:{rank}"`.
//! The wildcard position `*` exists only inside scan patterns; a key holding
//! it can never be written.

use std::fmt;

use catalog_core::{CacheError, ItemId, ProjectId};

/// Separator between key components.
const SEPARATOR: char = ':';

/// Wildcard token used in scan patterns.
pub const WILDCARD: &str = "*";

/// Position component of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// A concrete 1-based rank within a listing.
    Rank(i64),
    /// Any rank. Only valid in scan patterns.
    Any,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Rank(rank) => write!(f, "{}", rank),
            Position::Any => f.write_str(WILDCARD),
        }
    }
}

/// A cache key for an item snapshot at a listing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    item_id: ItemId,
    project_id: ProjectId,
    position: Position,
}

impl CacheKey {
    /// Key for an item at a concrete rank.
    pub fn at_rank(item_id: ItemId, project_id: ProjectId, rank: i64) -> Self {
        Self {
            item_id,
            project_id,
            position: Position::Rank(rank),
        }
    }

    /// Pattern matching an item at any rank.
    pub fn any_rank(item_id: ItemId, project_id: ProjectId) -> Self {
        Self {
            item_id,
            project_id,
            position: Position::Any,
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Whether this key may be written (i.e. carries a concrete rank).
    pub fn is_concrete(&self) -> bool {
        matches!(self.position, Position::Rank(_))
    }

    /// Scan pattern matching any item of any project at `rank`.
    pub fn rank_pattern(rank: i64) -> String {
        format!("{WILDCARD}{SEPARATOR}{WILDCARD}{SEPARATOR}{rank}")
    }

    /// Scan pattern matching every positional entry of one item.
    pub fn item_pattern(item_id: ItemId, project_id: ProjectId) -> String {
        Self::any_rank(item_id, project_id).to_string()
    }

    /// Parse a concrete key read back from the store.
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let invalid = |reason: &str| CacheError::InvalidKey {
            key: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = raw.split(SEPARATOR);
        let (Some(item), Some(project), Some(rank), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected three ':'-separated components"));
        };

        let item_id = item.parse().map_err(|_| invalid("item id is not an integer"))?;
        let project_id = project
            .parse()
            .map_err(|_| invalid("project id is not an integer"))?;
        let rank = rank.parse().map_err(|_| invalid("position is not a rank"))?;

        Ok(Self::at_rank(item_id, project_id, rank))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.item_id, self.project_id, self.position
        )
    }
}
