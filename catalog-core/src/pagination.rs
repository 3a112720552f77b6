//! Listing windows and the page envelope returned to callers.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::Item;

/// Limit used when a request carries no usable pagination.
pub const DEFAULT_LIMIT: i64 = 10;

/// Offset used when a request carries no usable pagination.
pub const DEFAULT_OFFSET: i64 = 1;

/// Largest limit a caller may request.
pub const MAX_LIMIT: i64 = 100;

/// Largest offset a caller may request. Item ids are `i32`, so no listing
/// reaches past this rank.
pub const MAX_OFFSET: i64 = i32::MAX as i64;

/// A `(limit, offset)` slice of a listing.
///
/// Ranks are 1-based: offset `o` and limit `l` select ranks `o+1 ..= o+l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl Window {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// A window with `limit` clamped into `1..=MAX_LIMIT` and `offset` into
    /// `0..=MAX_OFFSET`.
    pub fn bounded(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset: offset.clamp(0, MAX_OFFSET),
        }
    }

    /// First rank covered by this window.
    pub fn first_rank(&self) -> i64 {
        self.offset.saturating_add(1)
    }

    /// Last rank covered by this window. Saturates at `i64::MAX`.
    pub fn last_rank(&self) -> i64 {
        self.offset.saturating_add(self.limit)
    }

    /// Every rank covered by this window, ascending. Empty when `limit <= 0`.
    pub fn ranks(&self) -> RangeInclusive<i64> {
        self.first_rank()..=self.last_rank()
    }

    pub fn contains(&self, rank: i64) -> bool {
        self.ranks().contains(&rank)
    }
}

/// Aggregate counters reported alongside a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub total: i64,
    pub removed: i64,
    pub limit: i64,
    pub offset: i64,
}

/// A listing response: meta envelope plus items in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub meta: ListMeta,
    pub items: Vec<Item>,
}
