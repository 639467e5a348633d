//! Container counts per scheme, and cumulative per-quote snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::QuoteId;
use crate::pricing::Scheme;

/// Containers assigned to one quote, split by scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemeSplit {
    pub a: u32,
    pub b: u32,
}

impl SchemeSplit {
    pub const ZERO: SchemeSplit = SchemeSplit { a: 0, b: 0 };

    pub fn new(a: u32, b: u32) -> Self {
        Self { a, b }
    }

    pub fn total(self) -> u64 {
        u64::from(self.a) + u64::from(self.b)
    }

    pub fn is_zero(self) -> bool {
        self.a == 0 && self.b == 0
    }

    pub fn get(self, scheme: Scheme) -> u32 {
        match scheme {
            Scheme::A => self.a,
            Scheme::B => self.b,
        }
    }

    pub(crate) fn add(&mut self, scheme: Scheme, containers: u32) {
        match scheme {
            Scheme::A => self.a += containers,
            Scheme::B => self.b += containers,
        }
    }

    pub fn saturating_add(self, other: SchemeSplit) -> SchemeSplit {
        SchemeSplit {
            a: self.a.saturating_add(other.a),
            b: self.b.saturating_add(other.b),
        }
    }
}

/// Desired cumulative allocation per quote. Quotes not listed count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    lines: BTreeMap<QuoteId, SchemeSplit>,
}

impl AllocationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`AllocationSnapshot::set`].
    pub fn with(mut self, quote_id: QuoteId, a: u32, b: u32) -> Self {
        self.set(quote_id, SchemeSplit::new(a, b));
        self
    }

    pub fn set(&mut self, quote_id: QuoteId, split: SchemeSplit) {
        self.lines.insert(quote_id, split);
    }

    pub fn get(&self, quote_id: QuoteId) -> SchemeSplit {
        self.lines.get(&quote_id).copied().unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.lines.values().map(|split| split.total()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuoteId, SchemeSplit)> + '_ {
        self.lines.iter().map(|(id, split)| (*id, *split))
    }

    pub fn quote_ids(&self) -> impl Iterator<Item = QuoteId> + '_ {
        self.lines.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<BTreeMap<QuoteId, SchemeSplit>> for AllocationSnapshot {
    fn from(lines: BTreeMap<QuoteId, SchemeSplit>) -> Self {
        Self { lines }
    }
}

impl FromIterator<(QuoteId, SchemeSplit)> for AllocationSnapshot {
    fn from_iter<I: IntoIterator<Item = (QuoteId, SchemeSplit)>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}
