//! Recommendation engine: deterministic lowest-cost-first fill.
//!
//! **Algorithm:**
//! 1. One slot per (quote, scheme), priced at that scheme's per-container total.
//! 2. Sort slots ascending by cost. The sort is stable over slots generated in
//!    quote input order with Scheme A before Scheme B, so ties resolve to the
//!    first-seen quote, then Scheme A.
//! 3. Walk the slots taking `min(remaining_requirement, remaining_offer)`.
//!    A quote's offer is shared by its two slots.
//! 4. Stop when the requirement is met or slots run out. Running out is a
//!    shortfall, reported on the result rather than as an error.
//!
//! Containers already committed in the ledger are carried as-is; only the
//! outstanding requirement is filled from outstanding offer capacity.
//!
//! The recommendation is a pure function of its inputs and is never persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::allocation::{AllocationSnapshot, SchemeSplit};
use crate::fingerprint::recommendation_fingerprint;
use crate::ids::QuoteId;
use crate::pricing::{CostTotals, Scheme};

/// A quote as seen by the engine: identity, offer and computed totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteCosting {
    pub quote_id: QuoteId,
    pub offered_containers: u32,
    pub totals: CostTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedLine {
    pub quote_id: QuoteId,
    /// Cumulative split, including containers already committed.
    pub split: SchemeSplit,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub required_containers: u32,
    /// One line per quote, in input order (zero lines included).
    pub lines: Vec<RecommendedLine>,
    pub allocated_containers: u64,
    pub total_cost: f64,
    /// Containers that could not be placed for lack of offered capacity.
    pub shortfall: u64,
}

impl Recommendation {
    pub fn is_short(&self) -> bool {
        self.shortfall > 0
    }

    pub fn split_for(&self, quote_id: QuoteId) -> SchemeSplit {
        self.lines
            .iter()
            .find(|line| line.quote_id == quote_id)
            .map(|line| line.split)
            .unwrap_or_default()
    }

    /// Deterministic hash of the full recommendation.
    pub fn fingerprint(&self) -> u64 {
        recommendation_fingerprint(self)
    }

    /// Non-zero lines as a snapshot, ready to submit for finalization.
    pub fn to_snapshot(&self) -> AllocationSnapshot {
        self.lines
            .iter()
            .filter(|line| !line.split.is_zero())
            .map(|line| (line.quote_id, line.split))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    quote_idx: usize,
    scheme: Scheme,
    cost: f64,
}

/// Compute the baseline allocation for `required_containers`.
pub fn recommend(
    required_containers: u32,
    quotes: &[QuoteCosting],
    committed: &BTreeMap<QuoteId, SchemeSplit>,
) -> Recommendation {
    let mut splits: Vec<SchemeSplit> = quotes
        .iter()
        .map(|q| committed.get(&q.quote_id).copied().unwrap_or_default())
        .collect();
    let committed_total: u64 = splits.iter().map(|s| s.total()).sum();

    let mut remaining = u64::from(required_containers).saturating_sub(committed_total);
    let mut capacity: Vec<u64> = quotes
        .iter()
        .zip(&splits)
        .map(|(q, s)| u64::from(q.offered_containers).saturating_sub(s.total()))
        .collect();

    let mut slots: Vec<Slot> = quotes
        .iter()
        .enumerate()
        .flat_map(|(quote_idx, q)| {
            Scheme::ALL.into_iter().map(move |scheme| Slot {
                quote_idx,
                scheme,
                cost: q.totals.per_container(scheme),
            })
        })
        .collect();
    // Stable: equal costs keep generation order.
    slots.sort_by(|l, r| l.cost.total_cmp(&r.cost));

    for slot in &slots {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(capacity[slot.quote_idx]);
        if take == 0 {
            continue;
        }
        // take <= offered_containers, which is a u32.
        splits[slot.quote_idx].add(slot.scheme, take as u32);
        capacity[slot.quote_idx] -= take;
        remaining -= take;
    }

    let lines: Vec<RecommendedLine> = quotes
        .iter()
        .zip(splits)
        .map(|(q, split)| RecommendedLine {
            quote_id: q.quote_id,
            split,
            cost: q.totals.line_cost(split),
        })
        .collect();

    Recommendation {
        required_containers,
        allocated_containers: lines.iter().map(|l| l.split.total()).sum(),
        total_cost: lines.iter().map(|l| l.cost).sum(),
        shortfall: remaining,
        lines,
    }
}

/// Cost of an arbitrary snapshot at the given totals. Unknown quotes cost nothing.
pub fn snapshot_cost(snapshot: &AllocationSnapshot, quotes: &[QuoteCosting]) -> f64 {
    quotes
        .iter()
        .map(|q| q.totals.line_cost(snapshot.get(q.quote_id)))
        .sum()
}
