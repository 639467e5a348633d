//! Finalization planning.
//!
//! **Steps (all under the RFQ lock, before anything is written):**
//! 1. Screen: a stale `based_on_total` or a closed RFQ rejects the call.
//! 2. Delta per (quote, scheme) = proposed - recorded. Negative -> Validation.
//! 3. Per-quote and RFQ totals checked against offer and requirement.
//! 4. Deviation from the recommendation or edited prices -> reason required.
//! 5. At least one positive delta.
//!
//! The resulting plan is applied as a single ledger batch by the desk.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::allocation::{
    AllocationRecord, AllocationSnapshot, DeviationReport, QuoteCosting, Recommendation,
    RfqLedger, SchemeSplit, detect_deviation, require_reason, snapshot_cost,
};
use crate::error::{CapacityScope, SourcingError};
use crate::ids::{QuoteId, RfqId};
use crate::rfq::{Quote, Rfq, RfqStatus};

// --- Request / outcome ----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    /// Desired cumulative containers per quote per scheme (not a delta).
    pub snapshot: AllocationSnapshot,
    pub reason: Option<String>,
    /// Allocated total the operator saw when preparing `snapshot`.
    pub based_on_total: Option<u64>,
}

impl FinalizeRequest {
    pub fn new(snapshot: AllocationSnapshot) -> Self {
        Self {
            snapshot,
            reason: None,
            based_on_total: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn based_on(mut self, allocated_total: u64) -> Self {
        self.based_on_total = Some(allocated_total);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub rfq_id: RfqId,
    /// True when this call brought the RFQ to its required count.
    pub closed: bool,
    pub total_allocated: u64,
    pub records: Vec<AllocationRecord>,
    pub deviated: bool,
    pub recommended_cost: f64,
    pub proposed_cost: f64,
}

// --- Plan -----------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub rfq: &'a Rfq,
    pub status: RfqStatus,
    pub quotes: &'a [Quote],
    pub ledger: &'a RfqLedger,
    pub costings: &'a [QuoteCosting],
    pub recommendation: &'a Recommendation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizePlan {
    /// Positive increments only, in quote order.
    pub deltas: Vec<(QuoteId, SchemeSplit)>,
    pub deviation: DeviationReport,
    pub reason: Option<String>,
    pub recommended_cost: f64,
    pub proposed_cost: f64,
}

/// Reject stale or closed-RFQ requests before any pricing work.
///
/// A stale base is judged by what the operator intended to add
/// (`snapshot_total - based_on_total`). If that no longer fits, the call is a
/// capacity error. A stale base that still fits is `AlreadyFinalized` on a
/// closed RFQ and a reload request otherwise.
pub fn screen(
    rfq_id: RfqId,
    status: RfqStatus,
    ledger: &RfqLedger,
    request: &FinalizeRequest,
) -> Result<(), SourcingError> {
    if let Some(base) = request.based_on_total {
        let current = ledger.total_allocated();
        if base != current {
            let intended = request.snapshot.total().saturating_sub(base);
            let requested = current + intended;
            let limit = u64::from(ledger.required_containers());
            if requested > limit {
                return Err(SourcingError::CapacityExceeded {
                    scope: CapacityScope::Requirement(rfq_id),
                    requested,
                    limit,
                });
            }
            if status.is_terminal() {
                return Err(SourcingError::AlreadyFinalized { rfq_id });
            }
            return Err(SourcingError::validation(format!(
                "snapshot was prepared against {base} allocated containers but {rfq_id} now has {current}; reload and resubmit"
            )));
        }
    }
    if status.is_terminal() {
        return Err(SourcingError::AlreadyFinalized { rfq_id });
    }
    Ok(())
}

pub fn plan_finalization(
    inputs: &PlanInputs<'_>,
    request: &FinalizeRequest,
) -> Result<FinalizePlan, SourcingError> {
    let rfq_id = inputs.rfq.id();
    screen(rfq_id, inputs.status, inputs.ledger, request)?;

    let known: BTreeSet<QuoteId> = inputs.quotes.iter().map(|q| q.id).collect();
    if let Some(unknown) = request.snapshot.quote_ids().find(|id| !known.contains(id)) {
        return Err(SourcingError::validation(format!(
            "{unknown} is not a quote on {rfq_id}"
        )));
    }

    let mut deltas = Vec::new();
    for quote in inputs.quotes {
        let proposed = request.snapshot.get(quote.id);
        let recorded = inputs.ledger.recorded(quote.id);
        if proposed.a < recorded.a || proposed.b < recorded.b {
            return Err(SourcingError::validation(format!(
                "{} proposes A={} B={} below committed A={} B={}; committed allocation cannot be revoked",
                quote.id, proposed.a, proposed.b, recorded.a, recorded.b
            )));
        }
        if proposed.total() > u64::from(quote.offered_containers) {
            return Err(SourcingError::CapacityExceeded {
                scope: CapacityScope::QuoteOffer(quote.id),
                requested: proposed.total(),
                limit: u64::from(quote.offered_containers),
            });
        }
        let delta = SchemeSplit::new(proposed.a - recorded.a, proposed.b - recorded.b);
        if !delta.is_zero() {
            deltas.push((quote.id, delta));
        }
    }

    let required = u64::from(inputs.rfq.required_containers());
    if request.snapshot.total() > required {
        return Err(SourcingError::CapacityExceeded {
            scope: CapacityScope::Requirement(rfq_id),
            requested: request.snapshot.total(),
            limit: required,
        });
    }

    let deviation = detect_deviation(&request.snapshot, inputs.recommendation, inputs.quotes);
    let reason = require_reason(&deviation, request.reason.as_deref())?;

    if deltas.is_empty() {
        return Err(SourcingError::validation(format!(
            "snapshot adds no containers to {rfq_id} beyond what is already committed"
        )));
    }

    Ok(FinalizePlan {
        deltas,
        deviation,
        reason,
        recommended_cost: inputs.recommendation.total_cost,
        proposed_cost: snapshot_cost(&request.snapshot, inputs.costings),
    })
}

// --- Metrics --------------------------------------------------------------

/// Finalization counters. Shared across threads.
#[derive(Debug, Default)]
pub struct FinalizeMetrics {
    committed_total: AtomicU64,
    closed_total: AtomicU64,
    deviations_total: AtomicU64,
    rejected_validation_total: AtomicU64,
    rejected_capacity_total: AtomicU64,
    rejected_finalized_total: AtomicU64,
    rejected_upstream_total: AtomicU64,
    notify_failures_total: AtomicU64,
}

impl FinalizeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_commit(&self, closed: bool, deviated: bool) {
        self.committed_total.fetch_add(1, Ordering::Relaxed);
        if closed {
            self.closed_total.fetch_add(1, Ordering::Relaxed);
        }
        if deviated {
            self.deviations_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejection(&self, err: &SourcingError) {
        let counter = match err {
            SourcingError::Validation { .. } => &self.rejected_validation_total,
            SourcingError::CapacityExceeded { .. } => &self.rejected_capacity_total,
            SourcingError::AlreadyFinalized { .. } => &self.rejected_finalized_total,
            SourcingError::UpstreamUnavailable { .. } => &self.rejected_upstream_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notify_failure(&self) {
        self.notify_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn committed_total(&self) -> u64 {
        self.committed_total.load(Ordering::Relaxed)
    }

    pub fn closed_total(&self) -> u64 {
        self.closed_total.load(Ordering::Relaxed)
    }

    pub fn deviations_total(&self) -> u64 {
        self.deviations_total.load(Ordering::Relaxed)
    }

    pub fn rejected_validation_total(&self) -> u64 {
        self.rejected_validation_total.load(Ordering::Relaxed)
    }

    pub fn rejected_capacity_total(&self) -> u64 {
        self.rejected_capacity_total.load(Ordering::Relaxed)
    }

    pub fn rejected_finalized_total(&self) -> u64 {
        self.rejected_finalized_total.load(Ordering::Relaxed)
    }

    pub fn rejected_upstream_total(&self) -> u64 {
        self.rejected_upstream_total.load(Ordering::Relaxed)
    }

    pub fn notify_failures_total(&self) -> u64 {
        self.notify_failures_total.load(Ordering::Relaxed)
    }
}
