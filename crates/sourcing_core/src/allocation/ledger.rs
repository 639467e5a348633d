//! Append-only allocation ledger.
//!
//! Every committed allocation increment is an `AllocationRecord`. Records are
//! never mutated or deleted; the effective allocation of a quote is the sum of
//! its records. Invariants checked on every append, and again on replay:
//! - RFQ total (A + B over all records) <= required count.
//! - Per-quote total (A + B) <= that quote's offered count.
//!
//! `RfqLedger` is not internally synchronized. The owner holds the RFQ's lock
//! across read-validate-append, which makes the check-then-write atomic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::SchemeSplit;
use crate::error::{CapacityScope, SourcingError, Upstream};
use crate::ids::{QuoteId, RfqId, VendorId};
use crate::rfq::Quote;

// --- Record ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// 1-based commit sequence within the RFQ.
    pub seq: u64,
    pub rfq_id: RfqId,
    pub quote_id: QuoteId,
    /// Denormalized for audit.
    pub vendor: VendorId,
    pub scheme_a: u32,
    pub scheme_b: u32,
    pub reason: Option<String>,
    pub committed_at_ms: u64,
}

impl AllocationRecord {
    pub fn split(&self) -> SchemeSplit {
        SchemeSplit::new(self.scheme_a, self.scheme_b)
    }
}

// --- Journal seam ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("journal write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("journal read failed: {reason}")]
    ReadFailed { reason: String },
}

impl From<JournalError> for SourcingError {
    fn from(err: JournalError) -> Self {
        SourcingError::UpstreamUnavailable {
            upstream: Upstream::Persistence,
            reason: err.to_string(),
        }
    }
}

/// Persistence primitives (`RecordAllocation`, `GetAllocationHistory`).
pub trait AllocationJournal: Send + Sync {
    /// Persist one commit batch. Must be all-or-nothing.
    fn record_batch(&self, records: &[AllocationRecord]) -> Result<(), JournalError>;

    /// All records for `rfq_id`, in commit order.
    fn history(&self, rfq_id: RfqId) -> Result<Vec<AllocationRecord>, JournalError>;
}

/// In-process journal, for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<AllocationRecord>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("memory journal mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AllocationJournal for MemoryJournal {
    fn record_batch(&self, records: &[AllocationRecord]) -> Result<(), JournalError> {
        self.records
            .lock()
            .expect("memory journal mutex poisoned")
            .extend_from_slice(records);
        Ok(())
    }

    fn history(&self, rfq_id: RfqId) -> Result<Vec<AllocationRecord>, JournalError> {
        Ok(self
            .records
            .lock()
            .expect("memory journal mutex poisoned")
            .iter()
            .filter(|r| r.rfq_id == rfq_id)
            .cloned()
            .collect())
    }
}

// --- Ledger ---------------------------------------------------------------

/// One increment in an append batch.
#[derive(Debug, Clone, Copy)]
pub struct LedgerEntry<'a> {
    pub quote: &'a Quote,
    pub delta: SchemeSplit,
}

#[derive(Debug, Clone)]
pub struct RfqLedger {
    rfq_id: RfqId,
    required_containers: u32,
    records: Vec<AllocationRecord>,
    totals: BTreeMap<QuoteId, SchemeSplit>,
    allocated: u64,
}

impl RfqLedger {
    pub fn new(rfq_id: RfqId, required_containers: u32) -> Self {
        Self {
            rfq_id,
            required_containers,
            records: Vec::new(),
            totals: BTreeMap::new(),
            allocated: 0,
        }
    }

    /// Rebuild from journal history, re-checking both invariants.
    pub fn replay(
        rfq_id: RfqId,
        required_containers: u32,
        records: Vec<AllocationRecord>,
        quotes: &[Quote],
    ) -> Result<Self, SourcingError> {
        let mut ledger = Self::new(rfq_id, required_containers);
        for record in records {
            if record.rfq_id != rfq_id {
                return Err(SourcingError::validation(format!(
                    "replay of {rfq_id} found record for {}",
                    record.rfq_id
                )));
            }
            let quote = quotes
                .iter()
                .find(|q| q.id == record.quote_id)
                .ok_or_else(|| {
                    SourcingError::validation(format!(
                        "replay of {rfq_id} references unknown {}",
                        record.quote_id
                    ))
                })?;
            ledger.check(&[LedgerEntry {
                quote,
                delta: record.split(),
            }])?;
            ledger.apply(record);
        }
        Ok(ledger)
    }

    pub fn rfq_id(&self) -> RfqId {
        self.rfq_id
    }

    pub fn required_containers(&self) -> u32 {
        self.required_containers
    }

    /// Summed splits per quote across all records.
    pub fn recorded_totals(&self) -> &BTreeMap<QuoteId, SchemeSplit> {
        &self.totals
    }

    pub fn recorded(&self, quote_id: QuoteId) -> SchemeSplit {
        self.totals.get(&quote_id).copied().unwrap_or_default()
    }

    pub fn total_allocated(&self) -> u64 {
        self.allocated
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.allocated == u64::from(self.required_containers)
    }

    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    /// Append a single increment.
    pub fn append(
        &mut self,
        journal: &dyn AllocationJournal,
        quote: &Quote,
        delta: SchemeSplit,
        reason: Option<&str>,
        now_ms: u64,
    ) -> Result<AllocationRecord, SourcingError> {
        let mut records =
            self.append_batch(journal, &[LedgerEntry { quote, delta }], reason, now_ms)?;
        records
            .pop()
            .ok_or_else(|| SourcingError::validation("append produced no record"))
    }

    /// Append several increments as one unit: all are validated, persisted in
    /// one journal batch, then applied. Any failure leaves the ledger unchanged.
    pub fn append_batch(
        &mut self,
        journal: &dyn AllocationJournal,
        entries: &[LedgerEntry<'_>],
        reason: Option<&str>,
        now_ms: u64,
    ) -> Result<Vec<AllocationRecord>, SourcingError> {
        if entries.is_empty() {
            return Err(SourcingError::validation("empty allocation batch"));
        }
        self.check(entries)?;

        let base_seq = self.records.len() as u64;
        let records: Vec<AllocationRecord> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| AllocationRecord {
                seq: base_seq + i as u64 + 1,
                rfq_id: self.rfq_id,
                quote_id: entry.quote.id,
                vendor: entry.quote.vendor.clone(),
                scheme_a: entry.delta.a,
                scheme_b: entry.delta.b,
                reason: reason.map(str::to_string),
                committed_at_ms: now_ms,
            })
            .collect();

        journal.record_batch(&records)?;
        for record in &records {
            self.apply(record.clone());
        }
        Ok(records)
    }

    fn check(&self, entries: &[LedgerEntry<'_>]) -> Result<(), SourcingError> {
        let mut seen = BTreeSet::new();
        let mut batch_total: u64 = 0;

        for entry in entries {
            let quote = entry.quote;
            if quote.rfq_id != self.rfq_id {
                return Err(SourcingError::validation(format!(
                    "{} belongs to {}, not {}",
                    quote.id, quote.rfq_id, self.rfq_id
                )));
            }
            if entry.delta.is_zero() {
                return Err(SourcingError::validation(format!(
                    "zero allocation delta for {}; the ledger only records additions",
                    quote.id
                )));
            }
            if !seen.insert(quote.id) {
                return Err(SourcingError::validation(format!(
                    "{} appears twice in one allocation batch",
                    quote.id
                )));
            }

            let quote_total = self.recorded(quote.id).total() + entry.delta.total();
            if quote_total > u64::from(quote.offered_containers) {
                return Err(SourcingError::CapacityExceeded {
                    scope: CapacityScope::QuoteOffer(quote.id),
                    requested: quote_total,
                    limit: u64::from(quote.offered_containers),
                });
            }
            batch_total += entry.delta.total();
        }

        let rfq_total = self.allocated + batch_total;
        if rfq_total > u64::from(self.required_containers) {
            return Err(SourcingError::CapacityExceeded {
                scope: CapacityScope::Requirement(self.rfq_id),
                requested: rfq_total,
                limit: u64::from(self.required_containers),
            });
        }
        Ok(())
    }

    fn apply(&mut self, record: AllocationRecord) {
        let split = record.split();
        let entry = self.totals.entry(record.quote_id).or_default();
        *entry = entry.saturating_add(split);
        self.allocated += split.total();
        self.records.push(record);
    }
}
