//! Sourcing desk: RFQs, quotes and allocation ledgers behind one API.
//!
//! **Serialization:** each RFQ has one `Mutex<RfqFile>`. Quote submission,
//! quote edits, restore and the whole read-validate-append-close sequence of
//! a finalization run under it, so two finalizations of one RFQ can never
//! observe the same ledger total, and a quote edit cannot race a closure.
//!
//! **External I/O:** the FX fetch and the closure notification run with no
//! RFQ lock held and are bounded by the timeouts in `FinalizeConfig`.
//!
//! **Atomicity:** a finalization is validated in full, then written as one
//! journal batch, then applied in memory. A rejection or a journal failure
//! leaves the ledger exactly as it was.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::allocation::{
    AllocationJournal, AllocationRecord, FinalizeMetrics, FinalizeOutcome, FinalizeRequest,
    LedgerEntry, PlanInputs, QuoteCosting, Recommendation, RfqLedger, SchemeSplit,
    plan_finalization, recommend, screen,
};
use crate::clock::epoch_ms;
use crate::error::SourcingError;
use crate::fingerprint::format_fingerprint;
use crate::ids::{QuoteId, RfqId};
use crate::notify::{ClosureNotice, ClosureNotifier, VendorAllocation};
use crate::pricing::{FxRate, FxRateSource, PriceComponents};
use crate::rfq::quote::validate_prices;
use crate::rfq::{Quote, QuoteSubmission, Rfq, RfqEvent, RfqLifecycle, RfqStatus};

// ─── Configuration ──────────────────────────────────────────────────────

/// Bounds on external calls made by the desk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeConfig {
    /// Upper bound handed to `FxRateSource::fetch_rate` (default: 2s).
    pub fx_fetch_timeout: Duration,
    /// Upper bound handed to `ClosureNotifier::notify_closure` (default: 1s).
    pub notify_timeout: Duration,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            fx_fetch_timeout: Duration::from_millis(2000),
            notify_timeout: Duration::from_millis(1000),
        }
    }
}

// ─── Per-RFQ state ──────────────────────────────────────────────────────

#[derive(Debug)]
struct RfqFile {
    rfq: Rfq,
    lifecycle: RfqLifecycle,
    quotes: Vec<Quote>,
    ledger: RfqLedger,
}

impl RfqFile {
    fn new(rfq: Rfq) -> Self {
        let ledger = RfqLedger::new(rfq.id(), rfq.required_containers());
        Self {
            rfq,
            lifecycle: RfqLifecycle::new(),
            quotes: Vec::new(),
            ledger,
        }
    }

    fn costings(&self, fx: FxRate) -> Result<Vec<QuoteCosting>, SourcingError> {
        self.quotes
            .iter()
            .map(|q| {
                Ok(QuoteCosting {
                    quote_id: q.id,
                    offered_containers: q.offered_containers,
                    totals: q.totals(Some(fx))?,
                })
            })
            .collect()
    }

    fn recommendation(
        &self,
        fx: FxRate,
    ) -> Result<(Vec<QuoteCosting>, Recommendation), SourcingError> {
        let costings = self.costings(fx)?;
        let recommendation = recommend(
            self.rfq.required_containers(),
            &costings,
            self.ledger.recorded_totals(),
        );
        Ok((costings, recommendation))
    }

    fn closure_notice(&self, closed_at_ms: u64) -> ClosureNotice {
        let allocations = self
            .quotes
            .iter()
            .map(|q| (q, self.ledger.recorded(q.id)))
            .filter(|(_, split)| !split.is_zero())
            .map(|(q, split)| VendorAllocation {
                vendor: q.vendor.clone(),
                quote_id: q.id,
                split,
            })
            .collect();
        ClosureNotice {
            rfq_id: self.rfq.id(),
            required_containers: self.rfq.required_containers(),
            allocations,
            closed_at_ms,
        }
    }
}

// ─── Desk ───────────────────────────────────────────────────────────────

pub struct SourcingDesk {
    rfqs: RwLock<HashMap<RfqId, Arc<Mutex<RfqFile>>>>,
    journal: Arc<dyn AllocationJournal>,
    fx: Arc<dyn FxRateSource>,
    notifier: Option<Arc<dyn ClosureNotifier>>,
    config: FinalizeConfig,
    metrics: FinalizeMetrics,
    next_quote_id: AtomicU64,
}

impl SourcingDesk {
    pub fn new(
        journal: Arc<dyn AllocationJournal>,
        fx: Arc<dyn FxRateSource>,
        config: FinalizeConfig,
    ) -> Self {
        Self {
            rfqs: RwLock::new(HashMap::new()),
            journal,
            fx,
            notifier: None,
            config,
            metrics: FinalizeMetrics::new(),
            next_quote_id: AtomicU64::new(1),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ClosureNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &FinalizeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &FinalizeMetrics {
        &self.metrics
    }

    // --- RFQs -------------------------------------------------------------

    pub fn create_rfq(&self, id: RfqId, required_containers: u32) -> Result<Rfq, SourcingError> {
        self.create_rfq_at(id, required_containers, epoch_ms())
    }

    pub fn create_rfq_at(
        &self,
        id: RfqId,
        required_containers: u32,
        now_ms: u64,
    ) -> Result<Rfq, SourcingError> {
        let rfq = Rfq::new(id, required_containers, now_ms)?;
        self.insert_file(RfqFile::new(rfq.clone()))?;
        tracing::info!("RfqCreated rfq={} required={}", id, required_containers);
        Ok(rfq)
    }

    /// Re-register an RFQ after restart: quotes come from the quote store,
    /// allocations are replayed from the journal, status is re-derived.
    pub fn restore_rfq(&self, rfq: Rfq, quotes: Vec<Quote>) -> Result<RfqStatus, SourcingError> {
        let rfq = Rfq::new(rfq.id(), rfq.required_containers(), rfq.created_at_ms())?;
        for (idx, quote) in quotes.iter().enumerate() {
            if quote.rfq_id != rfq.id() {
                return Err(SourcingError::validation(format!(
                    "{} belongs to {}, not {}",
                    quote.id,
                    quote.rfq_id,
                    rfq.id()
                )));
            }
            if quote.offered_containers == 0 {
                return Err(SourcingError::validation(format!(
                    "{} offers no containers",
                    quote.id
                )));
            }
            validate_prices(&quote.submitted_prices)?;
            validate_prices(&quote.effective_prices)?;
            if quotes[..idx]
                .iter()
                .any(|q| q.id == quote.id || q.vendor == quote.vendor)
            {
                return Err(SourcingError::validation(format!(
                    "duplicate quote {} / vendor {} on {}",
                    quote.id,
                    quote.vendor,
                    rfq.id()
                )));
            }
        }

        let history = self.journal.history(rfq.id())?;
        let ledger = RfqLedger::replay(rfq.id(), rfq.required_containers(), history, &quotes)?;

        let mut lifecycle = RfqLifecycle::new();
        if !quotes.is_empty() {
            lifecycle.apply(RfqEvent::QuoteAccepted);
        }
        if ledger.is_fully_allocated() {
            lifecycle.apply(RfqEvent::FullyAllocated);
        }
        let status = lifecycle.status();

        if let Some(max_id) = quotes.iter().map(|q| q.id.0).max() {
            self.next_quote_id.fetch_max(max_id + 1, Ordering::Relaxed);
        }

        let rfq_id = rfq.id();
        let allocated = ledger.total_allocated();
        self.insert_file(RfqFile {
            rfq,
            lifecycle,
            quotes,
            ledger,
        })?;
        tracing::info!(
            "RfqRestored rfq={} status={} allocated={}",
            rfq_id,
            status.as_str(),
            allocated
        );
        Ok(status)
    }

    pub fn rfq(&self, rfq_id: RfqId) -> Result<Rfq, SourcingError> {
        self.lock(rfq_id, |file| file.rfq.clone())
    }

    pub fn rfq_status(&self, rfq_id: RfqId) -> Result<RfqStatus, SourcingError> {
        self.lock(rfq_id, |file| file.lifecycle.status())
    }

    pub fn quotes(&self, rfq_id: RfqId) -> Result<Vec<Quote>, SourcingError> {
        self.lock(rfq_id, |file| file.quotes.clone())
    }

    // --- Quotes -----------------------------------------------------------

    pub fn submit_quote(
        &self,
        rfq_id: RfqId,
        submission: QuoteSubmission,
    ) -> Result<Quote, SourcingError> {
        self.submit_quote_at(rfq_id, submission, epoch_ms())
    }

    /// Accept a vendor quote. A vendor's resubmission replaces its prior
    /// quote in place (same quote id) and resets any operator price edits.
    pub fn submit_quote_at(
        &self,
        rfq_id: RfqId,
        submission: QuoteSubmission,
        now_ms: u64,
    ) -> Result<Quote, SourcingError> {
        submission.validate()?;
        let handle = self.file(rfq_id)?;
        let mut guard = handle.lock().expect("rfq file mutex poisoned");
        let file: &mut RfqFile = &mut guard;
        file.lifecycle.ensure_open(rfq_id)?;

        let existing = file.quotes.iter().position(|q| q.vendor == submission.vendor);
        let quote = match existing {
            Some(idx) => {
                let quote = &mut file.quotes[idx];
                let committed = file.ledger.recorded(quote.id).total();
                if u64::from(submission.offered_containers) < committed {
                    return Err(SourcingError::validation(format!(
                        "{} already has {} containers committed; offer of {} is too small",
                        quote.id, committed, submission.offered_containers
                    )));
                }
                quote.offered_containers = submission.offered_containers;
                quote.submitted_prices = submission.prices;
                quote.effective_prices = submission.prices;
                quote.submitted_at_ms = now_ms;
                quote.clone()
            }
            None => {
                let id = QuoteId(self.next_quote_id.fetch_add(1, Ordering::Relaxed));
                let quote = Quote::from_submission(id, rfq_id, submission, now_ms);
                file.quotes.push(quote.clone());
                quote
            }
        };

        file.lifecycle.apply(RfqEvent::QuoteAccepted);
        tracing::debug!(
            "QuoteAccepted rfq={} quote={} vendor={} offered={}",
            rfq_id,
            quote.id,
            quote.vendor,
            quote.offered_containers
        );
        Ok(quote)
    }

    /// Operator override of the prices used for costing. The vendor's
    /// submitted prices are kept, so the edit forces a deviation reason.
    pub fn edit_quote_prices(
        &self,
        rfq_id: RfqId,
        quote_id: QuoteId,
        prices: PriceComponents,
    ) -> Result<Quote, SourcingError> {
        validate_prices(&prices)?;
        let handle = self.file(rfq_id)?;
        let mut file = handle.lock().expect("rfq file mutex poisoned");
        file.lifecycle.ensure_open(rfq_id)?;

        let quote = file
            .quotes
            .iter_mut()
            .find(|q| q.id == quote_id)
            .ok_or_else(|| SourcingError::validation(format!("{quote_id} is not a quote on {rfq_id}")))?;
        quote.effective_prices = prices;
        tracing::debug!(
            "QuotePricesEdited rfq={} quote={} edited={}",
            rfq_id,
            quote_id,
            quote.is_edited()
        );
        Ok(quote.clone())
    }

    // --- Recommendation ---------------------------------------------------

    /// Cost-minimizing baseline for the RFQ's outstanding requirement.
    pub fn recommend(&self, rfq_id: RfqId) -> Result<Recommendation, SourcingError> {
        let handle = self.file(rfq_id)?;
        let fx = self.fetch_fx()?;
        let file = handle.lock().expect("rfq file mutex poisoned");
        let (_, recommendation) = file.recommendation(fx)?;
        tracing::debug!(
            "Recommendation rfq={} allocated={} shortfall={} cost={} fingerprint={}",
            rfq_id,
            recommendation.allocated_containers,
            recommendation.shortfall,
            recommendation.total_cost,
            format_fingerprint(recommendation.fingerprint())
        );
        Ok(recommendation)
    }

    // --- Finalization -----------------------------------------------------

    pub fn finalize(
        &self,
        rfq_id: RfqId,
        request: FinalizeRequest,
    ) -> Result<FinalizeOutcome, SourcingError> {
        self.finalize_at(rfq_id, request, epoch_ms())
    }

    pub fn finalize_at(
        &self,
        rfq_id: RfqId,
        request: FinalizeRequest,
        now_ms: u64,
    ) -> Result<FinalizeOutcome, SourcingError> {
        match self.finalize_locked(rfq_id, &request, now_ms) {
            Ok((outcome, notice)) => {
                self.metrics.record_commit(outcome.closed, outcome.deviated);
                tracing::debug!(
                    "AllocationCommitted rfq={} records={} allocated={} closed={} deviated={}",
                    rfq_id,
                    outcome.records.len(),
                    outcome.total_allocated,
                    outcome.closed,
                    outcome.deviated
                );
                if let Some(notice) = notice {
                    self.dispatch_notice(&notice);
                }
                Ok(outcome)
            }
            Err(err) => {
                self.metrics.record_rejection(&err);
                tracing::warn!("FinalizeRejected rfq={} error={}", rfq_id, err);
                Err(err)
            }
        }
    }

    fn finalize_locked(
        &self,
        rfq_id: RfqId,
        request: &FinalizeRequest,
        now_ms: u64,
    ) -> Result<(FinalizeOutcome, Option<ClosureNotice>), SourcingError> {
        let handle = self.file(rfq_id)?;

        // Cheap screen so closed RFQs fail without an FX round trip.
        {
            let file = handle.lock().expect("rfq file mutex poisoned");
            screen(rfq_id, file.lifecycle.status(), &file.ledger, request)?;
        }
        let fx = self.fetch_fx()?;

        let mut guard = handle.lock().expect("rfq file mutex poisoned");
        let file: &mut RfqFile = &mut guard;
        let (costings, recommendation) = file.recommendation(fx)?;
        let plan = plan_finalization(
            &PlanInputs {
                rfq: &file.rfq,
                status: file.lifecycle.status(),
                quotes: &file.quotes,
                ledger: &file.ledger,
                costings: &costings,
                recommendation: &recommendation,
            },
            request,
        )?;

        let entries = plan
            .deltas
            .iter()
            .map(|(quote_id, delta)| {
                file.quotes
                    .iter()
                    .find(|q| q.id == *quote_id)
                    .map(|quote| LedgerEntry {
                        quote,
                        delta: *delta,
                    })
                    .ok_or_else(|| {
                        SourcingError::validation(format!("{quote_id} is not a quote on {rfq_id}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let records = file.ledger.append_batch(
            &*self.journal,
            &entries,
            plan.reason.as_deref(),
            now_ms,
        )?;

        let closed = file.ledger.is_fully_allocated();
        let notice = if closed {
            file.lifecycle.apply(RfqEvent::FullyAllocated);
            tracing::info!(
                "RfqClosed rfq={} required={}",
                rfq_id,
                file.rfq.required_containers()
            );
            Some(file.closure_notice(now_ms))
        } else {
            None
        };

        let outcome = FinalizeOutcome {
            rfq_id,
            closed,
            total_allocated: file.ledger.total_allocated(),
            records,
            deviated: plan.deviation.is_deviation(),
            recommended_cost: plan.recommended_cost,
            proposed_cost: plan.proposed_cost,
        };
        Ok((outcome, notice))
    }

    fn dispatch_notice(&self, notice: &ClosureNotice) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(err) = notifier.notify_closure(notice, self.config.notify_timeout) {
            self.metrics.record_notify_failure();
            tracing::warn!(
                "ClosureNotifyFailed rfq={} error={}",
                notice.rfq_id,
                err
            );
        }
    }

    // --- Ledger views -----------------------------------------------------

    /// Summed allocation per quote across all commits.
    pub fn effective_allocation(
        &self,
        rfq_id: RfqId,
    ) -> Result<BTreeMap<QuoteId, SchemeSplit>, SourcingError> {
        self.lock(rfq_id, |file| file.ledger.recorded_totals().clone())
    }

    pub fn allocation_history(
        &self,
        rfq_id: RfqId,
    ) -> Result<Vec<AllocationRecord>, SourcingError> {
        self.lock(rfq_id, |file| file.ledger.records().to_vec())
    }

    pub fn total_allocated(&self, rfq_id: RfqId) -> Result<u64, SourcingError> {
        self.lock(rfq_id, |file| file.ledger.total_allocated())
    }

    // --- Internals --------------------------------------------------------

    fn fetch_fx(&self) -> Result<FxRate, SourcingError> {
        Ok(self.fx.fetch_rate(self.config.fx_fetch_timeout)?)
    }

    fn file(&self, rfq_id: RfqId) -> Result<Arc<Mutex<RfqFile>>, SourcingError> {
        self.rfqs
            .read()
            .expect("rfq map lock poisoned")
            .get(&rfq_id)
            .cloned()
            .ok_or_else(|| SourcingError::validation(format!("unknown {rfq_id}")))
    }

    fn lock<T>(&self, rfq_id: RfqId, f: impl FnOnce(&RfqFile) -> T) -> Result<T, SourcingError> {
        let handle = self.file(rfq_id)?;
        let file = handle.lock().expect("rfq file mutex poisoned");
        Ok(f(&file))
    }

    fn insert_file(&self, file: RfqFile) -> Result<(), SourcingError> {
        let rfq_id = file.rfq.id();
        let mut rfqs = self.rfqs.write().expect("rfq map lock poisoned");
        if rfqs.contains_key(&rfq_id) {
            return Err(SourcingError::validation(format!("{rfq_id} already exists")));
        }
        rfqs.insert(rfq_id, Arc::new(Mutex::new(file)));
        Ok(())
    }
}
