#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sourcing_core::allocation::{AllocationJournal, AllocationRecord, JournalError, MemoryJournal};
use sourcing_core::notify::{ClosureNotice, ClosureNotifier, NotifyError};
use sourcing_core::pricing::{FxFetchError, FxRate, FxRateSource, PriceComponents, StaticFxRate};
use sourcing_core::rfq::QuoteSubmission;
use sourcing_core::{FinalizeConfig, QuoteId, RfqId, SourcingDesk, VendorId};

/// Prices whose totals at fx=1.0 are exactly `total_a` / `total_b`.
pub fn prices_with_totals(total_a: f64, total_b: f64) -> PriceComponents {
    PriceComponents {
        sea_freight: 0.0,
        hdo: 0.0,
        cfs: 0.0,
        transport: 0.0,
        edi: 0.0,
        scheme_a_charge: total_a,
        scheme_b_charge: total_b,
        scheme_b_warehousing: 0.0,
    }
}

pub fn submission(vendor: &str, offered: u32, total_a: f64, total_b: f64) -> QuoteSubmission {
    QuoteSubmission {
        vendor: VendorId::new(vendor),
        offered_containers: offered,
        prices: prices_with_totals(total_a, total_b),
    }
}

pub fn unit_fx() -> Arc<dyn FxRateSource> {
    Arc::new(StaticFxRate(FxRate::new(1.0).unwrap()))
}

pub fn desk_with_journal(journal: Arc<dyn AllocationJournal>) -> SourcingDesk {
    SourcingDesk::new(journal, unit_fx(), FinalizeConfig::default())
}

pub fn desk() -> SourcingDesk {
    desk_with_journal(Arc::new(MemoryJournal::new()))
}

pub struct Scenario {
    pub desk: SourcingDesk,
    pub journal: Arc<MemoryJournal>,
    pub rfq: RfqId,
    pub v1: QuoteId,
    pub v2: QuoteId,
}

/// RFQ requiring 10; V1 offers 6 at A=100/B=120; V2 offers 8 at A=110/B=90.
pub fn two_vendor_scenario() -> Scenario {
    let journal = Arc::new(MemoryJournal::new());
    let desk = desk_with_journal(journal.clone());
    let rfq = RfqId(1);
    desk.create_rfq_at(rfq, 10, 1_000).unwrap();
    let v1 = desk
        .submit_quote_at(rfq, submission("V1", 6, 100.0, 120.0), 2_000)
        .unwrap()
        .id;
    let v2 = desk
        .submit_quote_at(rfq, submission("V2", 8, 110.0, 90.0), 2_100)
        .unwrap()
        .id;
    Scenario {
        desk,
        journal,
        rfq,
        v1,
        v2,
    }
}

/// Journal whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingJournal;

impl AllocationJournal for FailingJournal {
    fn record_batch(&self, _records: &[AllocationRecord]) -> Result<(), JournalError> {
        Err(JournalError::WriteFailed {
            reason: "disk unavailable".to_string(),
        })
    }

    fn history(&self, _rfq_id: RfqId) -> Result<Vec<AllocationRecord>, JournalError> {
        Ok(Vec::new())
    }
}

/// FX source that is always down.
#[derive(Debug, Default)]
pub struct FailingFx;

impl FxRateSource for FailingFx {
    fn fetch_rate(&self, timeout: Duration) -> Result<FxRate, FxFetchError> {
        Err(FxFetchError::Timeout {
            waited_ms: timeout.as_millis() as u64,
        })
    }
}

/// Notifier that records every notice it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<ClosureNotice>>,
}

impl ClosureNotifier for RecordingNotifier {
    fn notify_closure(&self, notice: &ClosureNotice, _timeout: Duration) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Notifier that always fails.
#[derive(Debug, Default)]
pub struct BrokenNotifier;

impl ClosureNotifier for BrokenNotifier {
    fn notify_closure(&self, _notice: &ClosureNotice, _timeout: Duration) -> Result<(), NotifyError> {
        Err(NotifyError::Failed {
            reason: "smtp relay down".to_string(),
        })
    }
}
