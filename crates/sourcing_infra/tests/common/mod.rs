#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sourcing_core::allocation::AllocationRecord;
use sourcing_core::pricing::{FxFetchError, FxRate, FxRateSource, PriceComponents};
use sourcing_core::rfq::QuoteSubmission;
use sourcing_core::{QuoteId, RfqId, VendorId};

pub fn temp_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "sourcing_{tag}_{}_{}.jsonl",
        std::process::id(),
        nanos
    ))
}

pub fn remove_if_exists(path: &Path) {
    let _ = std::fs::remove_file(path);
}

pub fn record(rfq: u64, seq: u64, quote: u64, a: u32, b: u32) -> AllocationRecord {
    AllocationRecord {
        seq,
        rfq_id: RfqId(rfq),
        quote_id: QuoteId(quote),
        vendor: VendorId::new(format!("V{quote}")),
        scheme_a: a,
        scheme_b: b,
        reason: None,
        committed_at_ms: 1_000 * seq,
    }
}

pub fn submission(vendor: &str, offered: u32, total_a: f64, total_b: f64) -> QuoteSubmission {
    QuoteSubmission {
        vendor: VendorId::new(vendor),
        offered_containers: offered,
        prices: PriceComponents {
            sea_freight: 0.0,
            hdo: 0.0,
            cfs: 0.0,
            transport: 0.0,
            edi: 0.0,
            scheme_a_charge: total_a,
            scheme_b_charge: total_b,
            scheme_b_warehousing: 0.0,
        },
    }
}

pub fn rate(value: f64) -> FxRate {
    FxRate::new(value).unwrap()
}

/// FX source that answers from a script, then keeps failing.
#[derive(Debug, Default)]
pub struct ScriptedFx {
    answers: Mutex<VecDeque<Result<FxRate, FxFetchError>>>,
}

impl ScriptedFx {
    pub fn new(answers: impl IntoIterator<Item = Result<FxRate, FxFetchError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
        }
    }

    pub fn push(&self, answer: Result<FxRate, FxFetchError>) {
        self.answers.lock().unwrap().push_back(answer);
    }
}

impl FxRateSource for ScriptedFx {
    fn fetch_rate(&self, timeout: Duration) -> Result<FxRate, FxFetchError> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FxFetchError::Timeout {
                waited_ms: timeout.as_millis() as u64,
            }))
    }
}

pub fn down() -> Result<FxRate, FxFetchError> {
    Err(FxFetchError::Unavailable {
        reason: "rate feed offline".to_string(),
    })
}
