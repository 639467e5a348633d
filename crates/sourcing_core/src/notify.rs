//! Closure notification seam (`NotifyVendorsOnClosure`).
//!
//! Delivery is best-effort. A failure never rolls back a closure; the desk
//! logs it and bumps `notify_failures_total`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::SchemeSplit;
use crate::ids::{QuoteId, RfqId, VendorId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAllocation {
    pub vendor: VendorId,
    pub quote_id: QuoteId,
    pub split: SchemeSplit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureNotice {
    pub rfq_id: RfqId,
    pub required_containers: u32,
    /// Effective allocation per awarded quote.
    pub allocations: Vec<VendorAllocation>,
    pub closed_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification queue full")]
    QueueFull,
    #[error("notification channel disconnected")]
    Disconnected,
    #[error("notification timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },
    #[error("notification failed: {reason}")]
    Failed { reason: String },
}

/// Implementations must return within `timeout` and must not block on the RFQ.
pub trait ClosureNotifier: Send + Sync {
    fn notify_closure(&self, notice: &ClosureNotice, timeout: Duration) -> Result<(), NotifyError>;
}
