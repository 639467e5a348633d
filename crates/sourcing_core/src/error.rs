//! Error taxonomy for the allocation engine.
//!
//! - `Validation` and `CapacityExceeded` are surfaced verbatim; nothing is clamped.
//! - `AlreadyFinalized` is terminal: callers must not retry.
//! - `UpstreamUnavailable` is the only retryable class. The engine itself never retries.

use std::fmt;

use thiserror::Error;

use crate::ids::{QuoteId, RfqId};

pub type SourcingResult<T> = Result<T, SourcingError>;

/// Which limit a capacity check ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityScope {
    /// The RFQ's required container count.
    Requirement(RfqId),
    /// A single quote's offered container count (both schemes combined).
    QuoteOffer(QuoteId),
}

impl fmt::Display for CapacityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requirement(rfq_id) => write!(f, "{rfq_id} requirement"),
            Self::QuoteOffer(quote_id) => write!(f, "{quote_id} offer"),
        }
    }
}

/// External collaborator that failed to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    FxRate,
    Persistence,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FxRate => f.write_str("fx rate source"),
            Self::Persistence => f.write_str("allocation journal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcingError {
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("{scope} exceeded: requested {requested}, limit {limit}")]
    CapacityExceeded {
        scope: CapacityScope,
        requested: u64,
        limit: u64,
    },

    #[error("{rfq_id} is already finalized")]
    AlreadyFinalized { rfq_id: RfqId },

    #[error("{upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: Upstream, reason: String },
}

impl SourcingError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Only upstream outages may be retried (with caller-side backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AlreadyFinalized { .. })
    }
}
