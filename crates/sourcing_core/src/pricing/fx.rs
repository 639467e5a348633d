//! Foreign-exchange rate type and the rate-source seam.
//!
//! The engine treats a failed fetch as fatal to the current call only. Any
//! last-known-good substitution policy belongs to the source implementation,
//! never to the cost model.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{SourcingError, Upstream};

/// A positive, finite conversion rate (foreign currency -> INR).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct FxRate(f64);

impl FxRate {
    pub fn new(rate: f64) -> Option<Self> {
        (rate.is_finite() && rate > 0.0).then_some(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn convert(self, foreign_amount: f64) -> f64 {
        self.0 * foreign_amount
    }
}

impl TryFrom<f64> for FxRate {
    type Error = FxFetchError;

    fn try_from(rate: f64) -> Result<Self, Self::Error> {
        FxRate::new(rate).ok_or(FxFetchError::InvalidRate { rate })
    }
}

impl From<FxRate> for f64 {
    fn from(rate: FxRate) -> Self {
        rate.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxFetchError {
    #[error("fx rate fetch timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },
    #[error("fx rate unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("fx rate {rate} is not a positive finite number")]
    InvalidRate { rate: f64 },
}

impl From<FxFetchError> for SourcingError {
    fn from(err: FxFetchError) -> Self {
        SourcingError::UpstreamUnavailable {
            upstream: Upstream::FxRate,
            reason: err.to_string(),
        }
    }
}

/// External collaborator answering `GetForeignExchangeRate`.
///
/// Implementations must return within `timeout`.
pub trait FxRateSource: Send + Sync {
    fn fetch_rate(&self, timeout: Duration) -> Result<FxRate, FxFetchError>;
}

/// Source that always answers with one fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct StaticFxRate(pub FxRate);

impl FxRateSource for StaticFxRate {
    fn fetch_rate(&self, _timeout: Duration) -> Result<FxRate, FxFetchError> {
        Ok(self.0)
    }
}
