//! Per-container cost totals under both schemes.
//!
//! `total_a = fx*sea_freight + hdo + cfs + transport + edi + scheme_a_charge`
//! `total_b = fx*sea_freight + hdo + cfs + transport + edi + scheme_b_warehousing + scheme_b_charge`
//!
//! No rounding is applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::SchemeSplit;
use crate::error::{SourcingError, Upstream};
use crate::pricing::{FxRate, PriceComponents, Scheme};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostTotals {
    pub total_a: f64,
    pub total_b: f64,
}

impl CostTotals {
    pub fn per_container(&self, scheme: Scheme) -> f64 {
        match scheme {
            Scheme::A => self.total_a,
            Scheme::B => self.total_b,
        }
    }

    /// Cost of allocating `split` containers at these per-container totals.
    pub fn line_cost(&self, split: SchemeSplit) -> f64 {
        f64::from(split.a) * self.total_a + f64::from(split.b) * self.total_b
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostModelError {
    #[error("fx rate unavailable")]
    FxRateUnavailable,
    #[error("price component '{0}' is not a finite non-negative amount")]
    InvalidComponent(&'static str),
}

impl From<CostModelError> for SourcingError {
    fn from(err: CostModelError) -> Self {
        match err {
            CostModelError::FxRateUnavailable => SourcingError::UpstreamUnavailable {
                upstream: Upstream::FxRate,
                reason: err.to_string(),
            },
            CostModelError::InvalidComponent(_) => SourcingError::validation(err.to_string()),
        }
    }
}

/// Compute both scheme totals. A missing rate is an error, never a default.
pub fn compute_totals(
    components: &PriceComponents,
    fx: Option<FxRate>,
) -> Result<CostTotals, CostModelError> {
    let fx = fx.ok_or(CostModelError::FxRateUnavailable)?;
    if let Some(name) = components.first_invalid() {
        return Err(CostModelError::InvalidComponent(name));
    }

    let shared = fx.convert(components.sea_freight)
        + components.hdo
        + components.cfs
        + components.transport
        + components.edi;

    Ok(CostTotals {
        total_a: shared + components.scheme_a_charge,
        total_b: shared + components.scheme_b_warehousing + components.scheme_b_charge,
    })
}
