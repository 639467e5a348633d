//! Vendor quotes against an RFQ.
//!
//! A quote keeps the vendor-submitted prices alongside the effective prices
//! used for costing. Operator edits only touch the effective prices, so an
//! edit is always detectable by comparing the two.

use serde::{Deserialize, Serialize};

use crate::error::SourcingError;
use crate::ids::{QuoteId, RfqId, VendorId};
use crate::pricing::{CostModelError, CostTotals, FxRate, PriceComponents, compute_totals};

/// Vendor payload for `submit_quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSubmission {
    pub vendor: VendorId,
    /// Maximum containers that may be allocated against this quote, across both schemes.
    pub offered_containers: u32,
    pub prices: PriceComponents,
}

impl QuoteSubmission {
    pub fn validate(&self) -> Result<(), SourcingError> {
        if self.offered_containers == 0 {
            return Err(SourcingError::validation(format!(
                "vendor {} must offer at least one container",
                self.vendor
            )));
        }
        validate_prices(&self.prices)
    }
}

pub(crate) fn validate_prices(prices: &PriceComponents) -> Result<(), SourcingError> {
    match prices.first_invalid() {
        Some(name) => Err(CostModelError::InvalidComponent(name).into()),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub rfq_id: RfqId,
    pub vendor: VendorId,
    pub offered_containers: u32,
    pub submitted_prices: PriceComponents,
    pub effective_prices: PriceComponents,
    pub submitted_at_ms: u64,
}

impl Quote {
    pub fn from_submission(
        id: QuoteId,
        rfq_id: RfqId,
        submission: QuoteSubmission,
        submitted_at_ms: u64,
    ) -> Self {
        Self {
            id,
            rfq_id,
            vendor: submission.vendor,
            offered_containers: submission.offered_containers,
            submitted_prices: submission.prices,
            effective_prices: submission.prices,
            submitted_at_ms,
        }
    }

    /// Whether an operator changed any price relative to the vendor's submission.
    pub fn is_edited(&self) -> bool {
        self.effective_prices != self.submitted_prices
    }

    /// Scheme totals from the effective prices.
    pub fn totals(&self, fx: Option<FxRate>) -> Result<CostTotals, CostModelError> {
        compute_totals(&self.effective_prices, fx)
    }
}
