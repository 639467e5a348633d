//! Deviation detection for operator-submitted allocations.
//!
//! A finalization deviates when its snapshot differs from the current
//! recommendation for any (quote, scheme) pair, or when any quote on the RFQ
//! is priced from operator-edited components. A deviation needs a non-empty
//! reason.

use std::collections::BTreeSet;

use crate::allocation::{AllocationSnapshot, Recommendation};
use crate::error::SourcingError;
use crate::ids::QuoteId;
use crate::rfq::Quote;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviationReport {
    /// Quotes whose proposed split differs from the recommended split.
    pub differing_quotes: Vec<QuoteId>,
    /// Quotes whose effective prices differ from the vendor submission.
    pub edited_quotes: Vec<QuoteId>,
}

impl DeviationReport {
    pub fn is_deviation(&self) -> bool {
        !self.differing_quotes.is_empty() || !self.edited_quotes.is_empty()
    }
}

pub fn detect_deviation(
    proposed: &AllocationSnapshot,
    recommendation: &Recommendation,
    quotes: &[Quote],
) -> DeviationReport {
    let candidates: BTreeSet<QuoteId> = proposed
        .quote_ids()
        .chain(recommendation.lines.iter().map(|line| line.quote_id))
        .collect();

    let differing_quotes = candidates
        .into_iter()
        .filter(|id| proposed.get(*id) != recommendation.split_for(*id))
        .collect();
    let edited_quotes = quotes
        .iter()
        .filter(|q| q.is_edited())
        .map(|q| q.id)
        .collect();

    DeviationReport {
        differing_quotes,
        edited_quotes,
    }
}

/// Normalize the supplied reason, requiring one when the report is a deviation.
pub fn require_reason(
    report: &DeviationReport,
    reason: Option<&str>,
) -> Result<Option<String>, SourcingError> {
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    if report.is_deviation() && reason.is_none() {
        return Err(SourcingError::validation(format!(
            "allocation deviates from the recommendation (differing: {:?}, edited prices: {:?}); a reason is required",
            report.differing_quotes, report.edited_quotes
        )));
    }
    Ok(reason.map(str::to_string))
}
