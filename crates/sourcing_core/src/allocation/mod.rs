//! Allocation engine: recommendation, ledger, deviation gate, finalization.

pub mod deviation;
pub mod finalize;
pub mod ledger;
pub mod recommend;
pub mod split;

pub use deviation::{DeviationReport, detect_deviation, require_reason};
pub use finalize::{
    FinalizeMetrics, FinalizeOutcome, FinalizePlan, FinalizeRequest, PlanInputs,
    plan_finalization, screen,
};
pub use ledger::{
    AllocationJournal, AllocationRecord, JournalError, LedgerEntry, MemoryJournal, RfqLedger,
};
pub use recommend::{
    QuoteCosting, Recommendation, RecommendedLine, recommend, snapshot_cost,
};
pub use split::{AllocationSnapshot, SchemeSplit};
