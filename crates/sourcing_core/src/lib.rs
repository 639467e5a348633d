#![forbid(unsafe_code)]

pub mod allocation;
pub mod clock;
pub mod desk;
pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod notify;
pub mod pricing;
pub mod rfq;

pub use desk::{FinalizeConfig, SourcingDesk};
pub use error::{CapacityScope, SourcingError, SourcingResult, Upstream};
pub use ids::{QuoteId, RfqId, VendorId};
