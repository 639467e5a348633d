//! RFQ records, vendor quotes and the lifecycle state machine.

pub mod lifecycle;
pub mod model;
pub mod quote;

pub use lifecycle::{RfqEvent, RfqLifecycle, RfqStatus, TransitionResult};
pub use model::Rfq;
pub use quote::{Quote, QuoteSubmission};
