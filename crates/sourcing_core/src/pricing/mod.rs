//! Price components, FX conversion and the cost model.

pub mod components;
pub mod cost_model;
pub mod fx;

pub use components::{PriceComponents, Scheme};
pub use cost_model::{CostModelError, CostTotals, compute_totals};
pub use fx::{FxFetchError, FxRate, FxRateSource, StaticFxRate};
