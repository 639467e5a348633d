//! Named per-container price components of a vendor quote.

use serde::{Deserialize, Serialize};

/// Customs/logistics scheme a container is priced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Standard customs handling.
    A,
    /// Bonded-warehouse customs handling.
    B,
}

impl Scheme {
    /// Tie-break order: Scheme A before Scheme B.
    pub const ALL: [Scheme; 2] = [Scheme::A, Scheme::B];

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::A => "A",
            Scheme::B => "B",
        }
    }
}

/// Fixed set of per-container price components.
///
/// `sea_freight` is quoted in the vendor's foreign currency; every other
/// component is INR. Free-form adjustments are not representable: a new
/// charge needs a new named field here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceComponents {
    /// Ocean freight, foreign currency.
    pub sea_freight: f64,
    /// Delivery-order handling.
    pub hdo: f64,
    /// Container freight station charges.
    pub cfs: f64,
    /// Inland transport.
    pub transport: f64,
    /// Electronic data interchange filing.
    pub edi: f64,
    /// Charged only under Scheme A.
    pub scheme_a_charge: f64,
    /// Charged only under Scheme B.
    pub scheme_b_charge: f64,
    /// Bonded warehousing, charged only under Scheme B.
    pub scheme_b_warehousing: f64,
}

impl PriceComponents {
    /// Components paired with their field names, in declaration order.
    pub fn named(&self) -> [(&'static str, f64); 8] {
        [
            ("sea_freight", self.sea_freight),
            ("hdo", self.hdo),
            ("cfs", self.cfs),
            ("transport", self.transport),
            ("edi", self.edi),
            ("scheme_a_charge", self.scheme_a_charge),
            ("scheme_b_charge", self.scheme_b_charge),
            ("scheme_b_warehousing", self.scheme_b_warehousing),
        ]
    }

    /// First component that is negative or non-finite, if any.
    pub fn first_invalid(&self) -> Option<&'static str> {
        self.named()
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
            .map(|(name, _)| name)
    }
}
