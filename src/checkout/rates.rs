//! Shipping rate candidates and the default pick.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One priced offer from the rate aggregator. Field aliases accept the
/// aggregator's own names (`object_id`, `provider`, `servicelevel`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingRate {
    #[serde(alias = "object_id", default)]
    pub rate_id: String,
    #[serde(alias = "provider")]
    pub provider_id: String,
    #[serde(alias = "servicelevel")]
    pub service_level: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub duration_terms: Option<String>,
    #[serde(default)]
    pub rating: Option<Decimal>,
}

/// Index of the cheapest candidate by numeric amount; ties go to the one
/// returned first. Currencies are not converted.
pub fn cheapest(rates: &[ShippingRate]) -> Option<usize> {
    rates.iter().enumerate().min_by(|(_, a), (_, b)| a.amount.cmp(&b.amount)).map(|(i, _)| i)
}
