use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::QuoteItem;

/// Which price column won the precedence check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Approved,
    Negotiated,
    Initial,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub vat_pct: Decimal,
    pub total_with_vat: Decimal,
    pub source: PriceSource,
}

/// approved -> negotiated -> initial -> none.
pub fn resolve_price(item: &QuoteItem) -> Option<ResolvedPrice> {
    let (unit_price, source) = item
        .approved_price
        .map(|price| (price, PriceSource::Approved))
        .or_else(|| item.negotiated_price.map(|price| (price, PriceSource::Negotiated)))
        .or_else(|| item.initial_price.map(|price| (price, PriceSource::Initial)))?;

    Some(ResolvedPrice {
        unit_price,
        vat_pct: item.vat_pct,
        total_with_vat: with_vat(unit_price, item.vat_pct),
        source,
    })
}

/// VAT-inclusive amount, rounded to two decimals half away from zero. Always
/// derived from the unit price; never stored.
pub fn with_vat(unit_price: Decimal, vat_pct: Decimal) -> Decimal {
    (unit_price * (Decimal::ONE_HUNDRED + vat_pct) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// VAT-inclusive initial offer, the pre-negotiation floor candidate.
pub fn initial_total(item: &QuoteItem) -> Option<Decimal> {
    item.initial_price.map(|price| with_vat(price, item.vat_pct))
}
