use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::period::Period;
use crate::domain::product::{Product, ProductId};
use crate::domain::team::{Demand, TeamId};

/// The fallback tier that produced a comparison quantity. Part of the output
/// contract so callers can show where a number came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityTier {
    TeamDemand,
    BaseQuantity,
    QuoteLine,
}

impl QuantityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamDemand => "team_demand",
            Self::BaseQuantity => "base_quantity",
            Self::QuoteLine => "quote_line",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedQuantity {
    pub quantity: Decimal,
    pub tier: QuantityTier,
}

/// Resolves comparison quantities for one period and, optionally, one team.
#[derive(Clone, Debug, Default)]
pub struct QuantityResolver {
    demand: HashMap<ProductId, Decimal>,
}

impl QuantityResolver {
    /// Keeps only demand rows for `team` in `period`. Without a team no demand applies.
    pub fn new<I>(team: Option<&TeamId>, period: Period, demands: I) -> Self
    where
        I: IntoIterator<Item = Demand>,
    {
        let demand = match team {
            Some(team) => demands
                .into_iter()
                .filter(|demand| &demand.team_id == team && demand.period == period)
                .map(|demand| (demand.product_id, demand.quantity))
                .collect(),
            None => HashMap::new(),
        };
        Self { demand }
    }

    pub fn without_demand() -> Self {
        Self::default()
    }

    /// Team demand > product base quantity > the line's own quantity; first positive wins.
    pub fn resolve(
        &self,
        product: &Product,
        line_quantity: Option<Decimal>,
    ) -> Option<ResolvedQuantity> {
        let positive = |value: &Decimal| *value > Decimal::ZERO;

        if let Some(quantity) = self.demand.get(&product.id).copied().filter(positive) {
            return Some(ResolvedQuantity { quantity, tier: QuantityTier::TeamDemand });
        }
        if let Some(quantity) = product.base_quantity.filter(positive) {
            return Some(ResolvedQuantity { quantity, tier: QuantityTier::BaseQuantity });
        }
        line_quantity
            .filter(positive)
            .map(|quantity| ResolvedQuantity { quantity, tier: QuantityTier::QuoteLine })
    }
}
