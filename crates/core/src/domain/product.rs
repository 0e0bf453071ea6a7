use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub specification: Option<String>,
    pub unit: String,
    pub category: Option<String>,
    /// Static catalog price, used only for the base-demand cost baseline.
    pub base_price: Option<Decimal>,
    /// Default comparison quantity when no kitchen demand overrides it.
    pub base_quantity: Option<Decimal>,
    pub active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn positive_base_quantity(&self) -> Option<Decimal> {
        self.base_quantity.filter(|quantity| *quantity > Decimal::ZERO)
    }
}
