use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::period::Period;
use crate::domain::product::ProductId;
use crate::domain::supplier::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamKind {
    Kitchen,
    Other,
}

impl TeamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kitchen => "kitchen",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TeamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "kitchen" => Ok(Self::Kitchen),
            "other" => Ok(Self::Other),
            other => Err(DomainError::validation(
                "team_kind",
                format!("unsupported team kind `{other}` (expected kitchen|other)"),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub code: String,
    pub name: String,
    pub region: Option<String>,
    pub kind: TeamKind,
    pub active: bool,
}

impl Team {
    /// Region with surrounding whitespace removed; blank regions count as missing.
    pub fn configured_region(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|region| !region.is_empty())
    }
}

/// Permission for a supplier to price for a team. Toggled, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceScope {
    pub supplier_id: SupplierId,
    pub team_id: TeamId,
    pub active: bool,
}

/// Kitchen-specific quantity override for one product in one period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub team_id: TeamId,
    pub product_id: ProductId,
    pub period: Period,
    pub quantity: Decimal,
}
