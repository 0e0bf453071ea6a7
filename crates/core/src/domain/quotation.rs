use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::period::Period;
use crate::domain::product::ProductId;
use crate::domain::supplier::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuoteItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Pending,
    Negotiation,
    Approved,
    Cancelled,
}

impl QuotationStatus {
    pub const ALL: [QuotationStatus; 4] =
        [Self::Pending, Self::Negotiation, Self::Approved, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Negotiation => "negotiation",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Negotiation)
                | (Self::Pending, Self::Approved)
                | (Self::Negotiation, Self::Approved)
                | (Self::Pending, Self::Cancelled)
                | (Self::Negotiation, Self::Cancelled)
                | (Self::Approved, Self::Cancelled)
        )
    }

    /// Price fields a caller may still change while the quotation is in this state.
    pub fn mutable_price_fields(&self) -> &'static [PriceField] {
        match self {
            Self::Pending => &[
                PriceField::Initial,
                PriceField::Negotiated,
                PriceField::Approved,
                PriceField::Vat,
            ],
            Self::Negotiation => &[PriceField::Negotiated, PriceField::Approved],
            Self::Approved | Self::Cancelled => &[],
        }
    }

    pub fn allows_price_field(&self, field: PriceField) -> bool {
        self.mutable_price_fields().contains(&field)
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status values are exact and case-sensitive.
impl FromStr for QuotationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|status| status.as_str() == value).ok_or_else(|| {
            DomainError::validation(
                "status",
                format!("unknown quotation status `{value}` (expected pending|negotiation|approved|cancelled)"),
            )
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Initial,
    Negotiated,
    Approved,
    Vat,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial_price",
            Self::Negotiated => "negotiated_price",
            Self::Approved => "approved_price",
            Self::Vat => "vat_pct",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub code: String,
    pub period: Period,
    pub region: String,
    pub category: Option<String>,
    pub supplier_id: SupplierId,
    pub status: QuotationStatus,
    /// Incremented on every status change; transitions compare-and-swap on it.
    pub version: i64,
    pub quote_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn generate_code(period: &Period, region: &str, supplier_code: &str) -> String {
        format!(
            "Q-{}-{}-{}",
            period.month_key(),
            crate::domain::normalize_code(region).replace(' ', "_"),
            crate::domain::normalize_code(supplier_code)
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            self.version += 1;
            return Ok(());
        }

        Err(DomainError::InvalidQuotationTransition { from: self.status, to: next })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: QuoteItemId,
    pub quotation_id: QuotationId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub initial_price: Option<Decimal>,
    pub negotiated_price: Option<Decimal>,
    pub approved_price: Option<Decimal>,
    pub vat_pct: Decimal,
    pub negotiation_round: u32,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub notes: Option<String>,
}

/// Requested edit of one line item's prices. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub initial_price: Option<Decimal>,
    pub negotiated_price: Option<Decimal>,
    pub approved_price: Option<Decimal>,
    pub vat_pct: Option<Decimal>,
}

impl PriceUpdate {
    pub fn touched_fields(&self) -> Vec<PriceField> {
        [
            (self.initial_price.is_some(), PriceField::Initial),
            (self.negotiated_price.is_some(), PriceField::Negotiated),
            (self.approved_price.is_some(), PriceField::Approved),
            (self.vat_pct.is_some(), PriceField::Vat),
        ]
        .into_iter()
        .filter_map(|(touched, field)| touched.then_some(field))
        .collect()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            (PriceField::Initial, self.initial_price),
            (PriceField::Negotiated, self.negotiated_price),
            (PriceField::Approved, self.approved_price),
        ] {
            if value.is_some_and(|price| price < Decimal::ZERO) {
                return Err(DomainError::validation(field.as_str(), "price must not be negative"));
            }
        }
        if let Some(vat) = self.vat_pct {
            if vat < Decimal::ZERO || vat > Decimal::ONE_HUNDRED {
                return Err(DomainError::validation("vat_pct", "VAT must be within 0..=100"));
            }
        }
        Ok(())
    }
}

impl QuoteItem {
    /// Applies a price edit under the status gate. Negotiated prices set during
    /// negotiation open a new round.
    pub fn apply_price_update(
        &mut self,
        status: QuotationStatus,
        update: &PriceUpdate,
    ) -> Result<(), DomainError> {
        update.validate()?;
        if let Some(field) =
            update.touched_fields().into_iter().find(|field| !status.allows_price_field(*field))
        {
            return Err(DomainError::PriceFieldLocked { status, field });
        }

        if let Some(price) = update.initial_price {
            self.initial_price = Some(price);
        }
        if let Some(price) = update.negotiated_price {
            self.negotiated_price = Some(price);
            if status == QuotationStatus::Negotiation {
                self.negotiation_round += 1;
            }
        }
        if let Some(price) = update.approved_price {
            self.approved_price = Some(price);
        }
        if let Some(vat) = update.vat_pct {
            self.vat_pct = vat;
        }
        Ok(())
    }
}
