use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::period::Period;
use crate::domain::product::ProductId;
use crate::domain::quotation::{Quotation, QuotationId, QuoteItem};
use crate::domain::supplier::SupplierId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Approved,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
        }
    }
}

/// Append-only ledger row. Written once by an approval transition, never updated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: String,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub period: Period,
    pub region: String,
    pub price: Decimal,
    pub price_type: PriceType,
    pub quotation_id: QuotationId,
    pub recorded_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    /// One entry per item carrying an approved price; items without one are skipped.
    pub fn from_approval(
        quotation: &Quotation,
        items: &[QuoteItem],
        recorded_at: DateTime<Utc>,
    ) -> Vec<Self> {
        items
            .iter()
            .filter_map(|item| {
                item.approved_price.map(|price| Self {
                    id: Uuid::new_v4().to_string(),
                    product_id: item.product_id.clone(),
                    supplier_id: quotation.supplier_id.clone(),
                    period: quotation.period,
                    region: quotation.region.clone(),
                    price,
                    price_type: PriceType::Approved,
                    quotation_id: quotation.id.clone(),
                    recorded_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{PriceHistoryEntry, PriceType};
    use crate::domain::product::ProductId;
    use crate::domain::quotation::{
        Quotation, QuotationId, QuotationStatus, QuoteItem, QuoteItemId,
    };
    use crate::domain::supplier::SupplierId;

    fn item(id: &str, approved: Option<i64>) -> QuoteItem {
        QuoteItem {
            id: QuoteItemId(id.to_string()),
            quotation_id: QuotationId("qt-1".to_string()),
            product_id: ProductId(format!("p-{id}")),
            quantity: Decimal::ONE,
            initial_price: Some(Decimal::from(60_000)),
            negotiated_price: None,
            approved_price: approved.map(Decimal::from),
            vat_pct: Decimal::ZERO,
            negotiation_round: 0,
            approved_at: None,
            approved_by: None,
            notes: None,
        }
    }

    #[test]
    fn approval_writes_one_entry_per_approved_price() {
        let quotation = Quotation {
            id: QuotationId("qt-1".to_string()),
            code: "Q-202401-NORTH-S1".to_string(),
            period: "2024-01-01".parse().expect("period"),
            region: "North".to_string(),
            category: None,
            supplier_id: SupplierId("sup-1".to_string()),
            status: QuotationStatus::Negotiation,
            version: 3,
            quote_date: NaiveDate::from_ymd_opt(2024, 1, 3).expect("date"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = [item("a", Some(50_000)), item("b", None), item("c", Some(30_000))];

        let entries = PriceHistoryEntry::from_approval(&quotation, &items, Utc::now());

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.price_type == PriceType::Approved));
        assert_eq!(entries[0].price, Decimal::from(50_000));
        assert_eq!(entries[1].product_id, ProductId("p-c".to_string()));
        assert_eq!(entries[1].region, "North");
    }
}
