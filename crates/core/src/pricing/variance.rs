use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::fold_key;
use crate::domain::period::Period;
use crate::domain::price_history::PriceHistoryEntry;
use crate::domain::product::ProductId;
use crate::domain::supplier::SupplierId;
use crate::pricing::matrix::{MatrixCell, MatrixRow};
use crate::pricing::quantity::QuantityTier;

/// Signed difference against a baseline. Positive means the price went up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variance {
    pub baseline: Decimal,
    pub current: Decimal,
    pub difference: Decimal,
    /// Percentage of the baseline, rounded to two decimals for display.
    pub percent: Decimal,
}

/// `None` for a zero baseline.
pub fn calculate_variance(current: Decimal, baseline: Decimal) -> Option<Variance> {
    if baseline.is_zero() {
        return None;
    }
    let difference = current - baseline;
    Some(Variance {
        baseline,
        current,
        difference,
        percent: (difference / baseline * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    })
}

/// Recovers the baseline from a current value and an unrounded percentage.
/// `None` when the percentage is -100 (the baseline is unrecoverable).
pub fn baseline_from_variance(current: Decimal, percent: Decimal) -> Option<Decimal> {
    let factor = Decimal::ONE_HUNDRED + percent;
    if factor.is_zero() {
        return None;
    }
    Some(current * Decimal::ONE_HUNDRED / factor)
}

/// Latest approved price strictly before a period, per product and supplier,
/// restricted to one region.
#[derive(Clone, Debug, Default)]
pub struct PreviousPriceBook {
    prices: HashMap<(ProductId, SupplierId), (Period, Decimal)>,
}

impl PreviousPriceBook {
    pub fn from_history<'a, I>(region: &str, before: Period, history: I) -> Self
    where
        I: IntoIterator<Item = &'a PriceHistoryEntry>,
    {
        let region = fold_key(region);
        let mut prices: HashMap<(ProductId, SupplierId), (Period, Decimal)> = HashMap::new();
        for entry in history {
            if entry.period >= before || fold_key(&entry.region) != region {
                continue;
            }
            let key = (entry.product_id.clone(), entry.supplier_id.clone());
            match prices.get(&key) {
                Some((period, _)) if *period > entry.period => {}
                _ => {
                    prices.insert(key, (entry.period, entry.price));
                }
            }
        }
        Self { prices }
    }

    pub fn price(&self, product: &ProductId, supplier: &SupplierId) -> Option<Decimal> {
        self.prices.get(&(product.clone(), supplier.clone())).map(|(_, price)| *price)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierVariance {
    pub supplier_id: SupplierId,
    pub variance: Variance,
}

/// Up to three independent baselines for one matrix row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowVariance {
    /// Reference supplier the row-level figures are computed for.
    pub reference_supplier: Option<SupplierId>,
    /// Reference total vs the lowest VAT-inclusive initial offer.
    pub vs_base_price: Option<Variance>,
    /// Reference unit price vs the previous period's approved price.
    pub vs_previous_period: Option<Variance>,
    /// Cost at the resolved demand vs base price x base quantity.
    pub vs_base_demand: Option<Variance>,
    pub previous_by_supplier: Vec<SupplierVariance>,
}

impl RowVariance {
    pub fn has_previous(&self) -> bool {
        self.vs_previous_period.is_some()
    }
}

/// Computes a row's variances against the best cell, or against `focus` when the
/// caller pins a supplier.
pub fn row_variance(
    row: &MatrixRow,
    previous: &PreviousPriceBook,
    focus: Option<&SupplierId>,
) -> RowVariance {
    let reference = reference_cell(row, focus);
    let reference_price = reference.and_then(MatrixCell::price);

    let vs_base_price = reference_price
        .zip(row.min_initial_total)
        .and_then(|(price, base)| calculate_variance(price.total_with_vat, base));

    let vs_previous_period = reference.zip(reference_price).and_then(|(cell, price)| {
        previous
            .price(&row.product.id, &cell.supplier_id)
            .and_then(|baseline| calculate_variance(price.unit_price, baseline))
    });

    let vs_base_demand = match (&row.quantity, reference_price) {
        (Some(resolved), Some(price)) if resolved.tier == QuantityTier::TeamDemand => {
            row.product
                .base_price
                .zip(row.product.positive_base_quantity())
                .filter(|(_, base_quantity)| *base_quantity != resolved.quantity)
                .and_then(|(base_price, base_quantity)| {
                    calculate_variance(
                        price.total_with_vat * resolved.quantity,
                        base_price * base_quantity,
                    )
                })
        }
        _ => None,
    };

    let previous_by_supplier = row
        .cells
        .iter()
        .filter_map(|cell| {
            let price = cell.price()?;
            let baseline = previous.price(&row.product.id, &cell.supplier_id)?;
            calculate_variance(price.unit_price, baseline)
                .map(|variance| SupplierVariance { supplier_id: cell.supplier_id.clone(), variance })
        })
        .collect();

    RowVariance {
        reference_supplier: reference.map(|cell| cell.supplier_id.clone()),
        vs_base_price,
        vs_previous_period,
        vs_base_demand,
        previous_by_supplier,
    }
}

fn reference_cell<'a>(row: &'a MatrixRow, focus: Option<&SupplierId>) -> Option<&'a MatrixCell> {
    match focus {
        Some(supplier) => row.cell(supplier).filter(|cell| cell.price().is_some()),
        None => row.best_cell(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{baseline_from_variance, calculate_variance, row_variance, PreviousPriceBook};
    use crate::domain::period::Period;
    use crate::domain::price_history::{PriceHistoryEntry, PriceType};
    use crate::domain::product::ProductId;
    use crate::domain::quotation::{QuotationId, QuotationStatus};
    use crate::domain::supplier::SupplierId;
    use crate::domain::team::{Demand, TeamId};
    use crate::pricing::matrix::fixtures::{line, product, snapshot, Line};
    use crate::pricing::matrix::{build_matrix, MatrixOptions};
    use crate::pricing::quantity::QuantityResolver;

    fn history(product: &str, supplier: &str, period: &str, region: &str, price: i64) -> PriceHistoryEntry {
        PriceHistoryEntry {
            id: format!("h-{product}-{supplier}-{period}"),
            product_id: ProductId(format!("p-{product}")),
            supplier_id: SupplierId(format!("s-{supplier}")),
            period: period.parse().expect("period"),
            region: region.to_string(),
            price: Decimal::from(price),
            price_type: PriceType::Approved,
            quotation_id: QuotationId("old".to_string()),
            recorded_at: Utc.with_ymd_and_hms(2023, 12, 30, 0, 0, 0).single().expect("timestamp"),
        }
    }

    #[test]
    fn zero_baseline_is_undefined() {
        assert!(calculate_variance(Decimal::from(10), Decimal::ZERO).is_none());
    }

    #[test]
    fn sign_follows_price_direction() {
        let up = calculate_variance(Decimal::from(110), Decimal::from(100)).expect("variance");
        assert_eq!(up.difference, Decimal::from(10));
        assert_eq!(up.percent, Decimal::from(10));

        let down = calculate_variance(Decimal::from(90), Decimal::from(100)).expect("variance");
        assert_eq!(down.percent, Decimal::from(-10));
    }

    #[test]
    fn inverse_recovers_the_baseline() {
        let cases = [(99_750, 100_000), (50_000, 40_000), (1, 3), (250, 250)];
        for (current, baseline) in cases {
            let current = Decimal::from(current);
            let baseline = Decimal::from(baseline);
            let difference = current - baseline;
            let percent = difference / baseline * Decimal::ONE_HUNDRED;
            let recovered = baseline_from_variance(current, percent).expect("recoverable");
            assert!((recovered - baseline).abs() < Decimal::new(1, 6), "{recovered} vs {baseline}");
        }
        assert!(baseline_from_variance(Decimal::from(5), Decimal::from(-100)).is_none());
    }

    #[test]
    fn previous_book_takes_latest_period_before_target_in_region() {
        let before: Period = "2024-02-01".parse().expect("period");
        let rows = vec![
            history("P1", "S1", "2023-11-01", "North", 80),
            history("P1", "S1", "2024-01-01", "north", 90),
            history("P1", "S1", "2024-02-01", "North", 999),
            history("P1", "S1", "2024-01-01", "South", 1),
        ];
        let book = PreviousPriceBook::from_history("North", before, &rows);
        assert_eq!(
            book.price(&ProductId("p-P1".to_string()), &SupplierId("s-S1".to_string())),
            Some(Decimal::from(90))
        );
    }

    #[test]
    fn row_variance_uses_initial_floor_and_previous_history() {
        let snapshots = vec![
            snapshot(
                "S1",
                QuotationStatus::Negotiation,
                vec![Line { product: "P1", initial: Some(120), negotiated: Some(100), approved: None, vat: 0 }],
            ),
            snapshot("S2", QuotationStatus::Pending, vec![line("P1", Some(110))]),
        ];
        let products = vec![product("P1", "Dry")];
        let matrix = build_matrix(&snapshots, &products, &QuantityResolver::without_demand(), &MatrixOptions::default());
        let rows = vec![history("P1", "S1", "2023-12-01", "North", 80)];
        let book = PreviousPriceBook::from_history("North", "2024-01-01".parse().expect("period"), &rows);

        let variance = row_variance(&matrix.rows[0], &book, None);

        assert_eq!(variance.reference_supplier, Some(SupplierId("s-S1".to_string())));
        let base = variance.vs_base_price.expect("initial floor exists");
        assert_eq!(base.baseline, Decimal::from(110));
        assert_eq!(base.difference, Decimal::from(-10));
        let previous = variance.vs_previous_period.expect("history exists");
        assert_eq!(previous.percent, Decimal::from(25));
        assert_eq!(variance.previous_by_supplier.len(), 1);
        assert!(variance.vs_base_demand.is_none(), "no team demand in effect");
    }

    #[test]
    fn focus_supplier_without_history_has_no_previous_variance() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(100))]),
            snapshot("S2", QuotationStatus::Pending, vec![line("P1", Some(90))]),
        ];
        let products = vec![product("P1", "Dry")];
        let matrix = build_matrix(&snapshots, &products, &QuantityResolver::without_demand(), &MatrixOptions::default());
        let rows = vec![history("P1", "S2", "2023-12-01", "North", 100)];
        let book = PreviousPriceBook::from_history("North", "2024-01-01".parse().expect("period"), &rows);

        let focused = row_variance(&matrix.rows[0], &book, Some(&SupplierId("s-S1".to_string())));
        assert!(focused.vs_previous_period.is_none());
        assert_eq!(focused.vs_base_price.expect("base").percent, Decimal::new(1111, 2));
    }

    #[test]
    fn demand_override_compares_against_base_cost() {
        let mut p1 = product("P1", "Dry");
        p1.base_price = Some(Decimal::from(10));
        p1.base_quantity = Some(Decimal::from(20));
        let team = TeamId("kitchen-1".to_string());
        let period: Period = "2024-01-01".parse().expect("period");
        let resolver = QuantityResolver::new(
            Some(&team),
            period,
            vec![Demand {
                team_id: team.clone(),
                product_id: p1.id.clone(),
                period,
                quantity: Decimal::from(30),
            }],
        );
        let snapshots = vec![snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(12))])];
        let matrix = build_matrix(&snapshots, &[p1], &resolver, &MatrixOptions::default());

        let variance = row_variance(&matrix.rows[0], &PreviousPriceBook::default(), None);
        let demand = variance.vs_base_demand.expect("override in effect");
        assert_eq!(demand.baseline, Decimal::from(200));
        assert_eq!(demand.current, Decimal::from(360));
        assert_eq!(demand.percent, Decimal::from(80));
    }
}
