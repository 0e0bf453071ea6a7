use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::normalize_code;
use crate::domain::product::{Product, ProductId};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus, QuoteItem, QuoteItemId};
use crate::domain::supplier::{Supplier, SupplierId};
use crate::errors::DomainError;
use crate::pricing::price::{initial_total, resolve_price, ResolvedPrice};
use crate::pricing::quantity::{QuantityResolver, ResolvedQuantity};

/// A quotation with its supplier and line items, as loaded for comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationSnapshot {
    pub quotation: Quotation,
    pub supplier: Supplier,
    pub items: Vec<QuoteItem>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Equal totals go to the supplier with the lowest code (case-insensitive).
    #[default]
    LowestSupplierCode,
    /// Equal totals go to the supplier scanned last in roster order.
    LastEncountered,
}

impl FromStr for TieBreak {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lowest_supplier_code" => Ok(Self::LowestSupplierCode),
            "last_encountered" => Ok(Self::LastEncountered),
            other => Err(DomainError::validation(
                "tie_break",
                format!("unsupported tie break `{other}` (expected lowest_supplier_code|last_encountered)"),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Every status except cancelled.
    #[default]
    Working,
    /// Approved quotations only.
    ApprovalReady,
}

impl ComparisonMode {
    pub fn admits(&self, status: QuotationStatus) -> bool {
        match self {
            Self::Working => status != QuotationStatus::Cancelled,
            Self::ApprovalReady => status == QuotationStatus::Approved,
        }
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Working => "working",
            Self::ApprovalReady => "approval_ready",
        })
    }
}

impl FromStr for ComparisonMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "working" => Ok(Self::Working),
            "approval_ready" | "approved" => Ok(Self::ApprovalReady),
            other => Err(DomainError::validation(
                "mode",
                format!("unsupported comparison mode `{other}` (expected working|approval_ready)"),
            )),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MatrixOptions {
    pub mode: ComparisonMode,
    /// When set, only these suppliers participate.
    pub supplier_scope: Option<BTreeSet<SupplierId>>,
    pub tie_break: TieBreak,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierColumn {
    pub supplier_id: SupplierId,
    pub code: String,
    pub name: String,
    pub contact: String,
    pub quotation_ids: Vec<QuotationId>,
    pub quoted_products: usize,
    pub total_products: usize,
    pub coverage_pct: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCell {
    pub quotation_id: QuotationId,
    pub item_id: QuoteItemId,
    pub line_quantity: Decimal,
    /// `None` renders as "not yet quoted".
    pub price: Option<ResolvedPrice>,
    pub initial_total: Option<Decimal>,
    pub is_best: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub supplier_id: SupplierId,
    /// `None` when the supplier has no line item for the product.
    pub quote: Option<PriceCell>,
}

impl MatrixCell {
    pub fn total(&self) -> Option<Decimal> {
        self.quote.as_ref().and_then(|quote| quote.price.as_ref()).map(|price| price.total_with_vat)
    }

    pub fn price(&self) -> Option<&ResolvedPrice> {
        self.quote.as_ref().and_then(|quote| quote.price.as_ref())
    }

    pub fn is_best(&self) -> bool {
        self.quote.as_ref().is_some_and(|quote| quote.is_best)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub product: Product,
    /// One cell per roster supplier, in roster order.
    pub cells: Vec<MatrixCell>,
    pub best_supplier: Option<SupplierId>,
    pub best_total: Option<Decimal>,
    /// Lowest VAT-inclusive initial offer across suppliers.
    pub min_initial_total: Option<Decimal>,
    pub quantity: Option<ResolvedQuantity>,
}

impl MatrixRow {
    pub fn cell(&self, supplier_id: &SupplierId) -> Option<&MatrixCell> {
        self.cells.iter().find(|cell| &cell.supplier_id == supplier_id)
    }

    pub fn best_cell(&self) -> Option<&MatrixCell> {
        self.cells.iter().find(|cell| cell.is_best())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonMatrix {
    pub suppliers: Vec<SupplierColumn>,
    pub rows: Vec<MatrixRow>,
}

impl ComparisonMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn supplier(&self, supplier_id: &SupplierId) -> Option<&SupplierColumn> {
        self.suppliers.iter().find(|column| &column.supplier_id == supplier_id)
    }
}

/// Builds the product x supplier matrix as a single fold over the admitted
/// quotations. Rows come out ordered by product code, suppliers in input order.
/// `products` bounds the comparison: a quotation with no line for any of them
/// does not put its supplier on the roster.
pub fn build_matrix(
    snapshots: &[QuotationSnapshot],
    products: &[Product],
    quantities: &QuantityResolver,
    options: &MatrixOptions,
) -> ComparisonMatrix {
    let catalog: HashMap<&ProductId, &Product> =
        products.iter().map(|product| (&product.id, product)).collect();

    let draft = snapshots
        .iter()
        .filter(|snapshot| options.mode.admits(snapshot.quotation.status))
        .filter(|snapshot| {
            options.supplier_scope.as_ref().map_or(true, |scope| scope.contains(&snapshot.supplier.id))
        })
        .fold(MatrixDraft::default(), |draft, snapshot| draft.absorb(snapshot, &catalog));

    draft.finish(quantities, options.tie_break)
}

#[derive(Default)]
struct MatrixDraft<'a> {
    suppliers: Vec<(&'a Supplier, Vec<QuotationId>)>,
    rows: Vec<RowDraft<'a>>,
    row_index: HashMap<&'a ProductId, usize>,
}

struct RowDraft<'a> {
    product: &'a Product,
    line_quantity: Option<Decimal>,
    quotes: Vec<(SupplierId, PriceCell)>,
}

impl<'a> MatrixDraft<'a> {
    fn absorb(
        mut self,
        snapshot: &'a QuotationSnapshot,
        catalog: &HashMap<&'a ProductId, &'a Product>,
    ) -> Self {
        if !snapshot.items.iter().any(|item| catalog.contains_key(&item.product_id)) {
            return self;
        }

        let supplier = &snapshot.supplier;
        match self.suppliers.iter_mut().find(|(known, _)| known.id == supplier.id) {
            Some((_, quotation_ids)) => quotation_ids.push(snapshot.quotation.id.clone()),
            None => self.suppliers.push((supplier, vec![snapshot.quotation.id.clone()])),
        }

        for item in &snapshot.items {
            let Some(product) = catalog.get(&item.product_id).copied() else {
                continue;
            };
            let index = *self.row_index.entry(&product.id).or_insert_with(|| {
                self.rows.push(RowDraft { product, line_quantity: None, quotes: Vec::new() });
                self.rows.len() - 1
            });
            let row = &mut self.rows[index];
            if row.line_quantity.is_none() && item.quantity > Decimal::ZERO {
                row.line_quantity = Some(item.quantity);
            }

            let cell = PriceCell {
                quotation_id: snapshot.quotation.id.clone(),
                item_id: item.id.clone(),
                line_quantity: item.quantity,
                price: resolve_price(item),
                initial_total: initial_total(item),
                is_best: false,
            };
            match row.quotes.iter_mut().find(|(supplier_id, _)| supplier_id == &supplier.id) {
                Some((_, existing)) if existing.price.is_none() && cell.price.is_some() => {
                    *existing = cell;
                }
                Some(_) => {}
                None => row.quotes.push((supplier.id.clone(), cell)),
            }
        }
        self
    }

    fn finish(self, quantities: &QuantityResolver, tie_break: TieBreak) -> ComparisonMatrix {
        let codes: Vec<String> =
            self.suppliers.iter().map(|(supplier, _)| normalize_code(&supplier.code)).collect();

        let mut rows: Vec<MatrixRow> = self
            .rows
            .into_iter()
            .map(|draft| {
                let mut quotes = draft.quotes;
                let mut cells: Vec<MatrixCell> = self
                    .suppliers
                    .iter()
                    .map(|(supplier, _)| {
                        let quote = quotes
                            .iter()
                            .position(|(supplier_id, _)| supplier_id == &supplier.id)
                            .map(|position| quotes.swap_remove(position).1);
                        MatrixCell { supplier_id: supplier.id.clone(), quote }
                    })
                    .collect();

                let best = select_best(&cells, &codes, tie_break);
                if let Some(quote) = best.and_then(|index| cells[index].quote.as_mut()) {
                    quote.is_best = true;
                }

                let min_initial_total = cells
                    .iter()
                    .filter_map(|cell| cell.quote.as_ref().and_then(|quote| quote.initial_total))
                    .min();

                MatrixRow {
                    product: draft.product.clone(),
                    best_supplier: best.map(|index| cells[index].supplier_id.clone()),
                    best_total: best.and_then(|index| cells[index].total()),
                    min_initial_total,
                    quantity: quantities.resolve(draft.product, draft.line_quantity),
                    cells,
                }
            })
            .collect();
        rows.sort_by(|left, right| left.product.code.cmp(&right.product.code));

        let total_products = rows.len();
        let suppliers = self
            .suppliers
            .into_iter()
            .enumerate()
            .map(|(index, (supplier, quotation_ids))| {
                let quoted_products =
                    rows.iter().filter(|row| row.cells[index].total().is_some()).count();
                SupplierColumn {
                    supplier_id: supplier.id.clone(),
                    code: supplier.code.clone(),
                    name: supplier.name.clone(),
                    contact: supplier.contact_line(),
                    quotation_ids,
                    quoted_products,
                    total_products,
                    coverage_pct: coverage_pct(quoted_products, total_products),
                }
            })
            .collect();

        ComparisonMatrix { suppliers, rows }
    }
}

fn select_best(cells: &[MatrixCell], codes: &[String], tie_break: TieBreak) -> Option<usize> {
    cells
        .iter()
        .enumerate()
        .filter_map(|(index, cell)| cell.total().map(|total| (index, total)))
        .fold(None, |best: Option<(usize, Decimal)>, (index, total)| match best {
            None => Some((index, total)),
            Some((best_index, best_total)) => {
                let wins_tie = match tie_break {
                    TieBreak::LastEncountered => true,
                    TieBreak::LowestSupplierCode => codes[index] < codes[best_index],
                };
                if total < best_total || (total == best_total && wins_tie) {
                    Some((index, total))
                } else {
                    Some((best_index, best_total))
                }
            }
        })
        .map(|(index, _)| index)
}

/// quoted / total x 100, two decimals. Zero when there are no products.
pub fn coverage_pct(quoted: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(quoted as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use super::fixtures::{line, product, snapshot, Line};
    use super::{build_matrix, coverage_pct, ComparisonMode, MatrixOptions, TieBreak};
    use crate::domain::quotation::QuotationStatus;
    use crate::domain::supplier::SupplierId;
    use crate::pricing::kpi::summarize;
    use crate::pricing::quantity::{QuantityResolver, QuantityTier};

    fn options(tie_break: TieBreak) -> MatrixOptions {
        MatrixOptions { tie_break, ..MatrixOptions::default() }
    }

    #[test]
    fn approved_price_with_vat_beats_a_cheaper_looking_initial_offer() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(100_000))]),
            snapshot(
                "S2",
                QuotationStatus::Negotiation,
                vec![Line {
                    product: "P1",
                    initial: Some(110_000),
                    negotiated: None,
                    approved: Some(95_000),
                    vat: 5,
                }],
            ),
        ];
        let products = vec![product("P1", "Meat")];

        let matrix = build_matrix(
            &snapshots,
            &products,
            &QuantityResolver::without_demand(),
            &MatrixOptions::default(),
        );

        let row = &matrix.rows[0];
        assert_eq!(row.cells[0].total(), Some(Decimal::from(100_000)));
        assert_eq!(row.cells[1].price().map(|price| price.unit_price), Some(Decimal::from(95_000)));
        assert_eq!(row.cells[1].total(), Some(Decimal::from(99_750)));
        assert_eq!(row.best_supplier, Some(SupplierId("s-S2".to_string())));
        assert_eq!(row.best_total, Some(Decimal::from(99_750)));
        assert_eq!(row.cells.iter().filter(|cell| cell.is_best()).count(), 1);
    }

    #[test]
    fn best_price_is_unique_and_minimal() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(300)), line("P2", Some(10))]),
            snapshot("S2", QuotationStatus::Pending, vec![line("P1", Some(200)), line("P2", None)]),
            snapshot("S3", QuotationStatus::Pending, vec![line("P1", Some(250))]),
        ];
        let products = vec![product("P1", "Dry"), product("P2", "Dry")];

        let matrix = build_matrix(
            &snapshots,
            &products,
            &QuantityResolver::without_demand(),
            &MatrixOptions::default(),
        );

        for row in &matrix.rows {
            let best: Vec<_> = row.cells.iter().filter(|cell| cell.is_best()).collect();
            assert_eq!(best.len(), 1, "exactly one best cell for {}", row.product.code);
            let best_total = best[0].total().expect("best is priced");
            assert!(row.cells.iter().filter_map(|cell| cell.total()).all(|total| best_total <= total));
        }
    }

    #[test]
    fn unpriced_and_absent_cells_are_kept_but_never_best() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", None)]),
            snapshot("S2", QuotationStatus::Pending, vec![line("P2", Some(5))]),
        ];
        let products = vec![product("P1", "Dry"), product("P2", "Dry")];

        let matrix = build_matrix(
            &snapshots,
            &products,
            &QuantityResolver::without_demand(),
            &MatrixOptions::default(),
        );

        let p1 = &matrix.rows[0];
        assert_eq!(p1.product.code, "P1");
        assert!(p1.cells[0].quote.is_some(), "line item exists");
        assert!(p1.cells[0].price().is_none(), "renders as not yet quoted");
        assert!(p1.cells[1].quote.is_none(), "S2 never quoted P1");
        assert!(p1.best_supplier.is_none());
        assert!(p1.cells.iter().all(|cell| !cell.is_best()));
    }

    #[test]
    fn ties_go_to_lowest_supplier_code_by_default() {
        let snapshots = vec![
            snapshot("S9", QuotationStatus::Pending, vec![line("P1", Some(100))]),
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(100))]),
            snapshot("s5", QuotationStatus::Pending, vec![line("P1", Some(100))]),
        ];
        let products = vec![product("P1", "Dry")];
        let resolver = QuantityResolver::without_demand();

        let lowest = build_matrix(&snapshots, &products, &resolver, &options(TieBreak::LowestSupplierCode));
        assert_eq!(lowest.rows[0].best_supplier, Some(SupplierId("s-S1".to_string())));

        let last = build_matrix(&snapshots, &products, &resolver, &options(TieBreak::LastEncountered));
        assert_eq!(last.rows[0].best_supplier, Some(SupplierId("s-s5".to_string())));
    }

    #[test]
    fn mode_filters_statuses() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Approved, vec![line("P1", Some(100))]),
            snapshot("S2", QuotationStatus::Pending, vec![line("P1", Some(90))]),
            snapshot("S3", QuotationStatus::Cancelled, vec![line("P1", Some(10))]),
        ];
        let products = vec![product("P1", "Dry")];
        let resolver = QuantityResolver::without_demand();

        let working = build_matrix(&snapshots, &products, &resolver, &MatrixOptions::default());
        assert_eq!(working.suppliers.len(), 2);
        assert_eq!(working.rows[0].best_supplier, Some(SupplierId("s-S2".to_string())));

        let approval = build_matrix(
            &snapshots,
            &products,
            &resolver,
            &MatrixOptions { mode: ComparisonMode::ApprovalReady, ..MatrixOptions::default() },
        );
        assert_eq!(approval.suppliers.len(), 1);
        assert_eq!(approval.rows[0].best_supplier, Some(SupplierId("s-S1".to_string())));
    }

    #[test]
    fn supplier_scope_restricts_the_roster() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(100))]),
            snapshot("S2", QuotationStatus::Pending, vec![line("P1", Some(90)), line("P2", Some(1))]),
        ];
        let products = vec![product("P1", "Dry"), product("P2", "Dry")];
        let scope: BTreeSet<SupplierId> = [SupplierId("s-S1".to_string())].into_iter().collect();

        let matrix = build_matrix(
            &snapshots,
            &products,
            &QuantityResolver::without_demand(),
            &MatrixOptions { supplier_scope: Some(scope), ..MatrixOptions::default() },
        );

        assert_eq!(matrix.suppliers.len(), 1);
        assert_eq!(matrix.rows.len(), 1, "P2 was only quoted by an out-of-scope supplier");
    }

    #[test]
    fn roster_reports_coverage_and_rows_carry_quantity() {
        let mut p1 = product("P1", "Dry");
        p1.base_quantity = Some(Decimal::from(20));
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(1)), line("P2", Some(2)), line("P3", Some(3))]),
            snapshot("S2", QuotationStatus::Pending, vec![line("P1", Some(1))]),
        ];
        let products = vec![p1, product("P2", "Dry"), product("P3", "Dry")];

        let matrix = build_matrix(
            &snapshots,
            &products,
            &QuantityResolver::without_demand(),
            &MatrixOptions::default(),
        );

        assert_eq!(matrix.suppliers[0].quoted_products, 3);
        assert_eq!(matrix.suppliers[0].coverage_pct, Decimal::ONE_HUNDRED);
        assert_eq!(matrix.suppliers[1].coverage_pct, Decimal::new(3333, 2));

        let p1_quantity = matrix.rows[0].quantity.as_ref().expect("quantity");
        assert_eq!(p1_quantity.tier, QuantityTier::BaseQuantity);
        assert_eq!(p1_quantity.quantity, Decimal::from(20));
        let p2_quantity = matrix.rows[1].quantity.as_ref().expect("quantity");
        assert_eq!(p2_quantity.tier, QuantityTier::QuoteLine);
        assert_eq!(p2_quantity.quantity, Decimal::from(7));
    }

    #[test]
    fn suppliers_without_lines_in_the_product_set_stay_off_the_roster() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("VEG", Some(10))]),
            snapshot("S2", QuotationStatus::Pending, vec![line("MEAT", Some(90))]),
        ];
        let vegetables = vec![product("VEG", "Vegetable")];

        let matrix = build_matrix(
            &snapshots,
            &vegetables,
            &QuantityResolver::without_demand(),
            &MatrixOptions::default(),
        );

        let codes: Vec<&str> = matrix.suppliers.iter().map(|column| column.code.as_str()).collect();
        assert_eq!(codes, vec!["S1"]);
        assert_eq!(matrix.suppliers[0].coverage_pct, Decimal::ONE_HUNDRED);
        assert_eq!(matrix.rows[0].cells.len(), 1);
        assert_eq!(summarize(&matrix, &[]).total_suppliers, 1);
    }

    #[test]
    fn coverage_handles_empty_results() {
        assert_eq!(coverage_pct(0, 0), Decimal::ZERO);
        assert_eq!(coverage_pct(2, 3), Decimal::new(6667, 2));
    }
}
