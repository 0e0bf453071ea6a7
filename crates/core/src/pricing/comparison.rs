use serde::{Deserialize, Serialize};

use crate::domain::period::Period;
use crate::domain::supplier::SupplierId;
use crate::domain::team::TeamId;
use crate::pricing::kpi::{summarize, KpiSummary};
use crate::pricing::matrix::{ComparisonMatrix, ComparisonMode, MatrixRow, SupplierColumn};
use crate::pricing::sort::{sort_rows, SortSpec};
use crate::pricing::variance::{row_variance, PreviousPriceBook, RowVariance};

/// Where a comparison is drawn from: a region directly, or a team's region and scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ComparisonTarget {
    Region(String),
    Team(TeamId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonQuery {
    pub period: Period,
    pub target: ComparisonTarget,
    pub category: Option<String>,
    pub mode: ComparisonMode,
    /// Pins variance figures to one supplier instead of the best cell.
    pub focus_supplier: Option<SupplierId>,
    pub sort: SortSpec,
}

impl ComparisonQuery {
    pub fn for_region(period: Period, region: impl Into<String>) -> Self {
        Self {
            period,
            target: ComparisonTarget::Region(region.into()),
            category: None,
            mode: ComparisonMode::Working,
            focus_supplier: None,
            sort: SortSpec::default(),
        }
    }

    pub fn for_team(period: Period, team_id: TeamId) -> Self {
        Self { target: ComparisonTarget::Team(team_id), ..Self::for_region(period, String::new()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    #[serde(flatten)]
    pub row: MatrixRow,
    pub variance: RowVariance,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub period: Period,
    pub region: String,
    pub team_id: Option<TeamId>,
    pub category: Option<String>,
    pub mode: ComparisonMode,
    pub suppliers: Vec<SupplierColumn>,
    pub rows: Vec<ComparisonRow>,
    pub summary: KpiSummary,
}

impl ComparisonReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The matrix view of the report, in display order.
    pub fn matrix(&self) -> ComparisonMatrix {
        ComparisonMatrix {
            suppliers: self.suppliers.clone(),
            rows: self.rows.iter().map(|row| row.row.clone()).collect(),
        }
    }
}

/// Attaches variances, computes the KPI rollup and applies the requested order.
pub fn assemble_report(
    query: &ComparisonQuery,
    region: &str,
    matrix: ComparisonMatrix,
    previous: &PreviousPriceBook,
) -> ComparisonReport {
    let focus = query.focus_supplier.as_ref();
    let variances: Vec<RowVariance> =
        matrix.rows.iter().map(|row| row_variance(row, previous, focus)).collect();
    let summary = summarize(&matrix, &variances);

    let mut rows: Vec<ComparisonRow> = matrix
        .rows
        .into_iter()
        .zip(variances)
        .map(|(row, variance)| ComparisonRow { row, variance })
        .collect();
    sort_rows(&mut rows, query.sort);

    ComparisonReport {
        period: query.period,
        region: region.to_string(),
        team_id: match &query.target {
            ComparisonTarget::Team(team_id) => Some(team_id.clone()),
            ComparisonTarget::Region(_) => None,
        },
        category: query.category.clone(),
        mode: query.mode,
        suppliers: matrix.suppliers,
        rows,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{assemble_report, ComparisonQuery};
    use crate::domain::quotation::QuotationStatus;
    use crate::domain::supplier::SupplierId;
    use crate::pricing::matrix::fixtures::{line, product, snapshot, Line};
    use crate::pricing::matrix::{build_matrix, MatrixOptions};
    use crate::pricing::quantity::QuantityResolver;
    use crate::pricing::sort::{SortDirection, SortKey, SortSpec};
    use crate::pricing::variance::PreviousPriceBook;

    #[test]
    fn report_carries_scenario_a_and_its_summary() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Pending, vec![line("P1", Some(100_000))]),
            snapshot(
                "S2",
                QuotationStatus::Pending,
                vec![Line { product: "P1", initial: Some(110_000), negotiated: None, approved: Some(95_000), vat: 5 }],
            ),
        ];
        let mut p1 = product("P1", "Meat");
        p1.base_quantity = Some(Decimal::from(2));
        let matrix = build_matrix(&snapshots, &[p1], &QuantityResolver::without_demand(), &MatrixOptions::default());
        let query = ComparisonQuery::for_region("2024-01-01".parse().expect("period"), "North");

        let report = assemble_report(&query, "North", matrix, &PreviousPriceBook::default());

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].row.best_supplier, Some(SupplierId("s-S2".to_string())));
        assert_eq!(report.summary.total_current_value, Decimal::from(199_500));
        let base = report.rows[0].variance.vs_base_price.as_ref().expect("initial floor");
        assert_eq!(base.baseline, Decimal::from(100_000));
        assert_eq!(base.percent, Decimal::new(-25, 2));
        assert!(report.team_id.is_none());
    }

    #[test]
    fn report_rows_follow_requested_sort() {
        let snapshots = vec![snapshot(
            "S1",
            QuotationStatus::Pending,
            vec![line("A", Some(1)), line("B", Some(3)), line("C", Some(2))],
        )];
        let products = vec![product("A", "Dry"), product("B", "Dry"), product("C", "Dry")];
        let matrix = build_matrix(&snapshots, &products, &QuantityResolver::without_demand(), &MatrixOptions::default());
        let mut query = ComparisonQuery::for_region("2024-01-01".parse().expect("period"), "North");
        query.sort = SortSpec { key: SortKey::BestTotal, direction: SortDirection::Desc };

        let report = assemble_report(&query, "North", matrix, &PreviousPriceBook::default());

        let codes: Vec<_> = report.rows.iter().map(|row| row.row.product.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "C", "A"]);
        assert_eq!(report.matrix().rows[0].product.code, "B");
    }
}
