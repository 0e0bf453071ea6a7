use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::fold_key;
use crate::domain::period::Period;
use crate::domain::product::Product;
use crate::domain::quotation::QuotationStatus;
use crate::domain::supplier::SupplierId;
use crate::domain::team::{Demand, ServiceScope, Team, TeamId};
use crate::errors::DomainError;
use crate::pricing::matrix::{
    build_matrix, ComparisonMode, MatrixOptions, MatrixRow, QuotationSnapshot, SupplierColumn,
    TieBreak,
};
use crate::pricing::quantity::QuantityResolver;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceListSummary {
    pub total_products: usize,
    pub total_suppliers: usize,
    pub priced_products: usize,
    /// Sum of best total x resolved quantity over priced rows.
    pub total_value: Decimal,
}

/// Approved prices a team may buy at, restricted to its actively scoped suppliers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPriceList {
    pub team_id: TeamId,
    pub team_code: String,
    pub region: String,
    pub period: Period,
    pub suppliers: Vec<SupplierColumn>,
    pub rows: Vec<MatrixRow>,
    pub summary: PriceListSummary,
}

impl TeamPriceList {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Suppliers holding an active scope for `team`.
pub fn active_scope(team: &TeamId, scopes: &[ServiceScope]) -> BTreeSet<SupplierId> {
    scopes
        .iter()
        .filter(|scope| scope.active && &scope.team_id == team)
        .map(|scope| scope.supplier_id.clone())
        .collect()
}

/// Projects approved quotations for the team's region and period onto its scoped
/// suppliers. Fails only when the team has no region; an empty scope yields an
/// empty list.
pub fn project_price_list(
    team: &Team,
    period: Period,
    scopes: &[ServiceScope],
    snapshots: &[QuotationSnapshot],
    products: &[Product],
    demands: &[Demand],
    tie_break: TieBreak,
) -> Result<TeamPriceList, DomainError> {
    let region = team
        .configured_region()
        .ok_or_else(|| DomainError::TeamWithoutRegion { team: team.code.clone() })?
        .to_string();

    let scope = active_scope(&team.id, scopes);
    if scope.is_empty() {
        return Ok(TeamPriceList {
            team_id: team.id.clone(),
            team_code: team.code.clone(),
            region,
            period,
            suppliers: Vec::new(),
            rows: Vec::new(),
            summary: PriceListSummary::default(),
        });
    }

    let eligible: Vec<QuotationSnapshot> = snapshots
        .iter()
        .filter(|snapshot| {
            let quotation = &snapshot.quotation;
            quotation.status == QuotationStatus::Approved
                && quotation.period == period
                && fold_key(&quotation.region) == fold_key(&region)
        })
        .cloned()
        .collect();

    let quantities = QuantityResolver::new(Some(&team.id), period, demands.iter().cloned());
    let matrix = build_matrix(
        &eligible,
        products,
        &quantities,
        &MatrixOptions { mode: ComparisonMode::ApprovalReady, supplier_scope: Some(scope), tie_break },
    );

    let total_value: Decimal = matrix
        .rows
        .iter()
        .filter_map(|row| row.best_total.zip(row.quantity.as_ref().map(|resolved| resolved.quantity)))
        .map(|(total, quantity)| total * quantity)
        .sum();
    let summary = PriceListSummary {
        total_products: matrix.rows.len(),
        total_suppliers: matrix.suppliers.len(),
        priced_products: matrix.rows.iter().filter(|row| row.best_total.is_some()).count(),
        total_value,
    };

    Ok(TeamPriceList {
        team_id: team.id.clone(),
        team_code: team.code.clone(),
        region,
        period,
        suppliers: matrix.suppliers,
        rows: matrix.rows,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{project_price_list, PriceListSummary};
    use crate::domain::period::Period;
    use crate::domain::quotation::QuotationStatus;
    use crate::domain::supplier::SupplierId;
    use crate::domain::team::{Demand, ServiceScope, Team, TeamId, TeamKind};
    use crate::errors::DomainError;
    use crate::pricing::matrix::fixtures::{line, product, snapshot};
    use crate::pricing::matrix::TieBreak;
    use crate::pricing::quantity::QuantityTier;

    fn kitchen(region: Option<&str>) -> Team {
        Team {
            id: TeamId("k-1".to_string()),
            code: "K1".to_string(),
            name: "Kitchen One".to_string(),
            region: region.map(str::to_string),
            kind: TeamKind::Kitchen,
            active: true,
        }
    }

    fn scope(supplier: &str, active: bool) -> ServiceScope {
        ServiceScope {
            supplier_id: SupplierId(format!("s-{supplier}")),
            team_id: TeamId("k-1".to_string()),
            active,
        }
    }

    fn period() -> Period {
        "2024-01-01".parse().expect("period")
    }

    #[test]
    fn team_without_region_is_rejected() {
        let error = project_price_list(&kitchen(Some("  ")), period(), &[], &[], &[], &[], TieBreak::default())
            .expect_err("no region");
        assert!(matches!(error, DomainError::TeamWithoutRegion { ref team } if team == "K1"));
    }

    #[test]
    fn empty_scope_returns_an_empty_list_not_an_error() {
        let snapshots = vec![snapshot("S1", QuotationStatus::Approved, vec![line("P1", Some(10))])];
        let list = project_price_list(
            &kitchen(Some("North")),
            period(),
            &[scope("S1", false)],
            &snapshots,
            &[product("P1", "Dry")],
            &[],
            TieBreak::default(),
        )
        .expect("empty list");

        assert!(list.is_empty());
        assert_eq!(list.summary, PriceListSummary::default());
        assert_eq!(list.summary.total_suppliers, 0);
    }

    #[test]
    fn only_approved_quotations_from_scoped_suppliers_are_listed() {
        let snapshots = vec![
            snapshot("S1", QuotationStatus::Approved, vec![line("P1", Some(10)), line("P2", Some(4))]),
            snapshot("S2", QuotationStatus::Approved, vec![line("P1", Some(5))]),
            snapshot("S3", QuotationStatus::Negotiation, vec![line("P1", Some(1))]),
        ];
        let products = vec![product("P1", "Dry"), product("P2", "Dry")];
        let demands = vec![Demand {
            team_id: TeamId("k-1".to_string()),
            product_id: products[0].id.clone(),
            period: period(),
            quantity: Decimal::from(3),
        }];

        let list = project_price_list(
            &kitchen(Some("north")),
            period(),
            &[scope("S1", true), scope("S2", false), scope("S3", true)],
            &snapshots,
            &products,
            &demands,
            TieBreak::default(),
        )
        .expect("price list");

        assert_eq!(list.region, "north");
        assert_eq!(list.suppliers.len(), 1);
        assert_eq!(list.suppliers[0].supplier_id, SupplierId("s-S1".to_string()));
        assert_eq!(list.suppliers[0].coverage_pct, Decimal::ONE_HUNDRED);
        assert_eq!(list.rows.len(), 2);
        let p1 = &list.rows[0];
        assert_eq!(p1.best_supplier, Some(SupplierId("s-S1".to_string())));
        assert_eq!(p1.quantity.as_ref().map(|q| q.tier), Some(QuantityTier::TeamDemand));
        // 10 x 3 + 4 x 7 (line quantity fallback)
        assert_eq!(list.summary.total_value, Decimal::from(58));
        assert_eq!(list.summary.total_suppliers, 1);
    }
}
