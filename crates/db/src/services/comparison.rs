use std::collections::BTreeSet;

use procura_core::domain::fold_key;
use procura_core::domain::product::Product;
use procura_core::domain::quotation::QuotationStatus;
use procura_core::domain::supplier::SupplierId;
use procura_core::domain::team::Team;
use procura_core::errors::DomainError;
use procura_core::pricing::comparison::{assemble_report, ComparisonQuery, ComparisonReport, ComparisonTarget};
use procura_core::pricing::matrix::{build_matrix, ComparisonMode, MatrixOptions, TieBreak};
use procura_core::pricing::price_list::active_scope;
use procura_core::pricing::quantity::QuantityResolver;
use procura_core::pricing::variance::PreviousPriceBook;

use super::{referenced_products, ServiceError};
use crate::repositories::{
    PriceHistoryRepository, QuotationFilter, QuotationRepository, SqlPriceHistoryRepository,
    SqlProductRepository, SqlQuotationRepository, SqlTeamRepository, TeamRepository,
};
use crate::DbPool;

/// Read-only comparison over stored quotations. Needs no grant.
pub struct ComparisonService {
    products: SqlProductRepository,
    teams: SqlTeamRepository,
    quotations: SqlQuotationRepository,
    history: SqlPriceHistoryRepository,
    tie_break: TieBreak,
}

struct ResolvedTarget {
    region: String,
    team: Option<Team>,
    scope: Option<BTreeSet<SupplierId>>,
}

impl ComparisonService {
    pub fn new(pool: DbPool, tie_break: TieBreak) -> Self {
        Self {
            products: SqlProductRepository::new(pool.clone()),
            teams: SqlTeamRepository::new(pool.clone()),
            quotations: SqlQuotationRepository::new(pool.clone()),
            history: SqlPriceHistoryRepository::new(pool),
            tie_break,
        }
    }

    pub async fn compare(
        &self,
        query: &ComparisonQuery,
        correlation_id: &str,
    ) -> Result<ComparisonReport, ServiceError> {
        let target = self.resolve_target(&query.target).await?;

        let filter = QuotationFilter::for_period_region(query.period, target.region.clone())
            .with_statuses(statuses_for(query.mode));
        let snapshots = self.quotations.snapshots(&filter).await?;

        let products: Vec<Product> = referenced_products(&self.products, &snapshots)
            .await?
            .into_iter()
            .filter(|product| in_category(product, query.category.as_deref()))
            .collect();

        let demands = match &target.team {
            Some(team) => self.teams.demand_for(&team.id, query.period).await?,
            None => Vec::new(),
        };
        let quantities =
            QuantityResolver::new(target.team.as_ref().map(|team| &team.id), query.period, demands);

        let matrix = build_matrix(
            &snapshots,
            &products,
            &quantities,
            &MatrixOptions { mode: query.mode, supplier_scope: target.scope, tie_break: self.tie_break },
        );

        let history = self.history.list_before(&target.region, query.period).await?;
        let previous = PreviousPriceBook::from_history(&target.region, query.period, history.iter());
        let report = assemble_report(query, &target.region, matrix, &previous);

        tracing::info!(
            event_name = "comparison.matrix_built",
            correlation_id,
            period = %query.period,
            region = %report.region,
            mode = %query.mode,
            rows = report.rows.len(),
            suppliers = report.suppliers.len(),
            "comparison matrix built"
        );
        Ok(report)
    }

    async fn resolve_target(&self, target: &ComparisonTarget) -> Result<ResolvedTarget, ServiceError> {
        match target {
            ComparisonTarget::Region(region) => {
                let region = region.trim();
                if region.is_empty() {
                    return Err(DomainError::validation("region", "must not be empty").into());
                }
                Ok(ResolvedTarget { region: region.to_string(), team: None, scope: None })
            }
            ComparisonTarget::Team(team_id) => {
                let team = self
                    .teams
                    .find_by_id(team_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("team", &team_id.0))?;
                let region = team
                    .configured_region()
                    .ok_or_else(|| DomainError::TeamWithoutRegion { team: team.code.clone() })?
                    .to_string();
                let scopes = self.teams.scopes_for_team(&team.id).await?;
                let scope = active_scope(&team.id, &scopes);
                Ok(ResolvedTarget { region, team: Some(team), scope: Some(scope) })
            }
        }
    }
}

fn statuses_for(mode: ComparisonMode) -> &'static [QuotationStatus] {
    match mode {
        ComparisonMode::Working => {
            &[QuotationStatus::Pending, QuotationStatus::Negotiation, QuotationStatus::Approved]
        }
        ComparisonMode::ApprovalReady => &[QuotationStatus::Approved],
    }
}

fn in_category(product: &Product, category: Option<&str>) -> bool {
    match category.map(fold_key).filter(|category| !category.is_empty()) {
        None => true,
        Some(category) => product.category.as_deref().is_some_and(|own| fold_key(own) == category),
    }
}
