use procura_core::domain::period::Period;
use procura_core::domain::quotation::QuotationStatus;
use procura_core::domain::team::TeamId;
use procura_core::errors::DomainError;
use procura_core::pricing::matrix::TieBreak;
use procura_core::pricing::price_list::{project_price_list, TeamPriceList};

use super::{referenced_products, ServiceError};
use crate::repositories::{
    QuotationFilter, QuotationRepository, SqlProductRepository, SqlQuotationRepository,
    SqlTeamRepository, TeamRepository,
};
use crate::DbPool;

pub struct PriceListService {
    products: SqlProductRepository,
    teams: SqlTeamRepository,
    quotations: SqlQuotationRepository,
    tie_break: TieBreak,
}

impl PriceListService {
    pub fn new(pool: DbPool, tie_break: TieBreak) -> Self {
        Self {
            products: SqlProductRepository::new(pool.clone()),
            teams: SqlTeamRepository::new(pool.clone()),
            quotations: SqlQuotationRepository::new(pool),
            tie_break,
        }
    }

    /// Approved prices for the team's region in `period`, limited to suppliers
    /// the team currently has an active scope with.
    pub async fn price_list(
        &self,
        team_id: &TeamId,
        period: Period,
        correlation_id: &str,
    ) -> Result<TeamPriceList, ServiceError> {
        let team = self
            .teams
            .find_by_id(team_id)
            .await?
            .ok_or_else(|| DomainError::not_found("team", &team_id.0))?;
        let scopes = self.teams.scopes_for_team(&team.id).await?;

        let snapshots = match team.configured_region() {
            Some(region) => {
                let filter = QuotationFilter::for_period_region(period, region)
                    .with_statuses(&[QuotationStatus::Approved]);
                self.quotations.snapshots(&filter).await?
            }
            None => Vec::new(),
        };
        let products = referenced_products(&self.products, &snapshots).await?;
        let demands = self.teams.demand_for(&team.id, period).await?;

        let list = project_price_list(
            &team,
            period,
            &scopes,
            &snapshots,
            &products,
            &demands,
            self.tie_break,
        )?;

        tracing::info!(
            event_name = "price_list.projected",
            correlation_id,
            team_code = %list.team_code,
            period = %period,
            region = %list.region,
            rows = list.rows.len(),
            suppliers = list.suppliers.len(),
            "team price list projected"
        );
        Ok(list)
    }
}
