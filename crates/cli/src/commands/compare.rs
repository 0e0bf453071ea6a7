use clap::Args;
use serde::Serialize;

use procura_core::config::AppConfig;
use procura_core::pricing::{ComparisonMode, ComparisonQuery, ComparisonReport, SortSpec};
use procura_db::repositories::{
    RepositoryError, SqlSupplierRepository, SqlTeamRepository, SupplierRepository, TeamRepository,
};
use procura_db::{ComparisonService, DbPool};

use crate::commands::{correlation_id, parse_period, service_failure, with_database, CommandResult, Failure};

/// Selection shared by `compare` and `export`.
#[derive(Debug, Clone, Args)]
pub struct ComparisonArgs {
    /// Quotation period, `YYYY-MM-DD`.
    #[arg(long)]
    pub period: String,
    #[arg(long, required_unless_present = "team", conflicts_with = "team")]
    pub region: Option<String>,
    /// Team code; compares the team's region restricted to its active suppliers.
    #[arg(long)]
    pub team: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// `working` or `approval_ready`.
    #[arg(long, default_value = "working")]
    pub mode: String,
    /// `key` or `key:asc|desc`.
    #[arg(long, default_value = "product_code")]
    pub sort: String,
    /// Supplier code to pin variance figures to.
    #[arg(long)]
    pub focus_supplier: Option<String>,
}

impl ComparisonArgs {
    pub(crate) async fn query(&self, pool: &DbPool) -> Result<ComparisonQuery, Failure> {
        let period = parse_period(&self.period)?;
        let mut query = match (&self.team, &self.region) {
            (Some(team_code), _) => {
                let team = SqlTeamRepository::new(pool.clone())
                    .find_by_code(team_code)
                    .await
                    .map_err(storage_failure)?
                    .ok_or_else(|| not_found("team", team_code))?;
                ComparisonQuery::for_team(period, team.id)
            }
            (None, Some(region)) => ComparisonQuery::for_region(period, region.clone()),
            (None, None) => {
                return Err(("validation", "either --region or --team is required".to_string(), 6));
            }
        };

        query.category = self.category.clone();
        query.mode = self.mode.parse::<ComparisonMode>().map_err(invalid)?;
        query.sort = self.sort.parse::<SortSpec>().map_err(invalid)?;
        if let Some(code) = &self.focus_supplier {
            let supplier = SqlSupplierRepository::new(pool.clone())
                .find_by_code(code)
                .await
                .map_err(storage_failure)?
                .ok_or_else(|| not_found("supplier", code))?;
            query.focus_supplier = Some(supplier.id);
        }
        Ok(query)
    }
}

#[derive(Debug, Serialize)]
struct CompareOutput<'a> {
    correlation_id: &'a str,
    report: &'a ComparisonReport,
}

pub fn run(args: ComparisonArgs) -> CommandResult {
    with_database("compare", |config, pool| execute(config, pool, args))
}

async fn execute(config: AppConfig, pool: DbPool, args: ComparisonArgs) -> Result<CommandResult, Failure> {
    let correlation_id = correlation_id("compare");
    let query = args.query(&pool).await?;
    let report = ComparisonService::new(pool, config.comparison.tie_break)
        .compare(&query, &correlation_id)
        .await
        .map_err(|error| service_failure(error, &correlation_id))?;

    let message = format!(
        "{} products across {} suppliers for {} in {}",
        report.summary.total_products,
        report.summary.total_suppliers,
        report.period,
        report.region
    );
    Ok(CommandResult::success_with_data(
        "compare",
        message,
        CompareOutput { correlation_id: &correlation_id, report: &report },
    ))
}

pub(crate) fn storage_failure(error: RepositoryError) -> Failure {
    ("persistence", error.to_string(), 4)
}

pub(crate) fn not_found(entity: &str, code: &str) -> Failure {
    ("not_found", format!("{entity} `{code}` was not found"), 7)
}

fn invalid(error: procura_core::DomainError) -> Failure {
    ("validation", error.to_string(), 6)
}
