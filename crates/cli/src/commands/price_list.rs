use procura_core::config::AppConfig;
use procura_db::repositories::{SqlTeamRepository, TeamRepository};
use procura_db::{DbPool, PriceListService};

use crate::commands::compare::{not_found, storage_failure};
use crate::commands::{
    correlation_id, parse_period, service_failure, with_database, CommandResult, Failure,
};

/// Approved prices a team can order from in `period`.
pub fn run(team_code: String, period: String) -> CommandResult {
    with_database("price-list", |config, pool| execute(config, pool, team_code, period))
}

async fn execute(
    config: AppConfig,
    pool: DbPool,
    team_code: String,
    period: String,
) -> Result<CommandResult, Failure> {
    let correlation_id = correlation_id("price-list");
    let period = parse_period(&period)?;
    let team = SqlTeamRepository::new(pool.clone())
        .find_by_code(&team_code)
        .await
        .map_err(storage_failure)?
        .ok_or_else(|| not_found("team", &team_code))?;

    let price_list = PriceListService::new(pool, config.comparison.tie_break)
        .price_list(&team.id, period, &correlation_id)
        .await
        .map_err(|error| service_failure(error, &correlation_id))?;

    let message = if price_list.is_empty() {
        format!("no approved prices for team {} in {period}", price_list.team_code)
    } else {
        format!(
            "{} products from {} suppliers for team {} in {period}",
            price_list.rows.len(),
            price_list.suppliers.len(),
            price_list.team_code
        )
    };
    Ok(CommandResult::success_with_data("price-list", message, &price_list))
}
