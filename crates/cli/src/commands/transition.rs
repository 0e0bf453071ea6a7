use procura_core::access::AccessGrant;
use procura_core::flows::FlowEvent;
use procura_db::repositories::{QuotationRepository, SqlQuotationRepository};
use procura_db::{DbPool, WorkflowService};

use crate::commands::compare::{not_found, storage_failure};
use crate::commands::{correlation_id, service_failure, with_database, CommandResult, Failure};

pub struct TransitionArgs {
    pub quotation: String,
    pub event: String,
    pub expected_version: Option<i64>,
    pub actor: String,
}

/// Applies a workflow event to the quotation with the given code.
pub fn run(args: TransitionArgs) -> CommandResult {
    with_database("transition", |_config, pool| execute(pool, args))
}

async fn execute(pool: DbPool, args: TransitionArgs) -> Result<CommandResult, Failure> {
    let correlation_id = correlation_id("transition");
    let event = args
        .event
        .parse::<FlowEvent>()
        .map_err(|error| ("validation", error.to_string(), 6u8))?;
    let quotation = SqlQuotationRepository::new(pool.clone())
        .find_by_code(&args.quotation)
        .await
        .map_err(storage_failure)?
        .ok_or_else(|| not_found("quotation", &args.quotation))?;

    let grant = AccessGrant::manager(args.actor.as_str());
    let receipt = WorkflowService::new(pool)
        .transition(&grant, &quotation.id, event, args.expected_version, &correlation_id)
        .await
        .map_err(|error| service_failure(error, &correlation_id))?;

    let message = format!(
        "{} moved {} -> {} (version {}, {} history rows)",
        receipt.code,
        receipt.from.as_str(),
        receipt.to.as_str(),
        receipt.version,
        receipt.history_written
    );
    Ok(CommandResult::success_with_data("transition", message, &receipt))
}
