use rust_decimal::Decimal;

use procura_core::access::AccessGrant;
use procura_core::domain::quotation::{PriceUpdate, QuoteItemId};
use procura_db::{DbPool, WorkflowService};

use crate::commands::{correlation_id, service_failure, with_database, CommandResult, Failure};

pub struct SetPricesArgs {
    pub item: String,
    pub initial: Option<Decimal>,
    pub negotiated: Option<Decimal>,
    pub approved: Option<Decimal>,
    pub vat: Option<Decimal>,
    pub actor: String,
}

impl SetPricesArgs {
    fn update(&self) -> PriceUpdate {
        PriceUpdate {
            initial_price: self.initial,
            negotiated_price: self.negotiated,
            approved_price: self.approved,
            vat_pct: self.vat,
        }
    }
}

/// Edits one line item's prices, subject to its quotation's status.
pub fn run(args: SetPricesArgs) -> CommandResult {
    with_database("set-prices", |_config, pool| execute(pool, args))
}

async fn execute(pool: DbPool, args: SetPricesArgs) -> Result<CommandResult, Failure> {
    let update = args.update();
    if update.touched_fields().is_empty() {
        return Err((
            "validation",
            "nothing to update: pass at least one of --initial, --negotiated, --approved, --vat"
                .to_string(),
            6,
        ));
    }

    let correlation_id = correlation_id("set-prices");
    let grant = AccessGrant::manager(args.actor.as_str());
    let item = WorkflowService::new(pool)
        .set_item_prices(&grant, &QuoteItemId(args.item.clone()), &update, &correlation_id)
        .await
        .map_err(|error| service_failure(error, &correlation_id))?;

    let fields: Vec<&str> = update.touched_fields().iter().map(|field| field.as_str()).collect();
    let message = format!("updated {} on item {}", fields.join(", "), item.id.0);
    Ok(CommandResult::success_with_data("set-prices", message, &item))
}
