use procura_core::config::AppConfig;
use procura_db::{DbPool, DemoSeedDataset, SeedQuotationInfo};

use crate::commands::{with_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    with_database("seed", execute)
}

async fn execute(_config: AppConfig, pool: DbPool) -> Result<CommandResult, Failure> {
    let seeded = DemoSeedDataset::load(&pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    let verification = DemoSeedDataset::verify(&pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if !verification.all_present {
        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        return Err(("seed_verification", verification_message(&failed_checks), 6u8));
    }

    Ok(CommandResult::success("seed", seed_message(&seeded.quotations_seeded)))
}

fn seed_message(quotations: &[SeedQuotationInfo]) -> String {
    let lines: Vec<String> = quotations
        .iter()
        .map(|info| format!("  - {}: {} ({})", info.quotation_id, info.status, info.description))
        .collect();
    format!("demo seed dataset loaded with {} quotations:\n{}", quotations.len(), lines.join("\n"))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
