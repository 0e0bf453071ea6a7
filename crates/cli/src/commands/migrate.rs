use procura_core::config::AppConfig;
use procura_db::DbPool;

use crate::commands::{with_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    with_database("migrate", execute)
}

// Migrations are applied while the database is opened.
async fn execute(_config: AppConfig, _pool: DbPool) -> Result<CommandResult, Failure> {
    Ok(CommandResult::success("migrate", "applied pending migrations"))
}
