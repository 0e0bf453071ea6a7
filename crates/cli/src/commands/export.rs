use std::path::PathBuf;

use serde::Serialize;

use procura_core::config::AppConfig;
use procura_db::{ComparisonService, DbPool};
use procura_sheet::export_comparison;

use crate::commands::compare::ComparisonArgs;
use crate::commands::{correlation_id, service_failure, with_database, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct ExportOutput {
    path: String,
    bytes: usize,
    suppliers: usize,
    rows: usize,
}

/// Writes the comparison matrix for the selection to an xlsx file.
pub fn run(selection: ComparisonArgs, output: PathBuf) -> CommandResult {
    with_database("export", |config, pool| execute(config, pool, selection, output))
}

async fn execute(
    config: AppConfig,
    pool: DbPool,
    selection: ComparisonArgs,
    output: PathBuf,
) -> Result<CommandResult, Failure> {
    let correlation_id = correlation_id("export");
    let query = selection.query(&pool).await?;
    let report = ComparisonService::new(pool, config.comparison.tie_break)
        .compare(&query, &correlation_id)
        .await
        .map_err(|error| service_failure(error, &correlation_id))?;

    let matrix = report.matrix();
    let bytes = export_comparison(&matrix, &config.export)
        .map_err(|error| ("export_render", error.to_string(), 10u8))?;
    tokio::fs::write(&output, &bytes)
        .await
        .map_err(|error| ("export_write", format!("{}: {error}", output.display()), 11u8))?;

    tracing::info!(
        event_name = "export.matrix_written",
        correlation_id = %correlation_id,
        path = %output.display(),
        bytes = bytes.len(),
        "comparison workbook written"
    );
    let data = ExportOutput {
        path: output.display().to_string(),
        bytes: bytes.len(),
        suppliers: matrix.suppliers.len(),
        rows: matrix.rows.len(),
    };
    Ok(CommandResult::success_with_data(
        "export",
        format!("wrote {} rows to {}", data.rows, data.path),
        data,
    ))
}
