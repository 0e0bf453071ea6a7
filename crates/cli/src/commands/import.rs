use std::path::{Path, PathBuf};

use procura_core::access::AccessGrant;
use procura_core::config::AppConfig;
use procura_core::import::{FileReport, ImportBatchResult, ImportError, ImportFile, ImportOptions, ImportTarget};
use procura_db::{DbPool, ImportService};
use procura_sheet::parse_quotation_workbook;

use crate::commands::{
    correlation_id, parse_period, service_failure, with_database, CommandResult, Failure,
};

pub struct ImportArgs {
    pub period: String,
    pub region: String,
    pub overwrite: bool,
    pub actor: String,
    pub files: Vec<PathBuf>,
}

/// Imports quotation workbooks for one period and region. Unreadable files
/// are reported alongside the ones the reconciler rejected.
pub fn run(args: ImportArgs) -> CommandResult {
    with_database("import", |config, pool| execute(config, pool, args))
}

async fn execute(config: AppConfig, pool: DbPool, args: ImportArgs) -> Result<CommandResult, Failure> {
    let correlation_id = correlation_id("import");
    let target = ImportTarget { period: parse_period(&args.period)?, region: args.region.clone() };
    if args.files.len() > config.import.max_files_per_batch {
        let error = ImportError::TooManyFiles {
            count: args.files.len(),
            max: config.import.max_files_per_batch,
        };
        return Err(("validation", error.to_string(), 6));
    }

    let mut parsed = Vec::with_capacity(args.files.len());
    let mut unreadable = Vec::new();
    for path in &args.files {
        match read_file(path).await {
            Ok(file) => parsed.push(file),
            Err(error) => {
                tracing::warn!(
                    event_name = "import.file_unreadable",
                    correlation_id = %correlation_id,
                    source = %path.display(),
                    reason = %error,
                    "import file could not be parsed"
                );
                unreadable.push(FileReport::rejected(source_label(path), &error, Vec::new()));
            }
        }
    }

    let options = ImportOptions {
        overwrite: args.overwrite || config.import.allow_overwrite,
        default_vat_pct: config.comparison.default_vat_pct,
        max_files_per_batch: config.import.max_files_per_batch,
    };
    let grant = AccessGrant::manager(args.actor.as_str());
    let mut result = ImportService::new(pool, options)
        .import_batch(&grant, &target, &parsed, &correlation_id)
        .await
        .map_err(|error| service_failure(error, &correlation_id))?;
    for report in unreadable {
        result.record(report);
    }

    Ok(summarize(&result))
}

async fn read_file(path: &Path) -> Result<ImportFile, ImportError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| ImportError::Unreadable { message: error.to_string() })?;
    parse_quotation_workbook(&source_label(path), &bytes)
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn summarize(result: &ImportBatchResult) -> CommandResult {
    let message = format!(
        "{} of {} files imported ({} created, {} updated, {} rejected), {} line items",
        result.processed,
        result.files_total,
        result.created,
        result.updated,
        result.rejected,
        result.items
    );
    if result.is_clean() {
        CommandResult::success_with_data("import", message, result)
    } else {
        CommandResult::partial("import", message, result)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use procura_core::import::{FileOutcome, FileReport, ImportBatchResult, ImportError};

    use super::{source_label, summarize};

    #[test]
    fn source_label_uses_the_file_name() {
        assert_eq!(source_label(Path::new("/tmp/batch/fresh.xlsx")), "fresh.xlsx");
    }

    #[test]
    fn rejected_files_make_the_outcome_partial() {
        let mut result = ImportBatchResult::default();
        result.record(FileReport {
            source: "fresh.xlsx".to_string(),
            outcome: FileOutcome::Created { quotation_code: "Q-202403-NORTH-FRESH".to_string(), items: 2 },
            warnings: Vec::new(),
        });
        let clean = summarize(&result);
        assert_eq!(clean.exit_code, 0);

        let error = ImportError::Unreadable { message: "zip header".to_string() };
        result.record(FileReport::rejected("broken.xlsx", &error, Vec::new()));
        let partial = summarize(&result);
        assert_eq!(partial.exit_code, 1);
        let payload: serde_json::Value = serde_json::from_str(&partial.output).expect("json");
        assert_eq!(payload["status"], "partial");
        assert_eq!(payload["data"]["rejected"], 1);
        assert_eq!(payload["message"], "1 of 2 files imported (1 created, 0 updated, 1 rejected), 2 line items");
    }
}
