use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::period::Period;
use crate::import::error::ImportError;

/// Labelled key/value block at the top of an import file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportHeader {
    pub period: Period,
    pub region: String,
    pub supplier_code: String,
    pub supplier_name: String,
    pub quote_date: Option<NaiveDate>,
    pub category: Option<String>,
}

/// One parsed line-item row. `row_number` is 1-based in the source sheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLine {
    pub row_number: usize,
    pub product_code: String,
    pub product_name: Option<String>,
    pub specification: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_pct: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFile {
    /// File name or other label used to attribute errors.
    pub source: String,
    pub header: ImportHeader,
    pub lines: Vec<ImportLine>,
}

/// The period and region a batch was declared for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTarget {
    pub period: Period,
    pub region: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub overwrite: bool,
    /// Applied to rows without a VAT rate; each such row produces a warning.
    pub default_vat_pct: Decimal,
    pub max_files_per_batch: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { overwrite: false, default_vat_pct: Decimal::ZERO, max_files_per_batch: 50 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Created { quotation_code: String, items: usize },
    Updated { quotation_code: String, items: usize },
    Rejected { reason: String, kind: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
    pub warnings: Vec<String>,
}

impl FileReport {
    pub fn rejected(source: impl Into<String>, error: &ImportError, warnings: Vec<String>) -> Self {
        Self {
            source: source.into(),
            outcome: FileOutcome::Rejected { reason: error.to_string(), kind: error.kind().to_string() },
            warnings,
        }
    }
}

/// Aggregate over a batch. Files are independent: rejected files do not affect
/// the counts of files that went through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatchResult {
    pub files_total: usize,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
    pub items: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub files: Vec<FileReport>,
}

impl ImportBatchResult {
    pub fn record(&mut self, report: FileReport) {
        self.files_total += 1;
        match &report.outcome {
            FileOutcome::Created { items, .. } => {
                self.processed += 1;
                self.created += 1;
                self.items += items;
            }
            FileOutcome::Updated { items, .. } => {
                self.processed += 1;
                self.updated += 1;
                self.items += items;
            }
            FileOutcome::Rejected { reason, .. } => {
                self.rejected += 1;
                push_unique(&mut self.errors, format!("{}: {reason}", report.source));
            }
        }
        for warning in &report.warnings {
            push_unique(&mut self.warnings, format!("{}: {warning}", report.source));
        }
        self.files.push(report);
    }

    pub fn is_clean(&self) -> bool {
        self.rejected == 0
    }
}

fn push_unique(messages: &mut Vec<String>, message: String) {
    if !messages.contains(&message) {
        messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::{FileOutcome, FileReport, ImportBatchResult};
    use crate::import::error::ImportError;

    #[test]
    fn batch_counts_and_deduplicates_messages() {
        let mut result = ImportBatchResult::default();
        result.record(FileReport {
            source: "a.xlsx".to_string(),
            outcome: FileOutcome::Created { quotation_code: "Q-1".to_string(), items: 3 },
            warnings: vec!["row 4: VAT defaulted".to_string(), "row 4: VAT defaulted".to_string()],
        });
        result.record(FileReport {
            source: "b.xlsx".to_string(),
            outcome: FileOutcome::Updated { quotation_code: "Q-2".to_string(), items: 2 },
            warnings: Vec::new(),
        });
        let error = ImportError::UnknownSupplier { code: "NOPE".to_string() };
        result.record(FileReport::rejected("c.xlsx", &error, Vec::new()));
        result.record(FileReport::rejected("c.xlsx", &error, Vec::new()));

        assert_eq!(result.files_total, 4);
        assert_eq!(result.processed, 2);
        assert_eq!((result.created, result.updated, result.rejected), (1, 1, 2));
        assert_eq!(result.items, 5);
        assert_eq!(result.warnings, vec!["a.xlsx: row 4: VAT defaulted".to_string()]);
        assert_eq!(result.errors, vec!["c.xlsx: unknown supplier code `NOPE`".to_string()]);
        assert!(!result.is_clean());
    }
}
