use thiserror::Error;

use crate::domain::period::Period;
use crate::domain::quotation::QuotationStatus;

/// File-level import failures. Any of these aborts the file it occurred in and
/// nothing else.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("unreadable workbook: {message}")]
    Unreadable { message: String },
    #[error("missing required header `{key}`")]
    MissingHeader { key: String },
    #[error("missing required column `{column}`")]
    MissingColumn { column: String },
    #[error("row {row}, column `{column}`: {message}")]
    InvalidCell { row: usize, column: String, message: String },
    #[error("file has no line items")]
    EmptyFile,
    #[error("period mismatch: file declares {declared}, batch targets {target}")]
    PeriodMismatch { declared: Period, target: Period },
    #[error("region mismatch: file declares `{declared}`, batch targets `{target}`")]
    RegionMismatch { declared: String, target: String },
    #[error("unknown supplier code `{code}`")]
    UnknownSupplier { code: String },
    #[error("unknown product codes: {}", .codes.join(", "))]
    UnknownProducts { codes: Vec<String> },
    #[error("quotation `{code}` already exists for this supplier, period and region; re-run with overwrite to replace it")]
    DuplicateQuotation { code: String },
    #[error("quotation `{code}` is {status}; its line items can only be replaced while pending or in negotiation")]
    QuotationLocked { code: String, status: QuotationStatus },
    #[error("batch has {count} files, more than the configured maximum of {max}")]
    TooManyFiles { count: usize, max: usize },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ImportError {
    /// Short machine-readable class used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader { .. } | Self::MissingColumn { .. } | Self::InvalidCell { .. } => {
                "validation"
            }
            Self::Unreadable { .. } | Self::EmptyFile => "validation",
            Self::PeriodMismatch { .. } | Self::RegionMismatch { .. } => "target_mismatch",
            Self::UnknownSupplier { .. } | Self::UnknownProducts { .. } => "referential",
            Self::DuplicateQuotation { .. } | Self::QuotationLocked { .. } => "conflict",
            Self::TooManyFiles { .. } => "batch_limit",
            Self::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ImportError;

    #[test]
    fn unknown_products_lists_every_code() {
        let error = ImportError::UnknownProducts { codes: vec!["P9".to_string(), "P12".to_string()] };
        assert_eq!(error.to_string(), "unknown product codes: P9, P12");
        assert_eq!(error.kind(), "referential");
    }
}
