use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{fold_key, normalize_code};
use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::import::error::ImportError;
use crate::import::model::{ImportFile, ImportHeader, ImportOptions, ImportTarget};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedLine {
    pub row_number: usize,
    /// Normalized (trimmed, upper-case) product code.
    pub product_code: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_pct: Decimal,
    pub specification: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedFile {
    pub source: String,
    pub header: ImportHeader,
    pub supplier_code: String,
    pub lines: Vec<ValidatedLine>,
    pub warnings: Vec<String>,
}

impl ValidatedFile {
    pub fn product_codes(&self) -> BTreeSet<String> {
        self.lines.iter().map(|line| line.product_code.clone()).collect()
    }
}

/// The header must name the batch's period and region (region compared
/// case-insensitively).
pub fn check_target(header: &ImportHeader, target: &ImportTarget) -> Result<(), ImportError> {
    if header.period != target.period {
        return Err(ImportError::PeriodMismatch { declared: header.period, target: target.period });
    }
    if fold_key(&header.region) != fold_key(&target.region) {
        return Err(ImportError::RegionMismatch {
            declared: header.region.clone(),
            target: target.region.clone(),
        });
    }
    Ok(())
}

/// Range checks on every row; fails on the first bad cell with its row number.
pub fn validate_shape(file: &ImportFile, options: &ImportOptions) -> Result<ValidatedFile, ImportError> {
    let supplier_code = normalize_code(&file.header.supplier_code);
    if supplier_code.is_empty() {
        return Err(ImportError::MissingHeader { key: "supplier code".to_string() });
    }
    if file.lines.is_empty() {
        return Err(ImportError::EmptyFile);
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(file.lines.len());
    let mut warnings = Vec::new();

    for line in &file.lines {
        let row = line.row_number;
        let product_code = normalize_code(&line.product_code);
        if product_code.is_empty() {
            return Err(invalid(row, "product code", "must not be empty"));
        }
        if line.quantity <= Decimal::ZERO {
            return Err(invalid(row, "quantity", format!("must be positive, got {}", line.quantity)));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(invalid(row, "unit price", format!("must not be negative, got {}", line.unit_price)));
        }
        let vat_pct = match line.vat_pct {
            Some(vat) if vat < Decimal::ZERO || vat > Decimal::ONE_HUNDRED => {
                return Err(invalid(row, "vat", format!("must be within 0..=100, got {vat}")));
            }
            Some(vat) => vat,
            None => {
                warnings.push(format!(
                    "row {row}: VAT missing for `{product_code}`, defaulted to {}%",
                    options.default_vat_pct
                ));
                options.default_vat_pct
            }
        };
        if !seen.insert(product_code.clone()) {
            warnings.push(format!("row {row}: product `{product_code}` repeated, row skipped"));
            continue;
        }

        lines.push(ValidatedLine {
            row_number: row,
            product_code,
            quantity: line.quantity,
            unit_price: line.unit_price,
            vat_pct,
            specification: non_blank(line.specification.as_deref()),
            notes: non_blank(line.notes.as_deref()),
        });
    }

    Ok(ValidatedFile {
        source: file.source.clone(),
        header: file.header.clone(),
        supplier_code,
        lines,
        warnings,
    })
}

/// Every referenced code that is not in `known`, reported together.
pub fn missing_products(
    referenced: &BTreeSet<String>,
    known: &HashSet<String>,
) -> Result<(), ImportError> {
    let codes: Vec<String> =
        referenced.iter().filter(|code| !known.contains(*code)).cloned().collect();
    if codes.is_empty() {
        Ok(())
    } else {
        Err(ImportError::UnknownProducts { codes })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcilePlan {
    Create,
    /// Replace the line items of an existing quotation, keeping its status.
    Replace(QuotationId),
}

/// Overwrite only reaches quotations whose prices are still open. Approved
/// lines are frozen until a new cycle and cancelled ones are closed.
pub fn plan_reconciliation(
    existing: Option<&Quotation>,
    overwrite: bool,
) -> Result<ReconcilePlan, ImportError> {
    match existing {
        None => Ok(ReconcilePlan::Create),
        Some(quotation) if overwrite => match quotation.status {
            QuotationStatus::Pending | QuotationStatus::Negotiation => {
                Ok(ReconcilePlan::Replace(quotation.id.clone()))
            }
            status @ (QuotationStatus::Approved | QuotationStatus::Cancelled) => {
                Err(ImportError::QuotationLocked { code: quotation.code.clone(), status })
            }
        },
        Some(quotation) => Err(ImportError::DuplicateQuotation { code: quotation.code.clone() }),
    }
}

fn invalid(row: usize, column: &str, message: impl Into<String>) -> ImportError {
    ImportError::InvalidCell { row, column: column.to_string(), message: message.into() }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
