//! Bulk quotation import: file model, shape validation and reconciliation planning.
//!
//! Storage-bound steps (supplier/product lookups, the per-file transaction) live in
//! `procura-db`; everything here is pure so it can run before any database access.

pub mod error;
pub mod model;
pub mod validate;

pub use error::ImportError;
pub use model::{
    FileOutcome, FileReport, ImportBatchResult, ImportFile, ImportHeader, ImportLine,
    ImportOptions, ImportTarget,
};
pub use validate::{
    check_target, missing_products, plan_reconciliation, validate_shape, ReconcilePlan,
    ValidatedFile, ValidatedLine,
};
