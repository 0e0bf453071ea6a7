//! Spreadsheet adapters: quotation workbooks in, comparison workbooks out.

pub mod export;
pub mod parse;

pub use export::{export_comparison, SheetError, NOT_YET_QUOTED, ROSTER_SHEET};
pub use parse::{parse_quotation_rows, parse_quotation_workbook};
