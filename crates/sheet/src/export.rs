use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use procura_core::config::ExportConfig;
use procura_core::domain::fold_key;
use procura_core::pricing::{ComparisonMatrix, MatrixCell, MatrixRow, SupplierColumn};

pub const ROSTER_SHEET: &str = "Suppliers";

const UNCATEGORIZED: &str = "Uncategorized";
const PRODUCT_COLUMNS: [&str; 4] = ["Code", "Product", "Unit", "Quantity"];
const SUPPLIER_COLUMNS: [&str; 3] = ["Unit price", "VAT %", "Total with VAT"];
const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("workbook write failed: {0}")]
    Write(#[from] XlsxError),
}

struct Formats {
    header: Format,
    number: Format,
    best: Format,
}

impl Formats {
    fn new(export: &ExportConfig) -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin),
            number: Format::new().set_num_format("#,##0.00"),
            best: Format::new()
                .set_num_format("#,##0.00")
                .set_bold()
                .set_background_color(Color::RGB(export.best_price_rgb())),
        }
    }
}

/// Renders a comparison matrix as xlsx bytes: a supplier roster followed by
/// one sheet per product category, in first-seen row order.
pub fn export_comparison(matrix: &ComparisonMatrix, export: &ExportConfig) -> Result<Vec<u8>, SheetError> {
    let formats = Formats::new(export);
    let mut workbook = Workbook::new();

    let mut roster = Worksheet::new();
    roster.set_name(ROSTER_SHEET)?;
    write_roster(&mut roster, &matrix.suppliers, &formats)?;
    workbook.push_worksheet(roster);

    let mut taken = vec![ROSTER_SHEET.to_lowercase()];
    let groups = group_by_category(&matrix.rows);
    for (category, rows) in &groups {
        let mut sheet = Worksheet::new();
        sheet.set_name(unique_sheet_name(category, &mut taken))?;
        write_category(&mut sheet, &matrix.suppliers, rows, &formats)?;
        workbook.push_worksheet(sheet);
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::debug!(
        event_name = "sheet.matrix_exported",
        suppliers = matrix.suppliers.len(),
        rows = matrix.rows.len(),
        categories = groups.len(),
        bytes = bytes.len(),
        "comparison workbook rendered"
    );
    Ok(bytes)
}

fn write_roster(sheet: &mut Worksheet, suppliers: &[SupplierColumn], formats: &Formats) -> Result<(), SheetError> {
    for (col, label) in ["Code", "Supplier", "Contact", "Quoted products", "Coverage %"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *label, &formats.header)?;
    }
    for (index, supplier) in suppliers.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, &supplier.code)?;
        sheet.write_string(row, 1, &supplier.name)?;
        sheet.write_string(row, 2, &supplier.contact)?;
        sheet.write_number(row, 3, supplier.quoted_products as f64)?;
        sheet.write_number_with_format(row, 4, to_f64(supplier.coverage_pct), &formats.number)?;
    }
    sheet.set_column_width(1, 28)?;
    sheet.set_column_width(2, 32)?;
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_category(
    sheet: &mut Worksheet,
    suppliers: &[SupplierColumn],
    rows: &[&MatrixRow],
    formats: &Formats,
) -> Result<(), SheetError> {
    for (col, label) in PRODUCT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *label, &formats.header)?;
    }
    for (index, supplier) in suppliers.iter().enumerate() {
        let first = block_column(index);
        sheet.merge_range(0, first, 0, first + 2, &supplier.name, &formats.header)?;
        for (offset, label) in SUPPLIER_COLUMNS.iter().enumerate() {
            sheet.write_string_with_format(1, first + offset as u16, *label, &formats.header)?;
        }
    }

    for (index, matrix_row) in rows.iter().enumerate() {
        let row = index as u32 + 2;
        let product = &matrix_row.product;
        sheet.write_string(row, 0, &product.code)?;
        sheet.write_string(row, 1, &product.name)?;
        sheet.write_string(row, 2, &product.unit)?;
        if let Some(quantity) = &matrix_row.quantity {
            sheet.write_number(row, 3, to_f64(quantity.quantity))?;
        }
        for (supplier_index, supplier) in suppliers.iter().enumerate() {
            if let Some(cell) = matrix_row.cell(&supplier.supplier_id) {
                write_price_block(sheet, row, block_column(supplier_index), cell, formats)?;
            }
        }
    }

    sheet.set_column_width(1, 28)?;
    sheet.set_freeze_panes(2, PRODUCT_COLUMNS.len() as u16)?;
    Ok(())
}

/// Shown in place of prices for a line item whose price resolution yields nothing.
pub const NOT_YET_QUOTED: &str = "not yet quoted";

fn write_price_block(
    sheet: &mut Worksheet,
    row: u32,
    first: u16,
    cell: &MatrixCell,
    formats: &Formats,
) -> Result<(), SheetError> {
    let Some(quote) = &cell.quote else {
        return Ok(());
    };
    let Some(price) = &quote.price else {
        sheet.write_string(row, first, NOT_YET_QUOTED)?;
        return Ok(());
    };
    let format = if cell.is_best() { &formats.best } else { &formats.number };
    sheet.write_number_with_format(row, first, to_f64(price.unit_price), format)?;
    sheet.write_number_with_format(row, first + 1, to_f64(price.vat_pct), format)?;
    sheet.write_number_with_format(row, first + 2, to_f64(price.total_with_vat), format)?;
    Ok(())
}

fn block_column(supplier_index: usize) -> u16 {
    (PRODUCT_COLUMNS.len() + supplier_index * SUPPLIER_COLUMNS.len()) as u16
}

/// Groups rows by case-insensitive category, keeping the first spelling seen.
fn group_by_category(rows: &[MatrixRow]) -> Vec<(String, Vec<&MatrixRow>)> {
    let mut groups: Vec<(String, Vec<&MatrixRow>)> = Vec::new();
    for row in rows {
        let category = row
            .product
            .category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .unwrap_or(UNCATEGORIZED);
        match groups.iter_mut().find(|(name, _)| fold_key(name) == fold_key(category)) {
            Some((_, members)) => members.push(row),
            None => groups.push((category.to_string(), vec![row])),
        }
    }
    groups
}

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`, unique ignoring case.
fn unique_sheet_name(category: &str, taken: &mut Vec<String>) -> String {
    let cleaned: String = category
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base = if cleaned.is_empty() { UNCATEGORIZED } else { cleaned };

    let mut candidate = truncate(base, MAX_SHEET_NAME);
    let mut counter = 2;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({counter})");
        candidate = format!("{}{suffix}", truncate(base, MAX_SHEET_NAME - suffix.len()));
        counter += 1;
    }
    taken.push(candidate.to_lowercase());
    candidate
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
