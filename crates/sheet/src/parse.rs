use std::io::Cursor;
use std::str::FromStr;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use procura_core::domain::period::Period;
use procura_core::import::{ImportError, ImportFile, ImportHeader, ImportLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderKey {
    Period,
    Region,
    SupplierCode,
    SupplierName,
    QuoteDate,
    Category,
}

impl HeaderKey {
    fn from_label(label: &str) -> Option<Self> {
        match compact(label).as_str() {
            "period" => Some(Self::Period),
            "region" => Some(Self::Region),
            "suppliercode" => Some(Self::SupplierCode),
            "suppliername" | "supplier" => Some(Self::SupplierName),
            "quotedate" => Some(Self::QuoteDate),
            "category" => Some(Self::Category),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Period => "period",
            Self::Region => "region",
            Self::SupplierCode => "supplier code",
            Self::SupplierName => "supplier name",
            Self::QuoteDate => "quote date",
            Self::Category => "category",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Column {
    ProductCode,
    ProductName,
    Specification,
    Unit,
    Quantity,
    UnitPrice,
    Vat,
    Notes,
}

impl Column {
    const REQUIRED: [Column; 3] = [Column::ProductCode, Column::Quantity, Column::UnitPrice];

    fn from_label(label: &str) -> Option<Self> {
        match compact(label).as_str() {
            "productcode" | "code" => Some(Self::ProductCode),
            "productname" | "product" | "name" => Some(Self::ProductName),
            "specification" | "spec" => Some(Self::Specification),
            "unit" => Some(Self::Unit),
            "quantity" | "qty" => Some(Self::Quantity),
            "unitprice" | "price" | "initialprice" => Some(Self::UnitPrice),
            "vat" | "vatpct" | "vatpercent" | "vatrate" => Some(Self::Vat),
            "notes" | "note" => Some(Self::Notes),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ProductCode => "product code",
            Self::ProductName => "product name",
            Self::Specification => "specification",
            Self::Unit => "unit",
            Self::Quantity => "quantity",
            Self::UnitPrice => "unit price",
            Self::Vat => "vat",
            Self::Notes => "notes",
        }
    }
}

/// Column positions found on the line-item header row.
#[derive(Debug, Default)]
struct ColumnMap {
    positions: Vec<(Column, usize)>,
}

impl ColumnMap {
    fn from_row(row: &[Data]) -> Self {
        let mut positions: Vec<(Column, usize)> = Vec::new();
        for (index, cell) in row.iter().enumerate() {
            let Some(column) = cell_text(cell).as_deref().and_then(Column::from_label) else {
                continue;
            };
            if !positions.iter().any(|(known, _)| *known == column) {
                positions.push((column, index));
            }
        }
        Self { positions }
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.positions.iter().find(|(known, _)| *known == column).map(|(_, index)| *index)
    }

    fn cell<'a>(&self, row: &'a [Data], column: Column) -> &'a Data {
        self.position(column).and_then(|index| row.get(index)).unwrap_or(&Data::Empty)
    }
}

/// Reads the first worksheet of an xlsx quotation file.
pub fn parse_quotation_workbook(source: &str, bytes: &[u8]) -> Result<ImportFile, ImportError> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|error: calamine::XlsxError| {
            ImportError::Unreadable { message: error.to_string() }
        })?;
    let sheet_names = workbook.sheet_names();
    let first = sheet_names
        .first()
        .ok_or_else(|| ImportError::Unreadable { message: "workbook has no worksheets".to_string() })?;
    let range = workbook
        .worksheet_range(first)
        .map_err(|error| ImportError::Unreadable { message: error.to_string() })?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    let file = parse_quotation_rows(source, first_row, &rows)?;
    tracing::debug!(
        event_name = "sheet.workbook_parsed",
        source,
        worksheet = %first,
        lines = file.lines.len(),
        "quotation workbook parsed"
    );
    Ok(file)
}

/// Parses already-loaded cells. `first_row` is the 0-based sheet row of
/// `rows[0]`; reported row numbers are 1-based sheet rows.
pub fn parse_quotation_rows(
    source: &str,
    first_row: usize,
    rows: &[Vec<Data>],
) -> Result<ImportFile, ImportError> {
    let column_row = rows
        .iter()
        .position(|row| ColumnMap::from_row(row).position(Column::ProductCode).is_some())
        .ok_or_else(|| ImportError::MissingColumn { column: Column::ProductCode.label().to_string() })?;

    let header = parse_header(&rows[..column_row], first_row)?;

    let columns = ColumnMap::from_row(&rows[column_row]);
    for required in Column::REQUIRED {
        if columns.position(required).is_none() {
            return Err(ImportError::MissingColumn { column: required.label().to_string() });
        }
    }

    let mut lines = Vec::new();
    for (offset, row) in rows[column_row + 1..].iter().enumerate() {
        if row.iter().all(|cell| cell_text(cell).is_none()) {
            break;
        }
        let row_number = first_row + column_row + offset + 2;
        lines.push(parse_line(&columns, row, row_number)?);
    }

    Ok(ImportFile { source: source.to_string(), header, lines })
}

fn parse_header(rows: &[Vec<Data>], first_row: usize) -> Result<ImportHeader, ImportError> {
    let mut period = None;
    let mut region = None;
    let mut supplier_code = None;
    let mut supplier_name = None;
    let mut quote_date = None;
    let mut category = None;

    for (index, row) in rows.iter().enumerate() {
        let row_number = first_row + index + 1;
        let Some((key, value)) = labelled_value(row) else {
            continue;
        };
        let value = value.as_ref();
        match key {
            HeaderKey::Period => {
                period = header_date(value, row_number, key)?.map(Period::new);
            }
            HeaderKey::QuoteDate => quote_date = header_date(value, row_number, key)?,
            HeaderKey::Region => region = value.and_then(cell_text),
            HeaderKey::SupplierCode => supplier_code = value.and_then(cell_text),
            HeaderKey::SupplierName => supplier_name = value.and_then(cell_text),
            HeaderKey::Category => category = value.and_then(cell_text),
        }
    }

    Ok(ImportHeader {
        period: period.ok_or_else(|| missing_header(HeaderKey::Period))?,
        region: region.ok_or_else(|| missing_header(HeaderKey::Region))?,
        supplier_code: supplier_code.ok_or_else(|| missing_header(HeaderKey::SupplierCode))?,
        supplier_name: supplier_name.ok_or_else(|| missing_header(HeaderKey::SupplierName))?,
        quote_date,
        category,
    })
}

/// Finds `Label: value` in one cell, or `Label:` followed by the value in the
/// next non-empty cell.
fn labelled_value(row: &[Data]) -> Option<(HeaderKey, Option<Data>)> {
    let (label_index, text) =
        row.iter().enumerate().find_map(|(index, cell)| cell_text(cell).map(|text| (index, text)))?;
    let (label, inline) = match text.split_once(':') {
        Some((label, rest)) => (label, rest.trim()),
        None => (text.as_str(), ""),
    };
    let key = HeaderKey::from_label(label)?;

    if !inline.is_empty() {
        return Some((key, Some(Data::String(inline.to_string()))));
    }
    let value = row[label_index + 1..].iter().find(|cell| cell_text(cell).is_some()).cloned();
    Some((key, value))
}

fn header_date(
    value: Option<&Data>,
    row: usize,
    key: HeaderKey,
) -> Result<Option<NaiveDate>, ImportError> {
    match value {
        None => Ok(None),
        Some(cell) => cell_date(cell).map(Some).ok_or_else(|| ImportError::InvalidCell {
            row,
            column: key.label().to_string(),
            message: format!("`{}` is not a YYYY-MM-DD date", cell_text(cell).unwrap_or_default()),
        }),
    }
}

fn parse_line(columns: &ColumnMap, row: &[Data], row_number: usize) -> Result<ImportLine, ImportError> {
    let text = |column| cell_text(columns.cell(row, column));
    let required_number = |column: Column| {
        cell_decimal(columns.cell(row, column), row_number, column)?.ok_or_else(|| {
            ImportError::InvalidCell {
                row: row_number,
                column: column.label().to_string(),
                message: "value is required".to_string(),
            }
        })
    };

    Ok(ImportLine {
        row_number,
        product_code: text(Column::ProductCode).unwrap_or_default(),
        product_name: text(Column::ProductName),
        specification: text(Column::Specification),
        unit: text(Column::Unit),
        quantity: required_number(Column::Quantity)?,
        unit_price: required_number(Column::UnitPrice)?,
        vat_pct: cell_decimal(columns.cell(row, Column::Vat), row_number, Column::Vat)?,
        notes: text(Column::Notes),
    })
}

fn missing_header(key: HeaderKey) -> ImportError {
    ImportError::MissingHeader { key: key.label().to_string() }
}

/// Lower-cased alphanumerics only: `Unit Price`, `unit_price` and `UNIT-PRICE`
/// all compare equal.
fn compact(label: &str) -> String {
    label.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            value.trim().to_string()
        }
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => serial_date(value.as_f64())
            .map(|date| date.format(Period::FORMAT).to_string())
            .unwrap_or_else(|| value.as_f64().to_string()),
    };
    (!text.is_empty()).then_some(text)
}

fn cell_decimal(cell: &Data, row: usize, column: Column) -> Result<Option<Decimal>, ImportError> {
    let invalid = |shown: String| ImportError::InvalidCell {
        row,
        column: column.label().to_string(),
        message: format!("`{shown}` is not a number"),
    };
    match cell {
        Data::Empty => Ok(None),
        Data::Int(value) => Ok(Some(Decimal::from(*value))),
        // Display for f64 is the shortest round-trip form, never exponential.
        Data::Float(value) => {
            Decimal::from_str(&value.to_string()).map(Some).map_err(|_| invalid(value.to_string()))
        }
        Data::String(value) => {
            let trimmed = value.trim().trim_end_matches('%').trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            Decimal::from_str(&trimmed.replace(',', ""))
                .map(Some)
                .map_err(|_| invalid(value.clone()))
        }
        other => Err(invalid(cell_text(other).unwrap_or_default())),
    }
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(value) => serial_date(value.as_f64()),
        Data::Float(value) => serial_date(*value),
        Data::Int(value) => serial_date(*value as f64),
        Data::String(value) | Data::DateTimeIso(value) => {
            let trimmed = value.trim();
            NaiveDate::parse_from_str(trimmed.get(..10).unwrap_or(trimmed), Period::FORMAT).ok()
        }
        _ => None,
    }
}

/// Excel 1900 date system; serial 60 is the phantom 1900-02-29.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !(61.0..2_958_466.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}
