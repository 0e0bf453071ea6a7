use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use rust_decimal::Decimal;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use procura_core::config::ExportConfig;
use procura_core::domain::product::{Product, ProductId};
use procura_core::domain::quotation::{QuotationId, QuoteItemId};
use procura_core::domain::supplier::SupplierId;
use procura_core::import::ImportError;
use procura_core::pricing::{
    ComparisonMatrix, MatrixCell, MatrixRow, PriceCell, PriceSource, QuantityTier, ResolvedPrice,
    ResolvedQuantity, SupplierColumn,
};
use procura_sheet::{export_comparison, parse_quotation_workbook, NOT_YET_QUOTED, ROSTER_SHEET};

fn quotation_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let period = ExcelDateTime::parse_from_str("2024-03-01").expect("date");

    sheet.write_string(0, 0, "Period:").expect("write");
    sheet.write_datetime_with_format(0, 1, &period, &date).expect("write");
    sheet.write_string(1, 0, "Region: North").expect("write");
    sheet.write_string(2, 0, "Supplier Code: FRESH").expect("write");
    sheet.write_string(3, 0, "Quote date: 2024-03-02").expect("write");
    sheet.write_string(4, 0, "Category: meat").expect("write");
    sheet.write_string(5, 0, "Supplier name: Fresh Farm").expect("write");

    for (col, label) in ["Product code", "Product name", "Unit", "Quantity", "Unit price", "VAT"]
        .iter()
        .enumerate()
    {
        sheet.write_string(6, col as u16, *label).expect("write");
    }
    sheet.write_string(7, 0, "PORK").expect("write");
    sheet.write_string(7, 1, "Pork shoulder").expect("write");
    sheet.write_string(7, 2, "kg").expect("write");
    sheet.write_number(7, 3, 20).expect("write");
    sheet.write_number(7, 4, 84000.5).expect("write");
    sheet.write_number(7, 5, 5).expect("write");
    sheet.write_string(8, 0, "BEEF").expect("write");
    sheet.write_number(8, 3, 4).expect("write");
    sheet.write_number(8, 4, 240000).expect("write");

    workbook.save_to_buffer().expect("save")
}

#[test]
fn parses_a_written_quotation_workbook() {
    let file = parse_quotation_workbook("fresh.xlsx", &quotation_workbook()).expect("parse");

    assert_eq!(file.source, "fresh.xlsx");
    assert_eq!(file.header.period.to_string(), "2024-03-01");
    assert_eq!(file.header.region, "North");
    assert_eq!(file.header.supplier_code, "FRESH");
    assert_eq!(file.header.quote_date.map(|date| date.to_string()).as_deref(), Some("2024-03-02"));
    assert_eq!(file.header.category.as_deref(), Some("meat"));
    assert_eq!(file.header.supplier_name, "Fresh Farm");

    assert_eq!(file.lines.len(), 2);
    let pork = &file.lines[0];
    assert_eq!(pork.row_number, 8);
    assert_eq!(pork.product_name.as_deref(), Some("Pork shoulder"));
    assert_eq!(pork.quantity, Decimal::from(20));
    assert_eq!(pork.unit_price, Decimal::new(840005, 1));
    assert_eq!(pork.vat_pct, Some(Decimal::from(5)));
    let beef = &file.lines[1];
    assert_eq!(beef.row_number, 9);
    assert_eq!(beef.vat_pct, None);
    assert_eq!(beef.unit, None);
}

#[test]
fn garbage_bytes_are_an_unreadable_workbook() {
    let error = parse_quotation_workbook("notes.txt", b"not a workbook").expect_err("unreadable");
    assert!(matches!(error, ImportError::Unreadable { .. }));
    assert_eq!(error.kind(), "validation");
}

fn supplier(code: &str, quoted: usize) -> SupplierColumn {
    SupplierColumn {
        supplier_id: SupplierId(format!("s-{code}")),
        code: code.to_string(),
        name: format!("{code} Foods"),
        contact: format!("{code} desk"),
        quotation_ids: vec![QuotationId(format!("q-{code}"))],
        quoted_products: quoted,
        total_products: 3,
        coverage_pct: Decimal::new(6667, 2),
    }
}

fn row(code: &str, category: Option<&str>, totals: [(Option<i64>, bool); 2]) -> MatrixRow {
    let cells = ["FRESH", "GREEN"]
        .iter()
        .zip(totals)
        .map(|(supplier, (total, is_best))| MatrixCell {
            supplier_id: SupplierId(format!("s-{supplier}")),
            quote: total.map(|total| PriceCell {
                quotation_id: QuotationId(format!("q-{supplier}")),
                item_id: QuoteItemId(format!("i-{supplier}-{code}")),
                line_quantity: Decimal::ONE,
                price: Some(ResolvedPrice {
                    unit_price: Decimal::from(total),
                    vat_pct: Decimal::ZERO,
                    total_with_vat: Decimal::from(total),
                    source: PriceSource::Initial,
                }),
                initial_total: Some(Decimal::from(total)),
                is_best,
            }),
        })
        .collect();
    MatrixRow {
        product: Product {
            id: ProductId(format!("p-{code}")),
            code: code.to_string(),
            name: format!("Product {code}"),
            specification: None,
            unit: "kg".to_string(),
            category: category.map(str::to_string),
            base_price: None,
            base_quantity: None,
            active: true,
            deleted_at: None,
        },
        cells,
        best_supplier: None,
        best_total: None,
        min_initial_total: None,
        quantity: Some(ResolvedQuantity { quantity: Decimal::from(12), tier: QuantityTier::BaseQuantity }),
    }
}

#[test]
fn exported_matrix_has_roster_and_one_sheet_per_category() {
    let matrix = ComparisonMatrix {
        suppliers: vec![supplier("FRESH", 2), supplier("GREEN", 2)],
        rows: vec![
            row("CAB", Some("Vegetable"), [(Some(12000), false), (Some(11000), true)]),
            row("PORK", Some("meat"), [(Some(100800), true), (None, false)]),
            row("ONION", Some("vegetable"), [(None, false), (Some(3000), true)]),
        ],
    };
    let export = ExportConfig { best_price_color: "#C6EFCE".to_string() };
    let bytes = export_comparison(&matrix, &export).expect("export");

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).expect("open");
    assert_eq!(workbook.sheet_names(), vec![ROSTER_SHEET.to_string(), "Vegetable".to_string(), "meat".to_string()]);

    let roster = workbook.worksheet_range(ROSTER_SHEET).expect("roster");
    assert_eq!(roster.get_value((0, 3)), Some(&Data::String("Quoted products".to_string())));
    assert_eq!(roster.get_value((2, 0)), Some(&Data::String("GREEN".to_string())));
    assert_eq!(roster.get_value((2, 2)), Some(&Data::String("GREEN desk".to_string())));

    let vegetables = workbook.worksheet_range("Vegetable").expect("vegetables");
    assert_eq!(vegetables.get_value((0, 4)), Some(&Data::String("FRESH Foods".to_string())));
    assert_eq!(vegetables.get_value((0, 7)), Some(&Data::String("GREEN Foods".to_string())));
    assert_eq!(vegetables.get_value((1, 6)), Some(&Data::String("Total with VAT".to_string())));
    assert_eq!(vegetables.get_value((2, 0)), Some(&Data::String("CAB".to_string())));
    assert_eq!(vegetables.get_value((2, 9)), Some(&Data::Float(11000.0)));
    assert_eq!(vegetables.get_value((3, 0)), Some(&Data::String("ONION".to_string())));
    assert!(matches!(vegetables.get_value((3, 4)), None | Some(Data::Empty)));

    let meat = workbook.worksheet_range("meat").expect("meat");
    assert_eq!(meat.get_value((2, 3)), Some(&Data::Float(12.0)));
    assert_eq!(meat.get_value((2, 6)), Some(&Data::Float(100800.0)));
}

#[test]
fn unpriced_line_items_are_labelled_rather_than_left_blank() {
    let mut pork = row("PORK", Some("meat"), [(Some(100800), true), (Some(99000), false)]);
    if let Some(quote) = pork.cells[1].quote.as_mut() {
        quote.price = None;
        quote.is_best = false;
    }
    let matrix = ComparisonMatrix {
        suppliers: vec![supplier("FRESH", 1), supplier("GREEN", 1)],
        rows: vec![pork, row("BEEF", Some("meat"), [(Some(240000), true), (None, false)])],
    };
    let export = ExportConfig { best_price_color: "#C6EFCE".to_string() };
    let bytes = export_comparison(&matrix, &export).expect("export");

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).expect("open");
    let meat = workbook.worksheet_range("meat").expect("meat");
    assert_eq!(meat.get_value((2, 7)), Some(&Data::String(NOT_YET_QUOTED.to_string())));
    assert!(matches!(meat.get_value((2, 9)), None | Some(Data::Empty)));
    assert!(matches!(meat.get_value((3, 7)), None | Some(Data::Empty)));
}
