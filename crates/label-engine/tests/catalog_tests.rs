//! Catalog import against workbooks shaped like the accounting exports

use label_engine::{import_catalog, ColumnMapping, EngineError};
use numbering::ProductClass;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;

/// Workbook with a title row, a header row and the given data rows
fn workbook(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Номенклатура на складе").unwrap();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(1, col as u16, *header).unwrap();
    }
    for (i, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(i as u32 + 2, col as u16, *value).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

#[test]
fn test_standard_mapping_finds_columns_by_header() {
    let bytes = workbook(
        &["Артикул", "Наименование", "Код 1С"],
        &[
            &["ЦБ-0001", "Коронка импрегнированная NQ 05-07 высота 12 мм", "3501040"],
            &["", "Расширитель HQ3 резьба W", "3501041"],
            &["X-1", "Башмак обсадной", ""],
        ],
    );

    let products = import_catalog(&bytes, &ColumnMapping::standard()).unwrap();
    assert_eq!(products.len(), 2);

    let crown = &products[0];
    assert_eq!(crown.code_1c, "3501040");
    assert_eq!(crown.article.as_deref(), Some("ЦБ-0001"));
    assert_eq!(crown.matrix.as_deref(), Some("NQ"));
    assert_eq!(crown.drilling_depth.as_deref(), Some("05-07"));
    assert_eq!(crown.height.as_deref(), Some("12"));
    assert_eq!(crown.product_type, ProductClass::Crown);
    assert_eq!(crown.stock_code(), "ЦБ-0001");

    let reamer = &products[1];
    assert_eq!(reamer.article, None);
    assert_eq!(reamer.matrix.as_deref(), Some("HQ3"));
    assert_eq!(reamer.thread.as_deref(), Some("W"));
    assert_eq!(reamer.product_type, ProductClass::Reamer);
    assert_eq!(reamer.stock_code(), "3501041");
}

#[test]
fn test_alfa_legacy_assigns_swapped_columns() {
    let bytes = workbook(
        &["Артикул", "Код 1С", "Наименование"],
        &[
            &["3501050", "ALF-12", "Коронка ALFA импрегнированная"],
            &["3501051", "", "Коронка ALFA без артикула"],
        ],
    );

    let products = import_catalog(&bytes, &ColumnMapping::alfa_legacy()).unwrap();
    assert_eq!(products.len(), 1);

    let crown = &products[0];
    assert_eq!(crown.code_1c, "3501050");
    assert_eq!(crown.article.as_deref(), Some("ALF-12"));
    assert_eq!(crown.matrix.as_deref(), Some("BQ"));
    assert_eq!(crown.thread.as_deref(), Some("BQ"));
}

#[test]
fn test_large_catalog_imports_every_row() {
    let rows: Vec<[String; 3]> = (0..5_000)
        .map(|i| {
            [
                format!("ЦБ-{i:05}"),
                format!("Коронка импрегнированная NQ 05-07 №{i}"),
                format!("{}", 3_500_000 + i),
            ]
        })
        .collect();
    let rows: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| row.iter().map(String::as_str).collect())
        .collect();
    let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
    let bytes = workbook(&["Артикул", "Наименование", "Код 1С"], &rows);

    let products = import_catalog(&bytes, &ColumnMapping::standard()).unwrap();
    assert_eq!(products.len(), 5_000);
    assert_eq!(products[4_999].code_1c, "3504999");
    assert_eq!(products[4_999].article.as_deref(), Some("ЦБ-04999"));
}

#[test]
fn test_missing_header_is_reported() {
    let bytes = workbook(&["Наименование", "Артикул"], &[&["Коронка NQ", "ЦБ-1"]]);

    let err = import_catalog(&bytes, &ColumnMapping::standard()).unwrap_err();
    assert!(matches!(err, EngineError::Catalog(_)), "{err}");
    assert!(err.to_string().contains("Код 1С"), "{err}");
}

#[test]
fn test_unknown_mapping_name() {
    assert!(ColumnMapping::by_name("Alfa_Legacy").is_ok());
    assert!(matches!(
        ColumnMapping::by_name("vendor-x"),
        Err(EngineError::Catalog(_))
    ));
}
