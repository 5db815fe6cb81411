//! Product catalog import
//!
//! Catalogs arrive as xlsx exports with a title row, a header row and one product
//! per row. Which column feeds which product field is spelled out by a named
//! [`ColumnMapping`] rather than implied by position.

use crate::loader::xlsx::read_template;
use crate::record::Product;
use crate::{EngineError, Result};
use numbering::ProductClass;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;

static DEPTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}-\d{2})").expect("valid depth regex"));
static HEIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"высота (\d+) мм").expect("valid height regex"));
static THREAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"резьба (\w+)").expect("valid thread regex"));

/// Matrix codes recognised in product names; longer codes are tried first
const MATRICES: [&str; 7] = ["HQ3", "HWT", "PWT", "NQ", "HQ", "PQ", "BQ"];

const DEFAULT_DEPTH: &str = "05-07";
const DEFAULT_HEIGHT: &str = "12";

/// Product field filled from a catalog column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    Code1c,
    Name,
    Article,
}

impl fmt::Display for CatalogField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CatalogField::Code1c => "code_1c",
            CatalogField::Name => "name",
            CatalogField::Article => "article",
        })
    }
}

/// How a column is found in the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    /// Column whose header cell matches, ignoring case and surrounding spaces
    Header(String),
    /// Zero-based column index
    Position(u32),
}

/// Named assignment of catalog columns to product fields
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub name: String,
    /// Zero-based row holding the column headers; data starts below it
    pub header_row: u32,
    pub columns: Vec<(CatalogField, ColumnSelector)>,
    /// Fields that must be non-empty for a row to be imported
    pub required: Vec<CatalogField>,
    /// Matrix used when the product name names none
    pub default_matrix: String,
    /// Use the matrix as thread when the name names no thread
    pub thread_from_matrix: bool,
}

impl ColumnMapping {
    /// Catalog export with `Код 1С`, `Наименование` and `Артикул` headers
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            header_row: 1,
            columns: vec![
                (CatalogField::Code1c, ColumnSelector::Header("Код 1С".to_string())),
                (CatalogField::Name, ColumnSelector::Header("Наименование".to_string())),
                (CatalogField::Article, ColumnSelector::Header("Артикул".to_string())),
            ],
            required: vec![CatalogField::Code1c, CatalogField::Name],
            default_matrix: "NQ".to_string(),
            thread_from_matrix: false,
        }
    }

    /// ALFA crown list
    ///
    /// The sheet is read by position. Its first column, headed `Артикул`, holds
    /// the 1C code and its second column, headed `Код 1С`, holds the article, so
    /// the two are assigned crosswise.
    pub fn alfa_legacy() -> Self {
        Self {
            name: "alfa-legacy".to_string(),
            header_row: 1,
            columns: vec![
                (CatalogField::Code1c, ColumnSelector::Position(0)),
                (CatalogField::Article, ColumnSelector::Position(1)),
                (CatalogField::Name, ColumnSelector::Position(2)),
            ],
            required: vec![CatalogField::Code1c, CatalogField::Article, CatalogField::Name],
            default_matrix: "BQ".to_string(),
            thread_from_matrix: true,
        }
    }

    /// Look up a mapping by name (`standard` or `alfa-legacy`)
    pub fn by_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "alfa-legacy" | "alfa_legacy" => Ok(Self::alfa_legacy()),
            other => Err(EngineError::Catalog(format!("unknown column mapping '{other}'"))),
        }
    }

    /// Each field mapped at most once; `code_1c` and `name` always mapped
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (field, _) in &self.columns {
            if !seen.insert(*field) {
                return Err(EngineError::Catalog(format!(
                    "mapping '{}' assigns {field} twice",
                    self.name
                )));
            }
        }
        for field in [CatalogField::Code1c, CatalogField::Name]
            .iter()
            .chain(self.required.iter())
        {
            if !seen.contains(field) {
                return Err(EngineError::Catalog(format!(
                    "mapping '{}' does not assign {field}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Attributes encoded in a product name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAttributes {
    pub matrix: String,
    pub drilling_depth: String,
    pub height: String,
    pub product_type: ProductClass,
    pub thread: Option<String>,
}

/// Extract matrix, drilling depth, height, product type and thread from a name
pub fn parse_name_attributes(name: &str, default_matrix: &str) -> NameAttributes {
    let matrix = MATRICES
        .iter()
        .find(|code| name.contains(*code))
        .map(|code| code.to_string())
        .unwrap_or_else(|| default_matrix.to_string());

    let capture = |re: &Regex| re.captures(name).map(|caps| caps[1].to_string());

    let lower = name.to_lowercase();
    let product_type = if lower.contains("расширитель") {
        ProductClass::Reamer
    } else if lower.contains("башмак") {
        ProductClass::Shoe
    } else {
        ProductClass::Crown
    };

    NameAttributes {
        matrix,
        drilling_depth: capture(&DEPTH_RE).unwrap_or_else(|| DEFAULT_DEPTH.to_string()),
        height: capture(&HEIGHT_RE).unwrap_or_else(|| DEFAULT_HEIGHT.to_string()),
        product_type,
        thread: capture(&THREAD_RE),
    }
}

/// Read products from a catalog workbook
///
/// Rows missing a required field are skipped.
///
/// # Errors
/// `Catalog` when the mapping is invalid, the workbook cannot be read or a
/// mapped header is absent.
pub fn import_catalog(bytes: &[u8], mapping: &ColumnMapping) -> Result<Vec<Product>> {
    mapping.validate()?;

    let sheet = read_template(bytes, &mapping.name)
        .map_err(|err| EngineError::Catalog(err.to_string()))?;

    let texts: HashMap<(u32, u32), &str> = sheet
        .cells
        .iter()
        .map(|c| ((c.row, c.col), c.text.trim()))
        .collect();
    let text_at = |row: u32, col: u32| texts.get(&(row, col)).copied().unwrap_or_default();

    let header_text = |col: u32| text_at(mapping.header_row, col).to_lowercase();

    let mut columns = Vec::with_capacity(mapping.columns.len());
    for (field, selector) in &mapping.columns {
        let col = match selector {
            ColumnSelector::Position(col) => *col,
            ColumnSelector::Header(header) => {
                let wanted = header.trim().to_lowercase();
                (0..sheet.cols)
                    .find(|col| header_text(*col) == wanted)
                    .ok_or_else(|| {
                        EngineError::Catalog(format!("column '{header}' not found"))
                    })?
            }
        };
        columns.push((*field, col));
    }

    let mut products = Vec::new();
    let mut skipped = 0usize;

    for row in mapping.header_row + 1..sheet.rows {
        let value = |field: CatalogField| {
            columns
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, col)| text_at(row, *col).to_string())
                .unwrap_or_default()
        };

        if mapping.required.iter().any(|field| value(*field).is_empty()) {
            skipped += 1;
            continue;
        }

        let name = value(CatalogField::Name);
        let attrs = parse_name_attributes(&name, &mapping.default_matrix);
        let article = value(CatalogField::Article);
        let thread = attrs
            .thread
            .clone()
            .or_else(|| mapping.thread_from_matrix.then(|| attrs.matrix.clone()));

        products.push(Product {
            code_1c: value(CatalogField::Code1c),
            name,
            article: (!article.is_empty()).then_some(article),
            matrix: Some(attrs.matrix),
            drilling_depth: Some(attrs.drilling_depth),
            height: Some(attrs.height),
            thread,
            waterways: None,
            product_type: attrs.product_type,
        });
    }

    log::info!(
        "event=catalog_import module=catalog status=ok mapping={} products={} skipped={}",
        mapping.name,
        products.len(),
        skipped
    );
    Ok(products)
}
