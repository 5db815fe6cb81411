//! Records and the per-unit variable context

use crate::config::EngineConfig;
use crate::placeholder::Context;
use chrono::{DateTime, NaiveDate, Utc};
use numbering::{
    format_manufacture_date, format_production_date, DateParts, ProductAttributes, ProductClass,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog entry a unit is made from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// 1C accounting code
    pub code_1c: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drilling_depth: Option<String>,
    /// Height in millimetres, without unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    /// Waterway width in millimetres, without unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waterways: Option<String>,

    #[serde(default)]
    pub product_type: ProductClass,
}

impl Product {
    pub fn new(code_1c: &str, name: &str) -> Self {
        Self {
            code_1c: code_1c.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_article(mut self, article: &str) -> Self {
        self.article = Some(article.to_string());
        self
    }

    pub fn with_matrix(mut self, matrix: &str) -> Self {
        self.matrix = Some(matrix.to_string());
        self
    }

    pub fn with_drilling_depth(mut self, depth: &str) -> Self {
        self.drilling_depth = Some(depth.to_string());
        self
    }

    pub fn with_height(mut self, height: &str) -> Self {
        self.height = Some(height.to_string());
        self
    }

    pub fn with_type(mut self, class: ProductClass) -> Self {
        self.product_type = class;
        self
    }

    /// Warehouse code printed and barcoded on labels: the article, else the 1C code
    pub fn stock_code(&self) -> &str {
        non_empty(self.article.as_deref()).unwrap_or(self.code_1c.trim())
    }

    /// Attributes that go into the document number
    pub fn number_attributes(&self) -> ProductAttributes {
        let mut attrs = ProductAttributes::new();
        if let Some(matrix) = non_empty(self.matrix.as_deref()) {
            attrs = attrs.matrix(matrix);
        }
        if let Some(depth) = non_empty(self.drilling_depth.as_deref()) {
            attrs = attrs.drilling_depth(depth);
        }
        attrs
    }
}

/// Business payload for one unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// A number issued earlier; absent means one is issued at render time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,

    /// Additional template variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    pub fn new(product: Product) -> Self {
        Self {
            product: Some(product),
            ..Self::default()
        }
    }

    pub fn with_document_number(mut self, number: &str) -> Self {
        self.document_number = Some(number.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_extra(mut self, name: &str, value: &str) -> Self {
        self.extra.insert(name.to_string(), value.to_string());
        self
    }

    /// Production date: the creation date, or `now` for records without one
    pub fn production_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.created_at.unwrap_or(now).date_naive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Put a line break after the first occurrence of each token
///
/// Spaces after the token are dropped; a token already at the end of a line is
/// left alone.
fn break_after_tokens(name: &str, tokens: &[String]) -> String {
    let mut out = name.to_string();
    for token in tokens.iter().filter(|t| !t.is_empty()) {
        let Some(pos) = out.find(token.as_str()) else {
            continue;
        };
        let end = pos + token.len();
        let rest = out[end..].trim_start_matches(' ');
        if rest.is_empty() || rest.starts_with('\n') {
            continue;
        }
        out = format!("{}\n{}", &out[..end], rest);
    }
    out
}

fn with_mm(value: Option<&str>) -> String {
    non_empty(value)
        .map(|v| format!("{v} мм."))
        .unwrap_or_default()
}

/// Bind the document number to every variable that shows it
pub(crate) fn set_document_number(ctx: &mut Context, document_number: &str) {
    for name in ["serial_number", "serial number", "document_number"] {
        ctx.insert(name, document_number);
    }
}

/// Build the variables of one unit
///
/// Every known variable is present, empty when the record has no value, so a
/// template never shows a raw marker for missing data. Returns the context and
/// the required fields that came out empty; a record without a product is
/// reported as missing `product`.
pub fn build_context(
    record: &Record,
    document_number: &str,
    date: NaiveDate,
    config: &EngineConfig,
) -> (Context, Vec<String>) {
    let mut ctx = Context::new();

    for (name, value) in &config.company {
        ctx.insert(name, value.as_str());
    }

    let product = record.product.clone().unwrap_or_default();
    let matrix = non_empty(product.matrix.as_deref())
        .unwrap_or(&config.numbering.default_matrix)
        .to_string();

    ctx.insert(
        "nomenclature_name",
        break_after_tokens(product.name.trim(), &config.line_break_tokens),
    );
    ctx.insert("article", non_empty(product.article.as_deref()).unwrap_or_default());
    ctx.insert("stock_code", product.stock_code());
    ctx.insert("code_1c", product.code_1c.trim());
    ctx.insert("matrix", matrix);
    ctx.insert("height", with_mm(product.height.as_deref()));
    ctx.insert("waterways", with_mm(product.waterways.as_deref()));
    ctx.insert(
        "drilling_depth",
        non_empty(product.drilling_depth.as_deref()).unwrap_or_default(),
    );
    ctx.insert("thread", non_empty(product.thread.as_deref()).unwrap_or_default());
    ctx.insert(
        "product_type",
        if record.product.is_some() {
            product.product_type.as_str()
        } else {
            ""
        },
    );

    set_document_number(&mut ctx, document_number);

    let production_date = format_production_date(date);
    let parts = DateParts::from_date(date);
    ctx.insert("production_date", production_date.as_str());
    ctx.insert("date", production_date);
    ctx.insert("manufacture_date", format_manufacture_date(date));
    ctx.insert("day", parts.day);
    ctx.insert("month", parts.month);
    ctx.insert("year", parts.year);

    ctx.insert("order_number", record.order_number.as_deref().unwrap_or_default());

    for (name, value) in &record.extra {
        ctx.insert(name, value.as_str());
    }

    let missing = if record.product.is_none() {
        vec!["product".to_string()]
    } else {
        config
            .required_fields
            .iter()
            .filter(|field| ctx.get(field).map_or(true, |v| v.trim().is_empty()))
            .cloned()
            .collect()
    };

    (ctx, missing)
}
