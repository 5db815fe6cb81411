//! Document number formatting

use crate::counter::PartitionKey;
use crate::date::two_digit_year;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every passport number
pub const DEFAULT_PREFIX: &str = "AGB";

/// Matrix code used when the product does not declare one
pub const DEFAULT_MATRIX: &str = "NQ";

/// Product class, decides which attribute segments a number carries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductClass {
    /// Core bit (коронка); numbers embed the drilling depth
    #[default]
    Crown,
    /// Reaming shell (расширитель)
    Reamer,
    /// Casing shoe (башмак)
    Shoe,
    /// Any other product type, kept verbatim
    Other(String),
}

impl ProductClass {
    pub fn as_str(&self) -> &str {
        match self {
            ProductClass::Crown => "crown",
            ProductClass::Reamer => "reamer",
            ProductClass::Shoe => "shoe",
            ProductClass::Other(name) => name,
        }
    }

    /// Whether numbers of this class carry the drilling depth segment
    pub fn has_attribute_segment(&self) -> bool {
        matches!(self, ProductClass::Crown)
    }
}

impl From<String> for ProductClass {
    fn from(value: String) -> Self {
        ProductClass::from(value.as_str())
    }
}

impl From<&str> for ProductClass {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "crown" | "коронка" => ProductClass::Crown,
            "reamer" | "расширитель" => ProductClass::Reamer,
            "shoe" | "башмак" => ProductClass::Shoe,
            _ => ProductClass::Other(value.trim().to_string()),
        }
    }
}

impl From<ProductClass> for String {
    fn from(value: ProductClass) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProductClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product attributes that appear inside a document number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductAttributes {
    pub matrix: Option<String>,
    pub drilling_depth: Option<String>,
}

impl ProductAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(mut self, matrix: impl Into<String>) -> Self {
        self.matrix = Some(matrix.into());
        self
    }

    pub fn drilling_depth(mut self, depth: impl Into<String>) -> Self {
        self.drilling_depth = Some(depth.into());
        self
    }
}

/// Number layout: `<PREFIX> [<ATTR>] <MATRIX> <SERIAL:06> <YY>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub prefix: String,
    pub default_matrix: String,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            default_matrix: DEFAULT_MATRIX.to_string(),
        }
    }
}

impl NumberFormat {
    /// Render a number string for a serial issued in `year`
    pub fn format(
        &self,
        class: &ProductClass,
        attrs: &ProductAttributes,
        serial: u64,
        year: i32,
    ) -> String {
        let mut parts: Vec<String> = vec![self.prefix.clone()];

        if class.has_attribute_segment() {
            if let Some(depth) = non_empty(attrs.drilling_depth.as_deref()) {
                parts.push(depth.to_string());
            }
        }

        let matrix = non_empty(attrs.matrix.as_deref()).unwrap_or(&self.default_matrix);
        parts.push(matrix.to_string());
        parts.push(format!("{serial:06}"));
        parts.push(two_digit_year(year));

        parts.join(" ")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// An issued document number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNumber {
    value: String,
    serial: u64,
    partition: PartitionKey,
}

impl DocumentNumber {
    pub(crate) fn new(value: String, serial: u64, partition: PartitionKey) -> Self {
        Self {
            value,
            serial,
            partition,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Counter value the number was built from
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Expand a caller-supplied number into one number per unit
///
/// A single unit keeps the number as is; larger runs get a `-001`, `-002`, ... suffix.
pub fn manual_series(base: &str, count: usize) -> Vec<String> {
    match count {
        0 => Vec::new(),
        1 => vec![base.to_string()],
        n => (1..=n).map(|i| format!("{base}-{i:03}")).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_crown_number_with_depth() {
        let attrs = ProductAttributes::new().matrix("NQ").drilling_depth("05-07");
        let number = NumberFormat::default().format(&ProductClass::Crown, &attrs, 1, 2025);
        assert_eq!(number, "AGB 05-07 NQ 000001 25");
    }

    #[test]
    fn test_crown_number_without_depth_omits_segment() {
        let attrs = ProductAttributes::new().matrix("HQ");
        let number = NumberFormat::default().format(&ProductClass::Crown, &attrs, 42, 2025);
        assert_eq!(number, "AGB HQ 000042 25");
    }

    #[test]
    fn test_reamer_and_shoe_never_carry_depth() {
        let attrs = ProductAttributes::new().matrix("PQ").drilling_depth("3-5");
        let format = NumberFormat::default();
        assert_eq!(
            format.format(&ProductClass::Reamer, &attrs, 7, 2024),
            "AGB PQ 000007 24"
        );
        assert_eq!(
            format.format(&ProductClass::Shoe, &attrs, 8, 2024),
            "AGB PQ 000008 24"
        );
    }

    #[test]
    fn test_default_matrix_used_when_blank() {
        let attrs = ProductAttributes::new().matrix("  ");
        let number = NumberFormat::default().format(&ProductClass::Reamer, &attrs, 3, 2026);
        assert_eq!(number, "AGB NQ 000003 26");
    }

    #[test]
    fn test_serial_widens_past_six_digits() {
        let number = NumberFormat::default().format(
            &ProductClass::Shoe,
            &ProductAttributes::new(),
            1_234_567,
            2025,
        );
        assert_eq!(number, "AGB NQ 1234567 25");
    }

    #[test]
    fn test_product_class_parsing() {
        assert_eq!(ProductClass::from("коронка"), ProductClass::Crown);
        assert_eq!(ProductClass::from("Crown"), ProductClass::Crown);
        assert_eq!(ProductClass::from("РАСШИРИТЕЛЬ"), ProductClass::Reamer);
        assert_eq!(ProductClass::from("башмак"), ProductClass::Shoe);
        assert_eq!(
            ProductClass::from("adapter"),
            ProductClass::Other("adapter".to_string())
        );
    }

    #[test]
    fn test_manual_series() {
        assert_eq!(manual_series("AGB-77", 1), vec!["AGB-77"]);
        assert_eq!(
            manual_series("AGB-77", 3),
            vec!["AGB-77-001", "AGB-77-002", "AGB-77-003"]
        );
        assert!(manual_series("AGB-77", 0).is_empty());
    }
}
