//! Engine configuration

use crate::schema::PageGeometry;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything the engine needs besides templates, assets and records
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub numbering: NumberingConfig,

    /// Static variables available to every template
    pub company: BTreeMap<String, String>,

    /// Words in the nomenclature name that are followed by a line break
    pub line_break_tokens: Vec<String>,

    /// Variables that must be non-empty for a unit to render
    pub required_fields: Vec<String>,

    pub barcode: BarcodeConfig,
    pub layout: LayoutConfig,
    pub pdf: PdfConfig,
    pub docx: DocxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let company = [
            ("website", "almazgeobur.ru"),
            ("company_name_ru", "АЛМАЗГЕОБУР"),
            ("company_name_en", "ALMAZGEOBUR"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            numbering: NumberingConfig::default(),
            company,
            line_break_tokens: vec!["ALFA".to_string()],
            required_fields: vec!["nomenclature_name".to_string(), "stock_code".to_string()],
            barcode: BarcodeConfig::default(),
            layout: LayoutConfig::default(),
            pdf: PdfConfig::default(),
            docx: DocxConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file; a missing file yields the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!(
                "event=config_load module=config status=default path={}",
                path.display()
            );
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.barcode.dpi == 0 {
            return Err(EngineError::Config("barcode dpi must be positive".to_string()));
        }
        if !(self.barcode.width_mm > 0.0 && self.barcode.height_mm > 0.0) {
            return Err(EngineError::Config("barcode size must be positive".to_string()));
        }
        if self.layout.xlsx_page.capacity() == 0 {
            return Err(EngineError::Config("xlsx page geometry holds no units".to_string()));
        }
        for (name, page) in [("pdf", &self.pdf.page), ("docx", &self.docx.page)] {
            if !(page.width_mm > 0.0 && page.height_mm > 0.0) {
                return Err(EngineError::Config(format!("{name} page size must be positive")));
            }
        }
        Ok(())
    }
}

/// Document number settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberingConfig {
    pub prefix: String,
    /// Counter partition prefix; the year is appended
    pub scope: String,
    pub default_matrix: String,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            prefix: numbering::DEFAULT_PREFIX.to_string(),
            scope: numbering::DEFAULT_SCOPE.to_string(),
            default_matrix: numbering::DEFAULT_MATRIX.to_string(),
        }
    }
}

/// Barcode rasterization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarcodeConfig {
    pub dpi: u32,
    /// Blank modules on each side of a Code 128 symbol
    pub quiet_zone_modules: u32,
    /// Size used by slots created without an explicit size
    pub width_mm: f64,
    pub height_mm: f64,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            dpi: 600,
            quiet_zone_modules: 10,
            width_mm: 40.0,
            height_mm: 10.0,
        }
    }
}

/// Placement settings shared by every renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Gap between a region's top edge and a top-aligned image
    pub image_top_margin_px: f64,
    /// Page geometry for xlsx templates, which cannot declare one
    pub xlsx_page: PageGeometry,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            image_top_margin_px: 4.0,
            xlsx_page: PageGeometry::default(),
        }
    }
}

/// Physical page size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PaperSize {
    pub const A4: PaperSize = PaperSize {
        width_mm: 210.0,
        height_mm: 297.0,
    };
}

impl Default for PaperSize {
    fn default() -> Self {
        Self::A4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfConfig {
    pub page: PaperSize,
    pub margin_mm: f64,
    /// TrueType font for regular text; built-in Helvetica when absent
    pub regular_font: Option<PathBuf>,
    pub bold_font: Option<PathBuf>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            page: PaperSize::A4,
            margin_mm: 0.0,
            regular_font: None,
            bold_font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocxConfig {
    pub page: PaperSize,
    pub margin_mm: f64,
}

impl Default for DocxConfig {
    fn default() -> Self {
        Self {
            page: PaperSize::A4,
            margin_mm: 0.0,
        }
    }
}
