//! Label Engine - template-driven passport and label rendering
//!
//! This crate provides:
//! - The grid template model and its JSON / xlsx loaders
//! - `{{ name }}` placeholder substitution against per-unit variables
//! - Logo and barcode assets sized to physical dimensions
//! - Image placement inside cells and merge regions
//! - Multi-up pagination and the xlsx, docx and pdf renderers
//! - Batch orchestration with per-unit issue reporting
//!
//! # Example
//!
//! ```ignore
//! use label_engine::{DirAssetStore, DirTemplateStore, EngineConfig, LabelEngine, OutputFormat, RenderRequest};
//!
//! let templates = DirTemplateStore::new("templates");
//! let assets = DirAssetStore::new("assets");
//! let engine = LabelEngine::new(&templates, &assets, EngineConfig::default());
//!
//! let output = engine.render(RenderRequest::new("sticker", OutputFormat::Pdf, records))?;
//! std::fs::write("stickers.pdf", &output.bytes)?;
//! for issue in &output.issues {
//!     eprintln!("{issue}");
//! }
//! ```

mod assets;
mod catalog;
mod compositor;
mod config;
mod engine;
mod instance;
mod loader;
mod paginate;
mod placeholder;
mod record;
pub mod render;
mod schema;
mod store;

pub use assets::{AssetProvider, RasterAsset, LOGO_ASSET};
pub use catalog::{
    import_catalog, parse_name_attributes, CatalogField, ColumnMapping, ColumnSelector,
    NameAttributes,
};
pub use compositor::{
    column_width_px, mm_to_px, px_to_emu, px_to_pt, px_to_twips, row_height_px, Alignment,
    Compositor, PlacementOffset, Size, EMU_PER_PX,
};
pub use config::{
    BarcodeConfig, DocxConfig, EngineConfig, LayoutConfig, NumberingConfig, PaperSize, PdfConfig,
};
pub use engine::{LabelEngine, RenderOutput, RenderRequest};
pub use instance::{instantiate, ImagePlacement, Instance, PlacementUnit};
pub use loader::{load, LoadOptions, TemplateFormat};
pub use paginate::{paginate, Page};
pub use placeholder::{marker_names, normalize_name, substitute, Context, Substituted};
pub use record::{build_context, Product, Record};
pub use render::{renderer_for, OutputFormat, RenderJob, Renderer};
pub use schema::*;
pub use store::{
    AssetStore, DirAssetStore, DirTemplateStore, MemoryAssetStore, MemoryTemplateStore,
    TemplateSource, TemplateStore,
};

use std::fmt;
use thiserror::Error;

/// Errors that abort a whole render call
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error(transparent)]
    CounterUnavailable(#[from] numbering::NumberingError),

    #[error("Asset '{asset}' unavailable: {reason}")]
    AssetUnavailable { asset: String, reason: String },

    #[error("Record {unit} incomplete: missing {}", missing.join(", "))]
    RecordIncomplete { unit: usize, missing: Vec<String> },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn invalid_template(template: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn asset(asset: &str, reason: impl ToString) -> Self {
        EngineError::AssetUnavailable {
            asset: asset.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// A per-unit problem that did not abort the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitIssue {
    /// An image slot was left empty
    AssetUnavailable {
        unit: usize,
        slot: String,
        reason: String,
    },
    /// The record was skipped
    RecordIncomplete { unit: usize, missing: Vec<String> },
}

impl UnitIssue {
    /// Index of the record the issue belongs to
    pub fn unit(&self) -> usize {
        match self {
            UnitIssue::AssetUnavailable { unit, .. } => *unit,
            UnitIssue::RecordIncomplete { unit, .. } => *unit,
        }
    }
}

impl fmt::Display for UnitIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitIssue::AssetUnavailable { unit, slot, reason } => {
                write!(f, "unit {unit}: image '{slot}' left empty ({reason})")
            }
            UnitIssue::RecordIncomplete { unit, missing } => {
                write!(f, "unit {unit}: skipped, missing {}", missing.join(", "))
            }
        }
    }
}
