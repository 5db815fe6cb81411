//! Template loading
//!
//! Templates come either as the native JSON schema or as an xlsx workbook whose
//! first worksheet is the unit grid. Both paths end in [`Template::validate`].

pub(crate) mod xlsx;

use crate::schema::{ImageSlot, PageGeometry, Template, TemplateKind};
use crate::{EngineError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Template container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFormat {
    Json,
    Xlsx,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Xlsx => "xlsx",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for TemplateFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(TemplateFormat::Json),
            "xlsx" => Ok(TemplateFormat::Xlsx),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Settings a template container may not carry itself
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Template name used in errors; overrides an empty name in the container
    pub name: String,
    /// Page geometry for xlsx templates, or an override for JSON ones
    pub page: Option<PageGeometry>,
    /// Image slot definitions replacing the template's own
    pub images: Option<Vec<ImageSlot>>,
    /// Template kind for xlsx templates
    pub kind: TemplateKind,
    /// Barcode size of the default slots, in millimetres
    pub barcode_mm: (f64, f64),
}

impl LoadOptions {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            page: None,
            images: None,
            kind: TemplateKind::Label,
            barcode_mm: (40.0, 10.0),
        }
    }

    pub fn with_page(mut self, page: PageGeometry) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_images(mut self, images: Vec<ImageSlot>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_kind(mut self, kind: TemplateKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_barcode_size(mut self, width_mm: f64, height_mm: f64) -> Self {
        self.barcode_mm = (width_mm, height_mm);
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new("template")
    }
}

/// Parse and validate a template container
///
/// # Arguments
/// * `bytes` - Container bytes
/// * `format` - Container format
/// * `options` - Name, geometry and slot settings
///
/// # Errors
/// `InvalidTemplate` naming the template when the container cannot be parsed or
/// breaks a structural invariant.
pub fn load(bytes: &[u8], format: TemplateFormat, options: &LoadOptions) -> Result<Template> {
    let mut template = match format {
        TemplateFormat::Json => {
            let mut template: Template = serde_json::from_slice(bytes)
                .map_err(|err| EngineError::invalid_template(&options.name, err.to_string()))?;
            if template.name.trim().is_empty() {
                template.name = options.name.clone();
            }
            template
        }
        TemplateFormat::Xlsx => {
            let mut template = xlsx::read_template(bytes, &options.name)?;
            template.kind = options.kind;
            template
        }
    };

    if let Some(page) = options.page {
        template.page = page;
    }
    if let Some(images) = &options.images {
        template.images = images.clone();
    }
    if template.images.is_empty() {
        template.images = ImageSlot::default_set(options.barcode_mm);
    }

    template.validate()?;

    log::debug!(
        "event=template_load module=loader status=ok name={} format={} grid={}x{} merges={} anchors={}",
        template.name,
        format,
        template.rows,
        template.cols,
        template.merges.len(),
        template.anchors().len()
    );
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MergeRegion;
    use pretty_assertions::assert_eq;

    const STICKER: &str = r##"{
        "name": "sticker",
        "rows": 3,
        "cols": 3,
        "columnWidths": [14.29, 28.57, 14.29],
        "rowHeights": [45, 30, 30],
        "page": { "columns": 1, "rows": 2 },
        "cells": [
            { "row": 0, "col": 0, "text": "{{ logo }}" },
            { "row": 0, "col": 1, "text": "{{ nomenclature_name }}",
              "style": { "font": { "bold": true, "size": 12 }, "align": "center", "wrap": true } },
            { "row": 1, "col": 1, "text": "{{ stock_code }}" },
            { "row": 2, "col": 1, "text": "Серийный номер {{ serial_number_code }}",
              "style": { "fill": "#FFFF00" } }
        ],
        "merges": [
            { "firstRow": 0, "firstCol": 0, "lastRow": 2, "lastCol": 0 }
        ],
        "unitOutline": "thick"
    }"##;

    #[test]
    fn test_load_json_with_default_slots() {
        let template = load(STICKER.as_bytes(), TemplateFormat::Json, &LoadOptions::default()).unwrap();
        assert_eq!(template.name, "sticker");
        assert_eq!(template.merges, vec![MergeRegion::new(0, 0, 2, 0)]);
        assert_eq!(template.images.len(), 5);
        assert_eq!(template.page.capacity(), 2);

        let anchors: Vec<String> = template.anchors().into_iter().map(|a| a.slot).collect();
        assert_eq!(anchors, vec!["logo", "stock_code", "serial_number_code"]);

        let title = template.cell(0, 1).unwrap();
        assert!(title.style.font.bold);
        assert_eq!(title.style.font.family, "Calibri");
    }

    #[test]
    fn test_page_override() {
        let options = LoadOptions::new("sticker").with_page(PageGeometry::new(2, 2));
        let template = load(STICKER.as_bytes(), TemplateFormat::Json, &options).unwrap();
        assert_eq!(template.page.capacity(), 4);
    }

    #[test]
    fn test_invalid_json_names_template() {
        let err = load(b"{ nope", TemplateFormat::Json, &LoadOptions::new("broken")).unwrap_err();
        match err {
            EngineError::InvalidTemplate { template, .. } => assert_eq!(template, "broken"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_malformed_color_rejected() {
        for color in ["a€€a", "#12345G", "red"] {
            let json = format!(
                r#"{{ "name": "bad", "kind": "passport", "rows": 1, "cols": 1,
                     "cells": [{{ "row": 0, "col": 0, "text": "x",
                                  "style": {{ "font": {{ "color": "{color}" }} }} }}] }}"#
            );
            let err = load(json.as_bytes(), TemplateFormat::Json, &LoadOptions::default()).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTemplate { .. }), "{color}: {err}");
            assert!(err.to_string().contains("invalid color"), "{err}");
        }
    }

    #[test]
    fn test_overlapping_merges_rejected() {
        let json = r#"{
            "name": "bad", "rows": 2, "cols": 2,
            "cells": [{ "row": 0, "col": 0, "text": "{{logo}}" }],
            "merges": [
                { "firstRow": 0, "firstCol": 0, "lastRow": 1, "lastCol": 1 },
                { "firstRow": 1, "firstCol": 1, "lastRow": 1, "lastCol": 1 }
            ]
        }"#;
        let err = load(json.as_bytes(), TemplateFormat::Json, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("overlaps"), "{err}");
    }

    #[test]
    fn test_label_without_anchor_rejected() {
        let json = r#"{ "name": "plain", "rows": 1, "cols": 1,
                        "cells": [{ "row": 0, "col": 0, "text": "{{ matrix }}" }] }"#;
        let err = load(json.as_bytes(), TemplateFormat::Json, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no image anchor"), "{err}");

        let json = r#"{ "name": "plain", "kind": "passport", "rows": 1, "cols": 1 }"#;
        assert!(load(json.as_bytes(), TemplateFormat::Json, &LoadOptions::default()).is_ok());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("XLSX".parse::<TemplateFormat>().unwrap(), TemplateFormat::Xlsx);
        assert_eq!(TemplateFormat::from_path("t/sticker.json"), Some(TemplateFormat::Json));
        assert_eq!(TemplateFormat::from_path("t/sticker.odt"), None);
        assert!(matches!(
            "odt".parse::<TemplateFormat>(),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }
}
