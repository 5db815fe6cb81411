//! Batch orchestration
//!
//! One [`LabelEngine::render`] call loads the template once, binds every record
//! to its own instance, issues missing document numbers, tiles the instances
//! into pages and hands the pages to the renderer for the requested format.

use crate::assets::AssetProvider;
use crate::compositor::Compositor;
use crate::config::EngineConfig;
use crate::instance::{instantiate, PlacementUnit};
use crate::loader::{load, LoadOptions, TemplateFormat};
use crate::paginate::paginate;
use crate::placeholder::Context;
use crate::record::{build_context, set_document_number, Record};
use crate::render::{renderer_for, OutputFormat, RenderJob};
use crate::schema::Template;
use crate::store::{AssetStore, TemplateStore};
use crate::{EngineError, Result, UnitIssue};
use chrono::{NaiveDate, Utc};
use numbering::{manual_series, NumberIssuer};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::time::Instant;

/// One batch to render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub template_id: String,
    pub format: OutputFormat,
    pub records: Vec<Record>,
    /// Number supplied by the caller for every unit of the batch
    pub manual_number: Option<String>,
}

impl RenderRequest {
    pub fn new(template_id: &str, format: OutputFormat, records: Vec<Record>) -> Self {
        Self {
            template_id: template_id.to_string(),
            format,
            records,
            manual_number: None,
        }
    }

    /// Number every unit from `number`, suffixed `-001`, `-002`, ... for more than one
    pub fn with_manual_number(mut self, number: &str) -> Self {
        self.manual_number = Some(number.to_string());
        self
    }
}

/// Result of a render call
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    /// Units rendered
    pub units: usize,
    pub pages: usize,
    /// Per-unit problems that did not abort the batch, in record order
    pub issues: Vec<UnitIssue>,
    /// Numbers issued from the counter during this call
    pub minted: Vec<String>,
}

/// A record that passed the completeness check
struct Prepared {
    index: usize,
    date: NaiveDate,
    context: Context,
}

/// Template-driven batch renderer
///
/// Stores and the number issuer are borrowed, so one engine can serve many
/// calls against the same backends.
pub struct LabelEngine<'a> {
    templates: &'a dyn TemplateStore,
    assets: &'a dyn AssetStore,
    issuer: Option<&'a dyn NumberIssuer>,
    config: EngineConfig,
}

impl<'a> LabelEngine<'a> {
    pub fn new(
        templates: &'a dyn TemplateStore,
        assets: &'a dyn AssetStore,
        config: EngineConfig,
    ) -> Self {
        Self {
            templates,
            assets,
            issuer: None,
            config,
        }
    }

    /// Issue numbers for records that arrive without one
    pub fn with_issuer(mut self, issuer: &'a dyn NumberIssuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve and validate a template
    ///
    /// # Errors
    /// `TemplateNotFound` for an unknown id, `InvalidTemplate` when the container
    /// is malformed.
    pub fn load_template(&self, id: &str) -> Result<Template> {
        let source = self.templates.load(id)?;
        let barcode = &self.config.barcode;
        let mut options =
            LoadOptions::new(id).with_barcode_size(barcode.width_mm, barcode.height_mm);
        if source.format == TemplateFormat::Xlsx {
            options = options.with_page(self.config.layout.xlsx_page);
        }
        load(&source.bytes, source.format, &options)
    }

    /// Render a batch of records into one container
    ///
    /// Incomplete records are skipped and failed images leave their slot empty;
    /// both are reported in [`RenderOutput::issues`].
    ///
    /// # Errors
    /// - `TemplateNotFound` / `InvalidTemplate` when the template cannot be used
    /// - `CounterUnavailable` when a number cannot be issued
    /// - `Config` when a record needs a number and no issuer is configured
    /// - Container errors from the renderer
    pub fn render(&self, request: RenderRequest) -> Result<RenderOutput> {
        let started = Instant::now();
        let template = self.load_template(&request.template_id)?;
        let per_page = NonZeroUsize::new(template.page.capacity()).ok_or_else(|| {
            EngineError::invalid_template(&template.name, "page holds no units")
        })?;

        let now = Utc::now();
        let mut issues = Vec::new();
        let mut prepared = Vec::with_capacity(request.records.len());

        for (index, record) in request.records.iter().enumerate() {
            let date = record.production_date(now);
            let (context, missing) = build_context(record, "", date, &self.config);
            if missing.is_empty() {
                prepared.push(Prepared {
                    index,
                    date,
                    context,
                });
            } else {
                log::warn!(
                    "event=record_check module=engine status=skipped unit={} missing={}",
                    index,
                    missing.join(",")
                );
                issues.push(UnitIssue::RecordIncomplete {
                    unit: index,
                    missing,
                });
            }
        }

        let (numbers, minted) = self.assign_numbers(&request, &prepared)?;

        let assets = AssetProvider::new(self.assets, self.config.barcode.clone());
        let compositor = Compositor::new(self.config.layout.image_top_margin_px);
        let mut unknown: BTreeSet<String> = BTreeSet::new();
        let mut units: Vec<PlacementUnit> = Vec::with_capacity(prepared.len());

        for (item, number) in prepared.iter_mut().zip(&numbers) {
            set_document_number(&mut item.context, number);
            let instance = instantiate(
                &template,
                item.index,
                number,
                &item.context,
                &assets,
                &compositor,
            )?;
            issues.extend(instance.issues);
            unknown.extend(instance.unknown);
            units.push(instance.unit);
        }
        issues.sort_by_key(UnitIssue::unit);

        if !unknown.is_empty() {
            log::warn!(
                "event=substitute module=engine status=unknown_markers template={} names={}",
                template.name,
                unknown.into_iter().collect::<Vec<_>>().join(",")
            );
        }

        let unit_count = units.len();
        let pages = paginate(units, per_page);
        let job = RenderJob {
            template: &template,
            pages: &pages,
            config: &self.config,
        };
        let bytes = renderer_for(request.format).render(&job)?;

        log::info!(
            "event=render_batch module=engine status=ok template={} format={} records={} units={} pages={} issues={} minted={} duration_ms={}",
            template.name,
            request.format,
            request.records.len(),
            unit_count,
            pages.len(),
            issues.len(),
            minted.len(),
            started.elapsed().as_millis()
        );

        Ok(RenderOutput {
            format: request.format,
            bytes,
            units: unit_count,
            pages: pages.len(),
            issues,
            minted,
        })
    }

    /// Document number of every prepared record, plus the ones newly issued
    fn assign_numbers(
        &self,
        request: &RenderRequest,
        prepared: &[Prepared],
    ) -> Result<(Vec<String>, Vec<String>)> {
        if let Some(base) = &request.manual_number {
            return Ok((manual_series(base.trim(), prepared.len()), Vec::new()));
        }

        let mut numbers = Vec::with_capacity(prepared.len());
        let mut minted = Vec::new();

        for item in prepared {
            let record = &request.records[item.index];
            if let Some(number) = record
                .document_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                numbers.push(number.to_string());
                continue;
            }

            let issuer = self.issuer.ok_or_else(|| {
                EngineError::Config(format!(
                    "record {} has no document number and no number issuer is configured",
                    item.index
                ))
            })?;
            let product = record.product.clone().unwrap_or_default();
            let number = issuer
                .issue(item.date, &product.product_type, &product.number_attributes())?
                .into_string();
            minted.push(number.clone());
            numbers.push(number);
        }
        Ok((numbers, minted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Product;
    use crate::store::{MemoryAssetStore, MemoryTemplateStore};
    use chrono::TimeZone;
    use numbering::{IdentifierGenerator, MemoryCounterStore};
    use pretty_assertions::assert_eq;

    const STICKER: &str = r#"{
        "name": "sticker",
        "rows": 2,
        "cols": 2,
        "page": { "columns": 1, "rows": 2 },
        "cells": [
            { "row": 0, "col": 0, "text": "{{ nomenclature_name }}" },
            { "row": 0, "col": 1, "text": "{{ stock_code }}" },
            { "row": 1, "col": 0, "text": "№ {{ serial_number }}" }
        ]
    }"#;

    fn templates() -> MemoryTemplateStore {
        MemoryTemplateStore::new().with_template(
            "sticker",
            STICKER.as_bytes().to_vec(),
            TemplateFormat::Json,
        )
    }

    fn record(article: &str) -> Record {
        Record::new(
            Product::new("ЦБ-00012", "Коронка NQ")
                .with_article(article)
                .with_drilling_depth("05-07"),
        )
        .with_created_at(Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_numbers_issued_in_record_order() {
        let templates = templates();
        let assets = MemoryAssetStore::new();
        let issuer = IdentifierGenerator::new(MemoryCounterStore::new());
        let engine =
            LabelEngine::new(&templates, &assets, EngineConfig::default()).with_issuer(&issuer);

        let records = vec![
            record("3501040"),
            record("3501041").with_document_number("AGB NQ 000777 24"),
            record("3501042"),
        ];
        let output = engine
            .render(RenderRequest::new("sticker", OutputFormat::Xlsx, records))
            .unwrap();

        assert_eq!(output.units, 3);
        assert_eq!(output.pages, 2);
        assert!(output.issues.is_empty(), "{:?}", output.issues);
        assert_eq!(
            output.minted,
            vec!["AGB 05-07 NQ 000001 25", "AGB 05-07 NQ 000002 25"]
        );
    }

    #[test]
    fn test_manual_number_series() {
        let templates = templates();
        let assets = MemoryAssetStore::new();
        let engine = LabelEngine::new(&templates, &assets, EngineConfig::default());

        let request = RenderRequest::new(
            "sticker",
            OutputFormat::Docx,
            vec![record("1"), record("2")],
        )
        .with_manual_number("П-15");
        let output = engine.render(request).unwrap();
        assert!(output.minted.is_empty());

        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(&output.bytes[..])).unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("word/document.xml").unwrap(), &mut xml)
            .unwrap();
        assert!(xml.contains("№ П-15-001"));
        assert!(xml.contains("№ П-15-002"));
    }

    #[test]
    fn test_incomplete_record_skipped_without_number() {
        let templates = templates();
        let assets = MemoryAssetStore::new();
        let issuer = IdentifierGenerator::new(MemoryCounterStore::new());
        let engine =
            LabelEngine::new(&templates, &assets, EngineConfig::default()).with_issuer(&issuer);

        let records = vec![Record::default(), record("3501040")];
        let output = engine
            .render(RenderRequest::new("sticker", OutputFormat::Pdf, records))
            .unwrap();

        assert_eq!(output.units, 1);
        assert_eq!(
            output.issues,
            vec![UnitIssue::RecordIncomplete {
                unit: 0,
                missing: vec!["product".to_string()],
            }]
        );
        assert_eq!(output.minted, vec!["AGB 05-07 NQ 000001 25"]);
    }

    #[test]
    fn test_missing_issuer_is_config_error() {
        let templates = templates();
        let assets = MemoryAssetStore::new();
        let engine = LabelEngine::new(&templates, &assets, EngineConfig::default());

        let err = engine
            .render(RenderRequest::new("sticker", OutputFormat::Xlsx, vec![record("1")]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "{err}");
    }

    #[test]
    fn test_unknown_template() {
        let templates = templates();
        let assets = MemoryAssetStore::new();
        let engine = LabelEngine::new(&templates, &assets, EngineConfig::default());

        let err = engine
            .render(RenderRequest::new("passport", OutputFormat::Xlsx, Vec::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::TemplateNotFound(id) if id == "passport"));
    }
}
