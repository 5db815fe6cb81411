//! DOCX renderer
//!
//! Each page becomes one fixed-layout table whose grid is the unit grid repeated
//! `columns` x `rows` times. Merges map to `gridSpan`/`vMerge`, cell margins are
//! zero, and images are floating drawings anchored to the region's top-left
//! cell so their EMU offsets match the xlsx drawing offsets.

use super::{OutputFormat, RenderJob, Renderer};
use crate::compositor::{mm_to_px, px_to_emu, px_to_twips};
use crate::instance::{ImagePlacement, PlacementUnit};
use crate::paginate::Page;
use crate::schema::{BorderStyle, Borders, CellSpec, HAlign, MergeRegion, Template, VAlign};
use crate::Result;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#
);

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Renders pages into a Word document, one table per page
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxRenderer;

impl DocxRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// Characters XML 1.0 cannot carry at all, not even as references
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().filter(|c| is_xml_char(*c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn mm_to_twips(mm: f64) -> i64 {
    px_to_twips(mm_to_px(mm))
}

/// Border width in eighths of a point
fn border_size(style: BorderStyle) -> u32 {
    (style.width_pt() * 8.0).round() as u32
}

fn borders_xml(borders: &Borders) -> String {
    let mut xml = String::from("<w:tcBorders>");
    for (side, style) in [
        ("top", borders.top),
        ("left", borders.left),
        ("bottom", borders.bottom),
        ("right", borders.right),
    ] {
        match style {
            Some(style) => xml.push_str(&format!(
                r#"<w:{side} w:val="single" w:sz="{}" w:space="0" w:color="000000"/>"#,
                border_size(style)
            )),
            None => xml.push_str(&format!(r#"<w:{side} w:val="nil"/>"#)),
        }
    }
    xml.push_str("</w:tcBorders>");
    xml
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VMerge {
    None,
    Restart,
    Continue,
}

/// PNG parts of the package, shared between identical assets
#[derive(Default)]
struct Media<'a> {
    parts: Vec<&'a [u8]>,
    index: HashMap<&'a [u8], usize>,
}

impl<'a> Media<'a> {
    /// Relationship id for a PNG, adding the part on first use
    fn rel_id(&mut self, png: &'a [u8]) -> String {
        let next = self.parts.len();
        let number = *self.index.entry(png).or_insert(next) + 1;
        if number > self.parts.len() {
            self.parts.push(png);
        }
        format!("rIdImg{number}")
    }

    fn rels_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for number in 1..=self.parts.len() {
            xml.push_str(&format!(
                r#"<Relationship Id="rIdImg{number}" Type="{IMAGE_REL_TYPE}" Target="media/image{number}.png"/>"#
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }
}

struct DocumentWriter<'a> {
    template: &'a Template,
    xml: String,
    media: Media<'a>,
    next_drawing_id: u32,
}

impl<'a> DocumentWriter<'a> {
    fn new(template: &'a Template) -> Self {
        Self {
            template,
            xml: String::new(),
            media: Media::default(),
            next_drawing_id: 1,
        }
    }

    fn write_page(&mut self, page: &'a Page) {
        let template = self.template;
        let grid_cols = template.page.columns * template.cols;
        let total_width: i64 = (0..grid_cols)
            .map(|c| px_to_twips(template.column_px(c % template.cols)))
            .sum();

        self.xml.push_str("<w:tbl><w:tblPr>");
        self.xml.push_str(&format!(r#"<w:tblW w:w="{total_width}" w:type="dxa"/>"#));
        self.xml.push_str(r#"<w:tblLayout w:type="fixed"/>"#);
        self.xml.push_str(concat!(
            r#"<w:tblCellMar><w:top w:w="0" w:type="dxa"/><w:left w:w="0" w:type="dxa"/>"#,
            r#"<w:bottom w:w="0" w:type="dxa"/><w:right w:w="0" w:type="dxa"/></w:tblCellMar>"#
        ));
        self.xml.push_str("</w:tblPr><w:tblGrid>");
        for c in 0..grid_cols {
            let width = px_to_twips(template.column_px(c % template.cols));
            self.xml.push_str(&format!(r#"<w:gridCol w:w="{width}"/>"#));
        }
        self.xml.push_str("</w:tblGrid>");

        for grid_row in 0..template.page.rows * template.rows {
            let (slot_row, row) = (grid_row / template.rows, grid_row % template.rows);
            let height = px_to_twips(template.row_px(row));
            self.xml.push_str(&format!(
                r#"<w:tr><w:trPr><w:cantSplit/><w:trHeight w:val="{height}" w:hRule="exact"/></w:trPr>"#
            ));
            for slot_col in 0..template.page.columns {
                let slot = (slot_row * template.page.columns + slot_col) as usize;
                match page.units.get(slot) {
                    Some(unit) => self.write_unit_row(unit, row),
                    None => self.write_blank_row(row),
                }
            }
            self.xml.push_str("</w:tr>");
        }
        self.xml.push_str("</w:tbl>");
    }

    fn region_width(&self, region: &MergeRegion) -> i64 {
        (region.first_col..=region.last_col)
            .map(|c| px_to_twips(self.template.column_px(c)))
            .sum()
    }

    fn write_unit_row(&mut self, unit: &'a PlacementUnit, row: u32) {
        let grid = &unit.template;
        let empty = CellSpec::new(row, 0);
        let mut col = 0;

        while col < grid.cols {
            let region = grid.region_of(row, col);
            let origin = grid
                .cell(region.first_row, region.first_col)
                .unwrap_or(&empty);

            if region.first_row != row {
                self.write_cell(&region, origin, VMerge::Continue, &[]);
            } else {
                let vmerge = if region.row_span() > 1 {
                    VMerge::Restart
                } else {
                    VMerge::None
                };
                let images: Vec<&'a ImagePlacement> = unit
                    .images
                    .iter()
                    .filter(|p| p.region.first_row == row && p.region.first_col == col)
                    .collect();
                self.write_cell(&region, origin, vmerge, &images);
            }
            col = region.last_col + 1;
        }
    }

    /// Empty cells for a slot past the last unit of the final page
    fn write_blank_row(&mut self, row: u32) {
        let empty = CellSpec::new(row, 0);
        for col in 0..self.template.cols {
            self.write_cell(&MergeRegion::single(row, col), &empty, VMerge::None, &[]);
        }
    }

    fn write_cell(
        &mut self,
        region: &MergeRegion,
        cell: &CellSpec,
        vmerge: VMerge,
        images: &[&'a ImagePlacement],
    ) {
        let style = &cell.style;
        let width = self.region_width(region);

        self.xml.push_str(&format!(r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/>"#));
        if region.col_span() > 1 {
            self.xml
                .push_str(&format!(r#"<w:gridSpan w:val="{}"/>"#, region.col_span()));
        }
        match vmerge {
            VMerge::None => {}
            VMerge::Restart => self.xml.push_str(r#"<w:vMerge w:val="restart"/>"#),
            VMerge::Continue => self.xml.push_str("<w:vMerge/>"),
        }
        self.xml.push_str(&borders_xml(&style.borders));
        if let Some(fill) = style.fill {
            self.xml.push_str(&format!(
                r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                fill.to_hex()
            ));
        }
        // Anchored drawings are offset from the paragraph, which must sit at the cell top
        let valign = if !images.is_empty() {
            "top"
        } else {
            match style.valign {
                VAlign::Top => "top",
                VAlign::Center => "center",
                VAlign::Bottom => "bottom",
            }
        };
        self.xml
            .push_str(&format!(r#"<w:vAlign w:val="{valign}"/></w:tcPr>"#));

        let jc = match style.align {
            HAlign::Left => "left",
            HAlign::Center => "center",
            HAlign::Right => "right",
        };
        self.xml.push_str(&format!(
            r#"<w:p><w:pPr><w:spacing w:before="0" w:after="0" w:line="240" w:lineRule="auto"/><w:jc w:val="{jc}"/></w:pPr>"#
        ));

        for &placement in images {
            self.write_drawing(placement);
        }

        if vmerge != VMerge::Continue && !cell.text.is_empty() {
            let font = &style.font;
            let mut rpr = format!(
                r#"<w:rPr><w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}"/>"#,
                escape(&font.family)
            );
            if font.bold {
                rpr.push_str("<w:b/>");
            }
            if font.italic {
                rpr.push_str("<w:i/>");
            }
            rpr.push_str(&format!(
                r#"<w:color w:val="{}"/><w:sz w:val="{}"/></w:rPr>"#,
                font.color.to_hex(),
                (font.size * 2.0).round() as u32
            ));

            self.xml.push_str("<w:r>");
            self.xml.push_str(&rpr);
            for (i, line) in cell.text.split('\n').enumerate() {
                if i > 0 {
                    self.xml.push_str("<w:br/>");
                }
                self.xml.push_str(&format!(
                    r#"<w:t xml:space="preserve">{}</w:t>"#,
                    escape(line)
                ));
            }
            self.xml.push_str("</w:r>");
        }
        self.xml.push_str("</w:p></w:tc>");
    }

    fn write_drawing(&mut self, placement: &'a ImagePlacement) {
        let rel_id = self.media.rel_id(&placement.asset.png);
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;

        let (x, y) = (px_to_emu(placement.offset.x), px_to_emu(placement.offset.y));
        let (cx, cy) = (px_to_emu(placement.size.width), px_to_emu(placement.size.height));
        let name = escape(&placement.slot);

        self.xml.push_str(&format!(
            concat!(
                r#"<w:r><w:drawing><wp:anchor distT="0" distB="0" distL="0" distR="0" simplePos="0" relativeHeight="{id}" behindDoc="0" locked="0" layoutInCell="1" allowOverlap="1">"#,
                r#"<wp:simplePos x="0" y="0"/>"#,
                r#"<wp:positionH relativeFrom="column"><wp:posOffset>{x}</wp:posOffset></wp:positionH>"#,
                r#"<wp:positionV relativeFrom="paragraph"><wp:posOffset>{y}</wp:posOffset></wp:positionV>"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:wrapNone/>"#,
                r#"<wp:docPr id="{id}" name="{name} {id}"/><wp:cNvGraphicFramePr/>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="{name}.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:anchor></w:drawing></w:r>"#
            ),
            id = id,
            x = x,
            y = y,
            cx = cx,
            cy = cy,
            name = name,
            rel_id = rel_id
        ));
    }

    fn write_page_break(&mut self) {
        self.xml
            .push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
    }
}

impl Renderer for DocxRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        let mut writer = DocumentWriter::new(job.template);
        for (i, page) in job.pages.iter().enumerate() {
            if i > 0 {
                writer.write_page_break();
            }
            writer.write_page(page);
        }

        let paper = job.config.docx.page;
        let margin = mm_to_twips(job.config.docx.margin_mm);
        let mut document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {NS}><w:body>"#
        );
        document.push_str(&writer.xml);
        document.push_str(&format!(
            concat!(
                r#"<w:p/><w:sectPr><w:pgSz w:w="{}" w:h="{}"/>"#,
                r#"<w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="0" w:footer="0" w:gutter="0"/>"#,
                r#"</w:sectPr></w:body></w:document>"#
            ),
            mm_to_twips(paper.width_mm),
            mm_to_twips(paper.height_mm),
            m = margin
        ));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES.as_bytes())?;
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(PACKAGE_RELS.as_bytes())?;
        zip.start_file("word/document.xml", options)?;
        zip.write_all(document.as_bytes())?;
        zip.start_file("word/_rels/document.xml.rels", options)?;
        zip.write_all(writer.media.rels_xml().as_bytes())?;
        for (i, png) in writer.media.parts.iter().enumerate() {
            zip.start_file(format!("word/media/image{}.png", i + 1), options)?;
            zip.write_all(png)?;
        }
        let bytes = zip.finish()?.into_inner();

        log::debug!(
            "event=render module=render::docx status=ok pages={} media={} bytes={}",
            job.pages.len(),
            writer.media.parts.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}
