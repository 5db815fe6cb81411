//! PDF renderer
//!
//! One PDF page per [`Page`]. Units are laid on the page canvas at their slot
//! position and drawn cell by cell: fill, text, borders, then images. Every
//! coordinate comes from the shared pixel geometry converted with [`px_to_pt`].

use super::{visible_cells, OutputFormat, RenderJob, Renderer};
use crate::compositor::px_to_pt;
use crate::config::PdfConfig;
use crate::instance::PlacementUnit;
use crate::paginate::Page;
use crate::schema::{Borders, CellSpec, FontSpec, HAlign, Rgb, VAlign};
use crate::{EngineError, Result};
use pdf_core::{wrap_to_width, Align, BuiltinFont, Color, PdfDocument};

/// Gap between a cell edge and its text, in points
const TEXT_PADDING_PT: f64 = 1.5;

const LINE_SPACING: f64 = 1.15;

/// Characters a configured font must carry to be used
const COVERAGE_PROBE: &str = "AZaz09АЯаяЁё";

fn mm_to_pt(mm: f64) -> f64 {
    mm / 25.4 * 72.0
}

fn color(rgb: Rgb) -> Color {
    Color::from_rgb(rgb.r, rgb.g, rgb.b)
}

/// Rectangle in points from the page's top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Font names registered with the document for each face
struct Fonts {
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

impl Fonts {
    const BUILTIN: Fonts = Fonts {
        regular: "helvetica",
        bold: "helvetica-bold",
        italic: "helvetica-oblique",
        bold_italic: "helvetica-bold-oblique",
    };

    const EMBEDDED: Fonts = Fonts {
        regular: "ttf-regular",
        bold: "ttf-bold",
        italic: "ttf-regular",
        bold_italic: "ttf-bold",
    };

    fn face(&self, font: &FontSpec) -> &'static str {
        match (font.bold, font.italic) {
            (false, false) => self.regular,
            (true, false) => self.bold,
            (false, true) => self.italic,
            (true, true) => self.bold_italic,
        }
    }
}

fn register_builtin(doc: &mut PdfDocument) -> Result<()> {
    let fonts = &Fonts::BUILTIN;
    doc.add_builtin_font(fonts.regular, BuiltinFont::Helvetica)?;
    doc.add_builtin_font(fonts.bold, BuiltinFont::HelveticaBold)?;
    doc.add_builtin_font(fonts.italic, BuiltinFont::HelveticaOblique)?;
    doc.add_builtin_font(fonts.bold_italic, BuiltinFont::HelveticaBoldOblique)?;
    Ok(())
}

/// Register the configured TrueType fonts, or pick Helvetica
///
/// A configured font that cannot show Cyrillic text is not used.
///
/// # Errors
/// `Config` when a configured font file cannot be read, `Pdf` when it cannot be
/// parsed.
fn register_fonts(doc: &mut PdfDocument, config: &PdfConfig) -> Result<&'static Fonts> {
    register_builtin(doc)?;

    let Some(regular_path) = &config.regular_font else {
        return Ok(&Fonts::BUILTIN);
    };
    let read = |path: &std::path::Path| {
        std::fs::read(path).map_err(|err| {
            EngineError::Config(format!("cannot read font {}: {err}", path.display()))
        })
    };

    let regular = read(regular_path)?;
    let bold = match &config.bold_font {
        Some(path) => read(path)?,
        None => regular.clone(),
    };
    let fonts = &Fonts::EMBEDDED;
    doc.add_font(fonts.regular, &regular)?;
    doc.add_font(fonts.bold, &bold)?;

    for name in [fonts.regular, fonts.bold] {
        doc.set_font(name, 10.0)?;
        if !doc.covers(COVERAGE_PROBE)? {
            log::warn!(
                "event=font_load module=render::pdf status=fallback font={} reason=missing_cyrillic",
                regular_path.display()
            );
            return Ok(&Fonts::BUILTIN);
        }
    }
    Ok(fonts)
}

/// Renders pages onto fixed-size PDF pages
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

struct Canvas<'a> {
    doc: PdfDocument,
    fonts: &'a Fonts,
    /// Set once a text run contained characters the font cannot show
    missing_glyphs: bool,
}

impl Canvas<'_> {
    fn draw_unit(&mut self, page: usize, unit: &PlacementUnit, origin: (f64, f64)) -> Result<()> {
        let grid = &unit.template;

        for (cell, region) in visible_cells(grid) {
            let (x, y) = grid.cell_origin_px(region.first_row, region.first_col);
            let size = grid.region_size_px(&region);
            let rect = Rect {
                x: origin.0 + px_to_pt(x),
                y: origin.1 + px_to_pt(y),
                width: px_to_pt(size.width),
                height: px_to_pt(size.height),
            };

            if let Some(fill) = cell.style.fill {
                self.doc
                    .fill_rect(page, rect.x, rect.y, rect.width, rect.height, color(fill))?;
            }
            if !cell.text.is_empty() {
                self.draw_text(page, &cell, rect)?;
            }
            self.draw_borders(page, &cell.style.borders, rect)?;
        }

        for placement in &unit.images {
            let (x, y) = grid.cell_origin_px(placement.region.first_row, placement.region.first_col);
            self.doc.insert_image(
                &placement.asset.png,
                page,
                origin.0 + px_to_pt(x + placement.offset.x),
                origin.1 + px_to_pt(y + placement.offset.y),
                px_to_pt(placement.size.width),
                px_to_pt(placement.size.height),
            )?;
        }
        Ok(())
    }

    fn draw_text(&mut self, page: usize, cell: &CellSpec, rect: Rect) -> Result<()> {
        let style = &cell.style;
        self.doc.set_font(self.fonts.face(&style.font), style.font.size as f32)?;
        self.doc.set_text_color(color(style.font.color));

        if !self.missing_glyphs && !self.doc.covers(&cell.text)? {
            self.missing_glyphs = true;
            log::warn!(
                "event=text_draw module=render::pdf status=missing_glyphs cell={},{}",
                cell.row,
                cell.col
            );
        }

        let inner_width = rect.width - 2.0 * TEXT_PADDING_PT;
        let mut lines: Vec<String> = Vec::new();
        for paragraph in cell.text.split('\n') {
            if style.wrap {
                let doc = &self.doc;
                let wrapped =
                    wrap_to_width(paragraph, inner_width, |s| doc.text_width(s).unwrap_or(0.0));
                if wrapped.is_empty() {
                    lines.push(String::new());
                } else {
                    lines.extend(wrapped);
                }
            } else {
                lines.push(paragraph.to_string());
            }
        }

        let line_height = style.font.size * LINE_SPACING;
        let block = line_height * lines.len() as f64;
        let top = match style.valign {
            VAlign::Top => rect.y + TEXT_PADDING_PT,
            VAlign::Center => rect.y + (rect.height - block) / 2.0,
            VAlign::Bottom => rect.y + rect.height - TEXT_PADDING_PT - block,
        };
        let (x, align) = match style.align {
            HAlign::Left => (rect.x + TEXT_PADDING_PT, Align::Left),
            HAlign::Center => (rect.x + rect.width / 2.0, Align::Center),
            HAlign::Right => (rect.x + rect.width - TEXT_PADDING_PT, Align::Right),
        };
        let ascent = self.doc.font_ascent()?;

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let baseline = top + line_height * i as f64 + ascent;
            self.doc.insert_text(line, page, x, baseline, align)?;
        }
        Ok(())
    }

    fn draw_borders(&mut self, page: usize, borders: &Borders, rect: Rect) -> Result<()> {
        let (left, top) = (rect.x, rect.y);
        let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
        let sides = [
            (borders.top, (left, top), (right, top)),
            (borders.bottom, (left, bottom), (right, bottom)),
            (borders.left, (left, top), (left, bottom)),
            (borders.right, (right, top), (right, bottom)),
        ];
        for (style, from, to) in sides {
            if let Some(style) = style {
                self.doc
                    .stroke_line(page, from, to, style.width_pt(), Color::black())?;
            }
        }
        Ok(())
    }

    fn draw_page(&mut self, page: &Page, job: &RenderJob<'_>) -> Result<()> {
        let paper = job.config.pdf.page;
        let margin = mm_to_pt(job.config.pdf.margin_mm);
        let number = self
            .doc
            .add_page(mm_to_pt(paper.width_mm), mm_to_pt(paper.height_mm));

        let unit = job.template.unit_size_px();
        for (slot, placed) in page.units.iter().enumerate() {
            let (slot_row, slot_col) = job.template.page.slot_position(slot);
            let origin = (
                margin + px_to_pt(unit.width) * slot_col as f64,
                margin + px_to_pt(unit.height) * slot_row as f64,
            );
            self.draw_unit(number, placed, origin)?;
        }
        Ok(())
    }
}

impl Renderer for PdfRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        let mut doc = PdfDocument::new();
        let fonts = register_fonts(&mut doc, &job.config.pdf)?;
        let mut canvas = Canvas {
            doc,
            fonts,
            missing_glyphs: false,
        };

        for page in job.pages {
            canvas.draw_page(page, job)?;
        }
        if job.pages.is_empty() {
            let paper = job.config.pdf.page;
            canvas
                .doc
                .add_page(mm_to_pt(paper.width_mm), mm_to_pt(paper.height_mm));
        }

        let bytes = canvas.doc.to_bytes()?;
        log::debug!(
            "event=render module=render::pdf status=ok pages={} bytes={}",
            job.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::render::fixtures;
    use pretty_assertions::assert_eq;

    fn render(count: usize, config: &EngineConfig) -> lopdf::Document {
        let template = fixtures::sticker();
        let pages = fixtures::pages(&template, count);
        let bytes = PdfRenderer::new()
            .render(&RenderJob {
                template: &template,
                pages: &pages,
                config,
            })
            .unwrap();
        lopdf::Document::load_mem(&bytes).unwrap()
    }

    fn page_content(doc: &lopdf::Document, page: u32) -> String {
        let id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned()
    }

    #[test]
    fn test_image_offset_in_points() {
        let doc = render(1, &EngineConfig::default());
        let content = page_content(&doc, 1);
        // 96 x 48 px image at (22, 16) px from the A4 top-left corner
        assert!(content.contains("72 0 0 36 16.5 793.89 cm"), "{content}");
    }

    #[test]
    fn test_one_pdf_page_per_page() {
        let doc = render(3, &EngineConfig::default());
        assert_eq!(doc.get_pages().len(), 2);

        // Second unit of the first page sits one unit height (80 + 20 px) lower
        let content = page_content(&doc, 1);
        assert!(content.contains("72 0 0 36 16.5 718.89 cm"), "{content}");
        assert!(content.contains("NQ 1) Tj"), "{content}");
        assert!(page_content(&doc, 2).contains("NQ 2) Tj"));
    }

    #[test]
    fn test_margin_shifts_units() {
        let mut config = EngineConfig::default();
        config.pdf.margin_mm = 25.4;
        let content = page_content(&render(1, &config), 1);
        assert!(content.contains("72 0 0 36 88.5 721.89 cm"), "{content}");
    }

    #[test]
    fn test_empty_batch_has_blank_page() {
        let template = fixtures::sticker();
        let config = EngineConfig::default();
        let bytes = PdfRenderer::new()
            .render(&RenderJob {
                template: &template,
                pages: &[],
                config: &config,
            })
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_missing_font_file_is_config_error() {
        let mut config = EngineConfig::default();
        config.pdf.regular_font = Some("/nonexistent/font.ttf".into());
        let template = fixtures::sticker();
        let pages = fixtures::pages(&template, 1);
        let result = PdfRenderer::new().render(&RenderJob {
            template: &template,
            pages: &pages,
            config: &config,
        });
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
