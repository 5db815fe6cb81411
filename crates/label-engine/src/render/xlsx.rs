//! XLSX renderer
//!
//! All pages share one worksheet. Units are tiled on the unit grid, so a page of
//! `columns` x `rows` units occupies `rows * template.rows` worksheet rows, and a
//! manual page break closes every page but the last.

use super::{visible_cells, OutputFormat, RenderJob, Renderer};
use crate::instance::PlacementUnit;
use crate::schema::{BorderStyle, CellStyle, HAlign, Template, VAlign};
use crate::{EngineError, Result};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatPattern, Image, Workbook, Worksheet,
};

/// Excel paper size code for A4
const PAPER_A4: u8 = 9;

const SHEET_NAME: &str = "Labels";

/// Columns in a worksheet (`A` to `XFD`)
const MAX_COLUMNS: u32 = 16_384;

/// Worksheet column index of a tiled cell
fn column(index: u32) -> Result<u16> {
    if index >= MAX_COLUMNS {
        return Err(EngineError::Config(format!(
            "tiled layout needs column {} but a worksheet has {MAX_COLUMNS}",
            index + 1
        )));
    }
    Ok(index as u16)
}

/// Renders pages into a single-sheet workbook
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxRenderer;

impl XlsxRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn border(style: Option<BorderStyle>) -> FormatBorder {
    match style {
        None => FormatBorder::None,
        Some(BorderStyle::Thin) => FormatBorder::Thin,
        Some(BorderStyle::Medium) => FormatBorder::Medium,
        Some(BorderStyle::Thick) => FormatBorder::Thick,
    }
}

fn cell_format(style: &CellStyle) -> Format {
    let font = &style.font;
    let mut format = Format::new()
        .set_font_name(font.family.as_str())
        .set_font_size(font.size)
        .set_font_color(Color::RGB(font.color.to_u32()))
        .set_align(match style.align {
            HAlign::Left => FormatAlign::Left,
            HAlign::Center => FormatAlign::Center,
            HAlign::Right => FormatAlign::Right,
        })
        .set_align(match style.valign {
            VAlign::Top => FormatAlign::Top,
            VAlign::Center => FormatAlign::VerticalCenter,
            VAlign::Bottom => FormatAlign::Bottom,
        })
        .set_border_left(border(style.borders.left))
        .set_border_right(border(style.borders.right))
        .set_border_top(border(style.borders.top))
        .set_border_bottom(border(style.borders.bottom));

    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if style.wrap {
        format = format.set_text_wrap();
    }
    if let Some(fill) = style.fill {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(fill.to_u32()));
    }
    format
}

/// Column and row widths for every unit position the batch uses
fn write_geometry(sheet: &mut Worksheet, template: &Template, page_count: usize) -> Result<()> {
    for slot_col in 0..template.page.columns {
        for col in 0..template.cols {
            let px = template.column_px(col).round().clamp(0.0, u16::MAX as f64) as u16;
            sheet.set_column_width_pixels(column(slot_col * template.cols + col)?, px)?;
        }
    }

    let unit_rows = page_count as u32 * template.page.rows;
    for unit_row in 0..unit_rows {
        for row in 0..template.rows {
            sheet.set_row_height(unit_row * template.rows + row, template.row_height(row))?;
        }
    }
    Ok(())
}

fn write_unit(sheet: &mut Worksheet, unit: &PlacementUnit, row_offset: u32, col_offset: u32) -> Result<()> {
    for (cell, region) in visible_cells(&unit.template) {
        let format = cell_format(&cell.style);
        let region = region.offset(row_offset, col_offset);
        let (row, col) = (region.first_row, column(region.first_col)?);

        if region.is_single() {
            if cell.text.is_empty() {
                sheet.write_blank(row, col, &format)?;
            } else {
                sheet.write_string_with_format(row, col, cell.text.as_str(), &format)?;
            }
        } else {
            sheet.merge_range(
                region.first_row,
                col,
                region.last_row,
                column(region.last_col)?,
                cell.text.as_str(),
                &format,
            )?;
        }
    }

    for placement in &unit.images {
        let image = Image::new_from_buffer(&placement.asset.png)?.set_scale_to_size(
            placement.size.width,
            placement.size.height,
            false,
        );
        sheet.insert_image_with_offset(
            placement.region.first_row + row_offset,
            column(placement.region.first_col + col_offset)?,
            &image,
            placement.offset.x.round() as u32,
            placement.offset.y.round() as u32,
        )?;
    }
    Ok(())
}

impl Renderer for XlsxRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Xlsx
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        let template = job.template;
        let page_rows = template.page.rows * template.rows;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        sheet.set_paper_size(PAPER_A4);
        sheet.set_margins(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);

        write_geometry(sheet, template, job.pages.len())?;

        for page in job.pages {
            for (slot, unit) in page.units.iter().enumerate() {
                let (slot_row, slot_col) = template.page.slot_position(slot);
                let row_offset = (page.index as u32 * template.page.rows + slot_row) * template.rows;
                let col_offset = slot_col * template.cols;
                write_unit(sheet, unit, row_offset, col_offset)?;
            }
        }

        let breaks: Vec<u32> = (1..job.pages.len() as u32).map(|p| p * page_rows).collect();
        if !breaks.is_empty() {
            sheet.set_page_breaks(&breaks)?;
        }

        let bytes = workbook.save_to_buffer()?;
        log::debug!(
            "event=render module=render::xlsx status=ok pages={} bytes={}",
            job.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}
