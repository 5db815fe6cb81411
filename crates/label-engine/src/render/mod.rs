//! Output renderers
//!
//! Every renderer consumes the same pages of placed units. Geometry is taken
//! from the batch template and image offsets from the compositor, so the three
//! containers differ only in how they express the same layout.

mod docx;
mod pdf;
mod xlsx;

pub use docx::DocxRenderer;
pub use pdf::PdfRenderer;
pub use xlsx::XlsxRenderer;

use crate::config::EngineConfig;
use crate::paginate::Page;
use crate::schema::{CellSpec, MergeRegion, Template};
use crate::{EngineError, Result};
use std::fmt;
use std::str::FromStr;

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Xlsx,
    Docx,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Ok(OutputFormat::Xlsx),
            "docx" => Ok(OutputFormat::Docx),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Everything a renderer needs for one batch
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// Batch template; supplies grid geometry and page layout
    pub template: &'a Template,
    pub pages: &'a [Page],
    pub config: &'a EngineConfig,
}

/// A container backend
pub trait Renderer {
    fn format(&self) -> OutputFormat;

    /// Produce the container bytes for a batch
    fn render(&self, job: &RenderJob<'_>) -> Result<Vec<u8>>;
}

/// Renderer for an output format
pub fn renderer_for(format: OutputFormat) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Xlsx => Box::new(XlsxRenderer::new()),
        OutputFormat::Docx => Box::new(DocxRenderer::new()),
        OutputFormat::Pdf => Box::new(PdfRenderer::new()),
    }
}

/// Visible cells of a unit with the region each renders into, row-major
///
/// Cells hidden under a merge are skipped; merge origins without a cell spec
/// are included with an empty one so their borders and size still apply.
pub(crate) fn visible_cells(template: &Template) -> Vec<(CellSpec, MergeRegion)> {
    let mut cells: Vec<(CellSpec, MergeRegion)> = template
        .cells
        .iter()
        .filter(|cell| !template.is_covered(cell.row, cell.col))
        .map(|cell| (cell.clone(), template.region_of(cell.row, cell.col)))
        .collect();

    for merge in &template.merges {
        if template.cell(merge.first_row, merge.first_col).is_none() {
            cells.push((CellSpec::new(merge.first_row, merge.first_col), *merge));
        }
    }

    cells.sort_by_key(|(cell, _)| (cell.row, cell.col));
    cells
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_format() {
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!(OutputFormat::Docx.extension(), "docx");
        assert!(OutputFormat::Xlsx.mime_type().contains("spreadsheetml"));
        assert!(matches!(
            "odt".parse::<OutputFormat>(),
            Err(EngineError::UnsupportedFormat(f)) if f == "odt"
        ));
    }

    #[test]
    fn test_renderer_for() {
        for format in [OutputFormat::Xlsx, OutputFormat::Docx, OutputFormat::Pdf] {
            assert_eq!(renderer_for(format).format(), format);
        }
    }

    #[test]
    fn test_visible_cells() {
        let mut template = Template::new("t", 2, 2);
        template.set_cell_text(0, 1, "b").unwrap();
        template.set_cell_text(1, 0, "hidden").unwrap();
        template.merge_region(MergeRegion::new(0, 0, 1, 0)).unwrap();

        let cells = visible_cells(&template);
        let positions: Vec<(u32, u32)> = cells.iter().map(|(c, _)| (c.row, c.col)).collect();
        assert_eq!(positions, vec![(0, 0), (0, 1)]);
        assert_eq!(cells[0].1, MergeRegion::new(0, 0, 1, 0));
        assert!(cells[1].1.is_single());
    }
}
