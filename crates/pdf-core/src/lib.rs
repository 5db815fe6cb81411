//! PDF Core - Low-level PDF page building
//!
//! This crate provides functionality for:
//! - Creating blank documents with pages of arbitrary size
//! - Built-in Helvetica faces and embedded TrueType fonts
//! - Inserting text at specific coordinates
//! - Inserting images (JPEG, PNG)
//! - Filling rectangles and stroking lines (cell fills and borders)
//!
//! All coordinates passed to [`PdfDocument`] are in points measured from the
//! top-left corner of the page.
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{Align, BuiltinFont, PdfDocument, A4_HEIGHT, A4_WIDTH};
//!
//! let mut doc = PdfDocument::new();
//! doc.add_builtin_font("body", BuiltinFont::Helvetica)?;
//! let page = doc.add_page(A4_WIDTH, A4_HEIGHT);
//! doc.set_font("body", 12.0)?;
//! doc.insert_text("Hello, World!", page, 100.0, 100.0, Align::Left)?;
//! let bytes = doc.to_bytes()?;
//! ```

mod document;
mod font;
mod graphics;
mod image;
mod text;

pub use document::{Color, PdfDocument};
pub use font::{BuiltinFont, FontData, FontFace};
pub use graphics::{generate_line_operators, generate_rect_fill_operators};
pub use image::{detect_format, ImageFormat, ImageXObject};
pub use text::{generate_text_operators, wrap_to_width, TextRenderContext};

use thiserror::Error;

/// A4 page width in points
pub const A4_WIDTH: f64 = 595.28;
/// A4 page height in points
pub const A4_HEIGHT: f64 = 841.89;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Font already exists: {0}")]
    FontAlreadyExists(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Format a number for a content stream: at most three decimals, no trailing zeros
pub(crate) fn fmt_num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    let mut s = format!("{rounded:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_default() {
        assert_eq!(Align::default(), Align::Left);
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(100.0), "100");
        assert_eq!(fmt_num(0.75), "0.75");
        assert_eq!(fmt_num(12.3456), "12.346");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(-50.5), "-50.5");
    }
}
