//! PDF Document builder

use crate::graphics::{generate_line_operators, generate_rect_fill_operators};
use crate::image::{generate_image_operators, ImageXObject};
use crate::text::{generate_text_operators, TextRenderContext};
use crate::{Align, BuiltinFont, FontData, FontFace, PdfError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::path::Path;

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create color from RGB values (0-255)
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    pub fn white() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// A registered font and the resource name it is shown under
struct RegisteredFont {
    face: FontFace,
    resource_name: String,
}

/// Page state accumulated until the document is serialized
struct PageBuffer {
    width: f64,
    height: f64,
    /// Content operators in drawing order
    content: Vec<u8>,
    /// Font resource name -> registered font name
    fonts: BTreeMap<String, String>,
    /// Image resource name -> XObject
    images: BTreeMap<String, ObjectId>,
}

/// PDF document builder
///
/// Pages are created blank at any size. Everything drawn is buffered per page
/// and written out by [`PdfDocument::to_bytes`] or [`PdfDocument::save`], which
/// is also when the used fonts are embedded.
///
/// Coordinates are points from the top-left corner of the page.
pub struct PdfDocument {
    inner: Document,
    pages: Vec<PageBuffer>,
    fonts: HashMap<String, RegisteredFont>,
    next_font_resource: u32,
    current_font: Option<String>,
    current_font_size: f32,
    current_text_color: Color,
    /// Embedded images (data hash -> object ID, width, height)
    embedded_images: HashMap<u64, (ObjectId, u32, u32)>,
    next_image_resource: u32,
    compress: bool,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    /// Create an empty document with no pages
    pub fn new() -> Self {
        Self {
            inner: Document::with_version("1.5"),
            pages: Vec::new(),
            fonts: HashMap::new(),
            next_font_resource: 1,
            current_font: None,
            current_font_size: 12.0,
            current_text_color: Color::default(),
            embedded_images: HashMap::new(),
            next_image_resource: 1,
            compress: true,
        }
    }

    /// Enable or disable Flate compression of content streams (on by default)
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Append a blank page and return its number (1-indexed)
    ///
    /// # Arguments
    /// * `width` - Page width in points
    /// * `height` - Page height in points
    pub fn add_page(&mut self, width: f64, height: f64) -> usize {
        self.pages.push(PageBuffer {
            width,
            height,
            content: Vec::new(),
            fonts: BTreeMap::new(),
            images: BTreeMap::new(),
        });
        self.pages.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Width and height of a page in points
    pub fn page_size(&self, page: usize) -> Result<(f64, f64)> {
        let buffer = self.page(page)?;
        Ok((buffer.width, buffer.height))
    }

    /// Load a TrueType font under `name`
    ///
    /// # Arguments
    /// * `name` - Font identifier used with [`PdfDocument::set_font`]
    /// * `ttf_data` - TrueType font file bytes
    pub fn add_font(&mut self, name: &str, ttf_data: &[u8]) -> Result<()> {
        let font = FontData::from_ttf(name, ttf_data)?;
        self.register_font(name, FontFace::Embedded(font))
    }

    /// Register one of the built-in Helvetica faces under `name`
    pub fn add_builtin_font(&mut self, name: &str, font: BuiltinFont) -> Result<()> {
        self.register_font(name, FontFace::Builtin(font))
    }

    fn register_font(&mut self, name: &str, face: FontFace) -> Result<()> {
        if self.fonts.contains_key(name) {
            return Err(PdfError::FontAlreadyExists(name.to_string()));
        }

        let resource_name = format!("F{}", self.next_font_resource);
        self.next_font_resource += 1;
        self.fonts.insert(
            name.to_string(),
            RegisteredFont {
                face,
                resource_name,
            },
        );
        Ok(())
    }

    pub fn has_font(&self, name: &str) -> bool {
        self.fonts.contains_key(name)
    }

    /// Select the font and size used by subsequent text operations
    pub fn set_font(&mut self, name: &str, size: f32) -> Result<()> {
        if !self.fonts.contains_key(name) {
            return Err(PdfError::FontNotFound(name.to_string()));
        }
        self.current_font = Some(name.to_string());
        self.current_font_size = size;
        Ok(())
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.current_text_color = color;
    }

    fn current_face(&self) -> Result<&RegisteredFont> {
        let name = self
            .current_font
            .as_deref()
            .ok_or_else(|| PdfError::FontNotFound("no font selected".to_string()))?;
        self.fonts
            .get(name)
            .ok_or_else(|| PdfError::FontNotFound(name.to_string()))
    }

    /// Width of `text` in points with the current font and size
    pub fn text_width(&self, text: &str) -> Result<f64> {
        let font = self.current_face()?;
        Ok(font.face.text_width_points(text, self.current_font_size) as f64)
    }

    /// Ascent of the current font in points
    pub fn font_ascent(&self) -> Result<f64> {
        let font = self.current_face()?;
        Ok(font.face.ascent_points(self.current_font_size) as f64)
    }

    /// Descent of the current font in points (positive value)
    pub fn font_descent(&self) -> Result<f64> {
        let font = self.current_face()?;
        Ok(font.face.descent_points(self.current_font_size) as f64)
    }

    /// Whether the current font can show every character of `text`
    pub fn covers(&self, text: &str) -> Result<bool> {
        let font = self.current_face()?;
        Ok(text
            .chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| font.face.has_glyph(c)))
    }

    fn page(&self, page: usize) -> Result<&PageBuffer> {
        let count = self.pages.len();
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index))
            .ok_or(PdfError::InvalidPage(page, count))
    }

    fn page_mut(&mut self, page: usize) -> Result<&mut PageBuffer> {
        let count = self.pages.len();
        page.checked_sub(1)
            .and_then(|index| self.pages.get_mut(index))
            .ok_or(PdfError::InvalidPage(page, count))
    }

    /// Insert one line of text with the current font
    ///
    /// # Arguments
    /// * `text` - Text to show (no line breaks)
    /// * `page` - Page number (1-indexed)
    /// * `x` - Anchor X in points from the left edge; see `align`
    /// * `y` - Baseline Y in points from the top edge
    /// * `align` - Whether `x` is the left edge, center or right edge of the text
    pub fn insert_text(&mut self, text: &str, page: usize, x: f64, y: f64, align: Align) -> Result<()> {
        let page_height = self.page(page)?.height;
        let font_name = self
            .current_font
            .clone()
            .ok_or_else(|| PdfError::FontNotFound("no font selected".to_string()))?;
        let font_size = self.current_font_size;
        let color = self.current_text_color;

        let font = self
            .fonts
            .get_mut(&font_name)
            .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))?;
        let text_width = font.face.text_width_points(text, font_size) as f64;
        let encoded = font.face.encode_and_track(text);
        let resource_name = font.resource_name.clone();

        let ctx = TextRenderContext {
            font_name: resource_name.clone(),
            font_size,
            text_width,
            color,
        };
        let ops = generate_text_operators(&encoded, x, page_height - y, align, &ctx);

        let buffer = self.page_mut(page)?;
        buffer.fonts.insert(resource_name, font_name);
        buffer.content.extend_from_slice(&ops);
        Ok(())
    }

    /// Draw a JPEG or PNG image into a box
    ///
    /// The image is stretched to `width` x `height`. Identical image data is
    /// embedded once and shared between placements.
    ///
    /// # Arguments
    /// * `data` - Image file bytes
    /// * `page` - Page number (1-indexed)
    /// * `x` - Left edge in points
    /// * `y` - Top edge in points from the top of the page
    /// * `width` - Box width in points
    /// * `height` - Box height in points
    pub fn insert_image(
        &mut self,
        data: &[u8],
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        let page_height = self.page(page)?.height;
        let (object_id, _, _) = self.embed_image(data)?;

        let resource_name = {
            let buffer = self.page(page)?;
            buffer
                .images
                .iter()
                .find(|(_, id)| **id == object_id)
                .map(|(name, _)| name.clone())
        };
        let resource_name = match resource_name {
            Some(name) => name,
            None => {
                let name = format!("Im{}", self.next_image_resource);
                self.next_image_resource += 1;
                name
            }
        };

        let ops = generate_image_operators(&resource_name, x, page_height - y - height, width, height);

        let buffer = self.page_mut(page)?;
        buffer.images.insert(resource_name, object_id);
        buffer.content.extend_from_slice(&ops);
        Ok(())
    }

    /// Pixel size of an image as it would be embedded
    pub fn image_dimensions(&mut self, data: &[u8]) -> Result<(u32, u32)> {
        let (_, width, height) = self.embed_image(data)?;
        Ok((width, height))
    }

    fn embed_image(&mut self, data: &[u8]) -> Result<(ObjectId, u32, u32)> {
        let data_hash = hash_bytes(data);
        if let Some(embedded) = self.embedded_images.get(&data_hash) {
            return Ok(*embedded);
        }

        let xobject = ImageXObject::from_bytes(data)?;
        let object_id = self.inner.add_object(xobject.to_pdf_stream());
        let embedded = (object_id, xobject.width, xobject.height);
        self.embedded_images.insert(data_hash, embedded);
        Ok(embedded)
    }

    /// Fill a rectangle
    ///
    /// `x`/`y` are the top-left corner in points from the top-left of the page.
    pub fn fill_rect(
        &mut self,
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    ) -> Result<()> {
        let buffer = self.page_mut(page)?;
        let ops = generate_rect_fill_operators(x, buffer.height - y - height, width, height, color);
        buffer.content.extend_from_slice(&ops);
        Ok(())
    }

    /// Stroke a straight line between two points (top-left origin)
    pub fn stroke_line(
        &mut self,
        page: usize,
        from: (f64, f64),
        to: (f64, f64),
        line_width: f64,
        color: Color,
    ) -> Result<()> {
        let buffer = self.page_mut(page)?;
        let flip = |(x, y): (f64, f64)| (x, buffer.height - y);
        let ops = generate_line_operators(flip(from), flip(to), line_width, color);
        buffer.content.extend_from_slice(&ops);
        Ok(())
    }

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize the document
    ///
    /// Embeds every font that was used on at least one page, writes one content
    /// stream per page and assembles the page tree.
    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(PdfError::SaveError("document has no pages".to_string()));
        }

        // 1. Embed fonts referenced by any page
        let mut font_ids: HashMap<String, ObjectId> = HashMap::new();
        for buffer in &self.pages {
            for font_name in buffer.fonts.values() {
                if font_ids.contains_key(font_name) {
                    continue;
                }
                let font = self
                    .fonts
                    .get(font_name)
                    .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))?;
                let id = font.face.embed(&mut self.inner);
                font_ids.insert(font_name.clone(), id);
            }
        }

        // 2. Page objects with their resources and content
        let pages_id = self.inner.new_object_id();
        let mut kids = Vec::with_capacity(self.pages.len());

        for buffer in std::mem::take(&mut self.pages) {
            let mut font_dict = Dictionary::new();
            for (resource_name, font_name) in &buffer.fonts {
                if let Some(id) = font_ids.get(font_name) {
                    font_dict.set(resource_name.as_bytes(), Object::Reference(*id));
                }
            }

            let mut xobject_dict = Dictionary::new();
            for (resource_name, id) in &buffer.images {
                xobject_dict.set(resource_name.as_bytes(), Object::Reference(*id));
            }

            let mut content = Stream::new(Dictionary::new(), buffer.content);
            if self.compress {
                // Falls back to an uncompressed stream on failure
                let _ = content.compress();
            }
            let content_id = self.inner.add_object(content);

            let page_id = self.inner.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(buffer.width as f32),
                    Object::Real(buffer.height as f32),
                ],
                "Resources" => dictionary! {
                    "Font" => font_dict,
                    "XObject" => xobject_dict,
                },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        // 3. Page tree and catalog
        let count = kids.len() as i64;
        self.inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.inner.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        self.inner
            .save_to(&mut output)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(output)
    }
}

fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_document_has_no_pages() {
        let doc = PdfDocument::new();
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_add_page_numbers_from_one() {
        let mut doc = PdfDocument::new();
        assert_eq!(doc.add_page(100.0, 200.0), 1);
        assert_eq!(doc.add_page(300.0, 400.0), 2);
        assert_eq!(doc.page_size(2).unwrap(), (300.0, 400.0));
        assert!(matches!(doc.page_size(0), Err(PdfError::InvalidPage(0, 2))));
        assert!(matches!(doc.page_size(3), Err(PdfError::InvalidPage(3, 2))));
    }

    #[test]
    fn test_font_registration() {
        let mut doc = PdfDocument::new();
        doc.add_builtin_font("body", BuiltinFont::Helvetica).unwrap();
        assert!(doc.has_font("body"));
        assert!(matches!(
            doc.add_builtin_font("body", BuiltinFont::HelveticaBold),
            Err(PdfError::FontAlreadyExists(_))
        ));
        assert!(matches!(
            doc.set_font("missing", 10.0),
            Err(PdfError::FontNotFound(_))
        ));
    }

    #[test]
    fn test_text_requires_font() {
        let mut doc = PdfDocument::new();
        let page = doc.add_page(100.0, 100.0);
        let result = doc.insert_text("x", page, 0.0, 10.0, Align::Left);
        assert!(matches!(result, Err(PdfError::FontNotFound(_))));
    }

    #[test]
    fn test_text_y_is_flipped() {
        let mut doc = PdfDocument::new();
        doc.add_builtin_font("body", BuiltinFont::Helvetica).unwrap();
        doc.set_font("body", 10.0).unwrap();
        let page = doc.add_page(200.0, 300.0);
        doc.insert_text("Hi", page, 10.0, 50.0, Align::Left).unwrap();

        let content = String::from_utf8(doc.pages[0].content.clone()).unwrap();
        assert!(content.contains("10 250 Td"));
        assert!(content.contains("/F1 10 Tf"));
        assert_eq!(doc.pages[0].fonts.get("F1").map(String::as_str), Some("body"));
    }

    #[test]
    fn test_covers() {
        let mut doc = PdfDocument::new();
        doc.add_builtin_font("body", BuiltinFont::Helvetica).unwrap();
        doc.set_font("body", 10.0).unwrap();
        assert!(doc.covers("AGB 05-07").unwrap());
        assert!(!doc.covers("Коронка").unwrap());
    }

    #[test]
    fn test_empty_document_cannot_be_saved() {
        let doc = PdfDocument::new();
        assert!(matches!(doc.to_bytes(), Err(PdfError::SaveError(_))));
    }
}
