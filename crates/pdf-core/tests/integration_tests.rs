//! Integration tests for pdf-core
//!
//! Documents are built through the public API, serialized and then loaded
//! back with lopdf to check the resulting structure.

use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{Document, Object};
use pdf_core::{Align, BuiltinFont, Color, PdfDocument, PdfError, A4_HEIGHT, A4_WIDTH};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, _| {
        if x % 2 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn new_doc() -> PdfDocument {
    let mut doc = PdfDocument::new().with_compression(false);
    doc.add_builtin_font("body", BuiltinFont::Helvetica).unwrap();
    doc.add_builtin_font("bold", BuiltinFont::HelveticaBold).unwrap();
    doc
}

fn page_content(doc: &Document, page: u32) -> String {
    let pages = doc.get_pages();
    let page_id = pages[&page];
    String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap()
}

#[test]
fn test_pages_roundtrip_with_sizes() {
    let mut doc = new_doc();
    doc.add_page(A4_WIDTH, A4_HEIGHT);
    doc.add_page(297.64, 420.94);

    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load_mem(&bytes).unwrap();

    let pages = loaded.get_pages();
    assert_eq!(pages.len(), 2);

    let second = loaded.get_object(pages[&2]).unwrap().as_dict().unwrap();
    let media_box = second.get(b"MediaBox").unwrap().as_array().unwrap();
    let height = match &media_box[3] {
        Object::Real(v) => *v as f64,
        Object::Integer(v) => *v as f64,
        other => panic!("unexpected MediaBox value {other:?}"),
    };
    assert!((height - 420.94).abs() < 0.01);
}

#[test]
fn test_text_lands_on_requested_page() {
    let mut doc = new_doc();
    let first = doc.add_page(A4_WIDTH, A4_HEIGHT);
    let second = doc.add_page(A4_WIDTH, A4_HEIGHT);

    doc.set_font("body", 12.0).unwrap();
    doc.insert_text("AGB 05-07 NQ 000001 25", first, 50.0, 100.0, Align::Left)
        .unwrap();
    doc.set_font("bold", 9.0).unwrap();
    doc.insert_text("Page two", second, 100.0, 100.0, Align::Center)
        .unwrap();

    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load_mem(&bytes).unwrap();

    let page_one = page_content(&loaded, 1);
    assert!(page_one.contains("(AGB 05-07 NQ 000001 25) Tj"));
    assert!(!page_one.contains("Page two"));

    let page_two = page_content(&loaded, 2);
    assert!(page_two.contains("(Page two) Tj"));
    assert!(page_two.contains("/F2 9 Tf"));
}

#[test]
fn test_only_used_fonts_are_attached() {
    let mut doc = new_doc();
    let page = doc.add_page(A4_WIDTH, A4_HEIGHT);
    doc.set_font("bold", 10.0).unwrap();
    doc.insert_text("x", page, 10.0, 10.0, Align::Left).unwrap();

    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load_mem(&bytes).unwrap();
    let page_id = loaded.get_pages()[&1];
    let page = loaded.get_object(page_id).unwrap().as_dict().unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();

    assert_eq!(fonts.len(), 1);
    let font_id = fonts.get(b"F2").unwrap().as_reference().unwrap();
    let font = loaded.get_object(font_id).unwrap().as_dict().unwrap();
    assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica-Bold");
}

#[test]
fn test_image_is_embedded_once() {
    let mut doc = new_doc();
    let page = doc.add_page(A4_WIDTH, A4_HEIGHT);
    let png = sample_png(8, 4);

    doc.insert_image(&png, page, 10.0, 10.0, 80.0, 40.0).unwrap();
    doc.insert_image(&png, page, 10.0, 60.0, 80.0, 40.0).unwrap();
    assert_eq!(doc.image_dimensions(&png).unwrap(), (8, 4));

    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load_mem(&bytes).unwrap();

    let images = loaded
        .objects
        .values()
        .filter(|obj| {
            obj.as_stream()
                .ok()
                .and_then(|s| s.dict.get(b"Subtype").ok())
                .and_then(|v| v.as_name().ok())
                == Some(b"Image".as_slice())
        })
        .count();
    assert_eq!(images, 1);

    let content = page_content(&loaded, 1);
    assert_eq!(content.matches("/Im1 Do").count(), 2);
    // 841.89 - 10 - 40
    assert!(content.contains("80 0 0 40 10 791.89 cm"));
}

#[test]
fn test_fill_and_stroke_use_top_left_origin() {
    let mut doc = new_doc();
    let page = doc.add_page(200.0, 100.0);

    doc.fill_rect(page, 10.0, 10.0, 50.0, 20.0, Color::from_rgb(255, 255, 0))
        .unwrap();
    doc.stroke_line(page, (0.0, 0.0), (200.0, 0.0), 1.0, Color::black())
        .unwrap();

    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load_mem(&bytes).unwrap();
    let content = page_content(&loaded, 1);

    assert!(content.contains("10 70 50 20 re"));
    assert!(content.contains("0 100 m\n200 100 l"));
}

#[test]
fn test_invalid_page_is_rejected() {
    let mut doc = new_doc();
    doc.add_page(A4_WIDTH, A4_HEIGHT);
    doc.set_font("body", 12.0).unwrap();

    let result = doc.insert_text("x", 2, 0.0, 0.0, Align::Left);
    assert!(matches!(result, Err(PdfError::InvalidPage(2, 1))));

    let result = doc.fill_rect(5, 0.0, 0.0, 1.0, 1.0, Color::black());
    assert!(matches!(result, Err(PdfError::InvalidPage(5, 1))));
}

#[test]
fn test_bad_image_data_is_an_error() {
    let mut doc = new_doc();
    let page = doc.add_page(A4_WIDTH, A4_HEIGHT);
    let result = doc.insert_image(b"definitely not an image", page, 0.0, 0.0, 1.0, 1.0);
    assert!(matches!(result, Err(PdfError::ImageError(_))));
}

#[test]
fn test_compressed_output_still_loads() {
    let mut doc = PdfDocument::new();
    doc.add_builtin_font("body", BuiltinFont::Helvetica).unwrap();
    let page = doc.add_page(A4_WIDTH, A4_HEIGHT);
    doc.set_font("body", 11.0).unwrap();
    doc.insert_text("compressed", page, 20.0, 20.0, Align::Right)
        .unwrap();

    let bytes = doc.to_bytes().unwrap();
    let loaded = Document::load_mem(&bytes).unwrap();
    assert!(page_content(&loaded, 1).contains("(compressed) Tj"));
}

#[test]
fn test_save_writes_file() {
    let mut doc = new_doc();
    doc.add_page(A4_WIDTH, A4_HEIGHT);

    let path = std::env::temp_dir().join(format!("pdf-core-save-{}.pdf", std::process::id()));
    doc.save(&path).unwrap();

    let loaded = Document::load(&path).unwrap();
    assert_eq!(loaded.get_pages().len(), 1);
    std::fs::remove_file(path).unwrap();
}
