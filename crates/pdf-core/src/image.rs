//! Image handling for PDF documents

use crate::{fmt_num, PdfError, Result};
use image::{DynamicImage, GenericImageView};
use lopdf::{dictionary, Stream};
use std::io::Write;

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::ImageError(err.to_string())
    }
}

/// Detected image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Detect image format from magic bytes
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 8 {
        return Err(PdfError::ImageError("Image data too short".to_string()));
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok(ImageFormat::Jpeg);
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Ok(ImageFormat::Png);
    }

    Err(PdfError::ImageError("Unknown image format".to_string()))
}

/// Image XObject for PDF embedding
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    /// "DeviceRGB" or "DeviceGray"
    pub color_space: &'static str,
    /// "DCTDecode" for JPEG passthrough, "FlateDecode" for decoded pixels
    pub filter: &'static str,
    /// Compressed sample data
    pub data: Vec<u8>,
}

impl ImageXObject {
    /// Create an XObject from JPEG or PNG bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match detect_format(data)? {
            ImageFormat::Jpeg => Self::from_jpeg(data),
            ImageFormat::Png => Self::from_png(data),
        }
    }

    /// JPEG data is embedded as is with DCTDecode
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let (width, height, components) = jpeg_frame_info(data)?;

        Ok(Self {
            width,
            height,
            color_space: if components == 1 {
                "DeviceGray"
            } else {
                "DeviceRGB"
            },
            filter: "DCTDecode",
            data: data.to_vec(),
        })
    }

    /// PNG data is decoded and re-compressed with FlateDecode
    ///
    /// Transparent pixels are composited over white.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Png)?;
        let (width, height) = image.dimensions();

        let (samples, color_space) = flatten_onto_white(&image);

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&samples)?;

        Ok(Self {
            width,
            height,
            color_space,
            filter: "FlateDecode",
            data: encoder.finish()?,
        })
    }

    /// Convert to a lopdf image stream
    pub fn to_pdf_stream(&self) -> Stream {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space,
            "BitsPerComponent" => 8,
            "Filter" => self.filter,
        };
        // Already compressed; keep lopdf from compressing again
        Stream::new(dict, self.data.clone()).with_compression(false)
    }
}

/// Blend any alpha channel over white; grayscale stays single-channel
fn flatten_onto_white(image: &DynamicImage) -> (Vec<u8>, &'static str) {
    let blend = |value: u8, alpha: u8| -> u8 {
        let a = alpha as f32 / 255.0;
        (value as f32 * a + 255.0 * (1.0 - a)).round() as u8
    };

    let color = image.color();
    match (color.has_color(), color.has_alpha()) {
        (false, false) => (image.to_luma8().into_raw(), "DeviceGray"),
        (false, true) => {
            let samples = image
                .to_luma_alpha8()
                .pixels()
                .map(|p| blend(p[0], p[1]))
                .collect();
            (samples, "DeviceGray")
        }
        (true, false) => (image.to_rgb8().into_raw(), "DeviceRGB"),
        (true, true) => {
            let rgba = image.to_rgba8();
            let mut samples = Vec::with_capacity(rgba.len() / 4 * 3);
            for p in rgba.pixels() {
                samples.extend([blend(p[0], p[3]), blend(p[1], p[3]), blend(p[2], p[3])]);
            }
            (samples, "DeviceRGB")
        }
    }
}

/// Read width, height and component count from the first SOF segment
fn jpeg_frame_info(data: &[u8]) -> Result<(u32, u32, u8)> {
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Ok((width, height, data[i + 9]));
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        i += 2 + length;
    }

    Err(PdfError::ImageError("Could not parse JPEG frame header".to_string()))
}

/// Generate operators to draw an image resource
///
/// `x`/`y` are the lower-left corner in PDF coordinates (from bottom).
pub fn generate_image_operators(image_name: &str, x: f64, y: f64, width: f64, height: f64) -> Vec<u8> {
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{image_name} Do\nQ\n",
        fmt_num(width),
        fmt_num(height),
        fmt_num(x),
        fmt_num(y)
    )
    .into_bytes()
}
