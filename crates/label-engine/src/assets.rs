//! Logo and barcode rasters
//!
//! Every asset is a PNG rendered at the configured DPI together with the
//! physical size it must be printed at. Assets never touch the filesystem and are
//! dropped with the provider at the end of a render call.

use crate::compositor::Size;
use crate::config::BarcodeConfig;
use crate::schema::{ImageSlot, Symbology};
use crate::store::AssetStore;
use crate::{EngineError, Result};
use barcoders::sym::code128::Code128;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

/// Name of the company logo in the [`AssetStore`]
pub const LOGO_ASSET: &str = "logo.png";

/// Code 128 character set B selector understood by `barcoders`
const CODE128_SET_B: char = 'Ɓ';

/// Encoded raster plus its print size
#[derive(Debug, Clone, PartialEq)]
pub struct RasterAsset {
    pub png: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl RasterAsset {
    /// Print size in 96-DPI pixels
    pub fn size_px(&self) -> Size {
        Size::from_mm(self.width_mm, self.height_mm)
    }
}

fn mm_to_dots(mm: f64, dpi: u32) -> u32 {
    ((mm / 25.4 * dpi as f64).round() as u32).max(1)
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>> {
    let mut bytes: Vec<u8> = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image.write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Request-scoped source of raster assets
pub struct AssetProvider<'a> {
    store: &'a dyn AssetStore,
    config: BarcodeConfig,
    logo_source: RefCell<Option<Arc<DynamicImage>>>,
    logos: RefCell<HashMap<(u16, u64, u64), Arc<RasterAsset>>>,
}

impl<'a> AssetProvider<'a> {
    pub fn new(store: &'a dyn AssetStore, config: BarcodeConfig) -> Self {
        Self {
            store,
            config,
            logo_source: RefCell::new(None),
            logos: RefCell::new(HashMap::new()),
        }
    }

    fn logo_source(&self) -> Result<Arc<DynamicImage>> {
        if let Some(image) = self.logo_source.borrow().as_ref() {
            return Ok(Arc::clone(image));
        }
        let bytes = self.store.load(LOGO_ASSET)?;
        let image = image::load_from_memory(&bytes)
            .map_err(|err| EngineError::asset(LOGO_ASSET, err))?;
        let image = Arc::new(image);
        *self.logo_source.borrow_mut() = Some(Arc::clone(&image));
        Ok(image)
    }

    /// The logo rotated and resampled for a slot
    ///
    /// The slot size is the size after rotation. Results are cached per slot
    /// geometry, so a batch decodes and resamples the logo once.
    pub fn logo(&self, slot: &ImageSlot) -> Result<Arc<RasterAsset>> {
        let key = (slot.rotate, slot.width_mm.to_bits(), slot.height_mm.to_bits());
        if let Some(asset) = self.logos.borrow().get(&key) {
            return Ok(Arc::clone(asset));
        }

        let source = self.logo_source()?;
        let rotated = match slot.rotate {
            90 => source.rotate90(),
            180 => source.rotate180(),
            270 => source.rotate270(),
            _ => (*source).clone(),
        };

        let width = mm_to_dots(slot.width_mm, self.config.dpi);
        let height = mm_to_dots(slot.height_mm, self.config.dpi);
        let resized = rotated.resize_exact(width, height, FilterType::Lanczos3);

        let asset = Arc::new(RasterAsset {
            png: encode_png(resized)?,
            pixel_width: width,
            pixel_height: height,
            width_mm: slot.width_mm,
            height_mm: slot.height_mm,
        });
        self.logos.borrow_mut().insert(key, Arc::clone(&asset));
        Ok(asset)
    }

    /// Barcode of `payload` at a physical size
    ///
    /// # Errors
    /// `AssetUnavailable` when the payload is empty or cannot be encoded in the
    /// symbology (Code 128 accepts printable ASCII only).
    pub fn barcode(
        &self,
        payload: &str,
        symbology: Symbology,
        width_mm: f64,
        height_mm: f64,
    ) -> Result<Arc<RasterAsset>> {
        let label = format!("barcode '{payload}'");
        if payload.is_empty() {
            return Err(EngineError::asset(&label, "empty payload"));
        }

        let width = mm_to_dots(width_mm, self.config.dpi);
        let height = mm_to_dots(height_mm, self.config.dpi);

        let raster = match symbology {
            Symbology::Code128 => self.code128(payload, width, height),
            Symbology::Qr => qr(payload, width, height),
        }
        .map_err(|reason| EngineError::asset(&label, reason))?;

        Ok(Arc::new(RasterAsset {
            png: encode_png(DynamicImage::ImageLuma8(raster))?,
            pixel_width: width,
            pixel_height: height,
            width_mm,
            height_mm,
        }))
    }

    fn code128(&self, payload: &str, width: u32, height: u32) -> std::result::Result<GrayImage, String> {
        if let Some(bad) = payload.chars().find(|c| !(' '..='~').contains(c)) {
            return Err(format!("character {bad:?} not allowed in Code 128"));
        }

        let modules = Code128::new(format!("{CODE128_SET_B}{payload}"))
            .map_err(|err| err.to_string())?
            .encode();

        let quiet = self.config.quiet_zone_modules as usize;
        let total = modules.len() + 2 * quiet;
        // Whole pixels per module keep the bars crisp before the final resample
        let module_px = (width as usize / total).max(1) as u32;

        let mut bars = GrayImage::from_pixel(total as u32 * module_px, height, Luma([255u8]));
        for (i, module) in modules.iter().enumerate() {
            if *module == 0 {
                continue;
            }
            let x0 = (quiet + i) as u32 * module_px;
            for x in x0..x0 + module_px {
                for y in 0..height {
                    bars.put_pixel(x, y, Luma([0u8]));
                }
            }
        }

        Ok(image::imageops::resize(&bars, width, height, FilterType::Lanczos3))
    }
}

fn qr(payload: &str, width: u32, height: u32) -> std::result::Result<GrayImage, String> {
    use qrcode::QrCode;

    let code = QrCode::new(payload.as_bytes()).map_err(|err| err.to_string())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(width, height)
        .build();
    Ok(image::imageops::resize(&image, width, height, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAssetStore;
    use pretty_assertions::assert_eq;

    fn logo_png(width: u32, height: u32) -> Vec<u8> {
        let image = GrayImage::from_pixel(width, height, Luma([40u8]));
        encode_png(DynamicImage::ImageLuma8(image)).unwrap()
    }

    fn decode(asset: &RasterAsset) -> DynamicImage {
        image::load_from_memory(&asset.png).unwrap()
    }

    #[test]
    fn test_code128_size_follows_dpi() {
        let store = MemoryAssetStore::new();
        let provider = AssetProvider::new(&store, BarcodeConfig::default());
        let asset = provider
            .barcode("3501040", Symbology::Code128, 40.0, 10.0)
            .unwrap();

        assert_eq!((asset.pixel_width, asset.pixel_height), (945, 236));
        let image = decode(&asset);
        assert_eq!((image.width(), image.height()), (945, 236));
        assert_eq!(asset.size_px(), Size::from_mm(40.0, 10.0));
    }

    #[test]
    fn test_code128_has_quiet_zone_and_bars() {
        let store = MemoryAssetStore::new();
        let provider = AssetProvider::new(&store, BarcodeConfig::default());
        let asset = provider
            .barcode("AGB 05-07 NQ 000001 25", Symbology::Code128, 40.0, 10.0)
            .unwrap();
        let image = decode(&asset).to_luma8();

        let row = image.height() / 2;
        assert!(image.get_pixel(0, row)[0] > 200);
        assert!((0..image.width()).any(|x| image.get_pixel(x, row)[0] < 60));
    }

    #[test]
    fn test_code128_rejects_non_ascii() {
        let store = MemoryAssetStore::new();
        let provider = AssetProvider::new(&store, BarcodeConfig::default());
        let err = provider
            .barcode("ЦБ-12", Symbology::Code128, 40.0, 10.0)
            .unwrap_err();
        match err {
            EngineError::AssetUnavailable { asset, reason } => {
                assert_eq!(asset, "barcode 'ЦБ-12'");
                assert!(reason.contains("not allowed"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(provider.barcode("", Symbology::Code128, 40.0, 10.0).is_err());
    }

    #[test]
    fn test_qr_barcode() {
        let store = MemoryAssetStore::new();
        let provider = AssetProvider::new(&store, BarcodeConfig::default());
        let asset = provider.barcode("ЦБ-12", Symbology::Qr, 20.0, 20.0).unwrap();
        assert_eq!(asset.pixel_width, asset.pixel_height);
    }

    #[test]
    fn test_logo_rotated_and_cached() {
        let store = MemoryAssetStore::new().with_asset(LOGO_ASSET, logo_png(300, 90));
        let config = BarcodeConfig {
            dpi: 96,
            ..BarcodeConfig::default()
        };
        let provider = AssetProvider::new(&store, config);
        let slot = ImageSlot::logo("logo", 21.4, 72.2).with_rotation(90);

        let first = provider.logo(&slot).unwrap();
        let second = provider.logo(&slot).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let image = decode(&first);
        assert_eq!((image.width(), image.height()), (81, 273));
    }

    #[test]
    fn test_missing_logo() {
        let store = MemoryAssetStore::new();
        let provider = AssetProvider::new(&store, BarcodeConfig::default());
        let slot = ImageSlot::logo("logo", 20.0, 20.0);
        assert!(matches!(
            provider.logo(&slot),
            Err(EngineError::AssetUnavailable { .. })
        ));
    }
}
