//! Per-record template instances

use crate::assets::{AssetProvider, RasterAsset};
use crate::compositor::{Alignment, Compositor, PlacementOffset, Size};
use crate::placeholder::{strip_markers, substitute, Context};
use crate::schema::{BorderStyle, ImageSlot, ImageSource, MergeRegion, SlotAlignment, Template};
use crate::{EngineError, Result, UnitIssue};
use std::sync::Arc;

/// An asset positioned inside a region of one unit
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    pub slot: String,
    /// Region the image is centered in, in unit-local cell coordinates
    pub region: MergeRegion,
    pub asset: Arc<RasterAsset>,
    /// Offset from the region's top-left corner, in pixels
    pub offset: PlacementOffset,
    /// Displayed size in pixels
    pub size: Size,
}

/// One resolved template instance bound to one record
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementUnit {
    /// Position of the record in the request
    pub index: usize,
    pub document_number: String,
    /// Independent copy of the template with substituted text
    pub template: Template,
    pub images: Vec<ImagePlacement>,
}

impl PlacementUnit {
    pub fn new(index: usize, document_number: &str, template: Template) -> Self {
        Self {
            index,
            document_number: document_number.to_string(),
            template,
            images: Vec::new(),
        }
    }

    /// Attach a placed image
    ///
    /// # Errors
    /// `InvalidTemplate` when the region lies outside the unit grid.
    pub fn attach_image(&mut self, placement: ImagePlacement) -> Result<()> {
        let region = &placement.region;
        if region.last_row >= self.template.rows || region.last_col >= self.template.cols {
            return Err(EngineError::invalid_template(
                &self.template.name,
                format!("image '{}' anchored outside the grid at {region}", placement.slot),
            ));
        }
        self.images.push(placement);
        Ok(())
    }
}

/// Result of instantiating one record
#[derive(Debug)]
pub struct Instance {
    pub unit: PlacementUnit,
    /// Slots left empty
    pub issues: Vec<UnitIssue>,
    /// Marker names the context could not resolve
    pub unknown: Vec<String>,
}

fn resolve_alignment(slot: &ImageSlot, keeps_text: bool) -> Alignment {
    match slot.alignment {
        SlotAlignment::Center => Alignment::Center,
        SlotAlignment::TopCenter => Alignment::TopCenter,
        SlotAlignment::Auto if keeps_text => Alignment::TopCenter,
        SlotAlignment::Auto => Alignment::Center,
    }
}

fn load_asset(
    slot: &ImageSlot,
    context: &Context,
    assets: &AssetProvider<'_>,
) -> Result<Arc<RasterAsset>> {
    match &slot.source {
        ImageSource::Logo => assets.logo(slot),
        ImageSource::Barcode {
            variable,
            symbology,
        } => {
            let payload = context.get(variable).unwrap_or_default().trim();
            assets.barcode(payload, *symbology, slot.width_mm, slot.height_mm)
        }
    }
}

fn thicken(side: &mut Option<BorderStyle>, style: BorderStyle) {
    *side = Some(side.map_or(style, |current| current.max(style)));
}

/// Apply the unit outline to every region touching the unit's outer edge
fn apply_outline(template: &mut Template) {
    let Some(style) = template.unit_outline else {
        return;
    };
    let (last_row, last_col) = (template.rows.saturating_sub(1), template.cols.saturating_sub(1));

    for row in 0..template.rows {
        for col in 0..template.cols {
            if template.is_covered(row, col) {
                continue;
            }
            let region = template.region_of(row, col);
            let on_edge = region.first_row == 0
                || region.first_col == 0
                || region.last_row == last_row
                || region.last_col == last_col;
            if !on_edge {
                continue;
            }

            let borders = &mut template.cell_mut(row, col).style.borders;
            if region.first_row == 0 {
                thicken(&mut borders.top, style);
            }
            if region.last_row == last_row {
                thicken(&mut borders.bottom, style);
            }
            if region.first_col == 0 {
                thicken(&mut borders.left, style);
            }
            if region.last_col == last_col {
                thicken(&mut borders.right, style);
            }
        }
    }
}

/// Bind a template to one record's variables and assets
///
/// Text markers are substituted, image markers are removed from their cells and
/// replaced by placed assets. A failed asset leaves its slot empty and is
/// reported in [`Instance::issues`]; other failures abort.
pub fn instantiate(
    template: &Template,
    index: usize,
    document_number: &str,
    context: &Context,
    assets: &AssetProvider<'_>,
    compositor: &Compositor,
) -> Result<Instance> {
    let reserved = template.slot_names();
    let mut copy = template.clone();
    let mut unknown: Vec<String> = Vec::new();

    for cell in copy.cells.iter_mut() {
        let substituted = substitute(&cell.text, context, &reserved);
        for name in substituted.unknown {
            if !unknown.contains(&name) {
                unknown.push(name);
            }
        }
        cell.text = strip_markers(&substituted.text, &reserved);
        if substituted.wrap {
            cell.style.wrap = true;
        }
    }

    apply_outline(&mut copy);

    let mut unit = PlacementUnit::new(index, document_number, copy);
    let mut issues = Vec::new();

    for anchor in template.anchors() {
        let Some(slot) = template.slot(&anchor.slot) else {
            continue;
        };

        let asset = match load_asset(slot, context, assets) {
            Ok(asset) => asset,
            Err(EngineError::AssetUnavailable { reason, .. }) => {
                log::warn!(
                    "event=asset_load module=instance status=error unit={} slot={} reason={}",
                    index,
                    anchor.slot,
                    reason
                );
                issues.push(UnitIssue::AssetUnavailable {
                    unit: index,
                    slot: anchor.slot.clone(),
                    reason,
                });
                continue;
            }
            Err(err) => return Err(err),
        };

        let keeps_text = unit
            .template
            .cell(anchor.row, anchor.col)
            .map_or(false, |cell| !cell.text.trim().is_empty());
        let alignment = resolve_alignment(slot, keeps_text);
        let region = template.region_of(anchor.row, anchor.col);
        let size = asset.size_px();
        let offset = compositor.place(size, template.region_size_px(&region), alignment);

        unit.attach_image(ImagePlacement {
            slot: anchor.slot,
            region,
            asset,
            offset,
            size,
        })?;
    }

    Ok(Instance {
        unit,
        issues,
        unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BarcodeConfig;
    use crate::store::MemoryAssetStore;
    use pretty_assertions::assert_eq;

    fn template() -> Template {
        let mut template = Template::new("sticker", 2, 2);
        template.images = ImageSlot::default_set((25.4, 12.7));
        template.set_column_width(0, 20.0);
        template.set_row_height(0, 60.0);
        template.set_cell_text(0, 0, "{{ stock_code }}").unwrap();
        template
            .set_cell_text(0, 1, "Серийный номер {{ serial_number_code }}")
            .unwrap();
        template.set_cell_text(1, 0, "{{ nomenclature_name }}").unwrap();
        template.set_cell_text(1, 1, "{{ colour }}").unwrap();
        template
    }

    fn context(stock_code: &str) -> Context {
        let mut ctx = Context::new();
        ctx.insert("stock_code", stock_code);
        ctx.insert("serial_number", "AGB NQ 000001 25");
        ctx.insert("nomenclature_name", "Коронка ALFA\nNQ");
        ctx
    }

    #[test]
    fn test_instantiate_places_images() {
        let store = MemoryAssetStore::new();
        let assets = AssetProvider::new(&store, BarcodeConfig::default());
        let compositor = Compositor::new(4.0);

        let instance =
            instantiate(&template(), 0, "AGB NQ 000001 25", &context("3501040"), &assets, &compositor)
                .unwrap();
        let unit = instance.unit;

        assert!(instance.issues.is_empty());
        assert_eq!(instance.unknown, vec!["colour"]);
        assert_eq!(unit.images.len(), 2);

        let stock = &unit.images[0];
        assert_eq!(stock.slot, "stock_code");
        assert_eq!(stock.offset, PlacementOffset { x: 22.0, y: 16.0 });

        // Anchor cell keeps its label, so the barcode sits at the top margin
        let serial = &unit.images[1];
        assert_eq!(serial.slot, "serial_number_code");
        assert_eq!(serial.offset.y, 4.0);

        assert_eq!(unit.template.cell(0, 0).unwrap().text, "");
        assert_eq!(unit.template.cell(0, 1).unwrap().text, "Серийный номер");
        let name = unit.template.cell(1, 0).unwrap();
        assert_eq!(name.text, "Коронка ALFA\nNQ");
        assert!(name.style.wrap);
    }

    #[test]
    fn test_bad_payload_leaves_slot_empty() {
        let store = MemoryAssetStore::new();
        let assets = AssetProvider::new(&store, BarcodeConfig::default());
        let compositor = Compositor::new(4.0);

        let instance =
            instantiate(&template(), 3, "AGB NQ 000001 25", &context("ЦБ-1"), &assets, &compositor)
                .unwrap();

        assert_eq!(instance.unit.images.len(), 1);
        assert_eq!(instance.issues.len(), 1);
        assert_eq!(instance.issues[0].unit(), 3);
        assert!(matches!(
            &instance.issues[0],
            UnitIssue::AssetUnavailable { slot, .. } if slot == "stock_code"
        ));
    }

    #[test]
    fn test_template_is_not_modified() {
        let store = MemoryAssetStore::new();
        let assets = AssetProvider::new(&store, BarcodeConfig::default());
        let original = template();
        instantiate(&original, 0, "N", &context("1"), &assets, &Compositor::new(4.0)).unwrap();
        assert_eq!(original, template());
    }

    #[test]
    fn test_outline_thickens_edges() {
        let mut template = Template::new("box", 3, 3).with_outline(BorderStyle::Thick);
        template
            .merge_region(MergeRegion::new(0, 0, 2, 0))
            .unwrap();
        apply_outline(&mut template);

        let merged = template.cell(0, 0).unwrap().style.borders;
        assert_eq!(merged.top, Some(BorderStyle::Thick));
        assert_eq!(merged.bottom, Some(BorderStyle::Thick));
        assert_eq!(merged.left, Some(BorderStyle::Thick));
        assert_eq!(merged.right, None);
        assert!(template.cell(1, 1).is_none());
        assert_eq!(template.cell(1, 2).unwrap().style.borders.right, Some(BorderStyle::Thick));
    }

    #[test]
    fn test_attach_image_outside_grid() {
        let mut unit = PlacementUnit::new(0, "N", Template::new("t", 1, 1));
        let placement = ImagePlacement {
            slot: "logo".to_string(),
            region: MergeRegion::single(1, 0),
            asset: Arc::new(RasterAsset {
                png: Vec::new(),
                pixel_width: 1,
                pixel_height: 1,
                width_mm: 1.0,
                height_mm: 1.0,
            }),
            offset: PlacementOffset::default(),
            size: Size::new(1.0, 1.0),
        };
        assert!(matches!(
            unit.attach_image(placement),
            Err(EngineError::InvalidTemplate { .. })
        ));
    }
}
