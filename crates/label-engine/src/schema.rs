//! Template grid model

use crate::compositor::{column_width_px, row_height_px, Size};
use crate::placeholder::{marker_names, normalize_name};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Excel's default column width in file units (64 px)
pub const DEFAULT_COLUMN_WIDTH: f64 = 9.140625;

/// Excel's default row height in points (20 px)
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;

/// RGB color written as `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`, `RRGGBB` or the ARGB form `AARRGGBB` used by xlsx
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let hex = match hex.len() {
            6 => hex,
            8 => hex.get(2..)?,
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// 24-bit value as used by `rust_xlsxwriter::Color::RGB`
    pub fn to_u32(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Rgb::parse(&value).ok_or_else(|| format!("invalid color '{value}'"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        format!("#{}", value.to_hex())
    }
}

/// Border line weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
}

impl BorderStyle {
    /// Line width in points
    pub fn width_pt(&self) -> f64 {
        match self {
            BorderStyle::Thin => 0.75,
            BorderStyle::Medium => 1.5,
            BorderStyle::Thick => 2.25,
        }
    }

    /// The heavier of two borders
    pub fn max(self, other: BorderStyle) -> BorderStyle {
        if other.width_pt() > self.width_pt() {
            other
        } else {
            self
        }
    }
}

/// Borders on the four edges of a cell or merge region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderStyle>,
}

impl Borders {
    pub fn all(style: BorderStyle) -> Self {
        Self {
            left: Some(style),
            right: Some(style),
            top: Some(style),
            bottom: Some(style),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.top.is_none() && self.bottom.is_none()
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Font specification for a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    #[serde(default = "default_font_family")]
    pub family: String,

    /// Size in points
    #[serde(default = "default_font_size")]
    pub size: f64,

    #[serde(default)]
    pub bold: bool,

    #[serde(default)]
    pub italic: bool,

    #[serde(default)]
    pub color: Rgb,
}

fn default_font_family() -> String {
    "Calibri".to_string()
}

fn default_font_size() -> f64 {
    11.0
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: default_font_family(),
            size: default_font_size(),
            bold: false,
            italic: false,
            color: Rgb::BLACK,
        }
    }
}

/// Visual style of a cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default)]
    pub font: FontSpec,

    #[serde(default)]
    pub align: HAlign,

    #[serde(default)]
    pub valign: VAlign,

    #[serde(default)]
    pub wrap: bool,

    #[serde(default)]
    pub borders: Borders,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Rgb>,
}

/// One cell of the template grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSpec {
    /// Row (0-indexed)
    pub row: u32,

    /// Column (0-indexed)
    pub col: u32,

    /// Raw text with zero or more `{{ name }}` markers
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub style: CellStyle,
}

impl CellSpec {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            text: String::new(),
            style: CellStyle::default(),
        }
    }
}

/// Rectangular merge region (inclusive bounds, 0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRegion {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl MergeRegion {
    pub fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
        }
    }

    /// A 1 x 1 region
    pub fn single(row: u32, col: u32) -> Self {
        Self::new(row, col, row, col)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn overlaps(&self, other: &MergeRegion) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    pub fn is_single(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }

    pub fn row_span(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn col_span(&self) -> u32 {
        self.last_col - self.first_col + 1
    }

    /// Shift by a row/column offset
    pub fn offset(&self, rows: u32, cols: u32) -> Self {
        Self::new(
            self.first_row + rows,
            self.first_col + cols,
            self.last_row + rows,
            self.last_col + cols,
        )
    }
}

impl fmt::Display for MergeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            cell_ref(self.first_row, self.first_col),
            cell_ref(self.last_row, self.last_col)
        )
    }
}

/// A1-style reference for a 0-indexed cell
pub fn cell_ref(row: u32, col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{}", letters.into_iter().collect::<String>(), row + 1)
}

/// Units per printed page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub columns: u32,
    pub rows: u32,
}

impl PageGeometry {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Grid position (row, column) of the slot at `index` on a page
    pub fn slot_position(&self, index: usize) -> (u32, u32) {
        let columns = self.columns.max(1) as usize;
        ((index / columns) as u32, (index % columns) as u32)
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

/// Label templates must carry at least one image anchor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Label,
    Passport,
}

/// Barcode symbology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    #[default]
    Code128,
    Qr,
}

/// Where an image slot takes its picture from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageSource {
    /// The static company logo
    Logo,
    /// A barcode of a unit variable
    Barcode {
        variable: String,
        #[serde(default)]
        symbology: Symbology,
    },
}

/// Vertical placement of an image inside its region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotAlignment {
    /// Top-center when the anchor cell also shows text, otherwise centered
    #[default]
    Auto,
    Center,
    TopCenter,
}

/// Named image slot; anchored by a `{{ name }}` marker in a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSlot {
    pub name: String,
    pub source: ImageSource,
    pub width_mm: f64,
    pub height_mm: f64,

    /// Clockwise rotation in degrees (0, 90, 180 or 270)
    #[serde(default)]
    pub rotate: u16,

    #[serde(default)]
    pub alignment: SlotAlignment,
}

impl ImageSlot {
    pub fn logo(name: &str, width_mm: f64, height_mm: f64) -> Self {
        Self {
            name: name.to_string(),
            source: ImageSource::Logo,
            width_mm,
            height_mm,
            rotate: 0,
            alignment: SlotAlignment::Auto,
        }
    }

    pub fn barcode(name: &str, variable: &str, width_mm: f64, height_mm: f64) -> Self {
        Self {
            name: name.to_string(),
            source: ImageSource::Barcode {
                variable: variable.to_string(),
                symbology: Symbology::Code128,
            },
            width_mm,
            height_mm,
            rotate: 0,
            alignment: SlotAlignment::Auto,
        }
    }

    pub fn with_rotation(mut self, degrees: u16) -> Self {
        self.rotate = degrees;
        self
    }

    pub fn with_alignment(mut self, alignment: SlotAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Slots used when a template does not define its own
    ///
    /// # Arguments
    /// * `barcode_mm` - Width and height of the barcode slots in millimetres
    pub fn default_set(barcode_mm: (f64, f64)) -> Vec<ImageSlot> {
        let (w, h) = barcode_mm;
        vec![
            ImageSlot::logo("logo", 21.4, 72.2).with_rotation(90),
            ImageSlot::barcode("stock_code", "stock_code", w, h),
            ImageSlot::barcode("barcode_primary", "stock_code", w, h),
            ImageSlot::barcode("serial_number_code", "serial_number", w, h),
            ImageSlot::barcode("barcode_serial", "serial_number", w, h),
        ]
    }

    /// Displayed size in pixels
    ///
    /// `width_mm` x `height_mm` describe the box on the page, so a rotated logo
    /// is declared with its post-rotation orientation and no swap happens here.
    pub fn size_px(&self) -> Size {
        Size::from_mm(self.width_mm, self.height_mm)
    }
}

/// A cell that anchors an image slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotAnchor {
    pub slot: String,
    pub row: u32,
    pub col: u32,
}

/// Abstract grid template for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,

    #[serde(default)]
    pub kind: TemplateKind,

    pub rows: u32,
    pub cols: u32,

    /// Column widths in Excel character units; missing entries use the default
    #[serde(default)]
    pub column_widths: Vec<f64>,

    /// Row heights in points; missing entries use the default
    #[serde(default)]
    pub row_heights: Vec<f64>,

    #[serde(default)]
    pub cells: Vec<CellSpec>,

    #[serde(default)]
    pub merges: Vec<MergeRegion>,

    #[serde(default)]
    pub page: PageGeometry,

    #[serde(default)]
    pub images: Vec<ImageSlot>,

    /// Border drawn around each unit's outer edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_outline: Option<BorderStyle>,
}

impl Template {
    /// Create an empty grid
    pub fn new(name: &str, rows: u32, cols: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: TemplateKind::Label,
            rows,
            cols,
            column_widths: Vec::new(),
            row_heights: Vec::new(),
            cells: Vec::new(),
            merges: Vec::new(),
            page: PageGeometry::default(),
            images: Vec::new(),
            unit_outline: None,
        }
    }

    pub fn with_kind(mut self, kind: TemplateKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_page(mut self, page: PageGeometry) -> Self {
        self.page = page;
        self
    }

    pub fn with_outline(mut self, style: BorderStyle) -> Self {
        self.unit_outline = Some(style);
        self
    }

    fn check_bounds(&self, row: u32, col: u32) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(EngineError::invalid_template(
                &self.name,
                format!(
                    "cell {} outside the {}x{} grid",
                    cell_ref(row, col),
                    self.rows,
                    self.cols
                ),
            ));
        }
        Ok(())
    }

    /// Set the raw text of a cell, creating the cell if needed
    pub fn set_cell_text(&mut self, row: u32, col: u32, text: impl Into<String>) -> Result<()> {
        self.check_bounds(row, col)?;
        self.cell_mut(row, col).text = text.into();
        Ok(())
    }

    /// Set the style of a cell, creating the cell if needed
    pub fn set_cell_style(&mut self, row: u32, col: u32, style: CellStyle) -> Result<()> {
        self.check_bounds(row, col)?;
        self.cell_mut(row, col).style = style;
        Ok(())
    }

    /// Add a merge region after checking bounds and overlaps
    pub fn merge_region(&mut self, region: MergeRegion) -> Result<()> {
        self.check_merge(&region)?;
        if let Some(existing) = self.merges.iter().find(|m| m.overlaps(&region)) {
            return Err(EngineError::invalid_template(
                &self.name,
                format!("merge {region} overlaps {existing}"),
            ));
        }
        self.merges.push(region);
        Ok(())
    }

    /// Attach a named image slot
    pub fn attach_image(&mut self, slot: ImageSlot) -> Result<()> {
        let name = normalize_name(&slot.name);
        if self.images.iter().any(|s| normalize_name(&s.name) == name) {
            return Err(EngineError::invalid_template(
                &self.name,
                format!("duplicate image slot '{name}'"),
            ));
        }
        self.images.push(slot);
        Ok(())
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        let index = col as usize;
        if self.column_widths.len() <= index {
            self.column_widths.resize(index + 1, DEFAULT_COLUMN_WIDTH);
        }
        self.column_widths[index] = width;
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        let index = row as usize;
        if self.row_heights.len() <= index {
            self.row_heights.resize(index + 1, DEFAULT_ROW_HEIGHT);
        }
        self.row_heights[index] = height;
    }

    /// Column width in character units
    pub fn column_width(&self, col: u32) -> f64 {
        self.column_widths
            .get(col as usize)
            .copied()
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Row height in points
    pub fn row_height(&self, row: u32) -> f64 {
        self.row_heights
            .get(row as usize)
            .copied()
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&CellSpec> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Mutable access to a cell, inserting an empty one if absent
    pub fn cell_mut(&mut self, row: u32, col: u32) -> &mut CellSpec {
        let index = match self.cells.iter().position(|c| c.row == row && c.col == col) {
            Some(index) => index,
            None => {
                self.cells.push(CellSpec::new(row, col));
                self.cells.len() - 1
            }
        };
        &mut self.cells[index]
    }

    /// Merge region containing a cell, if any
    pub fn merge_at(&self, row: u32, col: u32) -> Option<&MergeRegion> {
        self.merges.iter().find(|m| m.contains(row, col))
    }

    /// The region a cell renders into: its merge, or the cell itself
    pub fn region_of(&self, row: u32, col: u32) -> MergeRegion {
        self.merge_at(row, col)
            .copied()
            .unwrap_or_else(|| MergeRegion::single(row, col))
    }

    /// Whether a cell is hidden under another cell's merge
    pub fn is_covered(&self, row: u32, col: u32) -> bool {
        self.merge_at(row, col)
            .map(|m| m.first_row != row || m.first_col != col)
            .unwrap_or(false)
    }

    pub fn slot(&self, name: &str) -> Option<&ImageSlot> {
        let name = normalize_name(name);
        self.images.iter().find(|s| normalize_name(&s.name) == name)
    }

    /// Normalized names of all image slots (reserved placeholder names)
    pub fn slot_names(&self) -> HashSet<String> {
        self.images.iter().map(|s| normalize_name(&s.name)).collect()
    }

    /// Cells whose text carries an image slot marker, in row-major order
    pub fn anchors(&self) -> Vec<SlotAnchor> {
        let reserved = self.slot_names();
        let mut anchors: Vec<SlotAnchor> = self
            .cells
            .iter()
            .filter(|cell| !self.is_covered(cell.row, cell.col))
            .flat_map(|cell| {
                marker_names(&cell.text)
                    .into_iter()
                    .filter(|name| reserved.contains(name))
                    .map(move |slot| SlotAnchor {
                        slot,
                        row: cell.row,
                        col: cell.col,
                    })
            })
            .collect();
        anchors.sort_by_key(|a| (a.row, a.col));
        anchors
    }

    /// Width of a column in pixels
    pub fn column_px(&self, col: u32) -> f64 {
        column_width_px(self.column_width(col))
    }

    /// Height of a row in pixels
    pub fn row_px(&self, row: u32) -> f64 {
        row_height_px(self.row_height(row))
    }

    /// Pixel offset of a cell's top-left corner from the unit's top-left corner
    pub fn cell_origin_px(&self, row: u32, col: u32) -> (f64, f64) {
        let x = (0..col).map(|c| self.column_px(c)).sum();
        let y = (0..row).map(|r| self.row_px(r)).sum();
        (x, y)
    }

    /// Pixel size of a region
    pub fn region_size_px(&self, region: &MergeRegion) -> Size {
        Size {
            width: (region.first_col..=region.last_col)
                .map(|c| self.column_px(c))
                .sum(),
            height: (region.first_row..=region.last_row)
                .map(|r| self.row_px(r))
                .sum(),
        }
    }

    /// Pixel size of one whole unit
    pub fn unit_size_px(&self) -> Size {
        self.region_size_px(&MergeRegion::new(
            0,
            0,
            self.rows.saturating_sub(1),
            self.cols.saturating_sub(1),
        ))
    }

    fn check_merge(&self, region: &MergeRegion) -> Result<()> {
        if region.first_row > region.last_row || region.first_col > region.last_col {
            return Err(EngineError::invalid_template(
                &self.name,
                format!("merge {region} has first cell after last cell"),
            ));
        }
        if region.last_row >= self.rows || region.last_col >= self.cols {
            return Err(EngineError::invalid_template(
                &self.name,
                format!(
                    "merge {region} outside the {}x{} grid",
                    self.rows, self.cols
                ),
            ));
        }
        Ok(())
    }

    /// Check every structural invariant
    ///
    /// # Errors
    /// `InvalidTemplate` naming the template and the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(EngineError::invalid_template(&self.name, "grid has no cells"));
        }
        if self.page.capacity() == 0 {
            return Err(EngineError::invalid_template(
                &self.name,
                "page geometry holds no units",
            ));
        }
        if self.column_widths.len() > self.cols as usize {
            return Err(EngineError::invalid_template(
                &self.name,
                format!(
                    "{} column widths for {} columns",
                    self.column_widths.len(),
                    self.cols
                ),
            ));
        }
        if self.row_heights.len() > self.rows as usize {
            return Err(EngineError::invalid_template(
                &self.name,
                format!("{} row heights for {} rows", self.row_heights.len(), self.rows),
            ));
        }
        if let Some(bad) = self
            .column_widths
            .iter()
            .chain(self.row_heights.iter())
            .find(|v| !v.is_finite() || **v < 0.0)
        {
            return Err(EngineError::invalid_template(
                &self.name,
                format!("invalid column width or row height {bad}"),
            ));
        }

        let mut seen = HashSet::new();
        for cell in &self.cells {
            self.check_bounds(cell.row, cell.col)?;
            if !seen.insert((cell.row, cell.col)) {
                return Err(EngineError::invalid_template(
                    &self.name,
                    format!("cell {} defined twice", cell_ref(cell.row, cell.col)),
                ));
            }
        }

        for (i, region) in self.merges.iter().enumerate() {
            self.check_merge(region)?;
            if let Some(other) = self.merges[i + 1..].iter().find(|m| m.overlaps(region)) {
                return Err(EngineError::invalid_template(
                    &self.name,
                    format!("merge {region} overlaps {other}"),
                ));
            }
        }

        let mut names = HashSet::new();
        for slot in &self.images {
            let name = normalize_name(&slot.name);
            if name.is_empty() {
                return Err(EngineError::invalid_template(&self.name, "image slot without a name"));
            }
            if !names.insert(name.clone()) {
                return Err(EngineError::invalid_template(
                    &self.name,
                    format!("duplicate image slot '{name}'"),
                ));
            }
            if !(slot.width_mm > 0.0 && slot.height_mm > 0.0) {
                return Err(EngineError::invalid_template(
                    &self.name,
                    format!("image slot '{name}' has no size"),
                ));
            }
            if !matches!(slot.rotate, 0 | 90 | 180 | 270) {
                return Err(EngineError::invalid_template(
                    &self.name,
                    format!("image slot '{name}' rotation {} is not a multiple of 90", slot.rotate),
                ));
            }
        }

        if self.kind == TemplateKind::Label && self.anchors().is_empty() {
            return Err(EngineError::invalid_template(
                &self.name,
                "label template has no image anchor cell",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn label() -> Template {
        let mut template = Template::new("sticker", 3, 3);
        template.images = ImageSlot::default_set((40.0, 10.0));
        template.set_cell_text(0, 1, "{{ stock_code }}").unwrap();
        template
    }

    #[test]
    fn test_rgb_parse() {
        assert_eq!(Rgb::parse("#FF8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse("FFFF8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse("nope"), None);
        assert_eq!(Rgb::parse("a€€a"), None);
        assert_eq!(Rgb::parse("#ЖЖЖ"), None);
        assert_eq!(Rgb::parse("GGHHII"), None);
        assert_eq!(Rgb::parse("FFGG0000"), None);
        assert_eq!(Rgb::new(1, 2, 3).to_u32(), 0x010203);
    }

    #[test]
    fn test_cell_ref() {
        assert_eq!(cell_ref(0, 0), "A1");
        assert_eq!(cell_ref(9, 25), "Z10");
        assert_eq!(cell_ref(0, 26), "AA1");
    }

    #[test]
    fn test_merge_geometry() {
        let a = MergeRegion::new(0, 0, 1, 1);
        let b = MergeRegion::new(1, 1, 2, 2);
        let c = MergeRegion::new(2, 0, 2, 0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.contains(1, 0));
        assert_eq!((a.row_span(), a.col_span()), (2, 2));
        assert_eq!(a.to_string(), "A1:B2");
    }

    #[test]
    fn test_merge_region_rejects_overlap() {
        let mut template = label();
        template.merge_region(MergeRegion::new(0, 0, 1, 0)).unwrap();
        let err = template.merge_region(MergeRegion::new(1, 0, 2, 0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid template 'sticker': merge A2:A3 overlaps A1:A2"
        );
    }

    #[test]
    fn test_merge_region_rejects_out_of_bounds() {
        let mut template = label();
        let err = template.merge_region(MergeRegion::new(0, 0, 0, 3)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_set_cell_text_bounds() {
        let mut template = label();
        assert!(template.set_cell_text(3, 0, "x").is_err());
        template.set_cell_text(2, 2, "x").unwrap();
        assert_eq!(template.cell(2, 2).unwrap().text, "x");
    }

    #[test]
    fn test_attach_image_rejects_duplicate_name() {
        let mut template = Template::new("passport", 2, 2);
        template.attach_image(ImageSlot::logo("logo", 30.0, 15.0)).unwrap();
        assert!(template
            .attach_image(ImageSlot::barcode("Logo", "stock_code", 40.0, 10.0))
            .is_err());
        assert_eq!(template.images.len(), 1);
    }

    #[test]
    fn test_validate_accepts_label() {
        assert!(label().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_anchor_for_labels() {
        let mut template = Template::new("plain", 2, 2);
        template.images = ImageSlot::default_set((40.0, 10.0));
        template.set_cell_text(0, 0, "{{ serial_number }}").unwrap();
        let err = template.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid template 'plain': label template has no image anchor cell"
        );

        let passport = template.with_kind(TemplateKind::Passport);
        assert!(passport.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_overlap_from_json() {
        let mut template = label();
        template.merges = vec![MergeRegion::new(0, 0, 1, 1), MergeRegion::new(1, 1, 2, 2)];
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_rotation_and_zero_page() {
        let mut template = label();
        template.images[0].rotate = 45;
        assert!(template.validate().is_err());

        let template = label().with_page(PageGeometry::new(0, 2));
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_anchor_in_covered_cell_is_ignored() {
        let mut template = label();
        template.merge_region(MergeRegion::new(1, 0, 1, 2)).unwrap();
        template.set_cell_text(1, 1, "{{ logo }}").unwrap();
        let anchors = template.anchors();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].slot, "stock_code");
    }

    #[test]
    fn test_rotated_slot_keeps_declared_box() {
        let slot = ImageSlot::logo("logo", 25.4, 50.8).with_rotation(90);
        let size = slot.size_px();
        assert_eq!((size.width, size.height), (96.0, 192.0));
    }

    #[test]
    fn test_pixel_geometry() {
        let mut template = Template::new("g", 2, 2);
        template.set_column_width(0, 20.0);
        template.set_row_height(1, 30.0);
        assert_eq!(template.column_px(0), 140.0);
        assert_eq!(template.column_px(1), 64.0);
        assert_eq!(template.row_px(0), 20.0);
        assert_eq!(template.row_px(1), 40.0);
        assert_eq!(template.cell_origin_px(1, 1), (140.0, 20.0));
        assert_eq!(
            template.unit_size_px(),
            Size {
                width: 204.0,
                height: 60.0
            }
        );
    }

    #[test]
    fn test_template_json_shape() {
        let json = r##"{
            "name": "sticker",
            "rows": 2,
            "cols": 2,
            "columnWidths": [14.0, 28.0],
            "cells": [
                { "row": 0, "col": 0, "text": "{{ logo }}",
                  "style": { "font": { "size": 9, "bold": true, "color": "#1F3864" }, "align": "center" } }
            ],
            "merges": [ { "firstRow": 0, "firstCol": 0, "lastRow": 1, "lastCol": 0 } ],
            "page": { "columns": 2, "rows": 2 },
            "images": [
                { "name": "logo", "source": { "type": "logo" }, "widthMm": 12, "heightMm": 30, "rotate": 90 }
            ],
            "unitOutline": "thick"
        }"##;

        let template: Template = serde_json::from_str(json).unwrap();
        assert_eq!(template.page.capacity(), 4);
        assert_eq!(template.cells[0].style.font.color, Rgb::new(0x1F, 0x38, 0x64));
        assert_eq!(template.cells[0].style.align, HAlign::Center);
        assert_eq!(template.images[0].source, ImageSource::Logo);
        assert_eq!(template.unit_outline, Some(BorderStyle::Thick));
        assert!(template.validate().is_ok());
    }
}
