//! First-worksheet reader for xlsx templates

use crate::schema::{
    BorderStyle, Borders, CellSpec, CellStyle, FontSpec, HAlign, MergeRegion, Rgb, Template,
    VAlign,
};
use crate::{EngineError, Result};
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn attr_f64(node: Node<'_, '_>, name: &str) -> Option<f64> {
    node.attribute(name)?.trim().parse().ok()
}

fn attr_usize(node: Node<'_, '_>, name: &str) -> Option<usize> {
    node.attribute(name)?.trim().parse().ok()
}

/// Boolean flag elements such as `<b/>` or `<b val="0"/>`
fn flag(node: Node<'_, '_>, name: &str) -> bool {
    child(node, name)
        .map(|n| !matches!(n.attribute("val"), Some("0") | Some("false")))
        .unwrap_or(false)
}

/// Last column of a worksheet (`XFD`), 1-based
const MAX_COLUMNS: u32 = 16_384;

/// Last row of a worksheet, 1-based
const MAX_ROWS: u32 = 1_048_576;

/// Parse an A1 reference into a 0-indexed (row, col)
///
/// References outside the worksheet limits yield `None`.
fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.trim().replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROWS || col > MAX_COLUMNS {
        return None;
    }
    Some((row - 1, col - 1))
}

fn parse_range(reference: &str) -> Option<MergeRegion> {
    let (first, last) = match reference.split_once(':') {
        Some((a, b)) => (a, b),
        None => (reference, reference),
    };
    let (first_row, first_col) = parse_cell_ref(first)?;
    let (last_row, last_col) = parse_cell_ref(last)?;
    Some(MergeRegion::new(first_row, first_col, last_row, last_col))
}

/// Text of a `<si>` or `<is>` node, ignoring phonetic runs
fn rich_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "t")
        .filter(|n| !n.ancestors().any(|a| a.tag_name().name() == "rPh"))
        .filter_map(|n| n.text())
        .collect()
}

fn border_style(node: Option<Node<'_, '_>>) -> Option<BorderStyle> {
    match node?.attribute("style")? {
        "none" => None,
        "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" | "slantDashDot" => {
            Some(BorderStyle::Medium)
        }
        "thick" | "double" => Some(BorderStyle::Thick),
        _ => Some(BorderStyle::Thin),
    }
}

fn color(node: Option<Node<'_, '_>>) -> Option<Rgb> {
    Rgb::parse(node?.attribute("rgb")?)
}

struct Styles {
    xfs: Vec<CellStyle>,
}

impl Styles {
    fn parse(xml: Option<&str>) -> Result<Self> {
        let Some(xml) = xml else {
            return Ok(Self { xfs: Vec::new() });
        };
        let doc = Document::parse(xml)?;
        let root = doc.root_element();

        let fonts: Vec<FontSpec> = child(root, "fonts")
            .map(|fonts| {
                children(fonts, "font")
                    .map(|font| FontSpec {
                        family: child(font, "name")
                            .and_then(|n| n.attribute("val"))
                            .unwrap_or("Calibri")
                            .to_string(),
                        size: child(font, "sz")
                            .and_then(|n| attr_f64(n, "val"))
                            .unwrap_or(11.0),
                        bold: flag(font, "b"),
                        italic: flag(font, "i"),
                        color: color(child(font, "color")).unwrap_or(Rgb::BLACK),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let fills: Vec<Option<Rgb>> = child(root, "fills")
            .map(|fills| {
                children(fills, "fill")
                    .map(|fill| {
                        let pattern = child(fill, "patternFill")?;
                        if pattern.attribute("patternType") != Some("solid") {
                            return None;
                        }
                        color(child(pattern, "fgColor"))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let borders: Vec<Borders> = child(root, "borders")
            .map(|borders| {
                children(borders, "border")
                    .map(|border| Borders {
                        left: border_style(child(border, "left")),
                        right: border_style(child(border, "right")),
                        top: border_style(child(border, "top")),
                        bottom: border_style(child(border, "bottom")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let xfs = child(root, "cellXfs")
            .map(|xfs| {
                children(xfs, "xf")
                    .map(|xf| {
                        let mut style = CellStyle::default();
                        if let Some(font) = attr_usize(xf, "fontId").and_then(|i| fonts.get(i)) {
                            style.font = font.clone();
                        }
                        if let Some(fill) = attr_usize(xf, "fillId").and_then(|i| fills.get(i)) {
                            style.fill = *fill;
                        }
                        if let Some(border) = attr_usize(xf, "borderId").and_then(|i| borders.get(i)) {
                            style.borders = *border;
                        }
                        if let Some(alignment) = child(xf, "alignment") {
                            style.align = match alignment.attribute("horizontal") {
                                Some("center") | Some("centerContinuous") => HAlign::Center,
                                Some("right") => HAlign::Right,
                                _ => HAlign::Left,
                            };
                            style.valign = match alignment.attribute("vertical") {
                                Some("top") => VAlign::Top,
                                Some("center") => VAlign::Center,
                                _ => VAlign::Bottom,
                            };
                            style.wrap = matches!(alignment.attribute("wrapText"), Some("1") | Some("true"));
                        }
                        style
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { xfs })
    }

    fn get(&self, index: usize) -> CellStyle {
        self.xfs.get(index).cloned().unwrap_or_default()
    }
}

fn shared_strings(xml: Option<&str>) -> Result<Vec<String>> {
    let Some(xml) = xml else {
        return Ok(Vec::new());
    };
    let doc = Document::parse(xml)?;
    Ok(children(doc.root_element(), "si").map(rich_text).collect())
}

/// Path of the first worksheet, following the workbook relationships
fn first_sheet_path<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let fallback = "xl/worksheets/sheet1.xml".to_string();

    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Err(EngineError::invalid_template(name, "xl/workbook.xml missing"));
    };
    let doc = Document::parse(&workbook)?;
    let rel_id = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "sheet")
        .and_then(|sheet| sheet.attribute((REL_NS, "id")))
        .map(str::to_string);
    let Some(rel_id) = rel_id else {
        return Err(EngineError::invalid_template(name, "workbook has no worksheet"));
    };

    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(fallback);
    };
    let doc = Document::parse(&rels)?;
    let target = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        .find(|n| n.attribute("Id") == Some(rel_id.as_str()))
        .and_then(|n| n.attribute("Target"));

    Ok(match target {
        Some(target) if target.starts_with('/') => target.trim_start_matches('/').to_string(),
        Some(target) => format!("xl/{target}"),
        None => fallback,
    })
}

struct RawCell {
    row: u32,
    col: u32,
    text: String,
    style: usize,
}

/// Read the first worksheet of an xlsx workbook as a template grid
///
/// The grid spans every cell that has a value or a style, every merge and the
/// declared sheet dimension.
pub(crate) fn read_template(bytes: &[u8], name: &str) -> Result<Template> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| EngineError::invalid_template(name, format!("not an xlsx container: {err}")))?;

    let sheet_path = first_sheet_path(&mut archive, name)?;
    let Some(sheet_xml) = read_part(&mut archive, &sheet_path)? else {
        return Err(EngineError::invalid_template(
            name,
            format!("{sheet_path} missing"),
        ));
    };
    let strings = shared_strings(read_part(&mut archive, "xl/sharedStrings.xml")?.as_deref())?;
    let styles = Styles::parse(read_part(&mut archive, "xl/styles.xml")?.as_deref())?;

    let doc = Document::parse(&sheet_xml)?;
    let root = doc.root_element();

    let mut rows: u32 = 0;
    let mut cols: u32 = 0;
    let mut extend = |row: u32, col: u32| {
        rows = rows.max(row + 1);
        cols = cols.max(col + 1);
    };

    if let Some(region) = child(root, "dimension")
        .and_then(|d| d.attribute("ref"))
        .and_then(parse_range)
    {
        extend(region.last_row, region.last_col);
    }

    let mut row_heights: HashMap<u32, f64> = HashMap::new();
    let mut cells: Vec<RawCell> = Vec::new();

    if let Some(sheet_data) = child(root, "sheetData") {
        for (i, row) in children(sheet_data, "row").enumerate() {
            let row_index = attr_usize(row, "r")
                .and_then(|r| (r as u32).checked_sub(1))
                .unwrap_or(i as u32);
            if let Some(height) = attr_f64(row, "ht") {
                row_heights.insert(row_index, height);
            }

            for (j, c) in children(row, "c").enumerate() {
                let (r, col) = match c.attribute("r") {
                    Some(reference) => parse_cell_ref(reference).ok_or_else(|| {
                        EngineError::invalid_template(
                            name,
                            format!("bad cell reference '{reference}'"),
                        )
                    })?,
                    None => (row_index, j as u32),
                };
                let value = child(c, "v").and_then(|v| v.text()).unwrap_or_default();
                let text = match c.attribute("t") {
                    Some("s") => value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| strings.get(i))
                        .cloned()
                        .unwrap_or_default(),
                    Some("inlineStr") => child(c, "is").map(rich_text).unwrap_or_default(),
                    Some("b") => (if value.trim() == "1" { "TRUE" } else { "FALSE" }).to_string(),
                    _ => value.to_string(),
                };
                let style = attr_usize(c, "s").unwrap_or(0);
                if text.is_empty() && style == 0 {
                    continue;
                }
                extend(r, col);
                cells.push(RawCell { row: r, col, text, style });
            }
        }
    }

    let mut merges = Vec::new();
    if let Some(merge_cells) = child(root, "mergeCells") {
        for merge in children(merge_cells, "mergeCell") {
            let reference = merge.attribute("ref").unwrap_or_default();
            let region = parse_range(reference).ok_or_else(|| {
                EngineError::invalid_template(name, format!("bad merge reference '{reference}'"))
            })?;
            extend(region.last_row, region.last_col);
            merges.push(region);
        }
    }

    if rows == 0 || cols == 0 {
        return Err(EngineError::invalid_template(name, "first worksheet is empty"));
    }

    let mut template = Template::new(name, rows, cols);

    let format = child(root, "sheetFormatPr");
    let default_width = format.and_then(|f| attr_f64(f, "defaultColWidth"));
    let default_height = format.and_then(|f| attr_f64(f, "defaultRowHeight"));

    for col in 0..cols {
        if let Some(width) = default_width {
            template.set_column_width(col, width);
        }
    }
    if let Some(col_defs) = child(root, "cols") {
        for def in children(col_defs, "col") {
            let (Some(min), Some(max), Some(width)) = (
                attr_usize(def, "min"),
                attr_usize(def, "max"),
                attr_f64(def, "width"),
            ) else {
                continue;
            };
            for col in min.max(1)..=max.min(cols as usize) {
                template.set_column_width(col as u32 - 1, width);
            }
        }
    }

    for row in 0..rows {
        match row_heights.get(&row).copied().or(default_height) {
            Some(height) => template.set_row_height(row, height),
            None => continue,
        }
    }

    // Keyed by position so a repeated reference keeps its last value
    let mut by_position: BTreeMap<(u32, u32), CellSpec> = BTreeMap::new();
    for cell in cells {
        let mut spec = CellSpec::new(cell.row, cell.col);
        spec.text = cell.text;
        spec.style = styles.get(cell.style);
        by_position.insert((cell.row, cell.col), spec);
    }
    template.cells = by_position.into_values().collect();
    for region in merges {
        template.merge_region(region)?;
    }

    Ok(template)
}
