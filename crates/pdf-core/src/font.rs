//! Font handling for PDF documents

use crate::{PdfError, Result};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeSet;

/// Helvetica advance widths for WinAnsi codes 32..=126 (1000 units per em)
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // a..z
    334, 260, 334, 584, // {..~
];

/// Helvetica-Bold advance widths for WinAnsi codes 32..=126 (1000 units per em)
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // A..Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389,
    556, 333, 611, 556, 778, 556, 556, 500, // a..z
    389, 280, 389, 584, // {..~
];

/// One of the standard 14 Helvetica faces (no embedding required)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
}

impl BuiltinFont {
    /// PostScript name used as `/BaseFont`
    pub fn base_font(&self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
            BuiltinFont::HelveticaOblique => "Helvetica-Oblique",
            BuiltinFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
        }
    }

    fn is_bold(&self) -> bool {
        matches!(
            self,
            BuiltinFont::HelveticaBold | BuiltinFont::HelveticaBoldOblique
        )
    }

    /// Advance width of a character in 1000-unit glyph space
    pub fn char_width(&self, c: char) -> u16 {
        let code = c as u32;
        if (32..=126).contains(&code) {
            let table = if self.is_bold() {
                &HELVETICA_BOLD_WIDTHS
            } else {
                &HELVETICA_WIDTHS
            };
            return table[(code - 32) as usize];
        }
        match c {
            '—' | '…' | '‰' => 1000,
            '‘' | '’' | '‚' => 222,
            _ => 556,
        }
    }

    /// Whether the character can be shown with WinAnsi encoding
    pub fn has_glyph(&self, c: char) -> bool {
        winansi_byte(c).is_some()
    }

    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f32 / 1000.0 * font_size
    }

    /// Encode text as a PDF literal string; unencodable characters become `?`
    pub fn encode_text(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('(');
        for c in text.chars() {
            let byte = winansi_byte(c).unwrap_or(b'?');
            match byte {
                b'(' | b')' | b'\\' => {
                    out.push('\\');
                    out.push(byte as char);
                }
                0x20..=0x7E => out.push(byte as char),
                _ => out.push_str(&format!("\\{byte:03o}")),
            }
        }
        out.push(')');
        out
    }

    fn embed(&self, doc: &mut Document) -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => self.base_font(),
            "Encoding" => "WinAnsiEncoding",
        })
    }
}

/// Map a character to its WinAnsiEncoding code
fn winansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match c {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '‰' => Some(0x89),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            _ => None,
        },
    }
}

/// TrueType font embedded as a Type0/CIDFontType2 font with Identity-H encoding
#[derive(Debug, Clone)]
pub struct FontData {
    /// Font identifier (also used as `/BaseFont`)
    pub name: String,
    ttf_data: Vec<u8>,
    used_chars: BTreeSet<char>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
}

impl FontData {
    /// Create font data from TTF bytes
    ///
    /// # Arguments
    /// * `name` - Font identifier
    /// * `ttf_data` - TrueType font file bytes
    pub fn from_ttf(name: &str, ttf_data: &[u8]) -> Result<Self> {
        let face = ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{name}: {e:?}")))?;

        Ok(Self {
            name: pdf_name(name),
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            ttf_data: ttf_data.to_vec(),
            used_chars: BTreeSet::new(),
        })
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.ttf_data, 0).ok()
    }

    /// Record characters shown with this font (drives `/W` and ToUnicode)
    pub fn add_chars(&mut self, text: &str) {
        self.used_chars.extend(text.chars());
    }

    pub fn used_chars(&self) -> &BTreeSet<char> {
        &self.used_chars
    }

    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.face()
            .and_then(|face| face.glyph_index(c).map(|id| id.0))
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).map(|id| id != 0).unwrap_or(false)
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Scale a font-unit value to 1000-unit glyph space
    fn to_glyph_space(&self, value: i32) -> i32 {
        let upm = self.units_per_em.max(1) as i32;
        value * 1000 / upm
    }

    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let Some(face) = self.face() else {
            return 0.0;
        };
        let units: u32 = text
            .chars()
            .filter_map(|c| face.glyph_index(c))
            .filter_map(|gid| face.glyph_hor_advance(gid))
            .map(|w| w as u32)
            .sum();
        units as f32 / self.units_per_em.max(1) as f32 * font_size
    }

    /// Encode text as a hex string of glyph IDs for the `Tj` operator
    pub fn encode_text_hex(&self, text: &str) -> String {
        let face = self.face();
        let mut result = String::with_capacity(text.len() * 4 + 2);
        result.push('<');
        for c in text.chars() {
            let gid = face
                .as_ref()
                .and_then(|f| f.glyph_index(c))
                .map(|g| g.0)
                .unwrap_or(0);
            result.push_str(&format!("{gid:04X}"));
        }
        result.push('>');
        result
    }

    /// `/W` array in the individual `gid [width]` form, widths in glyph space
    fn widths_array(&self) -> Vec<Object> {
        let Some(face) = self.face() else {
            return Vec::new();
        };

        let mut gids: Vec<u16> = self
            .used_chars
            .iter()
            .filter_map(|&c| face.glyph_index(c).map(|g| g.0))
            .collect();
        gids.sort_unstable();
        gids.dedup();

        let mut widths = Vec::with_capacity(gids.len() * 2);
        for gid in gids {
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(gid))
                .map(|w| self.to_glyph_space(w as i32))
                .unwrap_or(1000);
            widths.push(Object::Integer(gid as i64));
            widths.push(Object::Array(vec![Object::Integer(advance as i64)]));
        }
        widths
    }

    /// ToUnicode CMap mapping glyph IDs back to the characters they show
    fn tounicode_cmap(&self) -> String {
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );

        let mapped: Vec<(u16, char)> = self
            .used_chars
            .iter()
            .map(|&c| (self.glyph_id(c).unwrap_or(0), c))
            .collect();

        for chunk in mapped.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for (gid, c) in chunk {
                let mut units = [0u16; 2];
                let hex: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|u| format!("{u:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{hex}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        cmap
    }

    /// Add the font program and its dictionaries to `doc`, returning the Type0 font
    fn embed(&self, doc: &mut Document) -> ObjectId {
        let base_font = Object::Name(self.name.clone().into_bytes());

        let font_file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => self.ttf_data.len() as i64 },
            self.ttf_data.clone(),
        ));

        let ascent = self.to_glyph_space(self.ascender as i32) as i64;
        let descent = self.to_glyph_space(self.descender as i32) as i64;
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => 4,
            "FontBBox" => vec![0.into(), descent.into(), 1000.into(), ascent.into()],
            "ItalicAngle" => 0,
            "Ascent" => ascent,
            "Descent" => descent,
            "CapHeight" => ascent,
            "StemV" => 80,
            "FontFile2" => font_file_id,
        });

        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "CIDToGIDMap" => "Identity",
            "DW" => 1000,
            "W" => self.widths_array(),
        });

        let tounicode_id = doc.add_object(Stream::new(
            dictionary! {},
            self.tounicode_cmap().into_bytes(),
        ));

        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => tounicode_id,
        })
    }
}

/// Replace characters that are not allowed in a PDF name
fn pdf_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// A font registered with a document
#[derive(Debug, Clone)]
pub enum FontFace {
    Builtin(BuiltinFont),
    Embedded(FontData),
}

impl FontFace {
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        match self {
            FontFace::Builtin(font) => font.text_width_points(text, font_size),
            FontFace::Embedded(font) => font.text_width_points(text, font_size),
        }
    }

    /// Ascent above the baseline in points
    pub fn ascent_points(&self, font_size: f32) -> f32 {
        match self {
            FontFace::Builtin(_) => 0.718 * font_size,
            FontFace::Embedded(font) => {
                font.ascender as f32 / font.units_per_em.max(1) as f32 * font_size
            }
        }
    }

    /// Descent below the baseline in points (positive value)
    pub fn descent_points(&self, font_size: f32) -> f32 {
        match self {
            FontFace::Builtin(_) => 0.207 * font_size,
            FontFace::Embedded(font) => {
                -(font.descender as f32) / font.units_per_em.max(1) as f32 * font_size
            }
        }
    }

    pub fn has_glyph(&self, c: char) -> bool {
        match self {
            FontFace::Builtin(font) => font.has_glyph(c),
            FontFace::Embedded(font) => font.has_glyph(c),
        }
    }

    /// Encode text for a `Tj` operator and record its characters
    pub(crate) fn encode_and_track(&mut self, text: &str) -> String {
        match self {
            FontFace::Builtin(font) => font.encode_text(text),
            FontFace::Embedded(font) => {
                font.add_chars(text);
                font.encode_text_hex(text)
            }
        }
    }

    pub(crate) fn embed(&self, doc: &mut Document) -> ObjectId {
        match self {
            FontFace::Builtin(font) => font.embed(doc),
            FontFace::Embedded(font) => font.embed(doc),
        }
    }
}
