//! Vector drawing operators (fills and rules)

use crate::document::Color;
use crate::fmt_num;

/// Generate operators that fill a rectangle
///
/// `x`/`y` are the lower-left corner in PDF coordinates (from bottom).
pub fn generate_rect_fill_operators(x: f64, y: f64, width: f64, height: f64, color: Color) -> Vec<u8> {
    format!(
        "q\n{} {} {} rg\n{} {} {} {} re\nf\nQ\n",
        fmt_num(color.r as f64),
        fmt_num(color.g as f64),
        fmt_num(color.b as f64),
        fmt_num(x),
        fmt_num(y),
        fmt_num(width),
        fmt_num(height)
    )
    .into_bytes()
}

/// Generate operators that stroke a straight line in PDF coordinates
pub fn generate_line_operators(
    from: (f64, f64),
    to: (f64, f64),
    line_width: f64,
    color: Color,
) -> Vec<u8> {
    format!(
        "q\n{} {} {} RG\n{} w\n0 J\n{} {} m\n{} {} l\nS\nQ\n",
        fmt_num(color.r as f64),
        fmt_num(color.g as f64),
        fmt_num(color.b as f64),
        fmt_num(line_width),
        fmt_num(from.0),
        fmt_num(from.1),
        fmt_num(to.0),
        fmt_num(to.1)
    )
    .into_bytes()
}
