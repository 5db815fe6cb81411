//! Text rendering utilities

use crate::document::Color;
use crate::{fmt_num, Align};

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text width in points (for alignment)
    pub text_width: f64,
    /// Text color (RGB)
    pub color: Color,
}

/// Generate PDF operators for text insertion
///
/// # Arguments
/// * `encoded` - Encoded string operand, hex (`<0041>`) or literal (`(A)`)
/// * `x` - X coordinate in points (PDF coordinates, from left)
/// * `y` - Baseline Y coordinate in points (PDF coordinates, from bottom)
/// * `align` - Alignment relative to `x`
/// * `ctx` - Text rendering context
pub fn generate_text_operators(
    encoded: &str,
    x: f64,
    y: f64,
    align: Align,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let x_offset = match align {
        Align::Left => 0.0,
        Align::Center => -ctx.text_width / 2.0,
        Align::Right => -ctx.text_width,
    };

    format!(
        "BT\n{} {} {} rg\n/{} {} Tf\n{} {} Td\n{} Tj\nET\n",
        fmt_num(ctx.color.r as f64),
        fmt_num(ctx.color.g as f64),
        fmt_num(ctx.color.b as f64),
        ctx.font_name,
        fmt_num(ctx.font_size as f64),
        fmt_num(x + x_offset),
        fmt_num(y),
        encoded
    )
    .into_bytes()
}

/// Break one paragraph into lines no wider than `max_width`
///
/// Words are separated on whitespace; a single word wider than the line is split
/// between characters. `measure` returns the width of a string in the same unit
/// as `max_width`.
pub fn wrap_to_width<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    if max_width <= 0.0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measure(&candidate) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if measure(word) <= max_width {
            current = word.to_string();
            continue;
        }

        // Hard-break a word that cannot fit on any line
        for c in word.chars() {
            let mut next = current.clone();
            next.push(c);
            if !current.is_empty() && measure(&next) > max_width {
                lines.push(std::mem::take(&mut current));
                current.push(c);
            } else {
                current = next;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}
