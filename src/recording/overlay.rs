//! Timestamp burn-in for recorded frames.
//!
//! Renders the capture time, millisecond precision included, into the
//! top-left corner of an RGB pixel buffer using a built-in 5x7 bitmap font.
//! White glyphs over a black backing box keep the text readable on noisy
//! footage. Rendering clips at the frame edges instead of panicking on
//! small frames.

use chrono::{DateTime, Utc};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
// Horizontal advance per glyph, in font pixels.
const ADVANCE: u32 = 6;
const SCALE: u32 = 2;
const MARGIN: u32 = 4;
const PADDING: u32 = 2;

/// 5x7 glyph bitmaps; each byte is one row, bit 4 is the leftmost column.
fn glyph(c: char) -> Option<[u8; GLYPH_HEIGHT as usize]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ' ' => [0x00; 7],
        _ => return None,
    };
    Some(rows)
}

fn set_pixel(rgb: &mut [u8], width: u32, height: u32, x: u32, y: u32, value: u8) {
    if x >= width || y >= height {
        return;
    }
    let idx = (y as usize * width as usize + x as usize) * 3;
    rgb[idx] = value;
    rgb[idx + 1] = value;
    rgb[idx + 2] = value;
}

/// Render `captured_at` into the top-left corner of an RGB buffer.
///
/// The buffer must be `width * height * 3` bytes; anything else is left
/// untouched.
pub fn burn_timestamp(rgb: &mut [u8], width: u32, height: u32, captured_at: DateTime<Utc>) {
    if rgb.len() != width as usize * height as usize * 3 {
        return;
    }

    let text = captured_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
    let text_width = text.chars().count() as u32 * ADVANCE * SCALE;
    let text_height = GLYPH_HEIGHT * SCALE;

    // Black backing box so white digits survive bright footage.
    let box_x0 = MARGIN.saturating_sub(PADDING);
    let box_y0 = MARGIN.saturating_sub(PADDING);
    let box_x1 = (MARGIN + text_width + PADDING).min(width);
    let box_y1 = (MARGIN + text_height + PADDING).min(height);
    for y in box_y0..box_y1 {
        for x in box_x0..box_x1 {
            set_pixel(rgb, width, height, x, y, 0);
        }
    }

    let mut pen_x = MARGIN;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    let base_x = pen_x + col * SCALE;
                    let base_y = MARGIN + row as u32 * SCALE;
                    for dy in 0..SCALE {
                        for dx in 0..SCALE {
                            set_pixel(rgb, width, height, base_x + dx, base_y + dy, 255);
                        }
                    }
                }
            }
        }
        pen_x += ADVANCE * SCALE;
    }
}
