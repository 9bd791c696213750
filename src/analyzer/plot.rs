//! Chart rendering for intensity histograms.
//!
//! Draws straight into a single-channel byte canvas: white background, black
//! axis lines and polyline, gray dashed gridlines, and a small built-in 5x7
//! glyph set for the axis labels and tick digits.

use super::Histogram;
use crate::buffer::PixelBuffer;
use crate::shared::constants;

const INK: u8 = 0;
const GRID: u8 = 180;
const PAPER: u8 = 255;

const MARGIN_LEFT: u32 = 42;
const MARGIN_RIGHT: u32 = 12;
const MARGIN_TOP: u32 = 12;
const MARGIN_BOTTOM: u32 = 34;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![PAPER; (width * height) as usize],
        }
    }

    fn put(&mut self, x: i64, y: i64, value: u8) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            self.data[(y as u32 * self.width + x as u32) as usize] = value;
        }
    }

    fn vline(&mut self, x: i64, y0: i64, y1: i64, value: u8, dashed: bool) {
        let (lo, hi) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in lo..=hi {
            if !dashed || (y - lo) % 6 < 3 {
                self.put(x, y, value);
            }
        }
    }

    fn hline(&mut self, y: i64, x0: i64, x1: i64, value: u8, dashed: bool) {
        let (lo, hi) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        for x in lo..=hi {
            if !dashed || (x - lo) % 6 < 3 {
                self.put(x, y, value);
            }
        }
    }

    fn text(&mut self, text: &str, x: i64, y: i64) {
        let mut cx = x;
        for ch in text.chars() {
            self.glyph(ch, cx, y);
            cx += GLYPH_W as i64 + 1;
        }
    }

    /// Letters stacked top-to-bottom for the vertical y-axis label.
    fn text_vertical(&mut self, text: &str, x: i64, y: i64) {
        let mut cy = y;
        for ch in text.chars() {
            self.glyph(ch, x, cy);
            cy += GLYPH_H as i64 + 1;
        }
    }

    fn glyph(&mut self, ch: char, x: i64, y: i64) {
        let rows = glyph_rows(ch);
        for (dy, row) in rows.iter().enumerate() {
            for dx in 0..GLYPH_W {
                if row & (1 << (GLYPH_W - 1 - dx)) != 0 {
                    self.put(x + dx as i64, y + dy as i64, INK);
                }
            }
        }
    }
}

fn text_width(text: &str) -> i64 {
    text.chars().count() as i64 * (GLYPH_W as i64 + 1) - 1
}

pub fn render_chart(hist: &Histogram, width: u32, height: u32) -> PixelBuffer {
    let mut canvas = Canvas::new(width, height);

    let x0 = MARGIN_LEFT as i64;
    let x1 = (width - MARGIN_RIGHT) as i64 - 1;
    let y0 = MARGIN_TOP as i64;
    let y1 = (height - MARGIN_BOTTOM) as i64 - 1;
    let plot_w = (x1 - x0) as f64;
    let plot_h = (y1 - y0) as f64;

    // Fixed x-range 0..=256, quarter gridlines both ways.
    for step in 0..=4 {
        let bin = step * 64;
        let gx = x0 + ((bin as f64 / 256.0) * plot_w).round() as i64;
        canvas.vline(gx, y0, y1, GRID, true);

        let gy = y1 - ((step as f64 / 4.0) * plot_h).round() as i64;
        canvas.hline(gy, x0, x1, GRID, true);
    }

    // Axes.
    canvas.hline(y1, x0, x1, INK, false);
    canvas.vline(x0, y0, y1, INK, false);

    // Frequency polyline, normalized against the tallest bin.
    let max = hist.max_count();
    if max > 0 {
        let mut prev: Option<(i64, i64)> = None;
        for (bin, &count) in hist.counts().iter().enumerate() {
            let px = x0 + ((bin as f64 / 256.0) * plot_w).round() as i64;
            let py = y1 - ((count as f64 / max as f64) * plot_h).round() as i64;
            if let Some((_, py_prev)) = prev {
                // Bins are one x-step apart; a vertical fill joins the points.
                canvas.vline(px, py_prev, py, INK, false);
            } else {
                canvas.put(px, py, INK);
            }
            prev = Some((px, py));
        }
    }

    // X tick digits at the quarter marks.
    for step in 0..=4 {
        let bin = step * 64;
        let label = format!("{}", bin);
        let gx = x0 + ((bin as f64 / 256.0) * plot_w).round() as i64;
        canvas.text(&label, gx - text_width(&label) / 2, y1 + 4);
    }

    // Axis titles.
    let x_title = "PIXEL VALUE";
    canvas.text(
        x_title,
        x0 + ((plot_w as i64) - text_width(x_title)) / 2,
        y1 + 6 + GLYPH_H as i64 + 4,
    );
    let y_title = "FREQUENCY";
    let y_title_h = y_title.chars().count() as i64 * (GLYPH_H as i64 + 1) - 1;
    canvas.text_vertical(y_title, 4, y0 + ((plot_h as i64) - y_title_h) / 2);

    PixelBuffer::from_packed(width, height, 1, canvas.data)
        .expect("canvas dimensions are internally consistent")
}

/// 5x7 bitmap rows for the characters the chart needs (digits plus the axis
/// title letters). Unknown characters render as blanks.
fn glyph_rows(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        _ => [0; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_put_ignores_out_of_bounds() {
        let mut canvas = Canvas::new(4, 4);
        canvas.put(-1, 0, INK);
        canvas.put(0, 99, INK);
        assert!(canvas.data.iter().all(|&v| v == PAPER));
    }

    #[test]
    fn test_glyphs_exist_for_axis_titles() {
        for ch in "PIXEL VALUE FREQUENCY 0123456789".chars() {
            if ch != ' ' {
                assert_ne!(glyph_rows(ch), [0u8; 7], "missing glyph for {:?}", ch);
            }
        }
    }
}
