//! Minimal raster plotting surface.
//!
//! Only what the result plots need: a framed plot area with fixed data ranges,
//! a light grid, axis-aligned reference lines, square markers, and axis
//! labels with end-of-range tick values drawn with a built-in 3x5 bitmap font.
//! Points outside the data ranges are clipped, as with fixed axis limits in
//! any plotting package.
//!
//! The font has upper-case letters only; lower-case text is drawn in capitals
//! apart from `u`, which stands in for the micro sign.

use image::{Rgba, RgbaImage};

/// Background colour.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Frame, labels and event markers.
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Grid lines.
pub const GRID: Rgba<u8> = Rgba([220, 220, 220, 255]);
/// Threshold reference lines.
pub const RED: Rgba<u8> = Rgba([214, 39, 40, 255]);
/// Trace markers.
pub const BLUE: Rgba<u8> = Rgba([31, 119, 180, 255]);

const GRID_DIVISIONS: i64 = 5;
// Widest tick label the left margin is sized for, e.g. "-100.00".
const TICK_CHARS: i64 = 7;

/// An image with a plot area mapped to fixed data ranges.
pub struct Canvas {
    image: RgbaImage,
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    x_range: [f64; 2],
    y_range: [f64; 2],
    scale: i64,
}

impl Canvas {
    /// Blank canvas of `width` x `height` pixels showing the given data ranges.
    ///
    /// Margins are reserved for a title line above the plot area, tick values
    /// and an axis label below it, and tick values to its left.
    pub fn new(width: u32, height: u32, x_range: [f64; 2], y_range: [f64; 2]) -> Self {
        let (w, h) = (i64::from(width), i64::from(height));
        let scale = if height >= 240 { 2 } else { 1 };
        let (char_w, line_h) = (4 * scale, 6 * scale);
        let mut canvas = Self {
            image: RgbaImage::from_pixel(width, height, WHITE),
            left: TICK_CHARS * char_w + 2 * scale,
            top: line_h + 3 * scale,
            right: w - 1 - 2 * char_w,
            bottom: h - 1 - (2 * line_h + 3 * scale),
            x_range,
            y_range,
            scale,
        };
        canvas.draw_grid();
        canvas.draw_frame();
        canvas
    }

    /// Pixel position of a data point, or `None` when it falls outside the ranges.
    pub fn to_pixel(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let fx = (x - self.x_range[0]) / (self.x_range[1] - self.x_range[0]);
        let fy = (y - self.y_range[0]) / (self.y_range[1] - self.y_range[0]);
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        let px = self.left + (fx * (self.right - self.left) as f64).round() as i64;
        let py = self.bottom - (fy * (self.bottom - self.top) as f64).round() as i64;
        Some((px, py))
    }

    /// Vertical reference line at data `x`.
    pub fn vline(&mut self, x: f64, color: Rgba<u8>) {
        if let Some((px, _)) = self.to_pixel(x, self.y_range[0]) {
            for py in self.top..=self.bottom {
                self.put(px, py, color);
            }
        }
    }

    /// Horizontal reference line at data `y`.
    pub fn hline(&mut self, y: f64, color: Rgba<u8>) {
        if let Some((_, py)) = self.to_pixel(self.x_range[0], y) {
            for px in self.left..=self.right {
                self.put(px, py, color);
            }
        }
    }

    /// Square marker centred on a data point. Returns whether it was visible.
    pub fn marker(&mut self, x: f64, y: f64, color: Rgba<u8>) -> bool {
        match self.to_pixel(x, y) {
            Some((px, py)) => {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        self.put(px + dx, py + dy, color);
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Plot area as `[left, top, right, bottom]` pixel coordinates, frame included.
    pub fn plot_area(&self) -> [i64; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    /// Draw `text` in the top margin, right aligned with the plot area.
    pub fn title(&mut self, text: &str) {
        let x = self.right - self.text_width(text) + 1;
        self.text(x, self.scale, text, BLACK);
    }

    /// Label both axes and write the range ends next to them.
    ///
    /// The X label is centred under the plot area, below the X tick values.
    /// The Y label sits in the top-left corner above the Y axis.
    pub fn axis_labels(&mut self, x_label: &str, y_label: &str) {
        let line_h = 6 * self.scale;
        let gap = 2 * self.scale;
        let [x_lo, x_hi] = self.x_range;
        let [y_lo, y_hi] = self.y_range;

        let tick_y = self.bottom + gap;
        self.text(self.left, tick_y, &tick_label(x_lo, x_hi - x_lo), BLACK);
        let hi = tick_label(x_hi, x_hi - x_lo);
        self.text(self.right - self.text_width(&hi) + 1, tick_y, &hi, BLACK);

        let hi = tick_label(y_hi, y_hi - y_lo);
        self.text(self.left - gap - self.text_width(&hi), self.top, &hi, BLACK);
        let lo = tick_label(y_lo, y_hi - y_lo);
        let lo_y = self.bottom - 5 * self.scale + 1;
        self.text(self.left - gap - self.text_width(&lo), lo_y, &lo, BLACK);

        let centre = (self.left + self.right) / 2;
        self.text(centre - self.text_width(x_label) / 2, tick_y + line_h, x_label, BLACK);
        self.text(0, self.scale, y_label, BLACK);
    }

    /// Width in pixels of `text` drawn at this canvas's scale.
    pub fn text_width(&self, text: &str) -> i64 {
        let n = text.chars().count() as i64;
        if n == 0 {
            0
        } else {
            (4 * n - 1) * self.scale
        }
    }

    /// Draw `text` with its top-left corner at pixel `(x, y)`.
    pub fn text(&mut self, x: i64, y: i64, text: &str, color: Rgba<u8>) {
        let scale = self.scale;
        let mut cursor = x;
        for ch in text.chars() {
            for (row, bits) in glyph(ch).iter().enumerate() {
                for col in 0..3i64 {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            self.put(cursor + col * scale + sx, y + row as i64 * scale + sy, color);
                        }
                    }
                }
            }
            cursor += 4 * scale;
        }
    }

    /// Colour of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Finished image.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn draw_grid(&mut self) {
        for k in 1..GRID_DIVISIONS {
            let px = self.left + (self.right - self.left) * k / GRID_DIVISIONS;
            let py = self.top + (self.bottom - self.top) * k / GRID_DIVISIONS;
            for y in self.top..=self.bottom {
                self.put(px, y, GRID);
            }
            for x in self.left..=self.right {
                self.put(x, py, GRID);
            }
        }
    }

    fn draw_frame(&mut self) {
        for x in self.left..=self.right {
            self.put(x, self.top, BLACK);
            self.put(x, self.bottom, BLACK);
        }
        for y in self.top..=self.bottom {
            self.put(self.left, y, BLACK);
            self.put(self.right, y, BLACK);
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x >= 0 && y >= 0 && x < i64::from(self.image.width()) && y < i64::from(self.image.height()) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Data range covering `values` with 5% padding; `[0, 1]` when empty.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return [0.0, 1.0];
    }
    if lo == hi {
        let half = if lo == 0.0 { 1.0 } else { lo.abs() * 0.05 };
        return [lo - half, hi + half];
    }
    let pad = (hi - lo) * 0.05;
    [lo - pad, hi + pad]
}

/// Tick text for `value` on an axis spanning `span`, with fewer decimals on wider axes.
pub fn tick_label(value: f64, span: f64) -> String {
    let span = span.abs();
    let decimals = if span >= 100.0 {
        0
    } else if span >= 10.0 {
        1
    } else if span >= 1.0 {
        2
    } else {
        3
    };
    format!("{:.*}", decimals, value)
}

// 3x5 glyphs, one row per entry, most significant of the three bits on the left.
fn glyph(ch: char) -> [u8; 5] {
    if ch == 'u' {
        return [0b000, 0b101, 0b101, 0b111, 0b100];
    }
    match ch.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        _ => [0; 5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_of_range_map_to_plot_area() {
        let canvas = Canvas::new(120, 120, [-10.0, 10.0], [0.0, 100.0]);
        let (l, b) = canvas.to_pixel(-10.0, 0.0).unwrap();
        let (r, t) = canvas.to_pixel(10.0, 100.0).unwrap();
        assert!(l < r);
        assert!(t < b);
        assert!(canvas.to_pixel(10.5, 50.0).is_none());
        assert!(canvas.to_pixel(0.0, f64::NAN).is_none());
    }

    #[test]
    fn markers_are_clipped_to_range() {
        let mut canvas = Canvas::new(100, 100, [0.0, 1.0], [0.0, 1.0]);
        assert!(canvas.marker(0.5, 0.5, BLUE));
        assert!(!canvas.marker(2.0, 0.5, BLUE));
        let (px, py) = canvas.to_pixel(0.5, 0.5).unwrap();
        assert_eq!(canvas.pixel(px as u32, py as u32), BLUE);
    }

    #[test]
    fn reference_lines_span_plot_area() {
        let mut canvas = Canvas::new(100, 100, [0.0, 10.0], [0.0, 10.0]);
        canvas.vline(2.0, RED);
        canvas.hline(7.0, RED);
        let (vx, _) = canvas.to_pixel(2.0, 0.0).unwrap();
        let (_, hy) = canvas.to_pixel(0.0, 7.0).unwrap();
        let (_, mid_y) = canvas.to_pixel(0.0, 5.0).unwrap();
        let (mid_x, _) = canvas.to_pixel(5.0, 0.0).unwrap();
        assert_eq!(canvas.pixel(vx as u32, mid_y as u32), RED);
        assert_eq!(canvas.pixel(mid_x as u32, hy as u32), RED);
    }

    #[test]
    fn padded_range_handles_degenerate_input() {
        assert_eq!(padded_range(Vec::new()), [0.0, 1.0]);
        assert_eq!(padded_range([0.0]), [-1.0, 1.0]);
        let [lo, hi] = padded_range([0.0, 10.0, f64::NAN]);
        assert!((lo + 0.5).abs() < 1e-12);
        assert!((hi - 10.5).abs() < 1e-12);
    }

    #[test]
    fn text_marks_pixels() {
        let mut canvas = Canvas::new(64, 64, [0.0, 1.0], [0.0, 1.0]);
        canvas.text(0, 0, "1", BLACK);
        // Top row of '1' is the middle column only.
        assert_eq!(canvas.pixel(1, 0), BLACK);
        assert_eq!(canvas.pixel(0, 0), WHITE);
    }

    #[test]
    fn glyph_scale_follows_image_height() {
        let small = Canvas::new(200, 150, [0.0, 1.0], [0.0, 1.0]);
        let large = Canvas::new(640, 480, [0.0, 1.0], [0.0, 1.0]);
        assert_eq!(small.text_width("10"), 7);
        assert_eq!(large.text_width("10"), 14);
        assert_eq!(large.text_width(""), 0);
    }

    #[test]
    fn every_label_character_has_a_glyph() {
        for ch in "Time (sec) Current (uA) Voltage (V) 0.5 seconds -1+2/3:".chars() {
            if ch != ' ' {
                assert_ne!(glyph(ch), [0; 5], "no glyph for {:?}", ch);
            }
        }
    }

    #[test]
    fn tick_precision_follows_span() {
        assert_eq!(tick_label(-105.0, 355.0), "-105");
        assert_eq!(tick_label(12.345, 20.0), "12.3");
        assert_eq!(tick_label(1.3333, 2.0), "1.33");
        assert_eq!(tick_label(1.3333, 0.14), "1.333");
    }

    fn ink_in(canvas: &Canvas, xs: std::ops::Range<i64>, ys: std::ops::Range<i64>) -> usize {
        let mut count = 0;
        for y in ys {
            for x in xs.clone() {
                if canvas.pixel(x as u32, y as u32) == BLACK {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn axis_labels_write_into_margins() {
        let mut canvas = Canvas::new(320, 240, [0.0, 2.0], [-100.0, 250.0]);
        let [left, top, right, bottom] = canvas.plot_area();
        let below = bottom + 1..240;
        let beside = 0..left;

        assert_eq!(ink_in(&canvas, left..right + 1, below.clone()), 0);
        assert_eq!(ink_in(&canvas, beside.clone(), top..bottom + 1), 0);

        canvas.axis_labels("Time (sec)", "Current (uA)");
        assert!(ink_in(&canvas, left..right + 1, below) > 0);
        assert!(ink_in(&canvas, beside.clone(), top..bottom + 1) > 0);
        assert!(ink_in(&canvas, beside, 0..top) > 0);
    }
}
