// SPDX-License-Identifier: GPL-3.0-only

//! Drawing surfaces for overlays

use super::Color;
use super::font;
use crate::frame::PixelFormat;

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the interiors of two rectangles intersect
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Measured size of a run of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

/// The surface an overlay draws on during one draw pass
///
/// Implemented by [`PixelCanvas`] for frame buffers; tests can implement
/// it to record draw calls.
pub trait DrawContext {
    /// Current surface size in pixels
    fn surface_size(&self) -> (u32, u32);

    /// Stroke the outline of `rect`, centred on its edges
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);

    /// Fill `rect`, blending with `alpha` in `[0, 1]`
    fn fill_rect(&mut self, rect: Rect, color: Color, alpha: f64);

    /// Size `text` would occupy at `size` pixels per line
    fn text_extent(&self, text: &str, size: f64) -> TextExtent;

    /// Draw one line of text with its top-left corner at `(x, y)`
    fn draw_text(&mut self, x: f64, y: f64, text: &str, size: f64, color: Color);
}

/// Text extent for the built-in bitmap font
pub fn bitmap_text_extent(text: &str, size: f64) -> TextExtent {
    let scale = font::scale_for(size) as f64;
    let chars = text.chars().count() as f64;
    let width = if chars > 0.0 {
        (chars * font::ADVANCE as f64 - (font::ADVANCE - font::GLYPH_WIDTH) as f64) * scale
    } else {
        0.0
    };
    TextExtent {
        width,
        height: font::GLYPH_HEIGHT as f64 * scale,
    }
}

/// Software rasteriser over a packed frame buffer
///
/// Handles every [`PixelFormat`]; alpha-carrying formats keep their alpha
/// channel untouched except where a fill is opaque.
pub struct PixelCanvas<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> PixelCanvas<'a> {
    /// Wrap a buffer of `height` rows of `stride` bytes
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Self {
        // Never index past the buffer even if the caller's stride is off
        let rows_available = if stride == 0 { 0 } else { data.len() / stride };
        let height = height.min(rows_available as u32);
        let width = width.min((stride / format.bytes_per_pixel()) as u32);
        Self {
            data,
            width,
            height,
            stride,
            format,
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Clip `rect` to the surface as pixel bounds `(x0, y0, x1, y1)`
    fn clip(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x.round().max(0.0);
        let y0 = rect.y.round().max(0.0);
        let x1 = rect.right().round().min(self.width as f64);
        let y1 = rect.bottom().round().min(self.height as f64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn blend_span(&mut self, x0: u32, x1: u32, y: u32, rgb: [u8; 3], alpha: f64) {
        let bpp = self.format.bytes_per_pixel();
        let row = y as usize * self.stride;
        for x in x0..x1 {
            let offset = row + x as usize * bpp;
            let px = &mut self.data[offset..offset + bpp];
            let [r, g, b, a] = self.format.decode(px);
            let mix = |dst: u8, src: u8| -> u8 {
                (src as f64 * alpha + dst as f64 * (1.0 - alpha)).round() as u8
            };
            let out_alpha = if alpha >= 1.0 { 255 } else { a };
            self.format
                .encode([mix(r, rgb[0]), mix(g, rgb[1]), mix(b, rgb[2]), out_alpha], px);
        }
    }

    fn fill_block(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, rgb: [u8; 3], alpha: f64) {
        for y in y0..y1 {
            self.blend_span(x0, x1, y, rgb, alpha);
        }
    }
}

impl DrawContext for PixelCanvas<'_> {
    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        let half = line_width / 2.0;
        let outer = Rect::new(
            rect.x - half,
            rect.y - half,
            rect.width + line_width,
            rect.height + line_width,
        );
        // Four bands that do not overlap, so each pixel is painted once
        let bands = [
            Rect::new(outer.x, outer.y, outer.width, line_width),
            Rect::new(outer.x, outer.bottom() - line_width, outer.width, line_width),
            Rect::new(
                outer.x,
                outer.y + line_width,
                line_width,
                outer.height - 2.0 * line_width,
            ),
            Rect::new(
                outer.right() - line_width,
                outer.y + line_width,
                line_width,
                outer.height - 2.0 * line_width,
            ),
        ];
        for band in bands {
            self.fill_rect(band, color, 1.0);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        if let Some((x0, y0, x1, y1)) = self.clip(rect) {
            self.fill_block(x0, y0, x1, y1, color.to_rgb8(), alpha);
        }
    }

    fn text_extent(&self, text: &str, size: f64) -> TextExtent {
        bitmap_text_extent(text, size)
    }

    fn draw_text(&mut self, x: f64, y: f64, text: &str, size: f64, color: Color) {
        let scale = font::scale_for(size) as f64;
        let rgb = color.to_rgb8();
        let mut origin_x = x;

        for ch in text.chars() {
            let rows = font::glyph(ch);
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..font::GLYPH_WIDTH {
                    if bits & (1 << (font::GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    let cell = Rect::new(
                        origin_x + col as f64 * scale,
                        y + row as f64 * scale,
                        scale,
                        scale,
                    );
                    if let Some((x0, y0, x1, y1)) = self.clip(cell) {
                        self.fill_block(x0, y0, x1, y1, rgb, 1.0);
                    }
                }
            }
            origin_x += font::ADVANCE as f64 * scale;
        }
    }
}
