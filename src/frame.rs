// SPDX-License-Identifier: GPL-3.0-only

//! Video frames exchanged with the pipeline
//!
//! A [`Frame`] is an immutable packed image: its data is exactly
//! `width * height * bytes_per_pixel(format)` bytes with no row padding.

use crate::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Packed pixel formats understood by the capture and injection endpoints
///
/// The string tags match the graph runtime's format names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 24-bit RGB (3 bytes per pixel)
    #[serde(rename = "RGB")]
    Rgb,
    /// 32-bit RGB with alpha
    #[serde(rename = "RGBA")]
    Rgba,
    /// 24-bit BGR
    #[serde(rename = "BGR")]
    Bgr,
    /// 32-bit BGR with alpha
    #[serde(rename = "BGRA")]
    Bgra,
    /// 32-bit RGB with an unused padding byte
    #[serde(rename = "RGBx")]
    Rgbx,
    /// 32-bit BGR with an unused padding byte
    #[serde(rename = "BGRx")]
    Bgrx,
    /// 8-bit grayscale
    #[serde(rename = "GRAY8")]
    Gray8,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 7] = [
        PixelFormat::Rgb,
        PixelFormat::Rgba,
        PixelFormat::Bgr,
        PixelFormat::Bgra,
        PixelFormat::Rgbx,
        PixelFormat::Bgrx,
        PixelFormat::Gray8,
    ];

    /// Runtime format name (e.g. "RGB")
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Rgb => "RGB",
            PixelFormat::Rgba => "RGBA",
            PixelFormat::Bgr => "BGR",
            PixelFormat::Bgra => "BGRA",
            PixelFormat::Rgbx => "RGBx",
            PixelFormat::Bgrx => "BGRx",
            PixelFormat::Gray8 => "GRAY8",
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Rgbx | PixelFormat::Bgrx => 4,
        }
    }

    /// Whether the fourth byte carries alpha (as opposed to padding)
    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelFormat::Rgba | PixelFormat::Bgra)
    }

    /// Size in bytes of a packed frame in this format
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }

    /// Read one pixel as `[r, g, b, a]`
    ///
    /// `px` must hold at least `bytes_per_pixel()` bytes.
    pub fn decode(&self, px: &[u8]) -> [u8; 4] {
        match self {
            PixelFormat::Rgb => [px[0], px[1], px[2], 255],
            PixelFormat::Bgr => [px[2], px[1], px[0], 255],
            PixelFormat::Rgba => [px[0], px[1], px[2], px[3]],
            PixelFormat::Bgra => [px[2], px[1], px[0], px[3]],
            PixelFormat::Rgbx => [px[0], px[1], px[2], 255],
            PixelFormat::Bgrx => [px[2], px[1], px[0], 255],
            PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
        }
    }

    /// Write one `[r, g, b, a]` pixel into `out`
    pub fn encode(&self, rgba: [u8; 4], out: &mut [u8]) {
        let [r, g, b, a] = rgba;
        match self {
            PixelFormat::Rgb => out[..3].copy_from_slice(&[r, g, b]),
            PixelFormat::Bgr => out[..3].copy_from_slice(&[b, g, r]),
            PixelFormat::Rgba => out[..4].copy_from_slice(&[r, g, b, a]),
            PixelFormat::Bgra => out[..4].copy_from_slice(&[b, g, r, a]),
            PixelFormat::Rgbx => out[..4].copy_from_slice(&[r, g, b, 255]),
            PixelFormat::Bgrx => out[..4].copy_from_slice(&[b, g, r, 255]),
            PixelFormat::Gray8 => {
                // BT.709 luma in integer arithmetic
                let luma = (2126 * r as u32 + 7152 * g as u32 + 722 * b as u32) / 10_000;
                out[0] = luma as u8;
            }
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(format) = PixelFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
        {
            return Ok(format);
        }
        match s.to_ascii_uppercase().as_str() {
            "GREY" | "Y8" => Ok(PixelFormat::Gray8),
            _ => Err(PipelineError::InvalidFrame(format!(
                "unsupported pixel format '{}'",
                s
            ))),
        }
    }
}

/// A single frame of video
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl Frame {
    /// Create a frame from packed pixel data
    ///
    /// Fails if `data` is not exactly `width * height * bpp` bytes.
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: impl Into<Arc<[u8]>>,
    ) -> PipelineResult<Self> {
        let data = data.into();
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "{} bytes for {}x{} {} (expected {})",
                data.len(),
                width,
                height,
                format,
                expected
            )));
        }

        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// Copy a frame out of a buffer whose rows may be padded to `stride` bytes
    pub fn from_strided(
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: usize,
        data: &[u8],
    ) -> PipelineResult<Self> {
        let row = width as usize * format.bytes_per_pixel();
        if stride < row {
            return Err(PipelineError::InvalidFrame(format!(
                "stride {} is smaller than a {}-byte row",
                stride, row
            )));
        }

        if stride == row {
            return Self::new(format, width, height, data.to_vec());
        }

        // The last row may omit its padding
        let rows = height as usize;
        let needed = if rows == 0 { 0 } else { stride * (rows - 1) + row };
        if data.len() < needed {
            return Err(PipelineError::InvalidFrame(format!(
                "{} bytes for {} rows of stride {}",
                data.len(),
                rows,
                stride
            )));
        }

        let mut packed = Vec::with_capacity(row * rows);
        for y in 0..rows {
            let start = y * stride;
            packed.extend_from_slice(&data[start..start + row]);
        }
        Self::new(format, width, height, packed)
    }

    /// A frame where every pixel has the given `[r, g, b, a]` value
    pub fn filled(format: PixelFormat, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let bpp = format.bytes_per_pixel();
        let mut data = vec![0u8; format.frame_size(width, height)];
        for px in data.chunks_exact_mut(bpp) {
            format.encode(rgba, px);
        }
        Self {
            format,
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions as `(width, height)`
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Arc<[u8]> {
        self.data
    }

    /// `[r, g, b, a]` at `(x, y)`, or None outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride() + x as usize * bpp;
        Some(self.format.decode(&self.data[offset..offset + bpp]))
    }

    /// Convert to another packed format
    pub fn convert(&self, target: PixelFormat) -> Frame {
        if target == self.format {
            return self.clone();
        }

        let src_bpp = self.format.bytes_per_pixel();
        let dst_bpp = target.bytes_per_pixel();
        let mut out = vec![0u8; target.frame_size(self.width, self.height)];
        for (src, dst) in self
            .data
            .chunks_exact(src_bpp)
            .zip(out.chunks_exact_mut(dst_bpp))
        {
            target.encode(self.format.decode(src), dst);
        }

        Frame {
            format: target,
            width: self.width,
            height: self.height,
            data: Arc::from(out.into_boxed_slice()),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame ({}, {}x{})", self.format, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_size() {
        let result = Frame::new(PixelFormat::Rgb, 4, 2, vec![0u8; 4 * 2 * 4]);
        assert!(matches!(result, Err(PipelineError::InvalidFrame(_))));
    }

    #[test]
    fn test_from_strided_strips_row_padding() {
        // 3x2 RGB rows are 9 bytes, padded to 12 as GStreamer does
        let mut data = vec![0u8; 12 * 2];
        data[..9].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        data[12..21].copy_from_slice(&[10, 11, 12, 13, 14, 15, 16, 17, 18]);
        data[9..12].copy_from_slice(&[99, 99, 99]);

        let frame = Frame::from_strided(PixelFormat::Rgb, 3, 2, 12, &data).unwrap();
        assert_eq!(frame.data().len(), 18);
        assert_eq!(frame.pixel(0, 1), Some([10, 11, 12, 255]));
        assert!(!frame.data().contains(&99));
    }

    #[test]
    fn test_convert_rgb_to_bgra() {
        let frame = Frame::filled(PixelFormat::Rgb, 2, 2, [10, 20, 30, 255]);
        let converted = frame.convert(PixelFormat::Bgra);
        assert_eq!(converted.data().len(), 16);
        assert_eq!(&converted.data()[..4], &[30, 20, 10, 255]);
        assert_eq!(converted.pixel(1, 1), Some([10, 20, 30, 255]));
    }

    #[test]
    fn test_format_parse_is_case_insensitive() {
        assert_eq!("rgbx".parse::<PixelFormat>().unwrap(), PixelFormat::Rgbx);
        assert_eq!("GREY".parse::<PixelFormat>().unwrap(), PixelFormat::Gray8);
        assert!("NV12".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_every_format_parses_from_its_name() {
        for format in PixelFormat::ALL {
            assert_eq!(format.as_str().parse::<PixelFormat>().unwrap(), format);
            if format.has_alpha() {
                assert_eq!(format.bytes_per_pixel(), 4);
            }
        }
        let with_alpha: Vec<_> = PixelFormat::ALL
            .into_iter()
            .filter(PixelFormat::has_alpha)
            .collect();
        assert_eq!(with_alpha, vec![PixelFormat::Rgba, PixelFormat::Bgra]);
    }

    #[test]
    fn test_into_data_keeps_bytes() {
        let frame = Frame::filled(PixelFormat::Gray8, 3, 1, [255, 255, 255, 255]);
        let expected = frame.data().to_vec();
        assert_eq!(&*frame.into_data(), expected.as_slice());
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::filled(PixelFormat::Rgb, 640, 480, [0, 0, 0, 255]);
        assert_eq!(frame.to_string(), "Frame (RGB, 640x480)");
    }
}
