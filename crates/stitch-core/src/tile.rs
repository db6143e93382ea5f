//! Source images handed to the registration core.
//!
//! A tile exposes its pixels as an N-dimensional view in one of the supported
//! encodings, plus an optional region of interest. The full extent is the
//! shape of the pixel view.

use std::fmt;

use image::DynamicImage;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use num_traits::AsPrimitive;

/// Numeric sample encodings the sampler can read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelEncoding {
    Float32,
    UInt16,
    UInt8,
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelEncoding::Float32 => write!(f, "32-bit float"),
            PixelEncoding::UInt16 => write!(f, "16-bit unsigned"),
            PixelEncoding::UInt8 => write!(f, "8-bit unsigned"),
        }
    }
}

/// A pixel type that can be read as a working-precision float.
pub trait Pixel: Copy + Send + Sync + AsPrimitive<f32> {
    const ENCODING: PixelEncoding;

    fn to_f32(self) -> f32 {
        self.as_()
    }
}

impl Pixel for f32 {
    const ENCODING: PixelEncoding = PixelEncoding::Float32;
}

impl Pixel for u16 {
    const ENCODING: PixelEncoding = PixelEncoding::UInt16;
}

impl Pixel for u8 {
    const ENCODING: PixelEncoding = PixelEncoding::UInt8;
}

/// Borrowed pixels of a tile.
#[derive(Clone, Debug)]
pub enum TilePixels<'a> {
    Float32(ArrayViewD<'a, f32>),
    UInt16(ArrayViewD<'a, u16>),
    UInt8(ArrayViewD<'a, u8>),
    /// Any other encoding, described for diagnostics.
    Unsupported(String),
}

impl TilePixels<'_> {
    pub fn encoding(&self) -> Option<PixelEncoding> {
        match self {
            TilePixels::Float32(_) => Some(PixelEncoding::Float32),
            TilePixels::UInt16(_) => Some(PixelEncoding::UInt16),
            TilePixels::UInt8(_) => Some(PixelEncoding::UInt8),
            TilePixels::Unsupported(_) => None,
        }
    }

    /// Full extent, or `None` when the encoding is unsupported.
    pub fn extent(&self) -> Option<&[usize]> {
        match self {
            TilePixels::Float32(v) => Some(v.shape()),
            TilePixels::UInt16(v) => Some(v.shape()),
            TilePixels::UInt8(v) => Some(v.shape()),
            TilePixels::Unsupported(_) => None,
        }
    }
}

/// Axis-aligned box in pixel coordinates, array axis order.
///
/// A rect with fewer axes than the image spans the full extent on the
/// remaining axes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    pub offset: Vec<usize>,
    pub size: Vec<usize>,
}

impl Rect {
    pub fn new(offset: Vec<usize>, size: Vec<usize>) -> Self {
        Self { offset, size }
    }

    /// 2D rect in row/column order.
    pub fn from_xywh(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self::new(vec![y, x], vec![height, width])
    }

    /// Per-axis `[start, end)` ranges of this rect clipped to `extent`.
    /// Returns `None` when the intersection is empty.
    pub fn clip_to(&self, extent: &[usize]) -> Option<Vec<(usize, usize)>> {
        let mut ranges = Vec::with_capacity(extent.len());
        for (axis, &len) in extent.iter().enumerate() {
            let (start, end) = match (self.offset.get(axis), self.size.get(axis)) {
                (Some(&off), Some(&size)) => (off.min(len), off.saturating_add(size).min(len)),
                _ => (0, len),
            };
            if start >= end {
                return None;
            }
            ranges.push((start, end));
        }
        Some(ranges)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoiShape {
    Rectangle,
    Oval,
    Polygon,
    Freehand,
    Line,
    Point,
}

impl fmt::Display for RoiShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoiShape::Rectangle => "rectangle",
            RoiShape::Oval => "oval",
            RoiShape::Polygon => "polygon",
            RoiShape::Freehand => "freehand",
            RoiShape::Line => "line",
            RoiShape::Point => "point",
        };
        f.write_str(name)
    }
}

/// Region of interest attached to a tile. Only the bounding box of a
/// rectangle is ever used for sampling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roi {
    pub shape: RoiShape,
    pub bounds: Rect,
}

impl Roi {
    pub fn rectangle(bounds: Rect) -> Self {
        Self {
            shape: RoiShape::Rectangle,
            bounds,
        }
    }

    pub fn is_rectangular(&self) -> bool {
        self.shape == RoiShape::Rectangle
    }
}

/// Provider of a sampleable image.
pub trait TileSource: Sync {
    /// Name used in diagnostics.
    fn title(&self) -> &str;

    fn pixels(&self) -> TilePixels<'_>;

    fn roi(&self) -> Option<&Roi> {
        None
    }
}

/// Owned pixel storage for [`Tile`].
#[derive(Clone, Debug)]
pub enum TileData {
    Float32(ArrayD<f32>),
    UInt16(ArrayD<u16>),
    UInt8(ArrayD<u8>),
    Unsupported(String),
}

impl From<ArrayD<f32>> for TileData {
    fn from(data: ArrayD<f32>) -> Self {
        TileData::Float32(data)
    }
}

impl From<ArrayD<u16>> for TileData {
    fn from(data: ArrayD<u16>) -> Self {
        TileData::UInt16(data)
    }
}

impl From<ArrayD<u8>> for TileData {
    fn from(data: ArrayD<u8>) -> Self {
        TileData::UInt8(data)
    }
}

/// An in-memory tile.
#[derive(Clone, Debug)]
pub struct Tile {
    pub title: String,
    pub data: TileData,
    pub roi: Option<Roi>,
}

impl Tile {
    pub fn new(title: impl Into<String>, data: impl Into<TileData>) -> Self {
        Self {
            title: title.into(),
            data: data.into(),
            roi: None,
        }
    }

    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = Some(roi);
        self
    }

    /// Wrap a decoded image. Grayscale 8- and 16-bit layouts map to their
    /// encodings; every other colour layout is kept as unsupported.
    pub fn from_dynamic_image(title: impl Into<String>, img: &DynamicImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let shape = IxDyn(&[h, w]);
        let data = match img {
            DynamicImage::ImageLuma8(buf) => ArrayD::from_shape_vec(shape, buf.as_raw().clone())
                .map(TileData::UInt8)
                .unwrap_or_else(|e| TileData::Unsupported(e.to_string())),
            DynamicImage::ImageLuma16(buf) => ArrayD::from_shape_vec(shape, buf.as_raw().clone())
                .map(TileData::UInt16)
                .unwrap_or_else(|e| TileData::Unsupported(e.to_string())),
            other => TileData::Unsupported(format!("{:?}", other.color())),
        };
        Self::new(title, data)
    }
}

impl TileSource for Tile {
    fn title(&self) -> &str {
        &self.title
    }

    fn pixels(&self) -> TilePixels<'_> {
        match &self.data {
            TileData::Float32(a) => TilePixels::Float32(a.view()),
            TileData::UInt16(a) => TilePixels::UInt16(a.view()),
            TileData::UInt8(a) => TilePixels::UInt8(a.view()),
            TileData::Unsupported(name) => TilePixels::Unsupported(name.clone()),
        }
    }

    fn roi(&self) -> Option<&Roi> {
        self.roi.as_ref()
    }
}
