use ndarray::{ArrayD, ArrayViewD, Slice};
use tracing::warn;

use crate::config::RoiPolicy;
use crate::error::{Result, StitchError};
use crate::tile::{Pixel, TilePixels, TileSource};

/// Working-precision samples of one image, row-major.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    data: ArrayD<f32>,
}

impl SampleBuffer {
    pub fn new(data: ArrayD<f32>) -> Result<Self> {
        if data.ndim() == 0 || data.shape().contains(&0) {
            return Err(StitchError::EmptyExtent(data.shape().to_vec()));
        }
        Ok(Self { data })
    }

    pub fn extent(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    pub fn into_inner(self) -> ArrayD<f32> {
        self.data
    }
}

/// Copy `view` (or the part of it inside `region`) into a float buffer.
pub fn sample_view<P: Pixel>(
    view: ArrayViewD<'_, P>,
    region: Option<&[(usize, usize)]>,
) -> Result<SampleBuffer> {
    let mut window = view;
    if let Some(ranges) = region {
        window.slice_each_axis_inplace(|ax| {
            let (start, end) = ranges[ax.axis.index()];
            Slice::from(start..end)
        });
    }
    SampleBuffer::new(window.mapv(P::to_f32))
}

/// Sample a tile according to its ROI and the configured policy.
///
/// Non-rectangular regions are ignored with a warning and the whole image
/// is sampled. Unsupported encodings fail with
/// [`StitchError::UnsupportedEncoding`].
pub fn sample_tile(tile: &dyn TileSource, policy: RoiPolicy) -> Result<SampleBuffer> {
    let region = |extent: &[usize]| match policy {
        RoiPolicy::UseRectangular => rectangular_region(tile, extent),
        RoiPolicy::Ignore => None,
    };

    match tile.pixels() {
        TilePixels::Float32(v) => {
            let r = region(v.shape());
            sample_view(v, r.as_deref())
        }
        TilePixels::UInt16(v) => {
            let r = region(v.shape());
            sample_view(v, r.as_deref())
        }
        TilePixels::UInt8(v) => {
            let r = region(v.shape());
            sample_view(v, r.as_deref())
        }
        TilePixels::Unsupported(encoding) => {
            warn!(title = tile.title(), %encoding, "Unknown image type");
            Err(StitchError::UnsupportedEncoding {
                title: tile.title().to_string(),
                encoding,
            })
        }
    }
}

/// Clipped ranges of the tile's ROI when it is a usable rectangle.
fn rectangular_region(tile: &dyn TileSource, extent: &[usize]) -> Option<Vec<(usize, usize)>> {
    let roi = tile.roi()?;
    if !roi.is_rectangular() {
        warn!(
            title = tile.title(),
            shape = %roi.shape,
            "ROI is not a rectangle, ignoring it"
        );
        return None;
    }
    let ranges = roi.bounds.clip_to(extent);
    if ranges.is_none() {
        warn!(title = tile.title(), "ROI lies outside the image, ignoring it");
    }
    ranges
}
