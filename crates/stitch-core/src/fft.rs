//! Separable N-dimensional FFT over sample buffers.
//!
//! Each axis is transformed in turn with a 1-D complex FFT. The full complex
//! spectrum is kept so frequency bins index exactly like the samples.

use ndarray::{ArrayD, ArrayViewMut1, Axis, Slice, Zip};
use num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{Result, StitchError};
use crate::sampler::SampleBuffer;

/// Complex spectrum of a sample buffer, same extent as its source.
#[derive(Clone, Debug)]
pub struct FrequencyRepresentation {
    spectrum: ArrayD<Complex<f64>>,
}

impl FrequencyRepresentation {
    pub fn extent(&self) -> &[usize] {
        self.spectrum.shape()
    }

    pub fn spectrum(&self) -> &ArrayD<Complex<f64>> {
        &self.spectrum
    }

    pub fn into_inner(self) -> ArrayD<Complex<f64>> {
        self.spectrum
    }
}

/// Forward transform of `buffer` at its own extent.
pub fn forward(buffer: &SampleBuffer, parallel: bool) -> FrequencyRepresentation {
    let mut spectrum = buffer.data().mapv(|v| Complex::new(v as f64, 0.0));
    transform_axes(&mut spectrum, FftDirection::Forward, parallel);
    FrequencyRepresentation { spectrum }
}

/// Forward transform of `buffer` zero-padded at the high end to `extent`.
pub fn forward_padded(
    buffer: &SampleBuffer,
    extent: &[usize],
    parallel: bool,
) -> Result<FrequencyRepresentation> {
    let src = buffer.extent();
    if src.len() != extent.len() || src.iter().zip(extent).any(|(s, e)| s > e) {
        return Err(StitchError::DimensionMismatch {
            left: src.to_vec(),
            right: extent.to_vec(),
        });
    }
    if src == extent {
        return Ok(forward(buffer, parallel));
    }

    let mut spectrum = ArrayD::<Complex<f64>>::zeros(extent);
    spectrum
        .slice_each_axis_mut(|ax| Slice::from(0..src[ax.axis.index()]))
        .zip_mut_with(buffer.data(), |d, &s| *d = Complex::new(s as f64, 0.0));
    transform_axes(&mut spectrum, FftDirection::Forward, parallel);
    Ok(FrequencyRepresentation { spectrum })
}

/// Inverse transform returning the real part normalized by `1/len`.
pub fn inverse_real(spectrum: ArrayD<Complex<f64>>, parallel: bool) -> ArrayD<f64> {
    let mut work = spectrum;
    transform_axes(&mut work, FftDirection::Inverse, parallel);
    let scale = 1.0 / work.len() as f64;
    work.mapv(|c| c.re * scale)
}

/// Inverse of [`forward`], back to working precision.
pub fn inverse(freq: FrequencyRepresentation, parallel: bool) -> Result<SampleBuffer> {
    let real = inverse_real(freq.spectrum, parallel);
    SampleBuffer::new(real.mapv(|v| v as f32))
}

fn transform_axes(data: &mut ArrayD<Complex<f64>>, direction: FftDirection, parallel: bool) {
    let mut planner = FftPlanner::new();
    let parallel = parallel && data.len() >= PARALLEL_PIXEL_THRESHOLD;

    for axis in 0..data.ndim() {
        let len = data.len_of(Axis(axis));
        if len < 2 {
            continue;
        }
        let fft = planner.plan_fft(len, direction);
        if parallel {
            Zip::from(data.lanes_mut(Axis(axis)))
                .par_for_each(|lane| process_lane(&*fft, lane));
        } else {
            for lane in data.lanes_mut(Axis(axis)) {
                process_lane(&*fft, lane);
            }
        }
    }
}

fn process_lane(fft: &dyn Fft<f64>, mut lane: ArrayViewMut1<'_, Complex<f64>>) {
    if let Some(slice) = lane.as_slice_mut() {
        fft.process(slice);
        return;
    }
    let mut buf = lane.to_vec();
    fft.process(&mut buf);
    for (dst, src) in lane.iter_mut().zip(buf) {
        *dst = src;
    }
}
