//! Phase correlation: normalized cross-power spectrum, its inverse, and
//! peak extraction on the resulting (circular) correlation matrix.

use ndarray::{ArrayD, Zip};
use num_complex::Complex;
use rayon::prelude::*;
use tracing::debug;

use crate::consts::{CROSS_POWER_EPSILON, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{Result, StitchError};
use crate::fft::{inverse_real, FrequencyRepresentation};

/// Integer location in the correlation matrix and its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Peak {
    pub position: Vec<usize>,
    pub value: f64,
}

impl Peak {
    /// Signed shift assuming the smaller of the two wrap-around readings:
    /// positions past the midpoint of an axis are taken as negative.
    pub fn unwrapped_shift(&self, extent: &[usize]) -> Vec<i64> {
        self.position
            .iter()
            .zip(extent)
            .map(|(&p, &n)| {
                if p > n / 2 {
                    p as i64 - n as i64
                } else {
                    p as i64
                }
            })
            .collect()
    }
}

/// Real-valued inverse of the normalized cross-power spectrum.
#[derive(Clone, Debug)]
pub struct CorrelationMatrix {
    data: ArrayD<f64>,
}

impl CorrelationMatrix {
    pub fn new(data: ArrayD<f64>) -> Self {
        Self { data }
    }

    pub fn extent(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn value(&self, position: &[usize]) -> f64 {
        self.data[position]
    }

    /// Value at `position` moved by `delta` along `axis`, wrapping around.
    pub fn value_wrapped(&self, position: &[usize], axis: usize, delta: isize) -> f64 {
        let mut idx = position.to_vec();
        idx[axis] = wrap(position[axis] as isize + delta, self.data.shape()[axis]);
        self.data[idx.as_slice()]
    }
}

/// `A · conj(B) / (|A · conj(B)| + ε)` for every bin. Consumes `a` and reuses
/// its storage.
pub fn cross_power_spectrum(
    a: FrequencyRepresentation,
    b: &FrequencyRepresentation,
    parallel: bool,
) -> Result<ArrayD<Complex<f64>>> {
    if a.extent() != b.extent() {
        return Err(StitchError::DimensionMismatch {
            left: a.extent().to_vec(),
            right: b.extent().to_vec(),
        });
    }

    let mut spectrum = a.into_inner();
    let normalize = |x: &mut Complex<f64>, y: &Complex<f64>| {
        let cross = *x * y.conj();
        *x = cross / (cross.norm() + CROSS_POWER_EPSILON);
    };
    let zip = Zip::from(&mut spectrum).and(b.spectrum());
    if parallel && b.spectrum().len() >= PARALLEL_PIXEL_THRESHOLD {
        zip.par_for_each(normalize);
    } else {
        zip.for_each(normalize);
    }
    Ok(spectrum)
}

/// Build the correlation matrix of two spectra of identical extent.
pub fn phase_correlation_matrix(
    a: FrequencyRepresentation,
    b: FrequencyRepresentation,
    parallel: bool,
) -> Result<CorrelationMatrix> {
    let cross = cross_power_spectrum(a, &b, parallel)?;
    drop(b);
    Ok(CorrelationMatrix::new(inverse_real(cross, parallel)))
}

/// Top `num_peaks` local maxima, by descending value with ties broken by the
/// lexicographically smallest position.
///
/// A cell is a local maximum when no cell within `radius` (per axis, wrapping
/// around the borders) is larger. Among equal neighbors only the one with the
/// smallest row-major index qualifies, so a plateau is reported once.
pub fn find_peaks(matrix: &CorrelationMatrix, num_peaks: usize, radius: usize) -> Vec<Peak> {
    let data = matrix.data();
    let extent = data.shape();
    let ndim = extent.len();
    let offsets = neighbor_offsets(ndim, radius as isize);
    let scratch = || (vec![0usize; ndim], vec![0usize; ndim]);

    let mut peaks: Vec<Peak> = if data.len() >= PARALLEL_PIXEL_THRESHOLD {
        (0..data.len())
            .into_par_iter()
            .map_init(scratch, |(position, neighbor), flat| {
                local_maximum(data, &offsets, flat, position, neighbor)
            })
            .flatten()
            .collect()
    } else {
        let (mut position, mut neighbor) = scratch();
        (0..data.len())
            .filter_map(|flat| local_maximum(data, &offsets, flat, &mut position, &mut neighbor))
            .collect()
    };

    peaks.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.position.cmp(&b.position))
    });
    peaks.truncate(num_peaks);

    debug!(count = peaks.len(), radius, ?peaks, "Phase correlation peaks");
    peaks
}

/// The cell at row-major index `flat` as a peak, if it is a local maximum.
/// `position` and `neighbor` are scratch buffers of length `ndim`.
fn local_maximum(
    data: &ArrayD<f64>,
    offsets: &[Vec<isize>],
    flat: usize,
    position: &mut [usize],
    neighbor: &mut [usize],
) -> Option<Peak> {
    let extent = data.shape();
    let mut rest = flat;
    for d in (0..extent.len()).rev() {
        position[d] = rest % extent[d];
        rest /= extent[d];
    }
    let value = data[&*position];

    for offset in offsets {
        for (d, (&p, &o)) in position.iter().zip(offset).enumerate() {
            neighbor[d] = wrap(p as isize + o, extent[d]);
        }
        let other = data[&*neighbor];
        if other > value || (other == value && flat_index(neighbor, extent) < flat) {
            return None;
        }
    }
    Some(Peak {
        position: position.to_vec(),
        value,
    })
}

/// All offsets in `[-radius, radius]^ndim` except the origin.
fn neighbor_offsets(ndim: usize, radius: isize) -> Vec<Vec<isize>> {
    let mut offsets: Vec<Vec<isize>> = vec![Vec::new()];
    for _ in 0..ndim {
        offsets = offsets
            .into_iter()
            .flat_map(|prefix| {
                (-radius..=radius).map(move |o| {
                    let mut next = prefix.clone();
                    next.push(o);
                    next
                })
            })
            .collect();
    }
    offsets.retain(|o| o.iter().any(|&v| v != 0));
    offsets
}

fn flat_index(position: &[usize], extent: &[usize]) -> usize {
    position
        .iter()
        .zip(extent)
        .fold(0, |acc, (&p, &n)| acc * n + p)
}

fn wrap(index: isize, len: usize) -> usize {
    index.rem_euclid(len as isize) as usize
}
