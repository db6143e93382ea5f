//! Pairwise registration: sample, transform, correlate, pick a peak, refine.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::ArrayViewD;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::StitchingParameters;
use crate::consts::PARALLEL_PAIR_THRESHOLD;
use crate::correlation::{find_peaks, phase_correlation_matrix, Peak};
use crate::error::{Result, StitchError};
use crate::fft::forward_padded;
use crate::sampler::{sample_tile, sample_view, SampleBuffer};
use crate::subpixel::refine_peak;
use crate::tile::{Pixel, TileSource};
use crate::verify::verify_peaks;

/// Translation of the second image relative to the first.
///
/// `shift` follows array axis order and means `image2[x] ≈ image1[x + shift]`,
/// i.e. the origin of image 2 lies at `shift` in image 1's frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistrationResult {
    pub shift: Vec<f64>,
    /// Integer part of the shift, after wrap-around resolution.
    pub integer_shift: Vec<i64>,
    /// Sub-pixel correction added to `integer_shift`; all zero without refinement.
    pub offset: Vec<f64>,
    /// Correlation-matrix peak the shift was derived from.
    pub peak: Peak,
    pub phase_correlation: f64,
    /// Pearson correlation over the overlap, when peaks were verified.
    pub cross_correlation: Option<f64>,
    pub overlap: Option<usize>,
}

impl RegistrationResult {
    /// Cross-correlation when available, otherwise the phase-correlation peak.
    pub fn quality(&self) -> f64 {
        self.cross_correlation.unwrap_or(self.phase_correlation)
    }
}

/// Register two sample buffers of the same dimensionality.
///
/// Buffers of different extent are zero-padded to the per-axis maximum.
pub fn register_buffers(
    img1: &SampleBuffer,
    img2: &SampleBuffer,
    params: &StitchingParameters,
) -> Result<RegistrationResult> {
    params.validate()?;
    if img1.ndim() != img2.ndim() {
        return Err(StitchError::DimensionMismatch {
            left: img1.extent().to_vec(),
            right: img2.extent().to_vec(),
        });
    }

    let extent: Vec<usize> = img1
        .extent()
        .iter()
        .zip(img2.extent())
        .map(|(&a, &b)| a.max(b))
        .collect();

    let parallel = params.parallel_fft;
    let (fft1, fft2) = if parallel {
        rayon::join(
            || forward_padded(img1, &extent, true),
            || forward_padded(img2, &extent, true),
        )
    } else {
        (
            forward_padded(img1, &extent, false),
            forward_padded(img2, &extent, false),
        )
    };
    let matrix = phase_correlation_matrix(fft1?, fft2?, parallel)?;

    let peaks = find_peaks(&matrix, params.num_peaks, params.peak_radius);
    let matrix = if params.subpixel_accuracy {
        Some(matrix)
    } else {
        drop(matrix);
        None
    };

    let (peak, integer_shift, cross_correlation, overlap) = if params.verify_peaks {
        let best = verify_peaks(img1, img2, &peaks, &extent, params.min_overlap_fraction)
            .ok_or(StitchError::NoValidPeak)?;
        let peak = peaks[best.peak_index].clone();
        (
            peak,
            best.shift,
            Some(best.cross_correlation),
            Some(best.overlap),
        )
    } else {
        let peak = peaks.first().cloned().ok_or(StitchError::NoValidPeak)?;
        let shift = peak.unwrapped_shift(&extent);
        (peak, shift, None, None)
    };

    info!(
        shift = ?integer_shift,
        phase_correlation = peak.value,
        cross_correlation = ?cross_correlation,
        "Non sub-resolution shift"
    );

    let offset = match matrix {
        Some(matrix) => {
            let refined = refine_peak(&matrix, &peak, &params.subpixel);
            drop(matrix);
            refined.displacement()
        }
        None => vec![0.0; integer_shift.len()],
    };

    let shift: Vec<f64> = integer_shift
        .iter()
        .zip(&offset)
        .map(|(&s, &o)| s as f64 + o)
        .collect();

    if params.subpixel_accuracy {
        info!(
            ?shift,
            phase_correlation = peak.value,
            "Sub-pixel resolution shift"
        );
    }

    Ok(RegistrationResult {
        shift,
        integer_shift,
        offset,
        phase_correlation: peak.value,
        peak,
        cross_correlation,
        overlap,
    })
}

/// Shift between two raw images of any supported pixel kinds.
///
/// Runs with default parameters apart from `num_peaks` and
/// `subpixel_accuracy`.
pub fn compute_phase_correlation<T: Pixel, S: Pixel>(
    img1: ArrayViewD<'_, T>,
    img2: ArrayViewD<'_, S>,
    num_peaks: usize,
    subpixel_accuracy: bool,
) -> Result<Vec<f64>> {
    let params = StitchingParameters {
        num_peaks,
        subpixel_accuracy,
        ..StitchingParameters::default()
    };
    let a = sample_view(img1, None)?;
    let b = sample_view(img2, None)?;
    Ok(register_buffers(&a, &b, &params)?.shift)
}

/// Register two tiles, honoring their regions of interest.
///
/// A tile in an unsupported encoding yields
/// [`StitchError::UnsupportedEncoding`], which callers should treat as
/// "no registration edge" for this pair.
pub fn register_pair(
    tile1: &dyn TileSource,
    tile2: &dyn TileSource,
    params: &StitchingParameters,
) -> Result<RegistrationResult> {
    let img1 = sample_tile(tile1, params.roi_policy)?;
    let img2 = sample_tile(tile2, params.roi_policy)?;
    register_buffers(&img1, &img2, params)
}

/// Outcome of one pair in a batch.
#[derive(Debug)]
pub struct PairRegistration {
    pub first: usize,
    pub second: usize,
    pub outcome: Result<RegistrationResult>,
}

impl PairRegistration {
    pub fn result(&self) -> Option<&RegistrationResult> {
        self.outcome.as_ref().ok()
    }
}

/// Register every `(first, second)` pair of `tiles` independently.
///
/// A failing pair never aborts the batch; its error is kept in the returned
/// entry and logged. `on_pair_done` receives the number of finished pairs.
pub fn register_pairs<T, F>(
    tiles: &[T],
    pairs: &[(usize, usize)],
    params: &StitchingParameters,
    on_pair_done: F,
) -> Vec<PairRegistration>
where
    T: TileSource,
    F: Fn(usize) + Send + Sync,
{
    let counter = AtomicUsize::new(0);
    let run = |&(first, second): &(usize, usize)| {
        let outcome = match (tiles.get(first), tiles.get(second)) {
            (Some(a), Some(b)) => register_pair(a, b, params),
            _ => Err(StitchError::InvalidParameters(format!(
                "pair ({first}, {second}) out of range for {} tiles",
                tiles.len()
            ))),
        };
        if let Err(e) = &outcome {
            if e.is_recoverable() {
                warn!(first, second, error = %e, "Pair skipped");
            } else {
                error!(first, second, error = %e, "Pair failed");
            }
        }
        let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
        on_pair_done(done);
        PairRegistration {
            first,
            second,
            outcome,
        }
    };

    if pairs.len() >= PARALLEL_PAIR_THRESHOLD {
        pairs.par_iter().map(run).collect()
    } else {
        pairs.iter().map(run).collect()
    }
}
