//! Resolve the wrap-around ambiguity of correlation peaks.
//!
//! A peak at position `p` on an axis of length `n` may stand for a shift of
//! `p` or `p - n`. Every reading of every candidate peak is scored by the
//! Pearson correlation of the two images over their overlap, and the best
//! scoring reading wins.

use ndarray::{ArrayViewD, Slice, Zip};
use rayon::prelude::*;
use tracing::debug;

use crate::correlation::Peak;
use crate::sampler::SampleBuffer;

/// A peak reading confirmed on the image content.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedShift {
    /// Index into the candidate peak list.
    pub peak_index: usize,
    pub shift: Vec<i64>,
    pub cross_correlation: f64,
    /// Number of overlapping samples the score was computed on.
    pub overlap: usize,
}

/// All `2^N` wrap-around readings of `position` in a matrix of `extent`.
/// Axes where the position is 0 contribute a single reading.
pub fn shift_interpretations(position: &[usize], extent: &[usize]) -> Vec<Vec<i64>> {
    let mut readings: Vec<Vec<i64>> = vec![Vec::new()];
    for (&p, &n) in position.iter().zip(extent) {
        let mut choices = vec![p as i64];
        if p != 0 {
            choices.push(p as i64 - n as i64);
        }
        readings = readings
            .into_iter()
            .flat_map(|prefix| {
                choices.iter().map(move |&c| {
                    let mut next = prefix.clone();
                    next.push(c);
                    next
                })
            })
            .collect();
    }
    readings
}

/// Pearson correlation of `img1` and `img2` where `img2[x]` is compared with
/// `img1[x + shift]`. Returns the coefficient and the overlap size, or `None`
/// when the images do not overlap.
pub fn cross_correlation(
    img1: &SampleBuffer,
    img2: &SampleBuffer,
    shift: &[i64],
) -> Option<(f64, usize)> {
    let (ranges1, ranges2) = overlap_ranges(img1.extent(), img2.extent(), shift)?;
    let a = window(img1.view(), &ranges1);
    let b = window(img2.view(), &ranges2);
    let count = a.len();

    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / count as f64;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / count as f64;

    let (mut sab, mut saa, mut sbb) = (0.0f64, 0.0f64, 0.0f64);
    Zip::from(&a).and(&b).for_each(|&va, &vb| {
        let da = va as f64 - mean_a;
        let db = vb as f64 - mean_b;
        sab += da * db;
        saa += da * da;
        sbb += db * db;
    });

    let denom = (saa * sbb).sqrt();
    let r = if denom > 0.0 {
        sab / denom
    } else if saa == 0.0 && sbb == 0.0 && mean_a == mean_b {
        // Two equal constant windows.
        1.0
    } else {
        0.0
    };
    Some((r, count))
}

/// Pick the best-correlated reading across `peaks`.
///
/// Readings overlapping fewer than `min_overlap_fraction` of the smaller image
/// are skipped. Equal scores go to the higher phase-correlation value, then to
/// the earlier peak.
pub fn verify_peaks(
    img1: &SampleBuffer,
    img2: &SampleBuffer,
    peaks: &[Peak],
    extent: &[usize],
    min_overlap_fraction: f64,
) -> Option<VerifiedShift> {
    let smaller = img1.len().min(img2.len());
    let min_overlap = ((min_overlap_fraction * smaller as f64).ceil() as usize).max(1);

    let candidates: Vec<(usize, Vec<i64>)> = peaks
        .iter()
        .enumerate()
        .flat_map(|(i, peak)| {
            shift_interpretations(&peak.position, extent)
                .into_iter()
                .map(move |shift| (i, shift))
        })
        .collect();

    let scored: Vec<VerifiedShift> = candidates
        .into_par_iter()
        .filter_map(|(peak_index, shift)| {
            let (r, overlap) = cross_correlation(img1, img2, &shift)?;
            (overlap >= min_overlap).then_some(VerifiedShift {
                peak_index,
                shift,
                cross_correlation: r,
                overlap,
            })
        })
        .collect();

    let mut best: Option<VerifiedShift> = None;
    for candidate in scored {
        let better = best.as_ref().map_or(true, |b| {
            candidate
                .cross_correlation
                .total_cmp(&b.cross_correlation)
                .then_with(|| {
                    peaks[candidate.peak_index]
                        .value
                        .total_cmp(&peaks[b.peak_index].value)
                })
                .is_gt()
        });
        if better {
            best = Some(candidate);
        }
    }

    debug!(?best, "Peak verification");
    best
}

type Ranges = Vec<(usize, usize)>;

fn overlap_ranges(
    extent1: &[usize],
    extent2: &[usize],
    shift: &[i64],
) -> Option<(Ranges, Ranges)> {
    let mut r1 = Vec::with_capacity(shift.len());
    let mut r2 = Vec::with_capacity(shift.len());
    for ((&n1, &n2), &s) in extent1.iter().zip(extent2).zip(shift) {
        let start = s.max(0);
        let end = (n1 as i64).min(s + n2 as i64);
        if start >= end {
            return None;
        }
        r1.push((start as usize, end as usize));
        r2.push(((start - s) as usize, (end - s) as usize));
    }
    Some((r1, r2))
}

fn window<'a>(view: ArrayViewD<'a, f32>, ranges: &[(usize, usize)]) -> ArrayViewD<'a, f32> {
    let mut view = view;
    view.slice_each_axis_inplace(|ax| {
        let (start, end) = ranges[ax.axis.index()];
        Slice::from(start..end)
    });
    view
}
