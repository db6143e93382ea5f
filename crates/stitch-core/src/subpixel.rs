use crate::config::SubpixelConfig;
use crate::consts::{CELL_HALF_WIDTH, DEGENERATE_CURVATURE};
use crate::correlation::{CorrelationMatrix, Peak};

/// Outcome of the quadratic fit on one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitStatus {
    Fitted,
    /// Zero curvature; the axis offset is reported as 0.
    Degenerate,
}

/// A peak with its fractional location.
#[derive(Clone, Debug, PartialEq)]
pub struct RefinedPeak {
    /// The integer peak the refinement started from.
    pub peak: Peak,
    /// Integer cell the final fit was centered on.
    pub position: Vec<usize>,
    /// Signed number of cells moved away from `peak.position`, per axis.
    pub moved: Vec<isize>,
    /// Fractional offset from `position`, per axis.
    pub offset: Vec<f64>,
    /// Model value at the refined location.
    pub value: f64,
    pub status: Vec<FitStatus>,
    pub moves: usize,
}

impl RefinedPeak {
    /// Fractional displacement from the starting integer peak.
    pub fn displacement(&self) -> Vec<f64> {
        self.moved
            .iter()
            .zip(&self.offset)
            .map(|(&m, &o)| m as f64 + o)
            .collect()
    }
}

/// Refine `peak` by fitting a parabola through it and its two neighbors on
/// each axis.
///
/// When an axis is allowed to move and its offset leaves the cell, the fit is
/// re-centered on the neighboring cell, at most `max_num_moves` times. Without
/// `can_move_outside` the final offsets are clamped to the cell.
pub fn refine_peak(
    matrix: &CorrelationMatrix,
    peak: &Peak,
    config: &SubpixelConfig,
) -> RefinedPeak {
    let ndim = peak.position.len();
    let extent = matrix.extent();
    let mut position = peak.position.clone();
    let mut moved = vec![0isize; ndim];
    let mut moves = 0;

    let (mut offset, mut gradient, mut status) = fit_quadratic(matrix, &position);
    while moves < config.max_num_moves {
        let mut stepped = false;
        for axis in 0..ndim {
            if config.may_move(axis) && offset[axis].abs() > CELL_HALF_WIDTH {
                let step = offset[axis].signum() as isize;
                position[axis] =
                    (position[axis] as isize + step).rem_euclid(extent[axis] as isize) as usize;
                moved[axis] += step;
                stepped = true;
            }
        }
        if !stepped {
            break;
        }
        moves += 1;
        (offset, gradient, status) = fit_quadratic(matrix, &position);
    }

    if !config.can_move_outside {
        for o in offset.iter_mut() {
            *o = o.clamp(-CELL_HALF_WIDTH, CELL_HALF_WIDTH);
        }
    }

    let value = matrix.value(&position)
        + 0.5
            * gradient
                .iter()
                .zip(&offset)
                .map(|(g, o)| g * o)
                .sum::<f64>();

    RefinedPeak {
        peak: peak.clone(),
        position,
        moved,
        offset,
        value,
        status,
        moves,
    }
}

/// Per-axis `(offset, gradient, status)` of a 1-D parabola through
/// `(p-1, p, p+1)`, neighbors wrapping around the matrix borders.
fn fit_quadratic(
    matrix: &CorrelationMatrix,
    position: &[usize],
) -> (Vec<f64>, Vec<f64>, Vec<FitStatus>) {
    let centre = matrix.value(position);
    let mut offset = Vec::with_capacity(position.len());
    let mut gradient = Vec::with_capacity(position.len());
    let mut status = Vec::with_capacity(position.len());

    for axis in 0..position.len() {
        let prev = matrix.value_wrapped(position, axis, -1);
        let next = matrix.value_wrapped(position, axis, 1);
        let g = 0.5 * (next - prev);
        let curvature = prev - 2.0 * centre + next;

        if curvature.abs() > DEGENERATE_CURVATURE {
            offset.push(-g / curvature);
            status.push(FitStatus::Fitted);
        } else {
            offset.push(0.0);
            status.push(FitStatus::Degenerate);
        }
        gradient.push(g);
    }

    (offset, gradient, status)
}
