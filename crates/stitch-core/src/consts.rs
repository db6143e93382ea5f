/// Minimum sample count to process FFT lanes with Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum pair count to distribute pairwise registrations over Rayon.
pub const PARALLEL_PAIR_THRESHOLD: usize = 2;

/// Added to the cross-power magnitude so exactly-zero bins stay finite.
pub const CROSS_POWER_EPSILON: f64 = 1e-12;

/// Curvature magnitude below which a quadratic fit counts as degenerate.
pub const DEGENERATE_CURVATURE: f64 = 1e-12;

/// Default number of correlation peaks to investigate.
pub const DEFAULT_NUM_PEAKS: usize = 5;

/// Default neighborhood radius for local-maximum detection.
pub const DEFAULT_PEAK_RADIUS: usize = 1;

/// Default minimum overlap (fraction of the smaller image) for a shift
/// interpretation to be considered during peak verification.
pub const DEFAULT_MIN_OVERLAP_FRACTION: f64 = 0.05;

/// Half-width of the integer cell; sub-pixel offsets beyond it leave the cell.
pub const CELL_HALF_WIDTH: f64 = 0.5;
