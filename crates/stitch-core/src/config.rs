use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MIN_OVERLAP_FRACTION, DEFAULT_NUM_PEAKS, DEFAULT_PEAK_RADIUS};
use crate::error::{Result, StitchError};

/// Parameters for one pairwise registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchingParameters {
    /// Number of correlation maxima to investigate.
    pub num_peaks: usize,
    /// Neighborhood radius (per axis) used for local-maximum detection.
    pub peak_radius: usize,
    /// Refine the selected peak to sub-pixel precision.
    pub subpixel_accuracy: bool,
    pub roi_policy: RoiPolicy,
    /// Resolve wrap-around ambiguity by cross-correlating the overlap.
    pub verify_peaks: bool,
    /// Minimum overlap, as a fraction of the smaller image, for a shift
    /// interpretation to be verified.
    pub min_overlap_fraction: f64,
    /// Transform both images concurrently and split axis passes across threads.
    pub parallel_fft: bool,
    pub subpixel: SubpixelConfig,
}

impl Default for StitchingParameters {
    fn default() -> Self {
        Self {
            num_peaks: DEFAULT_NUM_PEAKS,
            peak_radius: DEFAULT_PEAK_RADIUS,
            subpixel_accuracy: true,
            roi_policy: RoiPolicy::default(),
            verify_peaks: true,
            min_overlap_fraction: DEFAULT_MIN_OVERLAP_FRACTION,
            parallel_fft: true,
            subpixel: SubpixelConfig::default(),
        }
    }
}

impl StitchingParameters {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Self = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_peaks == 0 {
            return Err(StitchError::InvalidParameters(
                "num_peaks must be at least 1".into(),
            ));
        }
        if self.peak_radius == 0 {
            return Err(StitchError::InvalidParameters(
                "peak_radius must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_overlap_fraction) {
            return Err(StitchError::InvalidParameters(format!(
                "min_overlap_fraction must lie in [0, 1], got {}",
                self.min_overlap_fraction
            )));
        }
        Ok(())
    }
}

/// How a tile's region of interest restricts sampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoiPolicy {
    /// Sample only the rectangular ROI; other shapes fall back to the full image.
    #[default]
    UseRectangular,
    /// Always sample the full image.
    Ignore,
}

impl fmt::Display for RoiPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoiPolicy::UseRectangular => write!(f, "Rectangular ROI"),
            RoiPolicy::Ignore => write!(f, "Ignore ROI"),
        }
    }
}

/// Controls for the quadratic peak fit.
///
/// The defaults refine exactly the given peak with one fit and no
/// re-centering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubpixelConfig {
    /// Per-axis permission to re-center on a neighboring cell. Missing
    /// entries count as `false`.
    pub allowed_to_move_in_dim: Vec<bool>,
    /// Keep offsets that land outside the integer cell instead of clamping.
    pub can_move_outside: bool,
    /// Upper bound on re-centering steps; 0 is a single-shot fit.
    pub max_num_moves: usize,
}

impl Default for SubpixelConfig {
    fn default() -> Self {
        Self {
            allowed_to_move_in_dim: Vec::new(),
            can_move_outside: true,
            max_num_moves: 0,
        }
    }
}

impl SubpixelConfig {
    pub fn may_move(&self, axis: usize) -> bool {
        self.allowed_to_move_in_dim
            .get(axis)
            .copied()
            .unwrap_or(false)
    }
}
