pub mod config;
pub mod consts;
pub mod correlation;
pub mod error;
pub mod fft;
pub mod registration;
pub mod sampler;
pub mod subpixel;
pub mod tile;
pub mod verify;

pub use config::{RoiPolicy, StitchingParameters, SubpixelConfig};
pub use error::{Result, StitchError};
pub use registration::{
    compute_phase_correlation, register_buffers, register_pair, register_pairs,
    PairRegistration, RegistrationResult,
};
