#![allow(dead_code)]

use std::f64::consts::TAU;

use ndarray::{ArrayD, IxDyn, Slice};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Uniform noise in `[0, 1)`.
pub fn noise(shape: &[usize], seed: u64) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.random::<f32>())
}

/// Uniform 8-bit noise.
pub fn noise_u8(shape: &[usize], seed: u64) -> ArrayD<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.random::<u8>())
}

/// Copy of the window of `base` starting at `origin` with extent `size`.
pub fn crop<T: Clone>(base: &ArrayD<T>, origin: &[usize], size: &[usize]) -> ArrayD<T> {
    base.slice_each_axis(|ax| {
        let d = ax.axis.index();
        Slice::from(origin[d]..origin[d] + size[d])
    })
    .to_owned()
}

/// Periodic 2D test pattern with energy in every frequency bin except the
/// Nyquist row and column, sampled at rows shifted by `dy`.
///
/// Because the pattern is band-limited and periodic, sampling it at `y + dy`
/// is an exact (circular) fractional translation.
pub fn periodic_field(h: usize, w: usize, dy: f64, seed: u64) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let max_ky = (h / 2 - 1) as i64;
    let max_kx = (w / 2 - 1) as i64;

    let mut terms = Vec::new();
    for ky in -max_ky..=max_ky {
        for kx in 0..=max_kx {
            if kx == 0 && ky <= 0 {
                continue;
            }
            let amplitude = rng.random_range(0.5..1.0);
            let phase = rng.random_range(0.0..TAU);
            terms.push((ky as f64, kx as f64, amplitude, phase));
        }
    }
    let scale = 1.0 / (terms.len() as f64).sqrt();

    ArrayD::from_shape_fn(IxDyn(&[h, w]), |ix| {
        let y = ix[0] as f64 + dy;
        let x = ix[1] as f64;
        let sum: f64 = terms
            .iter()
            .map(|&(ky, kx, a, p)| a * (TAU * (ky * y / h as f64 + kx * x / w as f64) + p).cos())
            .sum();
        (2.0 + scale * sum) as f32
    })
}
