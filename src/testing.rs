//! Tools to test algorithms and synthesize recordings
#![allow(dead_code)]
use core::f64::consts::{PI, TAU};
use num_traits::Float;
use rand::{Rng, prelude::*, rngs::StdRng};
use std::{path::PathBuf, vec::Vec};

/// Absolute difference of two angles, wrapped into `[0, pi]`.
pub fn angle_error(a: f64, b: f64) -> f64 {
    ((a - b + PI).rem_euclid(TAU) - PI).abs()
}

/// Maximum acceptable error between two values given relative and absolute
/// tolerances. The relative part scales with the larger magnitude.
pub fn max_error<T: Float>(a: T, b: T, rtol: T, atol: T) -> T {
    rtol * a.abs().max(b.abs()) + atol
}

/// Return whether two numbers are within absolute plus relative tolerance
pub fn isclose<T: Float>(a: T, b: T, rtol: T, atol: T) -> bool {
    (a - b).abs() <= max_error(a, b, rtol, atol)
}

/// Encode in-phase/quadrature pixels as a little endian `i16` payload.
pub fn iq_payload(iq: impl IntoIterator<Item = (i16, i16)>) -> Vec<u8> {
    iq.into_iter()
        .flat_map(|(i, q)| {
            let mut px = [0; 4];
            px[..2].copy_from_slice(&i.to_le_bytes());
            px[2..].copy_from_slice(&q.to_le_bytes());
            px
        })
        .collect()
}

/// Payload whose pixels sit at the given phases (radians) and amplitude.
pub fn phase_payload(phases: &[f64], amplitude: f64) -> Vec<u8> {
    iq_payload(phases.iter().map(|p| {
        let (s, c) = p.sin_cos();
        ((c * amplitude).round() as i16, (s * amplitude).round() as i16)
    }))
}

/// Random payload for a `pixels` sized frame.
///
/// A fraction of the pixels is dark (below any sensible threshold).
pub fn random_payload(rng: &mut StdRng, pixels: usize) -> Vec<u8> {
    iq_payload((0..pixels).map(|_| {
        if rng.random_bool(0.1) {
            (rng.random_range(-2..=2), rng.random_range(-2..=2))
        } else {
            rng.random()
        }
    }))
}

/// Deterministic generator for fixtures.
pub fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

/// Unique scratch file path for tests touching the file system.
pub fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("depthbench-{}-{name}", std::process::id()))
}
