//! Axisymmetric drop surface `R(θ) = 1 + A_0 + Σ_{l=1..N} A_l P_l(cos θ)`.
//!
//! θ is the polar angle measured from the downward vertical, so θ = 0 is the
//! bottom pole that first touches the bath. Amplitude vectors hold modes
//! `l = 1..=N` (index `l - 1`); `A_0` is never stored and is recovered from
//! the volume constraint.

use std::f64::consts::PI;

use nalgebra::DVector;

use crate::error::{Result, SimError};
use crate::math::{bisect, legendre::legendre_series};

// Uniform scan used to isolate the first root before bisecting.
const ROOT_SCAN_INTERVALS: usize = 720;
const ROOT_TOLERANCE: f64 = 1e-13;

/// Second-order volume correction for the `l = 0` mode.
pub fn volume_correction(amplitudes: &DVector<f64>) -> f64 {
    -amplitudes
        .iter()
        .enumerate()
        .map(|(i, a)| a * a / (2.0 * (i + 1) as f64 + 1.0))
        .sum::<f64>()
}

fn radius_with(amplitudes: &DVector<f64>, a0: f64, theta: f64) -> f64 {
    1.0 + a0 + legendre_series(amplitudes.as_slice(), theta.cos())
}

pub fn radius_at(amplitudes: &DVector<f64>, theta: f64) -> f64 {
    radius_with(amplitudes, volume_correction(amplitudes), theta)
}

pub fn radius_from_angle(amplitudes: &DVector<f64>, angles: &[f64]) -> Vec<f64> {
    let a0 = volume_correction(amplitudes);
    angles.iter().map(|th| radius_with(amplitudes, a0, *th)).collect()
}

/// Height of the surface point at each angle, relative to the drop centre.
pub fn height_from_angle(amplitudes: &DVector<f64>, angles: &[f64]) -> Vec<f64> {
    let a0 = volume_correction(amplitudes);
    angles
        .iter()
        .map(|th| -radius_with(amplitudes, a0, *th) * th.cos())
        .collect()
}

pub fn cylindrical_radius_at(amplitudes: &DVector<f64>, theta: f64) -> f64 {
    radius_at(amplitudes, theta) * theta.sin()
}

/// Widest point of the lower surface branch, seen from below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub angle: f64,
    pub radius: f64,
}

pub fn footprint(amplitudes: &DVector<f64>) -> Result<Footprint> {
    let a0 = volume_correction(amplitudes);
    let g = |th: f64| radius_with(amplitudes, a0, th) * th.sin();
    let h = PI / ROOT_SCAN_INTERVALS as f64;

    let mut prev = 0.0;
    for k in 1..=ROOT_SCAN_INTERVALS {
        let th = k as f64 * h;
        if radius_with(amplitudes, a0, th) <= 0.0 {
            return Err(SimError::GeometryDegenerate(format!(
                "surface radius is non-positive at θ={th:.4}"
            )));
        }
        let val = g(th);
        if val < prev {
            // First local maximum lies in [th - 2h, th]; golden-section it.
            let (mut a, mut b) = ((th - 2.0 * h).max(0.0), th);
            let phi = 0.5 * (5f64.sqrt() - 1.0);
            while b - a > ROOT_TOLERANCE {
                let c = b - phi * (b - a);
                let d = a + phi * (b - a);
                if g(c) > g(d) {
                    b = d;
                } else {
                    a = c;
                }
            }
            let angle = 0.5 * (a + b);
            return Ok(Footprint {
                angle,
                radius: g(angle),
            });
        }
        prev = val;
    }
    Err(SimError::GeometryDegenerate(
        "lower surface branch never turns back towards the axis".to_string(),
    ))
}

/// Angle of the surface point on the lower branch at cylindrical radius `r`.
///
/// Returns the smallest root `θ ≥ floor` of `R(θ) sin θ = r`. Chaining the
/// floor through increasing radii keeps successive contact angles monotone.
/// The height of the located point is `height_from_angle` at that angle.
pub fn angle_from_cylindrical(amplitudes: &DVector<f64>, r: f64, floor: f64) -> Result<f64> {
    if !r.is_finite() || r < 0.0 {
        return Err(SimError::GeometryDegenerate(format!(
            "invalid cylindrical radius {r}"
        )));
    }
    if !(0.0..=PI).contains(&floor) {
        return Err(SimError::GeometryDegenerate(format!(
            "angle floor {floor} outside [0, π]"
        )));
    }
    let a0 = volume_correction(amplitudes);
    let g = |th: f64| radius_with(amplitudes, a0, th) * th.sin() - r;

    let g_floor = g(floor);
    if g_floor.abs() <= ROOT_TOLERANCE {
        return Ok(floor);
    }
    if g_floor > 0.0 {
        return Err(SimError::GeometryDegenerate(format!(
            "cylindrical radius {r:.6} lies inside the floor angle {floor:.6}"
        )));
    }

    let h = PI / ROOT_SCAN_INTERVALS as f64;
    let mut lo = floor;
    loop {
        let hi = (lo + h).min(PI);
        if radius_with(amplitudes, a0, hi) <= 0.0 {
            return Err(SimError::GeometryDegenerate(format!(
                "surface radius is non-positive at θ={hi:.4}"
            )));
        }
        if g(hi) >= 0.0 {
            return Ok(bisect(g, lo, hi, ROOT_TOLERANCE));
        }
        if hi >= PI {
            return Err(SimError::GeometryDegenerate(format!(
                "no surface point at cylindrical radius {r:.6} beyond θ={floor:.6}"
            )));
        }
        lo = hi;
    }
}
