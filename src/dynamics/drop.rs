//! Linear oscillation of the drop's shape modes and of its centre of mass.
//!
//! Mode `l ≥ 2` obeys `A'' + c_l A' + ω_l² A = -l p_l` with
//! `ω_l² = (l-1) l (l+2)` and `c_l = 2 (l-1)(2l+1) Oh_d`. Mode 1 is the rigid
//! translation, carried by the centre height instead, and stays at zero.

use std::f64::consts::PI;

use nalgebra::DVector;

pub fn frequency_squared(l: usize) -> f64 {
    let l = l as f64;
    (l - 1.0) * l * (l + 2.0)
}

pub fn damping_rate(l: usize, ohnesorge: f64) -> f64 {
    let l = l as f64;
    2.0 * (l - 1.0) * (2.0 * l + 1.0) * ohnesorge
}

/// One trapezoidal step of the shape modes, split into the part without
/// pressure and the per-mode response to a unit pressure amplitude.
pub struct ModeStep {
    pub free_amplitudes: DVector<f64>,
    pub free_velocities: DVector<f64>,
    // dA'_l / dp_l and dB'_l / dp_l.
    pub amplitude_response: DVector<f64>,
    pub velocity_response: DVector<f64>,
}

impl ModeStep {
    pub fn new(amplitudes: &DVector<f64>, velocities: &DVector<f64>, dt: f64, ohnesorge: f64) -> Self {
        let n = amplitudes.len();
        let a = 0.5 * dt;
        let mut step = ModeStep {
            free_amplitudes: DVector::zeros(n),
            free_velocities: DVector::zeros(n),
            amplitude_response: DVector::zeros(n),
            velocity_response: DVector::zeros(n),
        };
        for i in 1..n {
            let l = i + 1;
            let w2 = frequency_squared(l);
            let c = damping_rate(l, ohnesorge);
            let denominator = 1.0 + a * a * w2 + a * c;
            let (amp, vel) = (amplitudes[i], velocities[i]);
            let vel_next = (vel * (1.0 - a * a * w2 - a * c) - 2.0 * a * w2 * amp) / denominator;
            step.free_velocities[i] = vel_next;
            step.free_amplitudes[i] = amp + a * (vel + vel_next);
            step.velocity_response[i] = -dt * l as f64 / denominator;
            step.amplitude_response[i] = a * step.velocity_response[i];
        }
        step
    }

    pub fn amplitudes_under(&self, pressure_amplitudes: &DVector<f64>) -> DVector<f64> {
        &self.free_amplitudes + self.amplitude_response.component_mul(pressure_amplitudes)
    }

    pub fn velocities_under(&self, pressure_amplitudes: &DVector<f64>) -> DVector<f64> {
        &self.free_velocities + self.velocity_response.component_mul(pressure_amplitudes)
    }
}

/// Centre-of-mass step under gravity and the bath's total force.
pub fn centre_step(z: f64, vz: f64, force: f64, dt: f64, bond: f64, mass: f64) -> (f64, f64) {
    let vz_next = vz + dt * (-bond + force / mass);
    (z + 0.5 * dt * (vz + vz_next), vz_next)
}

/// Kinetic plus surface energy stored in the shape modes.
pub fn mode_energy(amplitudes: &DVector<f64>, velocities: &DVector<f64>) -> f64 {
    amplitudes
        .iter()
        .zip(velocities.iter())
        .enumerate()
        .skip(1)
        .map(|(i, (a, b))| {
            let l = i + 1;
            2.0 * PI / (l as f64 * (2.0 * l as f64 + 1.0)) * (b * b + frequency_squared(l) * a * a)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn excited(n: usize) -> (DVector<f64>, DVector<f64>) {
        let a = DVector::from_fn(n, |i, _| if i == 0 { 0.0 } else { 0.02 / (i as f64) });
        let b = DVector::from_fn(n, |i, _| if i == 0 { 0.0 } else { -0.01 * i as f64 });
        (a, b)
    }

    #[test]
    fn inviscid_unloaded_modes_conserve_energy() {
        let (mut a, mut b) = excited(8);
        let e0 = mode_energy(&a, &b);
        for _ in 0..500 {
            let step = ModeStep::new(&a, &b, 0.01, 0.0);
            a = step.free_amplitudes;
            b = step.free_velocities;
        }
        assert_relative_eq!(mode_energy(&a, &b), e0, max_relative = 1e-12);
    }

    #[test]
    fn viscous_modes_lose_energy() {
        let (mut a, mut b) = excited(8);
        let e0 = mode_energy(&a, &b);
        for _ in 0..200 {
            let step = ModeStep::new(&a, &b, 0.01, 0.01);
            a = step.free_amplitudes;
            b = step.free_velocities;
        }
        assert!(mode_energy(&a, &b) < e0);
    }

    #[test]
    fn translation_mode_stays_zero() {
        let (a, b) = excited(5);
        let step = ModeStep::new(&a, &b, 0.1, 0.0);
        let p = DVector::from_element(5, 3.0);
        assert_eq!(step.amplitudes_under(&p)[0], 0.0);
        assert_eq!(step.velocities_under(&p)[0], 0.0);
    }

    #[test]
    fn pressure_flattens_the_bottom() {
        let zero = DVector::zeros(4);
        let step = ModeStep::new(&zero, &zero, 0.01, 0.0);
        let mut p = DVector::zeros(4);
        p[1] = 1.0;
        let a = step.amplitudes_under(&p);
        // A positive P_2 load pushes A_2 negative.
        assert!(a[1] < 0.0);
        assert_relative_eq!(a[1], step.amplitude_response[1]);
        assert_eq!(a[2], 0.0);
    }

    #[test]
    fn free_fall() {
        let (z, vz) = centre_step(1.0, -1.0, 0.0, 0.1, 2.0, 4.0 * PI / 3.0);
        assert_relative_eq!(vz, -1.2);
        assert_relative_eq!(z, 1.0 - 0.1 - 0.5 * 2.0 * 0.01, epsilon = 1e-15);
    }
}
