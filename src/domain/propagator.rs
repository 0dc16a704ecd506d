//! Implicit bath step for a fixed step size.
//!
//! The linearised free surface evolves by the trapezoidal rule
//!
//! ```text
//! η' = η + a [DtN(φ+φ') + 2 Oh_b Δ(η+η')]
//! φ' = φ + a [-Bo(η+η') + s Δ(η+η') + 2 Oh_b Δ(φ+φ')] - dt p̄/ρ_r
//! ```
//!
//! with `a = dt/2` and `s = σ_r/ρ_r`. The state `(η', φ')` is affine in the
//! step-mean pressure `p̄`, so one factorisation per step size gives both the
//! free evolution and the pressure response.

use log::debug;
use nalgebra::{DMatrix, DMatrixView, DVector};

use super::DomainOperator;
use crate::config::setup::parameters::constants::ProblemConstants;
use crate::error::{Result, SimError};

pub struct BathPropagator {
    dt: f64,
    node_count: usize,
    // (η', φ') = free · (η, φ) when p̄ = 0; 2nr × 2nr.
    free: DMatrix<f64>,
    // (η', φ') per unit p̄_j; 2nr × nr.
    response: DMatrix<f64>,
}

impl BathPropagator {
    pub fn new(operator: &DomainOperator, constants: &ProblemConstants, dt: f64) -> Result<Self> {
        let nr = operator.node_count();
        let a = 0.5 * dt;
        let nu = constants.bath_ohnesorge;
        let identity = DMatrix::<f64>::identity(nr, nr);
        let lap = &operator.laplacian;
        let dtn = &operator.dtn;
        let elastic = &identity * (-constants.bond) + lap * constants.bath_capillarity();

        let mut left = DMatrix::zeros(2 * nr, 2 * nr);
        let mut right = DMatrix::zeros(2 * nr, 2 * nr);
        let damped = &identity - lap * (2.0 * nu * a);
        let undamped = &identity + lap * (2.0 * nu * a);
        left.view_mut((0, 0), (nr, nr)).copy_from(&damped);
        left.view_mut((0, nr), (nr, nr)).copy_from(&(dtn * -a));
        left.view_mut((nr, 0), (nr, nr)).copy_from(&(&elastic * -a));
        left.view_mut((nr, nr), (nr, nr)).copy_from(&damped);
        right.view_mut((0, 0), (nr, nr)).copy_from(&undamped);
        right.view_mut((0, nr), (nr, nr)).copy_from(&(dtn * a));
        right.view_mut((nr, 0), (nr, nr)).copy_from(&(&elastic * a));
        right.view_mut((nr, nr), (nr, nr)).copy_from(&undamped);

        let lu = left.lu();
        let free = lu.solve(&right).ok_or_else(|| {
            SimError::InvalidConfiguration(format!("bath step matrix is singular at dt={dt}"))
        })?;
        let mut forcing = DMatrix::zeros(2 * nr, nr);
        forcing
            .view_mut((nr, 0), (nr, nr))
            .copy_from(&(&identity * (-dt / constants.density_ratio)));
        let response = lu.solve(&forcing).ok_or_else(|| {
            SimError::InvalidConfiguration(format!("bath step matrix is singular at dt={dt}"))
        })?;
        debug!("Factored bath propagator for dt={dt:.3e} on {nr} nodes");

        Ok(BathPropagator {
            dt,
            node_count: nr,
            free,
            response,
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Bath state after one step with no pressure applied.
    pub fn free_evolution(
        &self,
        eta: &DVector<f64>,
        phi: &DVector<f64>,
    ) -> (DVector<f64>, DVector<f64>) {
        let nr = self.node_count;
        let mut state = DVector::zeros(2 * nr);
        state.rows_mut(0, nr).copy_from(eta);
        state.rows_mut(nr, nr).copy_from(phi);
        let next = &self.free * state;
        (next.rows(0, nr).into_owned(), next.rows(nr, nr).into_owned())
    }

    /// `G[i, j]`: change of η'_i per unit step-mean pressure at node j.
    pub fn deflection_response(&self) -> DMatrixView<'_, f64> {
        self.response.view((0, 0), (self.node_count, self.node_count))
    }

    /// Deflection caused by pressure on the leading nodes of the grid.
    pub fn deflection_from_pressure(&self, pressure: &DVector<f64>) -> DVector<f64> {
        let q = pressure.len();
        self.response.view((0, 0), (self.node_count, q)) * pressure
    }

    /// Full step under pressure on the leading `pressure.len()` nodes.
    pub fn advance(
        &self,
        eta: &DVector<f64>,
        phi: &DVector<f64>,
        pressure: &DVector<f64>,
    ) -> (DVector<f64>, DVector<f64>) {
        let nr = self.node_count;
        let (mut eta_next, mut phi_next) = self.free_evolution(eta, phi);
        let q = pressure.len();
        if q > 0 {
            eta_next += self.response.view((0, 0), (nr, q)) * pressure;
            phi_next += self.response.view((nr, 0), (nr, q)) * pressure;
        }
        (eta_next, phi_next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::setup::parameters::physical::water_drop;
    use crate::domain::{dtn, DomainKey};
    use approx::assert_relative_eq;

    // Conserved quadratic of Fourier-Bessel mode j without viscosity.
    fn mode_energy(
        op: &DomainOperator,
        c: &ProblemConstants,
        eta: &DVector<f64>,
        phi: &DVector<f64>,
        j: usize,
    ) -> f64 {
        let k = op.wavenumbers[j];
        let e = op.bath_amplitudes(eta)[j];
        let p = op.bath_amplitudes(phi)[j];
        (c.bond + c.bath_capillarity() * k * k) * e * e + k * p * p
    }

    #[test]
    fn inviscid_wave_keeps_its_energy() {
        let op = dtn::generate(&DomainKey::new(4, 5, None)).unwrap();
        let mut c = water_drop(4).as_constants();
        c.bath_ohnesorge = 0.0;
        let prop = BathPropagator::new(&op, &c, 0.05).unwrap();
        let j = 3;
        let mut eta = op.basis.column(j) * 0.01;
        let mut phi = DVector::zeros(op.node_count());
        let e0 = mode_energy(&op, &c, &eta, &phi, j);
        for _ in 0..40 {
            (eta, phi) = prop.free_evolution(&eta, &phi);
        }
        assert_relative_eq!(mode_energy(&op, &c, &eta, &phi, j), e0, max_relative = 1e-8);
        // The wave did move.
        assert!(op.bath_amplitudes(&phi)[j].abs() > 1e-6);
    }

    #[test]
    fn viscosity_damps_waves() {
        let op = dtn::generate(&DomainKey::new(4, 5, None)).unwrap();
        let mut c = water_drop(4).as_constants();
        c.bath_ohnesorge = 0.05;
        let prop = BathPropagator::new(&op, &c, 0.05).unwrap();
        let j = 5;
        let mut eta = op.basis.column(j) * 0.01;
        let mut phi = DVector::zeros(op.node_count());
        let e0 = mode_energy(&op, &c, &eta, &phi, j);
        for _ in 0..40 {
            (eta, phi) = prop.free_evolution(&eta, &phi);
        }
        assert!(mode_energy(&op, &c, &eta, &phi, j) < 0.5 * e0);
    }

    #[test]
    fn pressure_pushes_the_bath_down() {
        let op = dtn::generate(&DomainKey::new(3, 6, None)).unwrap();
        let c = water_drop(4).as_constants();
        let prop = BathPropagator::new(&op, &c, 0.01).unwrap();
        let p = DVector::from_element(3, 1.0);
        let deflection = prop.deflection_from_pressure(&p);
        assert!(deflection[0] < 0.0);
        assert_relative_eq!(
            deflection[1],
            prop.deflection_response().row(1).columns(0, 3).sum()
        );
        let zero = DVector::zeros(op.node_count());
        let (eta, _) = prop.advance(&zero, &zero, &p);
        assert_relative_eq!(eta, deflection, epsilon = 1e-15);
    }

    #[test]
    fn rest_state_is_steady() {
        let op = dtn::generate(&DomainKey::new(2, 4, None)).unwrap();
        let c = water_drop(4).as_constants();
        let prop = BathPropagator::new(&op, &c, 0.01).unwrap();
        let zero = DVector::zeros(op.node_count());
        let (eta, phi) = prop.advance(&zero, &zero, &DVector::zeros(0));
        assert_eq!(eta.norm(), 0.0);
        assert_eq!(phi.norm(), 0.0);
    }
}
