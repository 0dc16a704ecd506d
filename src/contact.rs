//! Pressure on the contact patch from the kinematic match between the drop's
//! lower surface and the bath.
//!
//! For a trial patch of `q` grid nodes the unknown is the step-mean pressure
//! `p̄` on those nodes. The bath deflection, the drop's mode amplitudes and its
//! centre height at the end of the step are all affine in `p̄`, so requiring
//! the bath to meet the drop on every patch node is a `q × q` linear system.
//! Nodes that would need suction are unloaded instead, which leaves air
//! trapped under the drop when first contact is a ring.

pub mod search;

use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::config::setup::parameters::{
    constants::ProblemConstants,
    simulation::{ContactParams, CuspRegularization},
};
use crate::domain::{propagator::BathPropagator, DomainOperator};
use crate::dynamics::drop::{centre_step, ModeStep};
use crate::error::{Result, SimError};
use crate::geometry::{
    projection::Projector,
    shape::{angle_from_cylindrical, footprint, radius_at, volume_correction, Footprint},
};
use crate::math::legendre::legendre_all;
use crate::state::SimulationState;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRegime {
    // Direct solve of the match system.
    Standard,
    // Tikhonov-damped solve, for patches that are tiny or reach the steep
    // flank of the drop.
    Cusp,
}

impl ContactRegime {
    pub fn classify(
        contact_points: usize,
        patch_radius: f64,
        footprint_radius: f64,
        cusp: &CuspRegularization,
    ) -> ContactRegime {
        if contact_points <= cusp.small_patch_points
            || patch_radius >= cusp.saturation_fraction * footprint_radius
        {
            ContactRegime::Cusp
        } else {
            ContactRegime::Standard
        }
    }

    fn min_cosine(self, cusp: &CuspRegularization) -> f64 {
        match self {
            ContactRegime::Standard => 0.0,
            ContactRegime::Cusp => cusp.min_cosine,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContactSolution {
    pub contact_points: usize,
    // Patch nodes carrying pressure; the rest trap air under the drop.
    pub loaded_points: usize,
    pub patch_radius: f64,
    pub contact_angle: f64,
    // Step-mean pressure on patch nodes 0..q, zero on unloaded ones.
    pub pressure: DVector<f64>,
    pub pressure_amplitudes: DVector<f64>,
    // Total upward force on the drop.
    pub force: f64,
    pub regime: Option<ContactRegime>,
    // Most negative pressure relative to the peak, zero if none.
    pub edge_pressure: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Where the grid nodes under the drop meet its predicted lower surface.
pub struct PatchGeometry {
    pub predicted: DVector<f64>,
    pub footprint: Footprint,
    // Per grid node with r_i below the footprint radius.
    pub angles: Vec<f64>,
    pub cosines: Vec<f64>,
    pub drop_radii: Vec<f64>,
    // legendre[(i, l - 1)] = P_l(cos θ_i).
    pub legendre: DMatrix<f64>,
}

impl PatchGeometry {
    pub fn locate(predicted: &DVector<f64>, grid: &DVector<f64>) -> Result<PatchGeometry> {
        let footprint = footprint(predicted)?;
        let n = predicted.len();
        let mut angles = Vec::new();
        let mut floor = 0.0;
        for r in grid.iter().take_while(|r| **r < footprint.radius) {
            let theta = angle_from_cylindrical(predicted, *r, floor)?;
            angles.push(theta);
            floor = theta;
        }
        let cosines: Vec<f64> = angles.iter().map(|th| th.cos()).collect();
        let drop_radii = angles.iter().map(|th| radius_at(predicted, *th)).collect();
        let mut legendre = DMatrix::zeros(angles.len(), n);
        for (i, c) in cosines.iter().enumerate() {
            for (l, p) in legendre_all(n, *c).into_iter().enumerate().skip(1) {
                legendre[(i, l - 1)] = p;
            }
        }
        Ok(PatchGeometry {
            predicted: predicted.clone(),
            footprint,
            angles,
            cosines,
            drop_radii,
            legendre,
        })
    }

    /// Grid nodes the drop could cover; the largest admissible patch.
    pub fn covered_nodes(&self) -> usize {
        self.angles.len()
    }

    pub fn patch_radius(&self, contact_points: usize, dr: f64) -> f64 {
        if contact_points == 0 {
            0.0
        } else {
            ((contact_points as f64 - 0.5) * dr).min(self.footprint.radius)
        }
    }

    pub fn contact_angle(&self, contact_points: usize, dr: f64) -> Result<f64> {
        if contact_points == 0 {
            return Ok(0.0);
        }
        let radius = self.patch_radius(contact_points, dr);
        if radius >= self.footprint.radius {
            return Ok(self.footprint.angle);
        }
        angle_from_cylindrical(&self.predicted, radius, self.angles[contact_points - 1])
    }
}

/// Outcome of solving the match system on one trial patch.
pub struct PatchTrial {
    pub solution: ContactSolution,
    // Largest height of the bath above the drop over unloaded nodes.
    pub max_gap: f64,
}

/// Everything about one attempted step that does not depend on the patch.
pub struct ContactProblem<'a> {
    operator: &'a DomainOperator,
    propagator: &'a BathPropagator,
    projector: &'a Projector,
    params: &'a ContactParams,
    pub geometry: PatchGeometry,
    pub modes: ModeStep,
    volume_correction: f64,
    eta_free: DVector<f64>,
    z_free: f64,
    // dz'/dF.
    z_response: f64,
    // (1 + A_0 + Σ A_l P_l(c_i)) c_i for the unloaded amplitudes.
    free_reach: Vec<f64>,
    tolerance: f64,
}

impl<'a> ContactProblem<'a> {
    pub fn new(
        state: &SimulationState,
        operator: &'a DomainOperator,
        propagator: &'a BathPropagator,
        projector: &'a Projector,
        constants: &ProblemConstants,
        params: &'a ContactParams,
    ) -> Result<Self> {
        let dt = propagator.dt();
        let predicted = &state.amplitudes + &state.amplitude_velocities * dt;
        let geometry = PatchGeometry::locate(&predicted, &operator.radii)?;
        let modes = ModeStep::new(
            &state.amplitudes,
            &state.amplitude_velocities,
            dt,
            constants.drop_ohnesorge,
        );
        let (eta_free, _) =
            propagator.free_evolution(&state.bath_deflection, &state.bath_potential);
        let (z_free, _) =
            centre_step(state.z, state.vz, 0.0, dt, constants.bond, constants.drop_mass);
        let a0 = volume_correction(&predicted);
        let free_amplitudes = modes.free_amplitudes.transpose();
        let free_reach = (0..geometry.covered_nodes())
            .map(|i| {
                (1.0 + a0 + geometry.legendre.row(i).dot(&free_amplitudes)) * geometry.cosines[i]
            })
            .collect();

        Ok(ContactProblem {
            operator,
            propagator,
            projector,
            params,
            geometry,
            modes,
            volume_correction: a0,
            eta_free,
            z_free,
            z_response: 0.5 * dt * dt / constants.drop_mass,
            free_reach,
            tolerance: constants.tolerance,
        })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.params.max_iterations
    }

    pub fn covered_nodes(&self) -> usize {
        self.geometry.covered_nodes()
    }

    pub fn solve_patch(&self, contact_points: usize) -> Result<PatchTrial> {
        let radius = self.geometry.patch_radius(contact_points, self.operator.dr);
        let regime = ContactRegime::classify(
            contact_points,
            radius,
            self.geometry.footprint.radius,
            &self.params.cusp,
        );
        self.solve_patch_with(contact_points, regime)
    }

    pub fn solve_patch_with(&self, contact_points: usize, regime: ContactRegime) -> Result<PatchTrial> {
        let q = contact_points;
        let covered = self.covered_nodes();
        if q > covered {
            return Err(SimError::GeometryDegenerate(format!(
                "patch of {q} nodes exceeds the {covered} nodes under the drop"
            )));
        }
        let n = self.projector.mode_count();
        let weights = &self.operator.area_weights;

        let (pressure, loaded, pressure_amplitudes) = if q == 0 {
            (DVector::zeros(0), Vec::new(), DVector::zeros(n))
        } else {
            let pi_mat = self.projector.patch_matrix(
                &self.geometry.cosines[..q],
                &self.geometry.drop_radii[..q],
                &weights.as_slice()[..q],
                regime.min_cosine(&self.params.cusp),
            );
            let legendre = self.geometry.legendre.rows(0, q);
            let mut coupling =
                legendre * DMatrix::from_diagonal(&self.modes.amplitude_response) * &pi_mat;
            for i in 0..q {
                coupling.row_mut(i).scale_mut(self.geometry.cosines[i]);
            }
            let mut k = self.propagator.deflection_response().view((0, 0), (q, q)).into_owned();
            k += coupling;
            for i in 0..q {
                for j in 0..q {
                    k[(i, j)] -= self.z_response * weights[j];
                }
            }
            let b = DVector::from_fn(q, |i, _| self.z_free - self.eta_free[i] - self.free_reach[i]);
            let (p, loaded) = self.release_suction(&k, &b, regime)?;
            let pa = &pi_mat * &p;
            (p, loaded, pa)
        };

        let force: f64 = pressure.iter().zip(weights.iter()).map(|(p, w)| p * w).sum();
        let z_next = self.z_free + self.z_response * force;
        let amplitudes = self.modes.amplitudes_under(&pressure_amplitudes);
        let eta_next = &self.eta_free + self.propagator.deflection_from_pressure(&pressure);

        let amplitudes = amplitudes.transpose();
        let max_gap = (0..covered)
            .filter(|i| *i >= q || !loaded[*i])
            .map(|i| {
                let reach = (1.0
                    + self.volume_correction
                    + self.geometry.legendre.row(i).dot(&amplitudes))
                    * self.geometry.cosines[i];
                eta_next[i] - (z_next - reach)
            })
            .fold(f64::NEG_INFINITY, f64::max);

        let peak = pressure.iter().copied().fold(0.0, f64::max);
        let trough = pressure.iter().copied().fold(0.0, f64::min);
        trace!("patch q={q} ({regime:?}): force={force:.4e}, gap={max_gap:.3e}, p in [{trough:.3e}, {peak:.3e}]");

        Ok(PatchTrial {
            solution: ContactSolution {
                contact_points: q,
                loaded_points: loaded.iter().filter(|l| **l).count(),
                patch_radius: self.geometry.patch_radius(q, self.operator.dr),
                contact_angle: self.geometry.contact_angle(q, self.operator.dr)?,
                pressure,
                pressure_amplitudes,
                force,
                regime: (q > 0).then_some(regime),
                edge_pressure: -trough / peak.max(1.0),
                iterations: 1,
                converged: false,
            },
            max_gap,
        })
    }

    /// Solves the match system, unloading the most suctioned node until no
    /// node pulls on the drop. Unloaded nodes carry zero pressure and must
    /// clear the drop like nodes outside the patch.
    fn release_suction(
        &self,
        k: &DMatrix<f64>,
        b: &DVector<f64>,
        regime: ContactRegime,
    ) -> Result<(DVector<f64>, Vec<bool>)> {
        let q = b.len();
        let mut loaded = vec![true; q];
        loop {
            let nodes: Vec<usize> = (0..q).filter(|i| loaded[*i]).collect();
            let mut pressure = DVector::zeros(q);
            if nodes.is_empty() {
                return Ok((pressure, loaded));
            }
            let m = nodes.len();
            let reduced = DMatrix::from_fn(m, m, |i, j| k[(nodes[i], nodes[j])]);
            let rhs = DVector::from_fn(m, |i, _| b[nodes[i]]);
            let solved = match regime {
                ContactRegime::Standard => solve_direct(reduced, &rhs)?,
                ContactRegime::Cusp => solve_damped(reduced, &rhs, self.params.cusp.damping)?,
            };
            if solved.iter().any(|v| !v.is_finite()) {
                return Err(SimError::ContactConvergence {
                    iterations: 1,
                    residual: f64::INFINITY,
                    reason: format!("non-finite pressure on a {q}-node patch"),
                });
            }
            for (i, v) in nodes.iter().zip(solved.iter()) {
                pressure[*i] = *v;
            }

            let floor = -self.tolerance * solved.max().max(1.0);
            let (worst, lowest) = nodes
                .iter()
                .map(|i| (*i, pressure[*i]))
                .fold((nodes[0], f64::INFINITY), |acc, x| if x.1 < acc.1 { x } else { acc });
            if lowest >= floor {
                return Ok((pressure, loaded));
            }
            trace!("patch q={q}: unloading node {worst} (p={lowest:.3e})");
            loaded[worst] = false;
        }
    }
}

fn solve_direct(k: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let q = b.len();
    k.lu().solve(b).ok_or_else(|| SimError::ContactConvergence {
        iterations: 1,
        residual: f64::INFINITY,
        reason: format!("singular match system on a {q}-node patch"),
    })
}

// (KᵀK + λ²I) p = Kᵀb with λ relative to ‖K‖_F.
fn solve_damped(k: DMatrix<f64>, b: &DVector<f64>, damping: f64) -> Result<DVector<f64>> {
    let q = b.len();
    let lambda = damping * k.norm();
    let kt = k.transpose();
    let normal = &kt * &k + DMatrix::identity(q, q) * (lambda * lambda);
    let rhs = &kt * b;
    normal
        .cholesky()
        .map(|c| c.solve(&rhs))
        .ok_or_else(|| SimError::ContactConvergence {
            iterations: 1,
            residual: f64::INFINITY,
            reason: format!("damped match system on a {q}-node patch is not positive definite"),
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::setup::parameters::physical::water_drop;
    use crate::domain::{dtn, DomainKey};
    use approx::assert_relative_eq;

    pub(crate) struct Fixture {
        pub operator: DomainOperator,
        pub propagator: BathPropagator,
        pub projector: Projector,
        pub constants: ProblemConstants,
        pub params: ContactParams,
    }

    pub(crate) fn fixture() -> Fixture {
        let operator = dtn::generate(&DomainKey::new(4, 8, None)).unwrap();
        let constants = water_drop(8).as_constants();
        let propagator = BathPropagator::new(&operator, &constants, 0.01).unwrap();
        Fixture {
            projector: Projector::new(8),
            operator,
            propagator,
            constants,
            params: ContactParams::default(),
        }
    }

    // A sphere whose bottom sits `gap` above a flat bath, falling.
    pub(crate) fn falling(f: &Fixture, gap: f64) -> SimulationState {
        let mut state = SimulationState::new(8, f.operator.node_count(), f.constants.initial_velocity);
        state.z = 1.0 + gap;
        state
    }

    fn problem<'a>(f: &'a Fixture, state: &SimulationState) -> ContactProblem<'a> {
        ContactProblem::new(
            state,
            &f.operator,
            &f.propagator,
            &f.projector,
            &f.constants,
            &f.params,
        )
        .unwrap()
    }

    #[test]
    fn regime_follows_patch_size() {
        let cusp = CuspRegularization::default();
        assert_eq!(ContactRegime::classify(1, 0.05, 1.0, &cusp), ContactRegime::Cusp);
        assert_eq!(ContactRegime::classify(2, 0.15, 1.0, &cusp), ContactRegime::Cusp);
        assert_eq!(ContactRegime::classify(5, 0.45, 1.0, &cusp), ContactRegime::Standard);
        assert_eq!(ContactRegime::classify(12, 0.95, 1.0, &cusp), ContactRegime::Cusp);
    }

    #[test]
    fn sphere_patch_geometry() {
        let f = fixture();
        let geometry = PatchGeometry::locate(&DVector::zeros(8), &f.operator.radii).unwrap();
        // Nodes at r < 1 for a unit sphere on a grid of spacing 1/8.
        assert_eq!(geometry.covered_nodes(), 8);
        for (i, th) in geometry.angles.iter().enumerate() {
            assert_relative_eq!(th.sin(), f.operator.radii[i], epsilon = 1e-12);
        }
        assert_eq!(geometry.patch_radius(0, f.operator.dr), 0.0);
        assert_relative_eq!(geometry.patch_radius(2, f.operator.dr), 0.1875);
        assert_relative_eq!(
            geometry.contact_angle(2, f.operator.dr).unwrap(),
            0.1875f64.asin(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn no_patch_is_free_flight() {
        let f = fixture();
        let state = falling(&f, 0.5);
        let trial = problem(&f, &state).solve_patch(0).unwrap();
        assert_eq!(trial.solution.force, 0.0);
        assert!(trial.solution.regime.is_none());
        assert!(trial.max_gap < 0.0);
    }

    #[test]
    fn single_node_contact_pushes_up() {
        let f = fixture();
        let state = falling(&f, 0.0);
        let trial = problem(&f, &state).solve_patch(1).unwrap();
        assert_eq!(trial.solution.regime, Some(ContactRegime::Cusp));
        assert!(trial.solution.pressure[0] > 0.0);
        assert!(trial.solution.force > 0.0);
        assert!(trial.solution.pressure_amplitudes[1] > 0.0);
    }

    #[test]
    fn standard_and_cusp_agree_on_first_contact() {
        let f = fixture();
        let state = falling(&f, 0.0);
        let problem = problem(&f, &state);
        // Down to a single node, where the patch radius vanishes.
        for q in [3, 2, 1] {
            let standard = problem.solve_patch_with(q, ContactRegime::Standard).unwrap();
            let cusp = problem.solve_patch_with(q, ContactRegime::Cusp).unwrap();
            assert_eq!(standard.solution.loaded_points, cusp.solution.loaded_points);
            assert_relative_eq!(
                standard.solution.pressure,
                cusp.solution.pressure,
                epsilon = 1e-10,
                max_relative = 1e-6
            );
            assert_relative_eq!(standard.solution.force, cusp.solution.force, max_relative = 1e-6);
            assert_relative_eq!(standard.max_gap, cusp.max_gap, epsilon = 1e-10);
        }
    }

    // The bath under the drop's bottom is dented from an earlier single-node
    // load, so the drop first meets it on a ring around node 0.
    fn dented(f: &Fixture) -> SimulationState {
        let mut state = falling(f, 0.0);
        state.bath_deflection[0] = -0.05;
        state
    }

    #[test]
    fn suction_nodes_are_unloaded() {
        let f = fixture();
        let state = dented(&f);
        let problem = problem(&f, &state);
        let tol = f.constants.tolerance;

        // Holding node 0 against the drop would need suction.
        let centre = problem.solve_patch(1).unwrap();
        assert_eq!(centre.solution.loaded_points, 0);
        assert_eq!(centre.solution.force, 0.0);
        assert!(centre.max_gap > tol);

        let ring = problem.solve_patch(2).unwrap();
        assert_eq!(ring.solution.pressure[0], 0.0);
        assert!(ring.solution.pressure[1] > 0.0);
        assert_eq!(ring.solution.loaded_points, 1);
        assert!(ring.solution.edge_pressure <= tol);
    }

    #[test]
    fn ring_contact_traps_air() {
        let f = fixture();
        let state = dented(&f);
        let problem = problem(&f, &state);
        for previous in [0, 1, 4] {
            let solution = search::solve_contact(&problem, previous).unwrap();
            assert!(solution.converged);
            assert!(solution.contact_points >= 2);
            assert!(solution.loaded_points < solution.contact_points);
            assert_eq!(solution.pressure[0], 0.0);
            assert!(solution.force > 0.0);
        }
    }

    #[test]
    fn patch_may_not_outgrow_the_drop() {
        let f = fixture();
        let state = falling(&f, 0.0);
        assert!(matches!(
            problem(&f, &state).solve_patch(9),
            Err(SimError::GeometryDegenerate(_))
        ));
    }
}
