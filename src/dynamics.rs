pub mod drop;

use std::{f64::consts::PI, sync::Arc};

use log::{debug, error, info, warn};

use crate::config::run::{RunContext, RunParams};
use crate::config::setup::{parameters::constants::ProblemConstants, SetupConfig};
use crate::contact::{search::solve_contact, ContactProblem, ContactSolution};
use crate::domain::{
    store::{load_or_generate, OperatorStore},
    DomainOperator,
};
use crate::error::{Result, SimError};
use crate::geometry::shape::{height_from_angle, radius_from_angle};
use crate::output::RunWriter;
use crate::state::{SimulationState, StepSummary, Trajectory};

use self::drop::{centre_step, mode_energy};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initialized,
    Stepping,
    Completed,
    ErrorTerminal,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    // Drop left the bath.
    Rebound,
    // Still touching when the run ended.
    Contact,
    NoContact,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub t: f64,
    pub vz: f64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub impact: Option<ContactEvent>,
    pub detachment: Option<ContactEvent>,
    pub contact_time: Option<f64>,
    // -vz at detachment over vz at impact.
    pub restitution: Option<f64>,
    pub max_patch_radius: f64,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub final_time: f64,
    pub final_time_step: f64,
}

/// Refinement level bookkeeping: step `dt_0 / 2^level`, coarsening once two
/// halves have completed a step of the parent level.
#[derive(Debug, Clone, PartialEq)]
struct StepLevels {
    level: u32,
    // Completed steps at each level since it was entered.
    completed: Vec<u32>,
}

impl StepLevels {
    fn new() -> Self {
        StepLevels {
            level: 0,
            completed: vec![0],
        }
    }

    fn refine(&mut self) {
        self.level += 1;
        self.completed.push(0);
    }

    fn accept(&mut self) {
        if let Some(c) = self.completed.last_mut() {
            *c += 1;
        }
        while self.level > 0 && self.completed.last() == Some(&2) {
            self.completed.pop();
            self.level -= 1;
            if let Some(c) = self.completed.last_mut() {
                *c += 1;
            }
        }
    }
}

// An attempted step that passed the contact solve.
struct Proposal {
    state: SimulationState,
    solution: ContactSolution,
    error_estimate: f64,
    acceleration: f64,
}

fn retryable(error: &SimError) -> bool {
    matches!(
        error,
        SimError::ContactConvergence { .. }
            | SimError::StepRejected { .. }
            | SimError::GeometryDegenerate(_)
    )
}

pub struct Simulation {
    constants: ProblemConstants,
    params: RunParams,
    context: RunContext,
    state: SimulationState,
    trajectory: Trajectory,
    phase: RunPhase,
    levels: StepLevels,
    // Centre acceleration over the last accepted step.
    previous_acceleration: f64,
    accepted: usize,
    rejected: usize,
    impact: Option<ContactEvent>,
    detachment: Option<ContactEvent>,
    max_patch_radius: f64,
}

impl Simulation {
    pub fn new(
        constants: ProblemConstants,
        operator: Arc<DomainOperator>,
        params: RunParams,
    ) -> Result<Self> {
        operator.validate(&params.domain)?;
        if constants.mode_count < 2 {
            return Err(SimError::InvalidConfiguration(format!(
                "need at least 2 shape modes, got {}",
                constants.mode_count
            )));
        }
        let mut state = SimulationState::new(
            constants.mode_count,
            operator.node_count(),
            constants.initial_velocity,
        );
        state.z += params.simulation.initial_gap;
        Ok(Simulation {
            context: RunContext::new(operator, &constants),
            previous_acceleration: -constants.bond,
            constants,
            params,
            state,
            trajectory: Trajectory::new(),
            phase: RunPhase::Initialized,
            levels: StepLevels::new(),
            accepted: 0,
            rejected: 0,
            impact: None,
            detachment: None,
            max_patch_radius: 0.0,
        })
    }

    pub fn from_config(
        config: &SetupConfig,
        store: &mut dyn OperatorStore,
        dstep_view: usize,
    ) -> Result<Self> {
        let params = config.run_params(dstep_view);
        let operator = load_or_generate(store, &params.domain)?;
        Self::new(config.problem_constants(), operator, params)
    }

    /// Replaces the state before stepping starts.
    pub fn set_state(&mut self, state: SimulationState) -> Result<()> {
        if self.phase != RunPhase::Initialized {
            return Err(SimError::InvalidConfiguration(
                "state can only be replaced before stepping".to_string(),
            ));
        }
        let n = self.constants.mode_count;
        let nr = self.context.operator.node_count();
        if state.mode_count() != n
            || state.amplitude_velocities.len() != n
            || state.node_count() != nr
            || state.bath_potential.len() != nr
        {
            return Err(SimError::InvalidConfiguration(format!(
                "state has {} modes and {} bath nodes, run expects {n} and {nr}",
                state.mode_count(),
                state.node_count()
            )));
        }
        self.state = state;
        Ok(())
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn constants(&self) -> &ProblemConstants {
        &self.constants
    }

    pub fn operator(&self) -> &Arc<DomainOperator> {
        &self.context.operator
    }

    pub fn time_step(&self) -> f64 {
        self.params.simulation.step_at_level(self.levels.level)
    }

    fn attempt(&mut self, level: u32) -> Result<Proposal> {
        self.context
            .prepare_level(level, &self.constants, &self.params.simulation)?;
        let propagator = self.context.propagator(level);
        let dt = propagator.dt();
        let state = &self.state;

        let problem = ContactProblem::new(
            state,
            &self.context.operator,
            propagator,
            &self.context.projector,
            &self.constants,
            &self.params.contact,
        )?;
        let solution = solve_contact(&problem, state.contact_points)?;

        let (z, vz) = centre_step(
            state.z,
            state.vz,
            solution.force,
            dt,
            self.constants.bond,
            self.constants.drop_mass,
        );
        let (bath_deflection, bath_potential) = propagator.advance(
            &state.bath_deflection,
            &state.bath_potential,
            &solution.pressure,
        );
        let next = SimulationState {
            amplitudes: problem.modes.amplitudes_under(&solution.pressure_amplitudes),
            amplitude_velocities: problem.modes.velocities_under(&solution.pressure_amplitudes),
            bath_deflection,
            bath_potential,
            z,
            vz,
            t: state.t + dt,
            step: state.step + 1,
            contact_points: solution.contact_points,
            contact_angle: solution.contact_angle,
        };

        let expected = state.z + dt * state.vz + 0.5 * dt * dt * self.previous_acceleration;
        let error_estimate = (z - expected).abs();
        if error_estimate > self.constants.tolerance {
            return Err(SimError::StepRejected {
                t: state.t,
                dt,
                reason: format!("height error {error_estimate:.3e} above tolerance"),
            });
        }
        // Unloaded nodes inside the patch may be skipped over at once.
        let jump = solution.contact_points.abs_diff(state.contact_points);
        let trapped = solution.contact_points - solution.loaded_points;
        if jump > 1 + trapped {
            return Err(SimError::StepRejected {
                t: state.t,
                dt,
                reason: format!(
                    "contact jumped from {} to {} nodes",
                    state.contact_points, solution.contact_points
                ),
            });
        }

        Ok(Proposal {
            acceleration: (vz - state.vz) / dt,
            state: next,
            solution,
            error_estimate,
        })
    }

    fn accept(&mut self, proposal: Proposal) {
        let Proposal {
            state,
            solution,
            error_estimate,
            acceleration,
        } = proposal;
        let dt = self.time_step();

        if solution.contact_points > 0 && self.impact.is_none() {
            self.impact = Some(ContactEvent {
                t: self.state.t,
                vz: self.state.vz,
            });
            info!("Impact at t={:.4} with vz={:.4}", self.state.t, self.state.vz);
        }
        if solution.contact_points == 0 && self.impact.is_some() && self.detachment.is_none() {
            self.detachment = Some(ContactEvent {
                t: state.t,
                vz: state.vz,
            });
            info!("Detachment at t={:.4} with vz={:.4}", state.t, state.vz);
        }
        self.max_patch_radius = self.max_patch_radius.max(solution.patch_radius);

        let heights = height_from_angle(&state.amplitudes, &[0.0, PI]);
        let summary = StepSummary {
            time_step: dt,
            level: self.levels.level,
            contact_points: solution.contact_points,
            loaded_points: solution.loaded_points,
            patch_radius: solution.patch_radius,
            regime: solution.regime,
            force: solution.force,
            pressure_amplitudes: solution.pressure_amplitudes,
            edge_pressure: solution.edge_pressure,
            error_estimate,
            bottom_height: state.z + heights[0],
            top_height: state.z + heights[1],
            equatorial_radius: radius_from_angle(&state.amplitudes, &[0.5 * PI])[0],
            mode_energy: mode_energy(&state.amplitudes, &state.amplitude_velocities),
        };
        debug!(
            "step {}: t={:.5}, z={:.5}, vz={:.5}, q={}, level={}",
            state.step, state.t, state.z, state.vz, state.contact_points, self.levels.level
        );

        self.previous_acceleration = acceleration;
        self.accepted += 1;
        self.levels.accept();
        self.trajectory.push(state.clone(), Some(summary));
        self.state = state;
    }

    /// Advances by one accepted step, refining the step size as needed.
    pub fn step(&mut self) -> Result<()> {
        if self.phase == RunPhase::Initialized {
            self.trajectory.push(self.state.clone(), None);
            self.phase = RunPhase::Stepping;
        }
        if self.phase != RunPhase::Stepping {
            return Err(SimError::InvalidConfiguration(format!(
                "cannot step a run in phase {:?}",
                self.phase
            )));
        }
        loop {
            let level = self.levels.level;
            match self.attempt(level) {
                Ok(proposal) => {
                    self.accept(proposal);
                    return Ok(());
                }
                Err(e) if retryable(&e) && level < self.params.simulation.max_refinements => {
                    self.rejected += 1;
                    warn!(
                        "Step at t={:.5} rejected at level {level}: {e}; refining",
                        self.state.t
                    );
                    self.levels.refine();
                }
                Err(e) => {
                    self.phase = RunPhase::ErrorTerminal;
                    return Err(e);
                }
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        if self.state.t >= self.params.simulation.final_time {
            return true;
        }
        if !self.params.simulation.stop_on_detachment || self.detachment.is_none() {
            return false;
        }
        let bottom = self.state.z + height_from_angle(&self.state.amplitudes, &[0.0])[0];
        self.state.contact_points == 0 && self.state.vz > 0.0 && bottom > 0.0
    }

    /// Steps to completion, persisting each accepted step when a writer is
    /// given. A terminal error is persisted before it is returned.
    pub fn run(&mut self, mut writer: Option<&mut RunWriter>) -> Result<RunSummary> {
        info!(
            "Starting run: We={:.4}, Bo={:.4e}, N={}, nr={}",
            self.constants.weber,
            self.constants.bond,
            self.constants.mode_count,
            self.context.operator.node_count()
        );
        if self.phase == RunPhase::Initialized {
            if let Some(w) = writer.as_deref_mut() {
                w.write_step(&self.state, None)?;
            }
        }
        while !self.is_complete() {
            if let Err(e) = self.step() {
                error!("Run failed at t={:.5}: {e}", self.state.t);
                if let Some(w) = writer.as_deref_mut() {
                    if let Err(write_err) = w.write_error(&e, &self.state) {
                        error!("Could not persist the error record: {write_err}");
                    }
                }
                return Err(e);
            }
            if let Some(w) = writer.as_deref_mut() {
                if let Some(entry) = self.trajectory.last() {
                    w.write_step(&entry.state, entry.summary.as_ref())?;
                }
            }
            if self.params.dstep_view > 0 && self.accepted % self.params.dstep_view == 0 {
                let s = &self.state;
                info!(
                    "CHECKPOINT: step={}, t={:.4}, z={:.4}, vz={:.4}, q={}",
                    s.step, s.t, s.z, s.vz, s.contact_points
                );
            }
        }
        self.phase = RunPhase::Completed;

        let summary = self.summary();
        if let Some(w) = writer {
            w.write_summary(&summary, &self.constants)?;
        }
        info!(
            "Run complete: {:?} after {} steps ({} rejected)",
            summary.outcome, summary.accepted_steps, summary.rejected_steps
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        let outcome = match (self.impact, self.detachment) {
            (None, _) => RunOutcome::NoContact,
            (Some(_), Some(_)) => RunOutcome::Rebound,
            (Some(_), None) => RunOutcome::Contact,
        };
        let (contact_time, restitution) = match (self.impact, self.detachment) {
            (Some(i), Some(d)) => (Some(d.t - i.t), Some(-d.vz / i.vz)),
            _ => (None, None),
        };
        RunSummary {
            outcome,
            impact: self.impact,
            detachment: self.detachment,
            contact_time,
            restitution,
            max_patch_radius: self.max_patch_radius,
            accepted_steps: self.accepted,
            rejected_steps: self.rejected,
            final_time: self.state.t,
            final_time_step: self.time_step(),
        }
    }
}
