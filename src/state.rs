use nalgebra::DVector;

use crate::contact::ContactRegime;

/// Full state of the coupled drop and bath, in drop units.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationState {
    // Shape modes l = 1..=N; entry 0 (the translation mode) stays zero.
    pub amplitudes: DVector<f64>,
    pub amplitude_velocities: DVector<f64>,
    // Bath surface samples on the radial grid.
    pub bath_deflection: DVector<f64>,
    pub bath_potential: DVector<f64>,
    // Centre of mass height above the undisturbed bath.
    pub z: f64,
    pub vz: f64,
    pub t: f64,
    pub step: usize,
    pub contact_points: usize,
    pub contact_angle: f64,
}

impl SimulationState {
    /// A spherical drop resting its bottom on a flat bath at rest.
    pub fn new(mode_count: usize, node_count: usize, initial_velocity: f64) -> SimulationState {
        SimulationState {
            amplitudes: DVector::zeros(mode_count),
            amplitude_velocities: DVector::zeros(mode_count),
            bath_deflection: DVector::zeros(node_count),
            bath_potential: DVector::zeros(node_count),
            z: 1.0,
            vz: initial_velocity,
            t: 0.0,
            step: 0,
            contact_points: 0,
            contact_angle: 0.0,
        }
    }

    pub fn mode_count(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn node_count(&self) -> usize {
        self.bath_deflection.len()
    }
}

// A step summary is what was computed while taking a single accepted step.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct StepSummary {
    pub time_step: f64,
    pub level: u32,
    pub contact_points: usize,
    pub loaded_points: usize,
    pub patch_radius: f64,
    pub regime: Option<ContactRegime>,
    pub force: f64,
    pub pressure_amplitudes: DVector<f64>,
    pub edge_pressure: f64,
    pub error_estimate: f64,
    // Heights of the poles relative to the undisturbed bath.
    pub bottom_height: f64,
    pub top_height: f64,
    pub equatorial_radius: f64,
    pub mode_energy: f64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct TrajectoryEntry {
    pub state: SimulationState,
    // Optional because the initial state has no step behind it.
    pub summary: Option<StepSummary>,
}

/// Append-only record of accepted states.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default)]
pub struct Trajectory {
    entries: Vec<TrajectoryEntry>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: SimulationState, summary: Option<StepSummary>) {
        self.entries.push(TrajectoryEntry { state, summary });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TrajectoryEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrajectoryEntry> {
        self.entries.iter()
    }

    /// Summaries of accepted steps, in order.
    pub fn summaries(&self) -> impl Iterator<Item = (&SimulationState, &StepSummary)> {
        self.entries
            .iter()
            .filter_map(|e| e.summary.as_ref().map(|s| (&e.state, s)))
    }
}
