/// CGS size of one drop unit of each quantity.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct UnitConvention {
    // cm
    pub length: f64,
    // s
    pub time: f64,
    // g
    pub mass: f64,
    // cm/s
    pub velocity: f64,
    // dyn/cm²
    pub pressure: f64,
    // dyn
    pub force: f64,
}

/// Nondimensional groups of one impact problem.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct ProblemConstants {
    pub units: UnitConvention,
    pub weber: f64,
    pub bond: f64,
    pub drop_ohnesorge: f64,
    pub bath_ohnesorge: f64,
    // ρ_bath / ρ_drop
    pub density_ratio: f64,
    // σ_bath / σ_drop
    pub surface_tension_ratio: f64,
    // μ_air / μ_bath. Recorded with the results only; the air layer under
    // the drop is not modelled.
    pub air_viscosity_ratio: f64,
    pub mode_count: usize,
    pub tolerance: f64,
    // Degrees.
    pub impact_angle: f64,
    // cm/s.
    pub impact_speed: f64,
    // Vertical, in R/T; negative when falling.
    pub initial_velocity: f64,
    pub drop_mass: f64,
}

impl ProblemConstants {
    /// Surface tension to inertia ratio of the bath's free-surface equation.
    pub fn bath_capillarity(&self) -> f64 {
        self.surface_tension_ratio / self.density_ratio
    }
}
