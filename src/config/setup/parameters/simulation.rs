fn default_time_step() -> f64 {
    0.01
}

fn default_max_refinements() -> u32 {
    8
}

fn default_true() -> bool {
    true
}

fn default_max_iterations() -> usize {
    40
}

// Times in drop capillary units T.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub final_time: f64,
    // Coarsest step; refined steps are time_step / 2^level.
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u32,
    #[serde(default = "default_true")]
    pub stop_on_detachment: bool,
    // Height of the drop's bottom above the bath at t = 0, in R.
    #[serde(default)]
    pub initial_gap: f64,
}

impl SimulationParams {
    pub fn step_at_level(&self, level: u32) -> f64 {
        self.time_step / 2f64.powi(level as i32)
    }
}

/// Regularisation of the near-singular contact systems.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CuspRegularization {
    // Patches this small are solved in the regularised regime.
    pub small_patch_points: usize,
    // Patch radius, as a fraction of the footprint, beyond which the drop
    // surface is too steep for the standard solve.
    pub saturation_fraction: f64,
    // Tikhonov weight relative to ‖K‖_F.
    pub damping: f64,
    // Floor on cos θ in the patch solid angle.
    pub min_cosine: f64,
}

impl Default for CuspRegularization {
    fn default() -> Self {
        CuspRegularization {
            small_patch_points: 2,
            saturation_fraction: 0.9,
            damping: 1e-8,
            min_cosine: 0.05,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct ContactParams {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub cusp: CuspRegularization,
}

impl Default for ContactParams {
    fn default() -> Self {
        ContactParams {
            max_iterations: default_max_iterations(),
            cusp: CuspRegularization::default(),
        }
    }
}
