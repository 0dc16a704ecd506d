pub mod parameters;

use std::{fs::File, io::Read, path::Path, path::PathBuf};

use log::warn;

use super::run::RunParams;
use crate::domain::DomainKey;
use crate::error::{Result, SimError};

use self::parameters::{
    constants::ProblemConstants,
    physical::PhysicalParams,
    simulation::{ContactParams, SimulationParams},
};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct DomainConfig {
    // In drop radii.
    pub domain_radius: u32,
    pub points_per_radius: u32,
    #[serde(default)]
    pub truncation: Option<u32>,
}

impl DomainConfig {
    pub fn key(&self) -> DomainKey {
        DomainKey::new(self.domain_radius, self.points_per_radius, self.truncation)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SetupConfig {
    pub domain: DomainConfig,
    #[serde(flatten)]
    pub physical: PhysicalParams,
    pub simulation: SimulationParams,
    #[serde(default)]
    pub contact: ContactParams,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl SetupConfig {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: SetupConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimError::InvalidConfiguration(msg));
        let p = &self.physical;

        for (name, value) in [
            ("bath.density", p.bath.density),
            ("bath.surface_tension", p.bath.surface_tension),
            ("drop.density", p.drop.density),
            ("drop.surface_tension", p.drop.surface_tension),
            ("radius", p.radius),
            ("tolerance", p.tolerance),
            ("simulation.final_time", self.simulation.final_time),
            ("simulation.time_step", self.simulation.time_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        for (name, value) in [
            ("bath.kinematic_viscosity", p.bath.kinematic_viscosity),
            ("bath.air_viscosity", p.bath.air_viscosity),
            ("bath.gravity", p.bath.gravity),
            ("impact.speed", p.impact.speed),
            ("simulation.initial_gap", self.simulation.initial_gap),
            ("drop.kinematic_viscosity", p.drop_viscosity()),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be non-negative, got {value}"));
            }
        }
        if p.modes < 2 {
            return invalid(format!("need at least 2 shape modes, got {}", p.modes));
        }
        if self.domain.domain_radius < 2 || self.domain.points_per_radius < 2 {
            return invalid(format!(
                "domain must span at least 2 drop radii at 2 points per radius, got {:?}",
                self.domain
            ));
        }
        let key = self.domain.key();
        if key.truncation == 0 || key.truncation as usize > key.node_count() {
            return invalid(format!(
                "truncation must lie in 1..={}, got {}",
                key.node_count(),
                key.truncation
            ));
        }
        if !(90.0..=270.0).contains(&p.impact.angle) {
            return invalid(format!(
                "impact angle {} does not point towards the bath",
                p.impact.angle
            ));
        }
        let cusp = &self.contact.cusp;
        if !(0.0..=1.0).contains(&cusp.saturation_fraction)
            || !(0.0..1.0).contains(&cusp.min_cosine)
            || cusp.damping < 0.0
        {
            return invalid(format!("cusp regularisation out of range: {cusp:?}"));
        }
        if self.contact.max_iterations == 0 {
            return invalid("contact.max_iterations must be positive".to_string());
        }
        if p.impact.angle != 180.0 {
            warn!(
                "Oblique impact at {}° reduced to its vertical component",
                p.impact.angle
            );
        }
        Ok(())
    }

    pub fn problem_constants(&self) -> ProblemConstants {
        self.physical.as_constants()
    }

    pub fn run_params(&self, dstep_view: usize) -> RunParams {
        RunParams {
            domain: self.domain.key(),
            simulation: self.simulation.clone(),
            contact: self.contact.clone(),
            dstep_view,
        }
    }

    pub fn print(&self) {
        let p = &self.physical;
        let c = self.problem_constants();
        let key = self.domain.key();
        println!(
            "\
Physical parameters:
  Drop:
    Radius: {radius} cm
    Density: {rho_d} g/cm³
    Surface tension: {sigma_d} dyn/cm
    Kinematic viscosity: {nu_d} cm²/s
  Bath:
    Density: {rho_b} g/cm³
    Surface tension: {sigma_b} dyn/cm
    Kinematic viscosity: {nu_b} cm²/s
    Gravity: {g} cm/s²
  Impact:
    Speed: {u0} cm/s
    Angle: {ang}°

Derived parameters:
  Weber: {we:.4}
  Bond: {bo:.4e}
  Ohnesorge (drop, bath): {oh_d:.4e}, {oh_b:.4e}
  Capillary time: {t:.4e} s
  Initial velocity: {v0:.4} R/T

Discretisation:
  Shape modes: {n}
  Bath grid: {nr} nodes over {d} R, {m} radial modes
  Time step: {dt} T ({dt_s:.3e} s), up to {levels} refinements
  Initial gap: {gap} R
  Final time: {tf} T",
            radius = p.radius,
            rho_d = p.drop.density,
            sigma_d = p.drop.surface_tension,
            nu_d = p.drop_viscosity(),
            rho_b = p.bath.density,
            sigma_b = p.bath.surface_tension,
            nu_b = p.bath.kinematic_viscosity,
            g = p.bath.gravity,
            u0 = p.impact.speed,
            ang = p.impact.angle,
            we = c.weber,
            bo = c.bond,
            oh_d = c.drop_ohnesorge,
            oh_b = c.bath_ohnesorge,
            t = c.units.time,
            v0 = c.initial_velocity,
            n = p.modes,
            nr = key.node_count(),
            d = key.domain_radius,
            m = key.truncation,
            dt = self.simulation.time_step,
            dt_s = self.simulation.time_step * c.units.time,
            levels = self.simulation.max_refinements,
            gap = self.simulation.initial_gap,
            tf = self.simulation.final_time,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "
domain: { domain_radius: 8, points_per_radius: 20 }
bath: { density: 1.0, surface_tension: 72.20, kinematic_viscosity: 0.00978 }
drop: { density: 1.0, surface_tension: 72.20 }
radius: 0.035
impact: { speed: 44.52 }
modes: 21
tolerance: 5.0e-5
simulation: { final_time: 8.0 }
";

    #[test]
    fn parses_with_defaults() {
        let config = SetupConfig::from_yaml_str(EXAMPLE).unwrap();
        assert_eq!(config.domain.key().node_count(), 161);
        assert_eq!(config.domain.key().truncation, 161);
        assert_eq!(config.physical.impact.angle, 180.0);
        assert_eq!(config.physical.bath.air_viscosity, 1.825e-4);
        assert!((config.physical.bath.gravity - 980.665).abs() < 1e-9);
        assert_eq!(config.simulation.time_step, 0.01);
        assert_eq!(config.simulation.max_refinements, 8);
        assert!(config.simulation.stop_on_detachment);
        assert_eq!(config.simulation.initial_gap, 0.0);
        assert_eq!(config.contact.max_iterations, 40);
        assert_eq!(config.contact.cusp.small_patch_points, 2);
        assert_eq!(config.contact.cusp.min_cosine, 0.05);
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn overrides_nested_values() {
        let yaml = format!(
            "{EXAMPLE}contact: {{ max_iterations: 12, cusp: {{ damping: 1.0e-6 }} }}\noutput_dir: runs/a\n"
        );
        let config = SetupConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.contact.max_iterations, 12);
        assert_eq!(config.contact.cusp.damping, 1e-6);
        assert_eq!(config.contact.cusp.saturation_fraction, 0.9);
        assert_eq!(config.output_dir, Some(PathBuf::from("runs/a")));
    }

    #[test]
    fn rejects_invalid_values() {
        for bad in [
            EXAMPLE.replace("radius: 0.035", "radius: -0.035"),
            EXAMPLE.replace("modes: 21", "modes: 1"),
            EXAMPLE.replace("points_per_radius: 20", "points_per_radius: 20, truncation: 500"),
            EXAMPLE.replace("speed: 44.52", "speed: 44.52, angle: 45.0"),
            EXAMPLE.replace("final_time: 8.0", "final_time: 8.0, initial_gap: -0.1"),
        ] {
            assert!(matches!(
                SetupConfig::from_yaml_str(&bad),
                Err(SimError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            SetupConfig::from_yaml_str("domain: [1, 2"),
            Err(SimError::Yaml(_))
        ));
    }
}
