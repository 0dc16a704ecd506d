use std::f64::consts::PI;

use super::constants::{ProblemConstants, UnitConvention};

fn default_air_viscosity() -> f64 {
    // Dynamic viscosity of air at room temperature, g/(cm·s).
    1.825e-4
}

fn standard_gravity() -> f64 {
    // m/s² -> cm/s².
    100.0 * physical_constants::STANDARD_ACCELERATION_OF_GRAVITY
}

fn default_impact_angle() -> f64 {
    180.0
}

// All CGS.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct FluidProperties {
    pub density: f64,
    pub surface_tension: f64,
    pub kinematic_viscosity: f64,
    #[serde(default = "default_air_viscosity")]
    pub air_viscosity: f64,
    #[serde(default = "standard_gravity")]
    pub gravity: f64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SolidProperties {
    pub density: f64,
    pub surface_tension: f64,
    // Falls back to the bath liquid's when absent.
    #[serde(default)]
    pub kinematic_viscosity: Option<f64>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct ImpactConfig {
    // cm/s.
    pub speed: f64,
    // Degrees; 180 is a head-on fall.
    #[serde(default = "default_impact_angle")]
    pub angle: f64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct PhysicalParams {
    pub bath: FluidProperties,
    pub drop: SolidProperties,
    // Undeformed drop radius.
    pub radius: f64,
    pub impact: ImpactConfig,
    // Number of drop shape modes N.
    pub modes: usize,
    // Local error tolerance on the centre height, in drop radii.
    pub tolerance: f64,
}

impl PhysicalParams {
    pub fn drop_viscosity(&self) -> f64 {
        self.drop
            .kinematic_viscosity
            .unwrap_or(self.bath.kinematic_viscosity)
    }

    // T = sqrt(ρ_d R³ / σ_d), the drop's capillary time.
    pub fn time_scale(&self) -> f64 {
        (self.drop.density * self.radius.powi(3) / self.drop.surface_tension).sqrt()
    }

    pub fn units(&self) -> UnitConvention {
        let length = self.radius;
        let time = self.time_scale();
        let mass = self.drop.density * length.powi(3);
        UnitConvention {
            length,
            time,
            mass,
            velocity: length / time,
            pressure: self.drop.surface_tension / length,
            force: self.drop.surface_tension * length,
        }
    }

    pub fn weber(&self) -> f64 {
        self.drop.density * self.impact.speed.powi(2) * self.radius / self.drop.surface_tension
    }

    pub fn bond(&self) -> f64 {
        self.drop.density * self.bath.gravity * self.radius.powi(2) / self.drop.surface_tension
    }

    fn ohnesorge(&self, kinematic_viscosity: f64) -> f64 {
        kinematic_viscosity * (self.drop.density / (self.drop.surface_tension * self.radius)).sqrt()
    }

    pub fn drop_ohnesorge(&self) -> f64 {
        self.ohnesorge(self.drop_viscosity())
    }

    pub fn bath_ohnesorge(&self) -> f64 {
        self.ohnesorge(self.bath.kinematic_viscosity)
    }

    pub fn as_constants(&self) -> ProblemConstants {
        let units = self.units();
        // Only the vertical component of the impact velocity drives the
        // axisymmetric problem.
        let vertical_speed = self.impact.speed * self.impact.angle.to_radians().cos();
        ProblemConstants {
            weber: self.weber(),
            bond: self.bond(),
            drop_ohnesorge: self.drop_ohnesorge(),
            bath_ohnesorge: self.bath_ohnesorge(),
            density_ratio: self.bath.density / self.drop.density,
            surface_tension_ratio: self.bath.surface_tension / self.drop.surface_tension,
            air_viscosity_ratio: self.bath.air_viscosity
                / (self.bath.kinematic_viscosity * self.bath.density),
            mode_count: self.modes,
            tolerance: self.tolerance,
            impact_angle: self.impact.angle,
            impact_speed: self.impact.speed,
            initial_velocity: vertical_speed / units.velocity,
            drop_mass: 4.0 * PI / 3.0,
            units,
        }
    }
}

#[cfg(test)]
pub(crate) fn water_drop(modes: usize) -> PhysicalParams {
    PhysicalParams {
        bath: FluidProperties {
            density: 1.0,
            surface_tension: 72.20,
            kinematic_viscosity: 0.00978,
            air_viscosity: default_air_viscosity(),
            gravity: standard_gravity(),
        },
        drop: SolidProperties {
            density: 1.0,
            surface_tension: 72.20,
            kinematic_viscosity: None,
        },
        radius: 0.035,
        impact: ImpactConfig {
            speed: 44.52,
            angle: 180.0,
        },
        modes,
        tolerance: 5e-5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn water_drop_numbers() {
        let params = water_drop(21);
        let c = params.as_constants();
        assert_relative_eq!(c.weber, 44.52f64.powi(2) * 0.035 / 72.20, epsilon = 1e-12);
        assert_relative_eq!(c.bond, 980.665 * 0.035f64.powi(2) / 72.20, epsilon = 1e-6);
        assert_relative_eq!(c.drop_ohnesorge, c.bath_ohnesorge);
        assert_relative_eq!(c.density_ratio, 1.0);
        // Falling, so the initial velocity points down with magnitude sqrt(We).
        assert!(c.initial_velocity < 0.0);
        assert_relative_eq!(c.initial_velocity.abs(), c.weber.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn drop_viscosity_defaults_to_the_bath() {
        let mut params = water_drop(4);
        assert_eq!(params.drop_viscosity(), 0.00978);
        params.drop.kinematic_viscosity = Some(0.5);
        assert!(params.drop_ohnesorge() > params.bath_ohnesorge());
    }
}
