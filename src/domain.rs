//! The bath's Dirichlet-to-Neumann operator on a radial grid.

pub mod dtn;
pub mod propagator;
pub mod store;

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SimError};

/// Identifies a cached operator: domain size and resolution, both in drop
/// radii, and the number of Fourier-Bessel modes kept.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainKey {
    pub domain_radius: u32,
    pub points_per_radius: u32,
    pub truncation: u32,
}

impl DomainKey {
    /// A key keeping every mode the grid can carry unless told otherwise.
    pub fn new(domain_radius: u32, points_per_radius: u32, truncation: Option<u32>) -> Self {
        let nr = domain_radius * points_per_radius + 1;
        DomainKey {
            domain_radius,
            points_per_radius,
            truncation: truncation.unwrap_or(nr),
        }
    }

    pub fn node_count(&self) -> usize {
        (self.domain_radius * self.points_per_radius) as usize + 1
    }

    pub fn spacing(&self) -> f64 {
        1.0 / self.points_per_radius as f64
    }

    pub fn extent(&self) -> f64 {
        self.domain_radius as f64
    }

    pub fn file_stem(&self) -> String {
        format!(
            "dtn_D{}_ppr{}_M{}",
            self.domain_radius, self.points_per_radius, self.truncation
        )
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "domain radius {} R, {} points per radius, {} modes",
            self.domain_radius, self.points_per_radius, self.truncation
        )
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct DomainOperator {
    pub key: DomainKey,
    // Grid nodes r_i = i·dr.
    pub radii: DVector<f64>,
    pub dr: f64,
    // Fourier-Bessel wavenumbers, k_0 = 0.
    pub wavenumbers: DVector<f64>,
    // basis[(i, j)] = J0(k_j r_i).
    pub basis: DMatrix<f64>,
    pub basis_inverse: DMatrix<f64>,
    // Surface potential -> normal velocity.
    pub dtn: DMatrix<f64>,
    // Axisymmetric surface Laplacian.
    pub laplacian: DMatrix<f64>,
    pub area_weights: DVector<f64>,
}

impl DomainOperator {
    pub fn node_count(&self) -> usize {
        self.radii.len()
    }

    pub fn mode_count(&self) -> usize {
        self.wavenumbers.len()
    }

    pub fn extent(&self) -> f64 {
        self.radii[self.radii.len() - 1]
    }

    /// DtN matrix-vector product.
    pub fn apply(&self, samples: &DVector<f64>) -> DVector<f64> {
        &self.dtn * samples
    }

    /// Coefficients of a surface field in the radial Fourier-Bessel basis.
    pub fn bath_amplitudes(&self, samples: &DVector<f64>) -> DVector<f64> {
        &self.basis_inverse * samples
    }

    /// Checks the operator against the grid a run declares.
    pub fn validate(&self, expected: &DomainKey) -> Result<()> {
        if self.key != *expected {
            return Err(SimError::OperatorMismatch(format!(
                "operator built for ({}) but run declares ({})",
                self.key, expected
            )));
        }
        let nr = expected.node_count();
        let m = expected.truncation as usize;
        let shapes = [
            ("radii", (self.radii.len(), 1), (nr, 1)),
            ("wavenumbers", (self.wavenumbers.len(), 1), (m, 1)),
            ("basis", self.basis.shape(), (nr, m)),
            ("basis_inverse", self.basis_inverse.shape(), (m, nr)),
            ("dtn", self.dtn.shape(), (nr, nr)),
            ("laplacian", self.laplacian.shape(), (nr, nr)),
            ("area_weights", (self.area_weights.len(), 1), (nr, 1)),
        ];
        for (name, got, want) in shapes {
            if got != want {
                return Err(SimError::OperatorMismatch(format!(
                    "{name} has shape {got:?}, expected {want:?} for {expected}"
                )));
            }
        }
        if (self.dr - expected.spacing()).abs() > 1e-12 {
            return Err(SimError::OperatorMismatch(format!(
                "grid spacing {} does not match {}",
                self.dr,
                expected.spacing()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_geometry() {
        let key = DomainKey::new(8, 12, None);
        assert_eq!(key.node_count(), 97);
        assert_eq!(key.truncation, 97);
        assert_eq!(key.file_stem(), "dtn_D8_ppr12_M97");
        assert!((key.spacing() - 1.0 / 12.0).abs() < 1e-15);
    }

    #[test]
    fn resolution_mismatch_is_reported() {
        let op = dtn::generate(&DomainKey::new(3, 4, None)).unwrap();
        assert!(op.validate(&DomainKey::new(3, 4, None)).is_ok());
        assert!(matches!(
            op.validate(&DomainKey::new(3, 5, None)),
            Err(SimError::OperatorMismatch(_))
        ));
    }

    #[test]
    fn tampered_shapes_are_reported() {
        let key = DomainKey::new(2, 4, None);
        let mut op = dtn::generate(&key).unwrap();
        op.dtn = DMatrix::zeros(3, 3);
        assert!(matches!(
            op.validate(&key),
            Err(SimError::OperatorMismatch(_))
        ));
    }
}
