//! Offline generator for the DtN operator.
//!
//! The bath is a half-space truncated at `r = L` with a no-flux wall. Its
//! harmonic potentials are `J0(k r) e^{k z}` with `J1(k L) = 0`, so in the
//! Fourier-Bessel basis the DtN map is `diag(k)` and the surface Laplacian is
//! `diag(-k²)`. Collocating the basis on the grid gives the dense operators.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};

use super::{DomainKey, DomainOperator};
use crate::error::{Result, SimError};
use crate::geometry::annulus_areas;
use crate::math::bessel::{j0, j1_zeros};

// Singular values below this (relative) are dropped from the pseudo-inverse.
const PSEUDO_INVERSE_EPS: f64 = 1e-12;

pub fn generate(key: &DomainKey) -> Result<DomainOperator> {
    if key.domain_radius == 0 || key.points_per_radius == 0 {
        return Err(SimError::InvalidConfiguration(format!(
            "domain radius and resolution must be positive, got ({key})"
        )));
    }
    let nr = key.node_count();
    let m = key.truncation as usize;
    if m == 0 || m > nr {
        return Err(SimError::InvalidConfiguration(format!(
            "truncation must lie in 1..={nr}, got {m}"
        )));
    }

    let dr = key.spacing();
    let extent = key.extent();
    let radii = DVector::from_fn(nr, |i, _| i as f64 * dr);

    let mut wavenumbers = DVector::zeros(m);
    for (j, zero) in j1_zeros(m - 1).into_iter().enumerate() {
        wavenumbers[j + 1] = zero / extent;
    }
    debug!(
        "Fourier-Bessel wavenumbers up to {:.3} (grid Nyquist {:.3})",
        wavenumbers[m - 1],
        std::f64::consts::PI / dr
    );

    let basis = DMatrix::from_fn(nr, m, |i, j| j0(wavenumbers[j] * radii[i]));
    let basis_inverse = if m == nr {
        basis.clone().try_inverse().ok_or_else(|| {
            SimError::InvalidConfiguration(format!("Fourier-Bessel basis for ({key}) is singular"))
        })?
    } else {
        basis
            .clone()
            .svd(true, true)
            .pseudo_inverse(PSEUDO_INVERSE_EPS)
            .map_err(|e| SimError::InvalidConfiguration(e.to_string()))?
    };

    let dtn = &basis * DMatrix::from_diagonal(&wavenumbers) * &basis_inverse;
    let laplacian =
        &basis * DMatrix::from_diagonal(&wavenumbers.map(|k| -k * k)) * &basis_inverse;

    info!("Generated DtN operator ({key}): {nr} nodes, {m} modes");

    Ok(DomainOperator {
        key: *key,
        radii,
        dr,
        wavenumbers,
        basis,
        basis_inverse,
        dtn,
        laplacian,
        area_weights: DVector::from_vec(annulus_areas(nr, dr)),
    })
}
