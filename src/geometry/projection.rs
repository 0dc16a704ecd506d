use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use crate::math::{legendre::legendre_all, quadrature::gauss_legendre};

/// Projects surface fields onto the truncated Legendre basis `P_1..=P_N`.
pub struct Projector {
    mode_count: usize,
    angles: Vec<f64>,
    weights: Vec<f64>,
    // legendre[(l, k)] = P_l(cos θ_k), rows l = 0..=N.
    legendre: DMatrix<f64>,
}

impl Projector {
    pub fn new(mode_count: usize) -> Self {
        let (nodes, weights) = gauss_legendre(2 * mode_count.max(1));
        let mut legendre = DMatrix::zeros(mode_count + 1, nodes.len());
        for (k, mu) in nodes.iter().enumerate() {
            for (l, p) in legendre_all(mode_count, *mu).into_iter().enumerate() {
                legendre[(l, k)] = p;
            }
        }
        Projector {
            mode_count,
            angles: nodes.iter().map(|mu| mu.acos()).collect(),
            weights,
            legendre,
        }
    }

    pub fn mode_count(&self) -> usize {
        self.mode_count
    }

    /// Polar angles of the projection grid.
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// `A_l = (2l+1)/2 ∫ f(μ) P_l(μ) dμ` from samples on the grid angles.
    ///
    /// The `l = 0` content of `f` is dropped, so this is an exact left inverse
    /// of `radius_from_angle` on the same grid.
    pub fn project(&self, samples: &[f64]) -> DVector<f64> {
        assert_eq!(
            samples.len(),
            self.angles.len(),
            "samples must live on the projection grid"
        );
        DVector::from_fn(self.mode_count, |i, _| {
            let l = i + 1;
            let integral: f64 = samples
                .iter()
                .zip(&self.weights)
                .enumerate()
                .map(|(k, (f, w))| f * w * self.legendre[(l, k)])
                .sum();
            0.5 * (2.0 * l as f64 + 1.0) * integral
        })
    }

    /// Linear map from pressure samples on the contact patch to pressure mode
    /// amplitudes, `Π (N × q)`.
    ///
    /// Node j carries the bath annulus `area_weights[j]`, which covers a solid
    /// angle `w_j / (R_j² cos θ_j)` on the drop. `min_cosine` bounds the
    /// slope factor for patches that reach the drop's equator.
    pub fn patch_matrix(
        &self,
        cosines: &[f64],
        radii: &[f64],
        area_weights: &[f64],
        min_cosine: f64,
    ) -> DMatrix<f64> {
        let q = cosines.len();
        let floor = min_cosine.max(1e-12);
        let mut pi_mat = DMatrix::zeros(self.mode_count, q);
        for j in 0..q {
            let solid_angle = area_weights[j] / (radii[j] * radii[j] * cosines[j].max(floor));
            let p = legendre_all(self.mode_count, cosines[j]);
            for i in 0..self.mode_count {
                let l = (i + 1) as f64;
                pi_mat[(i, j)] = (2.0 * l + 1.0) / (4.0 * PI) * p[i + 1] * solid_angle;
            }
        }
        pi_mat
    }

    pub fn project_patch(
        &self,
        pressure: &[f64],
        cosines: &[f64],
        radii: &[f64],
        area_weights: &[f64],
        min_cosine: f64,
    ) -> DVector<f64> {
        self.patch_matrix(cosines, radii, area_weights, min_cosine)
            * DVector::from_column_slice(pressure)
    }
}
