use std::f64::consts::PI;

use super::legendre::legendre_with_derivative;

/// Gauss-Legendre nodes and weights on [-1, 1], nodes in ascending order.
///
/// Exact for polynomials of degree up to `2n - 1`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..n {
        // Tricomi's initial guess, then Newton.
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_with_derivative(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-16 {
                break;
            }
        }
        let (_, dp) = legendre_with_derivative(n, x);
        // Guess i sits near cos(small angle), i.e. descending order.
        nodes[n - 1 - i] = x;
        weights[n - 1 - i] = 2.0 / ((1.0 - x * x) * dp * dp);
    }
    (nodes, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_two() {
        for n in [1, 2, 5, 16, 42] {
            let (_, w) = gauss_legendre(n);
            assert_relative_eq!(w.iter().sum::<f64>(), 2.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn exact_for_high_degree_monomials() {
        let n = 8;
        let (x, w) = gauss_legendre(n);
        for degree in 0..(2 * n) {
            let integral: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(degree as i32)).sum();
            let exact = if degree % 2 == 1 {
                0.0
            } else {
                2.0 / (degree as f64 + 1.0)
            };
            assert_relative_eq!(integral, exact, epsilon = 1e-13);
        }
    }

    #[test]
    fn nodes_ascending_and_interior() {
        let (x, _) = gauss_legendre(21);
        assert!(x.windows(2).all(|w| w[0] < w[1]));
        assert!(x[0] > -1.0 && x[20] < 1.0);
    }
}
