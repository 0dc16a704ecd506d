pub mod projection;
pub mod shape;

/// Annulus areas of a uniform radial grid `r_i = i·dr`, `i < n`.
///
/// Each node owns the ring between its neighbours' midpoints, so the weights
/// integrate `∫ f(r) 2πr dr` over `[0, (n-1)·dr]` exactly for constant f.
pub fn annulus_areas(n: usize, dr: f64) -> Vec<f64> {
    let pi = std::f64::consts::PI;
    (0..n)
        .map(|i| {
            let r = i as f64 * dr;
            let inner = (r - 0.5 * dr).max(0.0);
            let outer = if i + 1 == n { r } else { r + 0.5 * dr };
            pi * (outer * outer - inner * inner)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn annuli_cover_the_disc() {
        let dr = 0.1;
        let n = 31;
        let total: f64 = annulus_areas(n, dr).iter().sum();
        let extent = (n - 1) as f64 * dr;
        assert_relative_eq!(total, std::f64::consts::PI * extent * extent, epsilon = 1e-12);
    }

    #[test]
    fn central_node_is_a_disc() {
        let a = annulus_areas(3, 0.2);
        assert_relative_eq!(a[0], std::f64::consts::PI * 0.01, epsilon = 1e-15);
    }
}
