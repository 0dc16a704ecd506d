/// Legendre polynomials `P_0(x)..=P_n(x)` by Bonnet's recurrence.
///
/// The recurrence is stable for |x| <= 1, including the poles x = ±1,
/// which is where the contact region of the drop lives.
pub fn legendre_all(n: usize, x: f64) -> Vec<f64> {
    let mut p = Vec::with_capacity(n + 1);
    p.push(1.0);
    if n == 0 {
        return p;
    }
    p.push(x);
    for l in 1..n {
        let lf = l as f64;
        let next = ((2.0 * lf + 1.0) * x * p[l] - lf * p[l - 1]) / (lf + 1.0);
        p.push(next);
    }
    p
}

/// `P_n(x)` together with its derivative `P_n'(x)`.
pub fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let p = legendre_all(n, x);
    let (pn, pm) = (p[n], p[n - 1]);
    let nf = n as f64;
    let denom = x * x - 1.0;
    let dp = if denom.abs() < 1e-300 {
        // P_n'(±1) = (±1)^(n+1) n(n+1)/2
        let sign = if x > 0.0 || n % 2 == 1 { 1.0 } else { -1.0 };
        sign * nf * (nf + 1.0) / 2.0
    } else {
        nf * (x * pn - pm) / denom
    };
    (pn, dp)
}

/// Evaluate `Σ_{l=1..N} c_l P_l(x)` where `coefficients[i]` multiplies `P_{i+1}`.
pub fn legendre_series(coefficients: &[f64], x: f64) -> f64 {
    let p = legendre_all(coefficients.len(), x);
    coefficients
        .iter()
        .zip(p.iter().skip(1))
        .map(|(c, p)| c * p)
        .sum()
}
