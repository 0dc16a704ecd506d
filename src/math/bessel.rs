use std::f64::consts::{PI, TAU};

/// Bessel function of the first kind `J_n(x)` for integer order.
///
/// Uses Bessel's integral `J_n(x) = (1/2π) ∫_0^{2π} cos(nτ - x sin τ) dτ`.
/// The integrand is periodic, so the trapezoid rule converges geometrically
/// once the node count exceeds `|x|` by a few Airy widths (~ x^(1/3)).
pub fn bessel_j(n: u32, x: f64) -> f64 {
    let ax = x.abs();
    let m = (ax + 20.0 * (1.0 + ax.cbrt())).ceil() as usize + n as usize + 8;
    let h = TAU / m as f64;
    let nf = n as f64;
    let sum: f64 = (0..m)
        .map(|k| {
            let tau = k as f64 * h;
            (nf * tau - x * tau.sin()).cos()
        })
        .sum();
    sum / m as f64
}

pub fn j0(x: f64) -> f64 {
    bessel_j(0, x)
}

pub fn j1(x: f64) -> f64 {
    bessel_j(1, x)
}

/// The first `count` positive zeros of `J_1`.
pub fn j1_zeros(count: usize) -> Vec<f64> {
    (1..=count)
        .map(|s| {
            // McMahon's expansion for J_1 (mu = 4).
            let beta = (s as f64 + 0.25) * PI;
            let mut x = beta - 0.375 / beta + 0.0234375 / beta.powi(3);
            for _ in 0..50 {
                let f = j1(x);
                let df = j0(x) - f / x;
                let dx = f / df;
                x -= dx;
                if dx.abs() < 1e-14 * x {
                    break;
                }
            }
            x
        })
        .collect()
}
