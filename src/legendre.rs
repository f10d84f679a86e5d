//! # Legendre transform tools
//!
//! A drift-cell hit at `(x, y)` with drift radius `r` is seen, for every orientation
//! `θ`, as two dual-space values:
//!
//! ```text
//! concave(θ) = x·cos θ + y·sin θ + r
//! convex(θ)  = x·cos θ + y·sin θ − r
//! ```
//!
//! A straight track `x·cos θ + y·sin θ = ρ` tangent to the drift circle satisfies
//! `ρ = concave(θ)` or `ρ = convex(θ)`. Accumulating these curves in a `(θ, ρ)`
//! histogram and searching its maxima is the Hough-like voting used by the line
//! finder. At `θ = 0` and `θ = π/2` the same values give the `x` and `y` extents of
//! a circle, which is how the circle finder fills its marginal histograms.
//!
//! [`LtGaussFunc`] is the smoothing kernel used to spread a vote over the
//! neighbouring bins of a `(θ, ρ)` map.
use serde::{Deserialize, Serialize};

/// Pair of dual-space values of a hit at a given orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LtResult {
    pub concave: f64,
    pub convex: f64,
}

/// Legendre transform of a drift circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegendreTransform {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl LegendreTransform {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        LegendreTransform { x, y, r }
    }

    /// Evaluate the transform at orientation `theta` (radians).
    #[inline]
    pub fn eval(&self, theta: f64) -> LtResult {
        let (st, ct) = theta.sin_cos();
        let rho = self.x * ct + self.y * st;
        LtResult {
            concave: rho + self.r,
            convex: rho - self.r,
        }
    }
}

/// Two dimensional Gaussian kernel in `(θ, r)` space.
///
/// `g(θ, r) = exp(-½ ((θ-θ0)/Δθ)² - ½ ((r-r0)/Δr)²)`, which is 1 at the kernel
/// center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LtGaussFunc {
    pub t0: f64,
    pub dt: f64,
    pub r0: f64,
    pub dr: f64,
}

impl LtGaussFunc {
    pub fn new(t0: f64, dt: f64, r0: f64, dr: f64) -> Self {
        LtGaussFunc { t0, dt, r0, dr }
    }

    #[inline]
    pub fn eval(&self, t: f64, r: f64) -> f64 {
        let ut = (t - self.t0) / self.dt;
        let ur = (r - self.r0) / self.dr;
        (-0.5 * (ut * ut + ur * ur)).exp()
    }

    /// Half width, in units of the kernel sigma, beyond which the kernel falls under
    /// `threshold` along one axis.
    pub fn reach(threshold: f64) -> f64 {
        (-2.0 * threshold.ln()).sqrt()
    }
}

#[cfg(test)]
mod legendre_tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_eval_axes() {
        let lt = LegendreTransform::new(3.0, -4.0, 1.5);
        let at0 = lt.eval(0.0);
        assert_relative_eq!(at0.concave, 4.5);
        assert_relative_eq!(at0.convex, 1.5);
        let at90 = lt.eval(FRAC_PI_2);
        assert_relative_eq!(at90.concave, -2.5, epsilon = 1e-12);
        assert_relative_eq!(at90.convex, -5.5, epsilon = 1e-12);
    }

    #[test]
    fn test_tangent_line_satisfies_transform() {
        // line y = 2 is tangent to the drift circle centred at (7, 0) with radius 2
        let lt = LegendreTransform::new(7.0, 0.0, 2.0);
        let v = lt.eval(FRAC_PI_2);
        assert!((v.concave - 2.0).abs() < 1e-12 || (v.convex - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gauss_kernel() {
        let g = LtGaussFunc::new(1.0, 0.01, 20.0, 0.5);
        assert_relative_eq!(g.eval(1.0, 20.0), 1.0);
        assert_relative_eq!(g.eval(1.01, 20.0), (-0.5f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(g.eval(1.0, 21.0), (-2.0f64).exp(), epsilon = 1e-12);
        let k = LtGaussFunc::reach(0.05);
        assert_relative_eq!(g.eval(1.0 + k * 0.01, 20.0), 0.05, epsilon = 1e-12);
    }
}
