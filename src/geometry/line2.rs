//! # Straight lines in the tracking plane
//!
//! A [`Line2`] is stored in its normalised implicit form `a·x + b·y + c = 0`
//! (`a² + b² = 1`, `b ≥ 0`) together with its Legendre parameters `(θ, r)`:
//!
//! ```text
//! x·cos θ + y·sin θ = r        with θ ∈ [0, π)
//! ```
//!
//! The reference point (curvilinear origin) is the foot of the perpendicular from
//! the origin, `(r cos θ, r sin θ)`, and the curve runs along `(-b, a)`.
use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Matrix2, SymmetricEigen};
use serde::{Deserialize, Serialize};

use super::curves::Curve2;
use super::{Point2, Vector2};
use crate::constants::LENGTH_EPS;
use crate::lttc_errors::LttcError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line2 {
    a: f64,
    b: f64,
    c: f64,
    theta: f64,
    r: f64,
}

impl Line2 {
    /// Build a line from its implicit coefficients `a·x + b·y + c = 0`.
    ///
    /// Arguments
    /// -----------------
    /// * `a`, `b`, `c`: implicit coefficients, not necessarily normalised.
    ///
    /// Return
    /// ----------
    /// * The normalised line, or [`LttcError::InvalidLine`] when `(a, b)` is null
    ///   or one of the coefficients is not finite.
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, LttcError> {
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(LttcError::InvalidLine(format!(
                "non finite coefficients ({a}, {b}, {c})"
            )));
        }
        let h = a.hypot(b);
        if h < LENGTH_EPS {
            return Err(LttcError::InvalidLine("null (a, b) normal".into()));
        }
        let (mut a, mut b, mut c) = (a / h, b / h, c / h);
        if b.abs() < 1e-15 {
            b = 0.0;
        }
        if b < 0.0 || (b == 0.0 && a < 0.0) {
            a = -a;
            b = -b;
            c = -c;
        }
        let theta = b.atan2(a);
        Ok(Line2 {
            a,
            b,
            c,
            theta,
            r: -c,
        })
    }

    /// Build the line through `position` with direction `direction`.
    pub fn from_point_direction(position: &Point2, direction: &Vector2) -> Result<Self, LttcError> {
        let norm = direction.norm();
        if !norm.is_finite() || norm < LENGTH_EPS {
            return Err(LttcError::InvalidLine("null direction".into()));
        }
        let u = direction / norm;
        let n = Vector2::new(u.y, -u.x);
        Line2::new(n.x, n.y, -n.dot(&position.coords))
    }

    /// Build the line passing through `start` and `stop`.
    pub fn make_from_start_stop(start: &Point2, stop: &Point2) -> Result<Self, LttcError> {
        Line2::from_point_direction(start, &(stop - start))
    }

    /// Build a line from its Legendre parameters.
    ///
    /// `theta` must lie in `[0, π]`; `r` may be negative.
    pub fn make_from_theta_r(theta: f64, r: f64) -> Result<Self, LttcError> {
        if !(0.0..=PI).contains(&theta) || !r.is_finite() {
            return Err(LttcError::InvalidLine(format!(
                "invalid Legendre parameters (theta={theta}, r={r})"
            )));
        }
        let (st, ct) = theta.sin_cos();
        Line2::new(ct, st, -r)
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    /// Unit direction of the line, `(-b, a)`.
    pub fn direction(&self) -> Vector2 {
        Vector2::new(-self.b, self.a)
    }

    /// Unit normal of the line, `(a, b)`.
    pub fn normal(&self) -> Vector2 {
        Vector2::new(self.a, self.b)
    }

    pub fn is_horizontal(&self, tolerance: f64) -> bool {
        self.a.abs() < tolerance
    }

    pub fn is_vertical(&self, tolerance: f64) -> bool {
        self.b.abs() < tolerance
    }

    /// Compare two lines through their Legendre parameters.
    pub fn is_same(&self, other: &Line2, r_tolerance: f64, theta_tolerance: f64) -> bool {
        (self.r - other.r).abs() <= r_tolerance && (self.theta - other.theta).abs() <= theta_tolerance
    }

    /// Signed distance from `p` to the line (positive on the side of the normal).
    pub fn signed_distance(&self, p: &Point2) -> f64 {
        self.a * p.x + self.b * p.y + self.c
    }

    pub fn distance(&self, p: &Point2) -> f64 {
        self.signed_distance(p).abs()
    }

    pub fn orthogonal_projection(&self, p: &Point2) -> Point2 {
        p - self.signed_distance(p) * self.normal()
    }

    /// Curvilinear abscissa of the orthogonal projection of `p`.
    pub fn curvilinear(&self, p: &Point2) -> f64 {
        (p - self.reference_point()).dot(&self.direction())
    }

    /// Unique intersection with another line, `None` when they are parallel.
    pub fn intersection(&self, other: &Line2) -> Option<Point2> {
        let den = self.a * other.b - self.b * other.a;
        if den.abs() < 1e-14 {
            return None;
        }
        let x0 = (self.b * other.c - self.c * other.b) / den;
        let y0 = (self.c * other.a - self.a * other.c) / den;
        Some(Point2::new(x0, y0))
    }

    /// Line orthogonal to this one passing through `p`.
    pub fn make_perp(&self, p: &Point2) -> Result<Line2, LttcError> {
        Line2::from_point_direction(p, &self.normal())
    }

    /// Total least squares line through a set of points.
    ///
    /// The normal is the eigenvector of the smallest eigenvalue of the scatter matrix
    /// around the centroid.
    ///
    /// Arguments
    /// -----------------
    /// * `points`: at least two distinct points.
    ///
    /// Return
    /// ----------
    /// * The orthogonal-distance fitted line, or [`LttcError::FitFailed`].
    pub fn fit(points: &[Point2]) -> Result<Line2, LttcError> {
        if points.len() < 2 {
            return Err(LttcError::FitFailed(format!(
                "line fit needs at least 2 points, got {}",
                points.len()
            )));
        }
        let n = points.len() as f64;
        let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
        let mut scatter = Matrix2::zeros();
        for p in points {
            let d = p.coords - centroid;
            scatter += d * d.transpose();
        }
        if scatter.trace() < LENGTH_EPS {
            return Err(LttcError::FitFailed("coincident points".into()));
        }
        let eig = SymmetricEigen::new(scatter);
        let imin = if eig.eigenvalues[0] <= eig.eigenvalues[1] {
            0
        } else {
            1
        };
        let normal = eig.eigenvectors.column(imin).into_owned();
        Line2::new(normal.x, normal.y, -normal.dot(&centroid))
    }
}

impl Curve2 for Line2 {
    fn reference_point(&self) -> Point2 {
        Point2::new(self.r * self.theta.cos(), self.r * self.theta.sin())
    }

    fn is_valid(&self) -> bool {
        [self.a, self.b, self.c, self.theta, self.r]
            .iter()
            .all(|v| v.is_finite())
    }

    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        if !self.is_valid() {
            return Err(LttcError::InvalidCurve("line is not valid".into()));
        }
        Ok(self.reference_point() + s * self.direction())
    }
}

impl fmt::Display for Line2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            let rp = self.reference_point();
            let d = self.direction();
            writeln!(f, "Line2")?;
            writeln!(f, "|-- a = {}", self.a)?;
            writeln!(f, "|-- b = {}", self.b)?;
            writeln!(f, "|-- c = {}", self.c)?;
            writeln!(f, "|-- theta = {}", self.theta)?;
            writeln!(f, "|-- r = {}", self.r)?;
            writeln!(f, "|-- reference = ({}, {})", rp.x, rp.y)?;
            write!(f, "`-- direction = ({}, {})", d.x, d.y)
        } else {
            write!(f, "Line2(theta={:.6}, r={:.3})", self.theta, self.r)
        }
    }
}
