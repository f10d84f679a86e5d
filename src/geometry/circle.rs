//! # Circles and the three-point circle fit
//!
//! A [`Circle`] is a center and a non-negative radius. A circle that has not been
//! fitted (or whose fit failed) carries the invalid sentinel in every field and
//! must be rejected by [`Circle::is_valid`] before being evaluated.
//!
//! ## Three-point fit
//!
//! The circumcircle of `(p1, p2, p3)` is computed in the frame of `p1`:
//!
//! ```text
//! b = p2 - p1,  c = p3 - p1,  D = 2 (b × c)
//! center = p1 + ( c.y |b|² - b.y |c|² ,  b.x |c|² - c.x |b|² ) / D
//! ```
//!
//! Both [`Circle::make_circle`] and [`Circle::build_circle`] share the same
//! degeneracy policy, see [`are_aligned`].
use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::curves::Curve2;
use super::{cross, invalid_point2, is_valid_point, Point2, Vector2};
use crate::constants::INVALID_REAL;
use crate::lttc_errors::LttcError;

/// Scale-invariant collinearity test of three points.
///
/// The points are aligned when `|(p2 - p1) × (p3 - p1)| <= tolerance · L²`, with `L`
/// the longest side of the triangle. Coincident points are always aligned.
///
/// Arguments
/// -----------------
/// * `p1`, `p2`, `p3`: the three points.
/// * `tolerance`: relative tolerance (see [`crate::constants::DEFAULT_COLLINEARITY_TOLERANCE`]).
///
/// Return
/// ----------
/// * `true` if no reliable circle can be built through the three points.
pub fn are_aligned(p1: &Point2, p2: &Point2, p3: &Point2, tolerance: f64) -> bool {
    let b = p2 - p1;
    let c = p3 - p1;
    let l2 = b
        .norm_squared()
        .max(c.norm_squared())
        .max((p3 - p2).norm_squared());
    if !(l2 > 0.0) {
        return true;
    }
    cross(&b, &c).abs() <= tolerance * l2
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    center: Point2,
    radius: f64,
}

impl Default for Circle {
    fn default() -> Self {
        Circle::invalid()
    }
}

impl Circle {
    /// Build a circle, rejecting negative or non-finite parameters.
    pub fn new(center: Point2, radius: f64) -> Result<Self, LttcError> {
        if !is_valid_point(&center) || !radius.is_finite() || radius < 0.0 {
            return Err(LttcError::InvalidCurve(format!(
                "invalid circle parameters (center=({}, {}), radius={radius})",
                center.x, center.y
            )));
        }
        Ok(Circle { center, radius })
    }

    /// The "not yet fitted" circle.
    pub fn invalid() -> Self {
        Circle {
            center: invalid_point2(),
            radius: INVALID_REAL,
        }
    }

    pub fn center(&self) -> Point2 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Circumcircle of three points.
    ///
    /// Return
    /// ----------
    /// * The circle through the three points, or [`Circle::invalid`] when they are
    ///   aligned within `tolerance`.
    ///
    /// See also
    /// ------------
    /// * [`Circle::build_circle`] – same fit reporting the degeneracy as an error.
    pub fn make_circle(p1: &Point2, p2: &Point2, p3: &Point2, tolerance: f64) -> Circle {
        Circle::build_circle(p1, p2, p3, tolerance).unwrap_or_else(|_| Circle::invalid())
    }

    /// Circumcircle of three points.
    ///
    /// Return
    /// ----------
    /// * The circle through the three points.
    /// * [`LttcError::DegenerateTriplet`] when the points are aligned (or coincident)
    ///   within `tolerance`, or when one of them is not a valid point.
    pub fn build_circle(
        p1: &Point2,
        p2: &Point2,
        p3: &Point2,
        tolerance: f64,
    ) -> Result<Circle, LttcError> {
        if !(is_valid_point(p1) && is_valid_point(p2) && is_valid_point(p3)) {
            return Err(LttcError::DegenerateTriplet);
        }
        if are_aligned(p1, p2, p3, tolerance) {
            return Err(LttcError::DegenerateTriplet);
        }
        let b = p2 - p1;
        let c = p3 - p1;
        let d = 2.0 * cross(&b, &c);
        let b2 = b.norm_squared();
        let c2 = c.norm_squared();
        let offset = Vector2::new(c.y * b2 - b.y * c2, b.x * c2 - c.x * b2) / d;
        let center = p1 + offset;
        // mean distance to the three points smooths the rounding of the closed form
        let radius = (nalgebra::distance(&center, p1)
            + nalgebra::distance(&center, p2)
            + nalgebra::distance(&center, p3))
            / 3.0;
        Circle::new(center, radius).map_err(|_| LttcError::DegenerateTriplet)
    }

    /// Distance from `p` to the circle, `| |p - center| - radius |`.
    pub fn dist(&self, p: &Point2) -> f64 {
        self.signed_dist(p).abs()
    }

    /// Signed distance, positive outside the circle.
    pub fn signed_dist(&self, p: &Point2) -> f64 {
        nalgebra::distance(&self.center, p) - self.radius
    }

    /// Orthogonal projection of `p` on the circle.
    ///
    /// Returns `None` when `p` is the center.
    pub fn orthogonal_projection(&self, p: &Point2) -> Option<Point2> {
        let d = p - self.center;
        let n = d.norm();
        if n == 0.0 {
            return None;
        }
        Some(self.center + d * (self.radius / n))
    }

    /// Curvilinear coordinate of the angular position of `p`, in `(-πR, πR]`.
    pub fn curvilinear(&self, p: &Point2) -> f64 {
        let d = p - self.center;
        self.radius * d.y.atan2(d.x)
    }

    /// Algebraic (Kåsa) least squares circle fit.
    ///
    /// Solves `x² + y² + D x + E y + F = 0` in the least squares sense around the
    /// centroid of the points, with an SVD of the design matrix.
    ///
    /// Arguments
    /// -----------------
    /// * `points`: at least three points, not all aligned.
    ///
    /// Return
    /// ----------
    /// * The fitted circle, or [`LttcError::FitFailed`].
    pub fn fit(points: &[Point2]) -> Result<Circle, LttcError> {
        let n = points.len();
        if n < 3 {
            return Err(LttcError::FitFailed(format!(
                "circle fit needs at least 3 points, got {n}"
            )));
        }
        let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n as f64;
        let mut design = DMatrix::<f64>::zeros(n, 3);
        let mut rhs = DVector::<f64>::zeros(n);
        for (i, p) in points.iter().enumerate() {
            let d = p.coords - centroid;
            design[(i, 0)] = d.x;
            design[(i, 1)] = d.y;
            design[(i, 2)] = 1.0;
            rhs[i] = -d.norm_squared();
        }
        let svd = design.svd(true, true);
        let smax = svd.singular_values.max();
        if !(svd.singular_values.min() > 1e-10 * smax) {
            return Err(LttcError::FitFailed("aligned points".into()));
        }
        let sol = svd
            .solve(&rhs, 1e-12)
            .map_err(|e| LttcError::FitFailed(e.to_string()))?;
        let (dd, ee, ff) = (sol[0], sol[1], sol[2]);
        let cx = -0.5 * dd;
        let cy = -0.5 * ee;
        let r2 = cx * cx + cy * cy - ff;
        if !(r2 > 0.0) || !r2.is_finite() {
            return Err(LttcError::FitFailed("aligned points".into()));
        }
        let center = Point2::new(centroid.x + cx, centroid.y + cy);
        Circle::new(center, r2.sqrt()).map_err(|e| LttcError::FitFailed(e.to_string()))
    }
}

impl Curve2 for Circle {
    /// Point at `s = 0`, i.e. `center + (R, 0)`.
    fn reference_point(&self) -> Point2 {
        self.center + Vector2::new(self.radius, 0.0)
    }

    fn is_valid(&self) -> bool {
        is_valid_point(&self.center) && self.radius.is_finite() && self.radius >= 0.0
    }

    /// `center + R (cos(s/R), sin(s/R))`; the center itself for a null radius.
    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        if !self.is_valid() {
            return Err(LttcError::InvalidCurve("circle is not valid".into()));
        }
        if self.radius == 0.0 {
            return Ok(self.center);
        }
        let (st, ct) = (s / self.radius).sin_cos();
        Ok(self.center + self.radius * Vector2::new(ct, st))
    }
}

impl fmt::Display for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circle(center=({:.3}, {:.3}), radius={:.3})",
            self.center.x, self.center.y, self.radius
        )
    }
}
