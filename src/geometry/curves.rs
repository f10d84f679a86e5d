//! # Parametric curves
//!
//! Every curve of the tracking plane implements [`Curve2`]: it has a reference point at
//! `s = 0`, can be evaluated at any curvilinear coordinate `s`, and can be sampled
//! into a [`Polyline2`].
//!
//! The set of curves used by the track finder is closed, so they are gathered in the
//! [`Curve`] enum:
//!
//! | Variant      | Meaning                                                         |
//! |--------------|-----------------------------------------------------------------|
//! | `Line`       | infinite straight line ([`Line2`])                              |
//! | `Circle`     | circle parametrised by arclength ([`Circle`])                   |
//! | `Segment`    | finite segment ([`Segment2`])                                   |
//! | `Translated` | another curve shifted by a constant vector                      |
//! | `Rotated`    | another curve rotated around a pivot point                      |
//! | `Kinked`     | another curve up to `s_pivot`, then its rotated continuation    |
//!
//! Decorators share the wrapped curve through an [`Arc`], so the wrapped curve always
//! lives at least as long as its wrappers.
//!
//! ## Sampling
//!
//! `generate_samples(s1, s2, n)` returns `n` samples uniformly spaced in `s`, the
//! first one exactly at `s1` and the last one exactly at `s2`. A kinked curve adds its
//! pivot as one extra sample when the pivot falls strictly inside `(s1, s2)` between
//! two grid points.
use std::sync::Arc;

use super::circle::Circle;
use super::line2::Line2;
use super::polyline::Polyline2;
use super::segment2::Segment2;
use super::{rotate_vector, Point2, Vector2};
use crate::lttc_errors::LttcError;

/// Common interface of the planar curves.
pub trait Curve2 {
    /// Point at `s = 0`.
    fn reference_point(&self) -> Point2;

    /// Whether the curve can be evaluated.
    fn is_valid(&self) -> bool;

    /// Point at curvilinear coordinate `s`.
    ///
    /// Fails with [`LttcError::InvalidCurve`] (or a more specific degeneracy error)
    /// when the curve is not valid.
    fn compute(&self, s: f64) -> Result<Point2, LttcError>;

    /// Sample the curve on `[s1, s2]`.
    ///
    /// Arguments
    /// -----------------
    /// * `s1`, `s2`: finite bounds with `s1 <= s2`.
    /// * `n`: number of samples, at least 2.
    ///
    /// Return
    /// ----------
    /// * A polyline whose first and last samples are exactly at `s1` and `s2`.
    fn generate_samples(&self, s1: f64, s2: f64, n: usize) -> Result<Polyline2, LttcError> {
        let grid = sampling_grid(s1, s2, n)?;
        if !self.is_valid() {
            return Err(LttcError::InvalidCurve("cannot sample an invalid curve".into()));
        }
        let mut samples = Polyline2::with_capacity(grid.len());
        for s in grid {
            samples.push(self.compute(s)?, s);
        }
        Ok(samples)
    }
}

/// Uniform grid of `n` curvilinear values from `s1` to `s2` (both exact).
fn sampling_grid(s1: f64, s2: f64, n: usize) -> Result<Vec<f64>, LttcError> {
    if n < 2 {
        return Err(LttcError::InvalidSampling(format!(
            "at least 2 samples are required, got {n}"
        )));
    }
    if !s1.is_finite() || !s2.is_finite() || s1 > s2 {
        return Err(LttcError::InvalidSampling(format!(
            "invalid curvilinear range [{s1}, {s2}]"
        )));
    }
    let step = (s2 - s1) / (n - 1) as f64;
    Ok((0..n)
        .map(|i| if i + 1 == n { s2 } else { s1 + i as f64 * step })
        .collect())
}

/// A curve shifted by a constant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedCurve2 {
    base: Arc<Curve>,
    shift: Vector2,
}

impl TranslatedCurve2 {
    pub fn new(base: Arc<Curve>, shift: Vector2) -> Self {
        TranslatedCurve2 { base, shift }
    }

    pub fn base(&self) -> &Arc<Curve> {
        &self.base
    }

    pub fn shift(&self) -> Vector2 {
        self.shift
    }
}

impl Curve2 for TranslatedCurve2 {
    fn reference_point(&self) -> Point2 {
        self.base.reference_point() + self.shift
    }

    fn is_valid(&self) -> bool {
        self.base.is_valid() && self.shift.x.is_finite() && self.shift.y.is_finite()
    }

    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        if !self.is_valid() {
            return Err(LttcError::InvalidCurve("translated curve is not valid".into()));
        }
        Ok(self.base.compute(s)? + self.shift)
    }
}

/// A curve rotated by `angle` around `pivot`.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedCurve2 {
    base: Arc<Curve>,
    pivot: Point2,
    angle: f64,
}

impl RotatedCurve2 {
    pub fn new(base: Arc<Curve>, pivot: Point2, angle: f64) -> Self {
        RotatedCurve2 { base, pivot, angle }
    }

    pub fn base(&self) -> &Arc<Curve> {
        &self.base
    }

    pub fn pivot(&self) -> Point2 {
        self.pivot
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    fn rotate(&self, p: Point2) -> Point2 {
        self.pivot + rotate_vector(&(p - self.pivot), self.angle)
    }
}

impl Curve2 for RotatedCurve2 {
    fn reference_point(&self) -> Point2 {
        self.rotate(self.base.reference_point())
    }

    fn is_valid(&self) -> bool {
        self.base.is_valid()
            && super::is_valid_point(&self.pivot)
            && self.angle.is_finite()
    }

    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        if !self.is_valid() {
            return Err(LttcError::InvalidCurve("rotated curve is not valid".into()));
        }
        Ok(self.rotate(self.base.compute(s)?))
    }
}

/// A curve that follows `base` up to `s_pivot` and then bends by `angle` around the
/// point `base(s_pivot)`.
#[derive(Debug, Clone, PartialEq)]
pub struct KinkedCurve2 {
    base: Arc<Curve>,
    s_pivot: f64,
    arm: RotatedCurve2,
}

impl KinkedCurve2 {
    /// Build the kinked curve.
    ///
    /// The pivot point is evaluated once here, so `base` must be valid and `s_pivot`
    /// finite.
    pub fn new(base: Arc<Curve>, s_pivot: f64, angle: f64) -> Result<Self, LttcError> {
        if !s_pivot.is_finite() || !angle.is_finite() {
            return Err(LttcError::InvalidCurve(format!(
                "invalid kink (s_pivot={s_pivot}, angle={angle})"
            )));
        }
        let pivot = base.compute(s_pivot)?;
        let arm = RotatedCurve2::new(Arc::clone(&base), pivot, angle);
        Ok(KinkedCurve2 { base, s_pivot, arm })
    }

    pub fn base(&self) -> &Arc<Curve> {
        &self.base
    }

    pub fn s_pivot(&self) -> f64 {
        self.s_pivot
    }

    pub fn pivot(&self) -> Point2 {
        self.arm.pivot()
    }

    pub fn angle(&self) -> f64 {
        self.arm.angle()
    }
}

impl Curve2 for KinkedCurve2 {
    fn reference_point(&self) -> Point2 {
        if self.s_pivot > 0.0 {
            self.base.reference_point()
        } else {
            self.arm.reference_point()
        }
    }

    fn is_valid(&self) -> bool {
        self.arm.is_valid()
    }

    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        if s < self.s_pivot {
            self.base.compute(s)
        } else {
            self.arm.compute(s)
        }
    }

    fn generate_samples(&self, s1: f64, s2: f64, n: usize) -> Result<Polyline2, LttcError> {
        let mut grid = sampling_grid(s1, s2, n)?;
        if !self.is_valid() {
            return Err(LttcError::InvalidCurve("cannot sample an invalid curve".into()));
        }
        let sp = self.s_pivot;
        if sp > s1 && sp < s2 {
            let tol = 1e-12 * sp.abs().max(1.0);
            if let Some(pos) = grid.iter().position(|&s| s >= sp - tol) {
                if (grid[pos] - sp).abs() > tol {
                    grid.insert(pos, sp);
                }
            }
        }
        let mut samples = Polyline2::with_capacity(grid.len());
        for s in grid {
            samples.push(self.compute(s)?, s);
        }
        Ok(samples)
    }
}

/// Closed set of curves handled by the track finder.
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    Line(Line2),
    Circle(Circle),
    Segment(Segment2),
    Translated(TranslatedCurve2),
    Rotated(RotatedCurve2),
    Kinked(KinkedCurve2),
}

impl Curve {
    fn as_dyn(&self) -> &dyn Curve2 {
        match self {
            Curve::Line(c) => c,
            Curve::Circle(c) => c,
            Curve::Segment(c) => c,
            Curve::Translated(c) => c,
            Curve::Rotated(c) => c,
            Curve::Kinked(c) => c,
        }
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Curve::Line(_) => "line",
            Curve::Circle(_) => "circle",
            Curve::Segment(_) => "segment",
            Curve::Translated(_) => "translated",
            Curve::Rotated(_) => "rotated",
            Curve::Kinked(_) => "kinked",
        }
    }
}

impl Curve2 for Curve {
    fn reference_point(&self) -> Point2 {
        self.as_dyn().reference_point()
    }

    fn is_valid(&self) -> bool {
        self.as_dyn().is_valid()
    }

    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        self.as_dyn().compute(s)
    }

    fn generate_samples(&self, s1: f64, s2: f64, n: usize) -> Result<Polyline2, LttcError> {
        self.as_dyn().generate_samples(s1, s2, n)
    }
}

impl From<Line2> for Curve {
    fn from(c: Line2) -> Self {
        Curve::Line(c)
    }
}

impl From<Circle> for Curve {
    fn from(c: Circle) -> Self {
        Curve::Circle(c)
    }
}

impl From<Segment2> for Curve {
    fn from(c: Segment2) -> Self {
        Curve::Segment(c)
    }
}

impl From<TranslatedCurve2> for Curve {
    fn from(c: TranslatedCurve2) -> Self {
        Curve::Translated(c)
    }
}

impl From<RotatedCurve2> for Curve {
    fn from(c: RotatedCurve2) -> Self {
        Curve::Rotated(c)
    }
}

impl From<KinkedCurve2> for Curve {
    fn from(c: KinkedCurve2) -> Self {
        Curve::Kinked(c)
    }
}

#[cfg(test)]
mod curves_tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn line_x() -> Arc<Curve> {
        Arc::new(Line2::new(0.0, 1.0, 0.0).unwrap().into())
    }

    #[test]
    fn test_sampling_bounds_are_exact() {
        let c: Curve = Circle::new(Point2::new(0.0, 0.0), 7.0).unwrap().into();
        let pl = c.generate_samples(-3.3, 11.1, 7).unwrap();
        assert_eq!(pl.len(), 7);
        assert_eq!(pl.s()[0], -3.3);
        assert_eq!(pl.s()[6], 11.1);
        assert!(pl.is_monotonic());
    }

    #[test]
    fn test_sampling_arguments() {
        let c = line_x();
        assert!(matches!(
            c.generate_samples(0.0, 1.0, 1),
            Err(LttcError::InvalidSampling(_))
        ));
        assert!(c.generate_samples(2.0, 1.0, 10).is_err());
        assert!(c.generate_samples(0.0, f64::NAN, 10).is_err());

        let bad: Curve = Circle::invalid().into();
        assert!(matches!(
            bad.generate_samples(0.0, 1.0, 10),
            Err(LttcError::InvalidCurve(_))
        ));
    }

    #[test]
    fn test_translated_curve() {
        let t = TranslatedCurve2::new(line_x(), Vector2::new(0.0, 5.0));
        let p = t.compute(3.0).unwrap();
        let q = line_x().compute(3.0).unwrap();
        assert_relative_eq!(p.x, q.x);
        assert_relative_eq!(p.y, q.y + 5.0);
    }

    #[test]
    fn test_rotated_curve() {
        let r = RotatedCurve2::new(line_x(), Point2::origin(), FRAC_PI_2);
        let p = r.compute(2.0).unwrap();
        // the x axis becomes the y axis
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y.abs(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kink_continuity() {
        let base: Arc<Curve> = Arc::new(Circle::new(Point2::new(10.0, -4.0), 50.0).unwrap().into());
        for angle in [-1.2, -0.3, 0.0, 0.4, 2.5] {
            let k = KinkedCurve2::new(Arc::clone(&base), 17.0, angle).unwrap();
            let a = k.compute(17.0).unwrap();
            let b = base.compute(17.0).unwrap();
            assert_relative_eq!(a.x, b.x, epsilon = 1e-12);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
            // before the pivot the kinked curve follows its base
            let c = k.compute(5.0).unwrap();
            let d = base.compute(5.0).unwrap();
            assert_eq!(c, d);
        }
    }

    #[test]
    fn test_kink_pivot_sampled_once() {
        let k: Curve = KinkedCurve2::new(line_x(), 0.35, 0.5).unwrap().into();
        let pl = k.generate_samples(0.0, 1.0, 11).unwrap();
        assert_eq!(pl.len(), 12);
        assert_eq!(pl.s().iter().filter(|&&s| s == 0.35).count(), 1);
        assert!(pl.is_monotonic());
        assert_eq!(pl.s()[0], 0.0);
        assert_eq!(pl.s()[11], 1.0);

        // pivot already on the grid
        let k2: Curve = KinkedCurve2::new(line_x(), 0.5, 0.5).unwrap().into();
        let pl2 = k2.generate_samples(0.0, 1.0, 11).unwrap();
        assert_eq!(pl2.len(), 11);

        // pivot outside the range
        let pl3 = k.generate_samples(0.5, 1.0, 6).unwrap();
        assert_eq!(pl3.len(), 6);
    }

    #[test]
    fn test_decorators_share_base() {
        let base = line_x();
        let t = TranslatedCurve2::new(Arc::clone(&base), Vector2::new(1.0, 1.0));
        let k = KinkedCurve2::new(Arc::new(t.into()), 0.0, 0.1).unwrap();
        assert_eq!(Arc::strong_count(&base), 2);
        assert_eq!(Curve::from(k).kind(), "kinked");
    }
}
