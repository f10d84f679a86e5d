//! Ordered list of sampled points with their curvilinear coordinates.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{is_valid_point, Point2};

/// A polyline sampled along a curve.
///
/// `points[i]` was computed at curvilinear coordinate `s[i]`; both vectors always
/// have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline2 {
    points: Vec<Point2>,
    s: Vec<f64>,
}

impl Polyline2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Polyline2 {
            points: Vec::with_capacity(n),
            s: Vec::with_capacity(n),
        }
    }

    /// Append a sample.
    pub fn push(&mut self, p: Point2, s: f64) {
        self.points.push(p);
        self.s.push(s);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn s(&self) -> &[f64] {
        &self.s
    }

    pub fn first(&self) -> Option<(Point2, f64)> {
        self.points.first().copied().zip(self.s.first().copied())
    }

    pub fn last(&self) -> Option<(Point2, f64)> {
        self.points.last().copied().zip(self.s.last().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point2, &f64)> {
        self.points.iter().zip(self.s.iter())
    }

    /// True when every sample is a valid point with a finite coordinate.
    pub fn is_finite(&self) -> bool {
        self.iter().all(|(p, s)| is_valid_point(p) && s.is_finite())
    }

    /// True when the curvilinear coordinates never decrease.
    pub fn is_monotonic(&self) -> bool {
        self.s.windows(2).all(|w| w[0] <= w[1])
    }

    /// Sum of the straight distances between consecutive samples.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// Keep the samples whose curvilinear coordinate lies in `[s1, s2]`.
    pub fn restricted(&self, s1: f64, s2: f64) -> Polyline2 {
        let mut out = Polyline2::new();
        for (p, s) in self.iter() {
            if *s >= s1 && *s <= s2 {
                out.push(*p, *s);
            }
        }
        out
    }

    /// Write the samples as `x y s` lines, one per sample (gnuplot friendly).
    pub fn store<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for (p, s) in self.iter() {
            writeln!(out, "{} {} {}", p.x, p.y, s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod polyline_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_push_keeps_parallel_arrays() {
        let mut pl = Polyline2::with_capacity(3);
        pl.push(Point2::new(0.0, 0.0), 0.0);
        pl.push(Point2::new(3.0, 4.0), 5.0);
        assert_eq!(pl.points().len(), pl.s().len());
        assert_eq!(pl.len(), 2);
        assert!(pl.is_monotonic());
        assert_relative_eq!(pl.length(), 5.0);
        assert_eq!(pl.last(), Some((Point2::new(3.0, 4.0), 5.0)));
    }

    #[test]
    fn test_restricted_and_store() {
        let mut pl = Polyline2::new();
        for i in 0..5 {
            pl.push(Point2::new(i as f64, 0.0), i as f64);
        }
        let sub = pl.restricted(1.0, 3.0);
        assert_eq!(sub.s(), &[1.0, 2.0, 3.0]);

        let mut dump = String::new();
        sub.store(&mut dump).unwrap();
        assert_eq!(dump.lines().count(), 3);
        assert!(dump.starts_with("1 0 1"));
    }

    #[test]
    fn test_non_finite_detection() {
        let mut pl = Polyline2::new();
        pl.push(Point2::new(0.0, f64::NAN), 0.0);
        assert!(!pl.is_finite());
    }
}
