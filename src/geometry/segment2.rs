use serde::{Deserialize, Serialize};

use super::curves::Curve2;
use super::line2::Line2;
use super::{is_valid_point, Point2, Vector2};
use crate::constants::LENGTH_EPS;
use crate::lttc_errors::LttcError;

/// A finite straight segment, parametrised by the arclength from `start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment2 {
    start: Point2,
    stop: Point2,
}

impl Segment2 {
    /// Build a segment; coincident or non-finite end points are rejected.
    pub fn new(start: Point2, stop: Point2) -> Result<Self, LttcError> {
        if !is_valid_point(&start) || !is_valid_point(&stop) {
            return Err(LttcError::InvalidCurve("non finite segment end".into()));
        }
        if nalgebra::distance(&start, &stop) < LENGTH_EPS {
            return Err(LttcError::DegenerateSegment);
        }
        Ok(Segment2 { start, stop })
    }

    pub fn start(&self) -> Point2 {
        self.start
    }

    pub fn stop(&self) -> Point2 {
        self.stop
    }

    pub fn length(&self) -> f64 {
        nalgebra::distance(&self.start, &self.stop)
    }

    /// Unit vector from `start` to `stop`.
    pub fn direction(&self) -> Vector2 {
        (self.stop - self.start) / self.length()
    }

    pub fn supporting_line(&self) -> Result<Line2, LttcError> {
        Line2::make_from_start_stop(&self.start, &self.stop)
    }

    /// Distance from `p` to the closest point of the segment.
    pub fn distance(&self, p: &Point2) -> f64 {
        let t = (p - self.start).dot(&self.direction()).clamp(0.0, self.length());
        nalgebra::distance(p, &(self.start + t * self.direction()))
    }
}

impl Curve2 for Segment2 {
    fn reference_point(&self) -> Point2 {
        self.start
    }

    fn is_valid(&self) -> bool {
        is_valid_point(&self.start) && is_valid_point(&self.stop) && self.length() >= LENGTH_EPS
    }

    fn compute(&self, s: f64) -> Result<Point2, LttcError> {
        if !self.is_valid() {
            return Err(LttcError::DegenerateSegment);
        }
        Ok(self.start + s * self.direction())
    }
}

#[cfg(test)]
mod segment2_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_degenerate_segment() {
        let p = Point2::new(1.0, 1.0);
        assert_eq!(Segment2::new(p, p), Err(LttcError::DegenerateSegment));
    }

    #[test]
    fn test_segment_distance_and_compute() {
        let seg = Segment2::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)).unwrap();
        assert_relative_eq!(seg.length(), 10.0);
        assert_relative_eq!(seg.distance(&Point2::new(5.0, 3.0)), 3.0);
        assert_relative_eq!(seg.distance(&Point2::new(13.0, 4.0)), 5.0);
        assert_relative_eq!(seg.distance(&Point2::new(-3.0, -4.0)), 5.0);
        let end = seg.compute(seg.length()).unwrap();
        assert_relative_eq!(end.x, 10.0);
        let line = seg.supporting_line().unwrap();
        assert!(line.is_horizontal(1e-12));
    }
}
