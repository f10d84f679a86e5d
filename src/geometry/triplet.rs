use serde::{Deserialize, Serialize};

use super::circle::{are_aligned, Circle};
use super::{is_valid_point, Point2};
use crate::lttc_errors::LttcError;

/// Three distinct points, the atomic unit of the circle voting pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triplet2 {
    pub p1: Point2,
    pub p2: Point2,
    pub p3: Point2,
}

impl Triplet2 {
    /// Build a triplet; invalid or coincident points give [`LttcError::DegenerateTriplet`].
    pub fn new(p1: Point2, p2: Point2, p3: Point2) -> Result<Self, LttcError> {
        if !(is_valid_point(&p1) && is_valid_point(&p2) && is_valid_point(&p3)) {
            return Err(LttcError::DegenerateTriplet);
        }
        if p1 == p2 || p2 == p3 || p1 == p3 {
            return Err(LttcError::DegenerateTriplet);
        }
        Ok(Triplet2 { p1, p2, p3 })
    }

    pub fn is_aligned(&self, tolerance: f64) -> bool {
        are_aligned(&self.p1, &self.p2, &self.p3, tolerance)
    }

    /// Circumcircle of the triplet, invalid when the points are aligned.
    pub fn make_circle(&self, tolerance: f64) -> Circle {
        Circle::make_circle(&self.p1, &self.p2, &self.p3, tolerance)
    }

    pub fn build_circle(&self, tolerance: f64) -> Result<Circle, LttcError> {
        Circle::build_circle(&self.p1, &self.p2, &self.p3, tolerance)
    }
}
