//! # Planar geometry kernel
//!
//! Basic 2D objects used by the track-finding algorithm: points and vectors
//! (thin aliases over [`nalgebra`]), polylines with curvilinear coordinates,
//! lines, segments, circles, triplets and the [`curves::Curve`] family with its
//! translated, rotated and kinked decorators.
//!
//! ## Conventions
//!
//! * Every length is expressed in millimetres (see [`crate::constants`]).
//! * A point is either fully valid (both coordinates finite) or fully invalid
//!   (both coordinates NaN). Use [`invalid_point2`] to build the sentinel and
//!   [`is_valid_point`] to check it.
//! * Curves are parametrised by a curvilinear coordinate `s` measured from their
//!   reference point.
use crate::constants::{is_valid_real, INVALID_REAL};

pub mod circle;
pub mod curves;
pub mod line2;
pub mod polyline;
pub mod segment2;
pub mod triplet;

/// A point of the tracking plane.
pub type Point2 = nalgebra::Point2<f64>;

/// A displacement of the tracking plane.
pub type Vector2 = nalgebra::Vector2<f64>;

/// Build the invalid point sentinel (NaN, NaN).
#[inline]
pub fn invalid_point2() -> Point2 {
    Point2::new(INVALID_REAL, INVALID_REAL)
}

/// Return true when both coordinates are finite.
#[inline]
pub fn is_valid_point(p: &Point2) -> bool {
    is_valid_real(p.x) && is_valid_real(p.y)
}

/// Rotate a vector by `angle` radians (counter-clockwise).
#[inline]
pub fn rotate_vector(v: &Vector2, angle: f64) -> Vector2 {
    let (sa, ca) = angle.sin_cos();
    Vector2::new(ca * v.x - sa * v.y, sa * v.x + ca * v.y)
}

/// Z component of the cross product `u × v`.
#[inline]
pub fn cross(u: &Vector2, v: &Vector2) -> f64 {
    u.x * v.y - u.y * v.x
}
