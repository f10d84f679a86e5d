//! # Constants and type definitions for LTTC
//!
//! This module centralizes the **units**, **numerical tolerances**, and the **default
//! tracker layout** used throughout the `lttc` library.
//!
//! ## Overview
//!
//! - Length units (every length in the crate is expressed in millimetres)
//! - The invalid-real sentinel used for "not yet computed" coordinates
//! - Numerical tolerances shared by the geometry kernel
//! - The default SuperNEMO-like drift-cell layout
//!
//! These definitions are used by all main modules, including the curve kernel,
//! the histograms, the tracker geometry and the track-finding driver.

// -------------------------------------------------------------------------------------------------
// Units
// -------------------------------------------------------------------------------------------------

/// One millimetre (base length unit)
pub const MM: f64 = 1.0;

/// One centimetre in millimetres
pub const CM: f64 = 10.0 * MM;

/// One metre in millimetres
pub const M: f64 = 1000.0 * MM;

/// 2π, useful for angle wrapping
pub const DPI: f64 = 2. * std::f64::consts::PI;

// -------------------------------------------------------------------------------------------------
// Invalid sentinel and tolerances
// -------------------------------------------------------------------------------------------------

/// Canonical "invalid real" sentinel (NaN).
pub const INVALID_REAL: f64 = f64::NAN;

/// Check that a real value is not the invalid sentinel (and is finite).
#[inline]
pub fn is_valid_real(x: f64) -> bool {
    x.is_finite()
}

/// Default relative tolerance on the collinearity test of three points.
///
/// Three points are considered aligned when
/// `|cross(p2 - p1, p3 - p1)| <= tol * max_side²`, which is scale invariant.
pub const DEFAULT_COLLINEARITY_TOLERANCE: f64 = 1e-6;

/// Minimal norm accepted for a direction vector or a segment length (mm).
pub const LENGTH_EPS: f64 = 1e-12;

/// Default number of samples generated along a curve.
pub const DEFAULT_NSAMPLES: usize = 100;

// -------------------------------------------------------------------------------------------------
// Default tracker layout
// -------------------------------------------------------------------------------------------------

/// Drift cell radius (half of the cell pitch)
pub const DEFAULT_CELL_RADIUS: f64 = 22.0 * MM;

/// Number of cell layers per tracker side
pub const DEFAULT_NLAYERS: u32 = 9;

/// Number of cell rows per tracker side
pub const DEFAULT_NROWS: u32 = 113;

/// Number of tracker sides (one on each side of the source foil)
pub const NSIDES: u8 = 2;

/// Gap between the source foil and the first cell layer
pub const DEFAULT_SOURCE_XSKIP: f64 = 30.0 * MM;

/// Gap between the last cell layer and the main calorimeter wall
pub const DEFAULT_CALO_XSKIP: f64 = 30.0 * MM;

/// Gap between the first/last cell row and the X-calorimeter walls
pub const DEFAULT_XCALO_YSKIP: f64 = 100.0 * MM;
