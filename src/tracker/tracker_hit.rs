use std::fmt;

use serde::{Deserialize, Serialize};

use super::cell_id::CellId;
use super::Tracker;
use crate::geometry::{is_valid_point, Point2};
use crate::lttc_errors::LttcError;

/// A drift-cell hit as delivered by the calibration layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerHit {
    /// Index of the hit in the input collection.
    pub index: usize,
    pub cell: CellId,
    /// Position of the anode wire in the tracking plane.
    pub position: Point2,
    pub drift_radius: f64,
    pub drift_radius_err: f64,
    /// Delayed (late) Geiger hit.
    pub delayed: bool,
}

impl TrackerHit {
    /// Build a prompt hit located at the center of `cell`.
    pub fn from_cell(
        tracker: &Tracker,
        index: usize,
        cell: CellId,
        drift_radius: f64,
        drift_radius_err: f64,
    ) -> Self {
        TrackerHit {
            index,
            cell,
            position: tracker.cell_position(&cell),
            drift_radius,
            drift_radius_err,
            delayed: false,
        }
    }

    pub fn with_delayed(mut self, delayed: bool) -> Self {
        self.delayed = delayed;
        self
    }

    /// Check the hit can take part in a voting pass.
    pub fn validate(&self) -> Result<(), LttcError> {
        let invalid = |reason: &str| LttcError::InvalidHit {
            index: self.index,
            reason: reason.into(),
        };
        if !is_valid_point(&self.position) {
            return Err(invalid("non finite position"));
        }
        if !self.drift_radius.is_finite() || self.drift_radius < 0.0 {
            return Err(invalid("drift radius must be finite and >= 0"));
        }
        if !self.drift_radius_err.is_finite() || self.drift_radius_err < 0.0 {
            return Err(invalid("drift radius error must be finite and >= 0"));
        }
        Ok(())
    }
}

impl fmt::Display for TrackerHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hit #{} {} at ({:.2}, {:.2}) r={:.2}±{:.2}{}",
            self.index,
            self.cell,
            self.position.x,
            self.position.y,
            self.drift_radius,
            self.drift_radius_err,
            if self.delayed { " (delayed)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tracker_hit_tests {
    use super::*;

    #[test]
    fn test_validate() {
        let trk = Tracker::default();
        let h = TrackerHit::from_cell(&trk, 3, CellId::new(1, 0, 56), 10.0, 0.5);
        assert!(h.validate().is_ok());
        let bad = TrackerHit {
            drift_radius: -1.0,
            ..h
        };
        assert!(matches!(
            bad.validate(),
            Err(LttcError::InvalidHit { index: 3, .. })
        ));
        let nan = TrackerHit {
            drift_radius_err: f64::NAN,
            ..h
        };
        assert!(nan.validate().is_err());
        assert!(h.with_delayed(true).to_string().ends_with("(delayed)"));
    }
}
