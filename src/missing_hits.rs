//! # Missing hits finder
//!
//! Given a candidate trajectory, list the tracker cells it crosses and explain why a
//! crossed cell does not carry one of the track's hits.
//!
//! ## Classification
//!
//! For every crossed cell, in this order:
//!
//! 1. the cell carries a hit owned by the track → [`CellStatus::Hit`];
//! 2. the cell is declared dead in the tracker conditions → [`MissingHitReason::DeadCell`];
//! 3. the cell carries a hit of another timing class (prompt vs delayed) → the cell was
//!    busy when the track crossed it, [`MissingHitReason::BusyCell`];
//! 4. the cell carries a hit of the same timing class whose drift radius is not longer
//!    than the distance expected from the track (within errors) → the avalanche was
//!    triggered by another particle passing closer to the wire,
//!    [`MissingHitReason::OtherTrack`];
//! 5. any other case → [`MissingHitReason::NoTrigger`].
//!
//! [`MissingHitReason::Undefined`] is only the default value of a record and is never
//! produced by the finder.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::polyline::Polyline2;
use crate::geometry::segment2::Segment2;
use crate::geometry::Point2;
use crate::lttc_errors::LttcError;
use crate::tracker::{CellId, Tracker, TrackerHit};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingHitReason {
    NoTrigger,
    DeadCell,
    BusyCell,
    OtherTrack,
    #[default]
    Undefined,
}

impl fmt::Display for MissingHitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissingHitReason::NoTrigger => "no-trigger",
            MissingHitReason::DeadCell => "dead-cell",
            MissingHitReason::BusyCell => "busy-cell",
            MissingHitReason::OtherTrack => "other-track",
            MissingHitReason::Undefined => "undefined",
        };
        f.write_str(s)
    }
}

/// A crossed cell without a hit of the track, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMissingHit {
    pub cell: CellId,
    pub reason: MissingHitReason,
}

impl fmt::Display for ClusterMissingHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.cell, self.reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CellStatus {
    /// The cell carries the hit of the track with this index.
    Hit(usize),
    Missing(MissingHitReason),
}

/// One crossed cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellCrossing {
    pub cell: CellId,
    /// Distance from the anode wire to the trajectory.
    pub expected_distance: f64,
    pub status: CellStatus,
}

/// Classifier of the cells crossed by a trajectory.
///
/// Holds read-only borrows of the geometry and of the hit collection; building it
/// indexes the hits by cell.
#[derive(Debug, Clone)]
pub struct MissingHitsFinder<'a> {
    tracker: &'a Tracker,
    hits: &'a [TrackerHit],
    owned: &'a BTreeSet<usize>,
    hit_cells: BTreeMap<CellId, usize>,
    delayed: bool,
    expected_distance_err: f64,
}

impl<'a> MissingHitsFinder<'a> {
    /// Arguments
    /// -----------------
    /// * `tracker`: geometry oracle.
    /// * `hits`: the full hit collection of the event.
    /// * `owned`: positions in `hits` of the hits assigned to the track.
    ///
    /// The timing class of the track is delayed when all its owned hits are delayed.
    pub fn new(tracker: &'a Tracker, hits: &'a [TrackerHit], owned: &'a BTreeSet<usize>) -> Self {
        let mut hit_cells = BTreeMap::new();
        for (i, h) in hits.iter().enumerate() {
            hit_cells.entry(h.cell).or_insert(i);
        }
        let delayed = !owned.is_empty()
            && owned
                .iter()
                .all(|&i| hits.get(i).map(|h| h.delayed).unwrap_or(false));
        MissingHitsFinder {
            tracker,
            hits,
            owned,
            hit_cells,
            delayed,
            expected_distance_err: 0.0,
        }
    }

    /// Override the timing class of the track.
    pub fn with_delayed(mut self, delayed: bool) -> Self {
        self.delayed = delayed;
        self
    }

    /// Uncertainty on the distance between the trajectory and a wire.
    pub fn with_expected_distance_err(mut self, err: f64) -> Self {
        self.expected_distance_err = err.max(0.0);
        self
    }

    fn classify_cell(&self, cell: CellId, expected_distance: f64) -> CellStatus {
        if let Some(&ih) = self.hit_cells.get(&cell) {
            if self.owned.contains(&ih) {
                return CellStatus::Hit(ih);
            }
        }
        if self.tracker.is_dead(&cell) {
            return CellStatus::Missing(MissingHitReason::DeadCell);
        }
        let Some(&ih) = self.hit_cells.get(&cell) else {
            return CellStatus::Missing(MissingHitReason::NoTrigger);
        };
        let other = &self.hits[ih];
        if other.delayed != self.delayed {
            return CellStatus::Missing(MissingHitReason::BusyCell);
        }
        let reason = if expected_distance + self.expected_distance_err
            > other.drift_radius - other.drift_radius_err
        {
            MissingHitReason::OtherTrack
        } else {
            MissingHitReason::NoTrigger
        };
        CellStatus::Missing(reason)
    }

    /// Classify every cell crossed by the segment `[start, stop]`.
    ///
    /// Return
    /// ----------
    /// * The crossed cells in cell order, each with its status.
    /// * [`LttcError::DegenerateSegment`] when the ends coincide.
    pub fn classify(&self, start: &Point2, stop: &Point2) -> Result<Vec<CellCrossing>, LttcError> {
        let segment = Segment2::new(*start, *stop)?;
        let cells = self.tracker.intersect_segment(start, stop)?;
        Ok(cells
            .into_iter()
            .map(|cell| {
                let d = segment.distance(&self.tracker.cell_position(&cell));
                CellCrossing {
                    cell,
                    expected_distance: d,
                    status: self.classify_cell(cell, d),
                }
            })
            .collect())
    }

    /// Missing hits along the segment `[start, stop]`.
    ///
    /// Return
    /// ----------
    /// * `Ok(None)` when the segment does not cross any cell.
    /// * `Ok(Some(missing))` otherwise; `missing` may be empty when every crossed cell
    ///   carries a hit of the track.
    pub fn find(
        &self,
        start: &Point2,
        stop: &Point2,
    ) -> Result<Option<Vec<ClusterMissingHit>>, LttcError> {
        let crossings = self.classify(start, stop)?;
        Ok(Self::collect_missing(crossings))
    }

    /// Missing hits along a sampled trajectory (circular or kinked tracks).
    ///
    /// The expected distance of a cell is the distance from its wire to the closest
    /// segment of the polyline.
    pub fn find_along_polyline(
        &self,
        polyline: &Polyline2,
    ) -> Result<Option<Vec<ClusterMissingHit>>, LttcError> {
        let segments: Vec<Segment2> = polyline
            .points()
            .windows(2)
            .filter_map(|w| Segment2::new(w[0], w[1]).ok())
            .collect();
        if segments.is_empty() {
            return Ok(None);
        }
        let cells = self.tracker.intersect_polyline(polyline)?;
        let crossings = cells
            .into_iter()
            .map(|cell| {
                let wire = self.tracker.cell_position(&cell);
                let d = segments
                    .iter()
                    .map(|s| s.distance(&wire))
                    .fold(f64::INFINITY, f64::min);
                CellCrossing {
                    cell,
                    expected_distance: d,
                    status: self.classify_cell(cell, d),
                }
            })
            .collect();
        Ok(Self::collect_missing(crossings))
    }

    fn collect_missing(crossings: Vec<CellCrossing>) -> Option<Vec<ClusterMissingHit>> {
        if crossings.is_empty() {
            return None;
        }
        let ncrossed = crossings.len();
        let missing: Vec<ClusterMissingHit> = crossings
            .into_iter()
            .filter_map(|c| match c.status {
                CellStatus::Missing(reason) => Some(ClusterMissingHit {
                    cell: c.cell,
                    reason,
                }),
                CellStatus::Hit(_) => None,
            })
            .collect();
        debug!(
            crossed = ncrossed,
            missing = missing.len(),
            "missing hits classified"
        );
        Some(missing)
    }
}

#[cfg(test)]
mod missing_hits_tests {
    use super::*;

    fn hit(trk: &Tracker, index: usize, cell: CellId, r: f64) -> TrackerHit {
        TrackerHit::from_cell(trk, index, cell, r, 0.5)
    }

    #[test]
    fn test_no_crossing_gives_none() {
        let trk = Tracker::default();
        let owned = BTreeSet::new();
        let finder = MissingHitsFinder::new(&trk, &[], &owned);
        let res = finder
            .find(&Point2::new(-5.0, 0.0), &Point2::new(5.0, 10.0))
            .unwrap();
        assert_eq!(res, None);
        assert!(finder
            .find(&Point2::new(1.0, 1.0), &Point2::new(1.0, 1.0))
            .is_err());
    }

    #[test]
    fn test_reasons() {
        let mut cond = crate::tracker::TrackerConditions::new();
        cond.add_dead_cell(CellId::new(1, 2, 50));
        let trk = Tracker::default().with_conditions(cond);
        let y = trk.cell_position(&CellId::new(1, 0, 50)).y;

        let hits = vec![
            hit(&trk, 0, CellId::new(1, 0, 50), 2.0),
            hit(&trk, 1, CellId::new(1, 1, 50), 15.0),
            // other particle passing closer to the wire
            hit(&trk, 2, CellId::new(1, 3, 50), 1.0),
            // delayed hit in a crossed cell
            hit(&trk, 3, CellId::new(1, 4, 50), 1.0).with_delayed(true),
            hit(&trk, 4, CellId::new(1, 8, 50), 2.0),
        ];
        let owned: BTreeSet<usize> = [0, 4].into_iter().collect();
        let finder = MissingHitsFinder::new(&trk, &hits, &owned);
        let crossings = finder
            .classify(&Point2::new(40.0, y + 2.0), &Point2::new(440.0, y + 2.0))
            .unwrap();
        assert_eq!(crossings.len(), 9);
        let status_of = |layer: u32| {
            crossings
                .iter()
                .find(|c| c.cell.layer == layer)
                .map(|c| c.status)
                .unwrap()
        };
        assert_eq!(status_of(0), CellStatus::Hit(0));
        // drift radius 15 mm is longer than the 2 mm expected distance
        assert_eq!(
            status_of(1),
            CellStatus::Missing(MissingHitReason::NoTrigger)
        );
        assert_eq!(status_of(2), CellStatus::Missing(MissingHitReason::DeadCell));
        assert_eq!(
            status_of(3),
            CellStatus::Missing(MissingHitReason::OtherTrack)
        );
        assert_eq!(status_of(4), CellStatus::Missing(MissingHitReason::BusyCell));
        assert_eq!(
            status_of(5),
            CellStatus::Missing(MissingHitReason::NoTrigger)
        );
        assert_eq!(status_of(8), CellStatus::Hit(4));

        let missing = finder
            .find(&Point2::new(40.0, y + 2.0), &Point2::new(440.0, y + 2.0))
            .unwrap()
            .unwrap();
        assert_eq!(missing.len(), 7);
        assert!(missing
            .iter()
            .all(|m| m.reason != MissingHitReason::Undefined));
    }

    #[test]
    fn test_polyline_variant() {
        let trk = Tracker::default();
        let y = trk.cell_position(&CellId::new(0, 0, 10)).y;
        let mut pl = Polyline2::new();
        pl.push(Point2::new(-40.0, y), 0.0);
        pl.push(Point2::new(-200.0, y), 160.0);
        pl.push(Point2::new(-440.0, y), 400.0);
        let owned = BTreeSet::new();
        let finder = MissingHitsFinder::new(&trk, &[], &owned);
        let missing = finder.find_along_polyline(&pl).unwrap().unwrap();
        assert_eq!(missing.len(), 9);
        assert!(missing
            .iter()
            .all(|m| m.reason == MissingHitReason::NoTrigger));
        assert_eq!(missing[0].to_string(), "[0.0.10] (no-trigger)");
    }
}
