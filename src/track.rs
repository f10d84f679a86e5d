//! Candidate tracks produced by the track finder.
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::curves::Curve;
use crate::geometry::polyline::Polyline2;
use crate::geometry::Point2;
use crate::missing_hits::{ClusterMissingHit, MissingHitReason};

/// Shape class of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackShape {
    Line,
    Circle,
    Kink,
}

impl fmt::Display for TrackShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackShape::Line => "line",
            TrackShape::Circle => "circle",
            TrackShape::Kink => "kink",
        };
        f.write_str(s)
    }
}

/// Position of a kink along the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinkInfo {
    pub point: Point2,
    /// Curvilinear coordinate of the kink on the track curve.
    pub s: f64,
    /// Angle between the two arms (radians).
    pub angle: f64,
    /// Input indexes of the hits of the arm before and after the kink.
    pub arms: [BTreeSet<usize>; 2],
}

/// Coarse fit quality class of a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityRank {
    #[default]
    Good,
    Poor,
    Bad,
}

impl fmt::Display for QualityRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityRank::Good => "good",
            QualityRank::Poor => "poor",
            QualityRank::Bad => "bad",
        };
        f.write_str(s)
    }
}

/// Goodness of fit of a track over its hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackQuality {
    /// Chi-square survival probability of `chi2` with the track `ndof`.
    pub pvalue: f64,
    /// Input indexes of the hits with a normalised residual above `outlier_nsigma`.
    pub outliers: BTreeSet<usize>,
    pub no_outliers_chi2: f64,
    pub no_outliers_ndof: usize,
    pub no_outliers_pvalue: f64,
    pub rank: QualityRank,
}

impl TrackQuality {
    /// P-value without the outliers when at least three hits are left, the full
    /// p-value otherwise.
    pub fn effective_pvalue(&self, nhits: usize) -> f64 {
        if !self.outliers.is_empty() && nhits.saturating_sub(self.outliers.len()) >= 3 {
            self.no_outliers_pvalue
        } else {
            self.pvalue
        }
    }
}

/// Hit set relations of a track with the other tracks of the pass (track ids).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRelations {
    /// Tracks holding a strict subset of the hits of this one.
    pub superset_of: BTreeSet<usize>,
    /// Tracks holding a strict superset of the hits of this one.
    pub subset_of: BTreeSet<usize>,
    /// Tracks sharing some hits but neither containing nor contained.
    pub overlaps: BTreeSet<usize>,
}

impl TrackRelations {
    pub fn is_empty(&self) -> bool {
        self.superset_of.is_empty() && self.subset_of.is_empty() && self.overlaps.is_empty()
    }
}

/// Why the trajectory was truncated at a cut position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutKind {
    /// The trajectory reaches the source foil (`x = 0`).
    SourceFoil,
    /// The trajectory leaves the tracker volume.
    TrackerExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackCut {
    pub s: f64,
    pub kind: CutKind,
}

/// A reconstructed track candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Track2 {
    pub id: usize,
    pub shape: TrackShape,
    /// Fitted trajectory; a kinked track holds a [`Curve::Kinked`].
    pub curve: Curve,
    /// Indexes of the associated hits in the input collection.
    pub hits: BTreeSet<usize>,
    /// Trajectory sampled between its first and last hits.
    pub polyline: Polyline2,
    pub kink: Option<KinkInfo>,
    /// Curvilinear positions where the extrapolated trajectory is cut.
    pub cuts: Vec<TrackCut>,
    pub chi2: f64,
    pub ndof: usize,
    pub delayed: bool,
    pub missing_hits: Vec<ClusterMissingHit>,
    /// Input indexes of the hits also held by another track.
    pub shared_hits: BTreeSet<usize>,
    pub quality: TrackQuality,
    pub relations: TrackRelations,
}

impl Track2 {
    pub fn nhits(&self) -> usize {
        self.hits.len()
    }

    pub fn effective_pvalue(&self) -> f64 {
        self.quality.effective_pvalue(self.nhits())
    }

    /// Crossed cells without any hit nor another good reason to stay silent.
    pub fn effective_missing_hits(&self) -> usize {
        self.missing_hits
            .iter()
            .filter(|m| m.reason == MissingHitReason::NoTrigger)
            .count()
    }

    /// `chi2 / ndof`, infinite without degree of freedom.
    pub fn reduced_chi2(&self) -> f64 {
        if self.ndof == 0 {
            f64::INFINITY
        } else {
            self.chi2 / self.ndof as f64
        }
    }

    /// Curvilinear range covered by the sampled trajectory.
    pub fn s_range(&self) -> Option<(f64, f64)> {
        Some((self.polyline.first()?.1, self.polyline.last()?.1))
    }

    /// True when every sample of the polyline and the kink are finite.
    pub fn is_finite(&self) -> bool {
        self.polyline.is_finite()
            && self.chi2.is_finite()
            && self
                .kink
                .as_ref()
                .map(|k| k.point.x.is_finite() && k.point.y.is_finite() && k.s.is_finite())
                .unwrap_or(true)
    }
}

impl fmt::Display for Track2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Track2(id={}, shape={}, hits={}, chi2/ndof={:.3}/{}, missing={}",
            self.id,
            self.shape,
            self.nhits(),
            self.chi2,
            self.ndof,
            self.missing_hits.len()
        )?;
        write!(f, ", rank={}", self.quality.rank)?;
        if let Some(k) = &self.kink {
            write!(f, ", kink=({:.2}, {:.2})", k.point.x, k.point.y)?;
        }
        if f.alternate() {
            write!(f, ", curve={}", self.curve.kind())?;
            for c in &self.cuts {
                write!(f, ", cut {:?}@{:.2}", c.kind, c.s)?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod track_tests {
    use super::*;
    use crate::geometry::line2::Line2;
    use crate::tracker::CellId;

    #[test]
    fn test_track_helpers() {
        let mut pl = Polyline2::new();
        pl.push(Point2::new(0.0, 0.0), -3.0);
        pl.push(Point2::new(1.0, 0.0), 4.0);
        let t = Track2 {
            id: 0,
            shape: TrackShape::Line,
            curve: Line2::new(0.0, 1.0, 0.0).unwrap().into(),
            hits: [1, 2, 3].into_iter().collect(),
            polyline: pl,
            kink: None,
            cuts: vec![],
            chi2: 6.0,
            ndof: 2,
            delayed: false,
            missing_hits: vec![
                ClusterMissingHit {
                    cell: CellId::new(1, 2, 3),
                    reason: MissingHitReason::NoTrigger,
                },
                ClusterMissingHit {
                    cell: CellId::new(1, 2, 4),
                    reason: MissingHitReason::DeadCell,
                },
            ],
            shared_hits: BTreeSet::new(),
            quality: TrackQuality::default(),
            relations: TrackRelations::default(),
        };
        assert_eq!(t.nhits(), 3);
        assert_eq!(t.reduced_chi2(), 3.0);
        assert_eq!(t.s_range(), Some((-3.0, 4.0)));
        assert!(t.is_finite());
        assert_eq!(t.effective_missing_hits(), 1);
        assert!(t.to_string().starts_with("Track2(id=0, shape=line"));
        assert!(t.to_string().contains("rank=good"));
    }

    #[test]
    fn test_effective_pvalue() {
        let mut q = TrackQuality {
            pvalue: 1e-6,
            no_outliers_pvalue: 0.4,
            ..TrackQuality::default()
        };
        // no outlier: the full p-value
        assert_eq!(q.effective_pvalue(5), 1e-6);
        q.outliers.insert(7);
        assert_eq!(q.effective_pvalue(5), 0.4);
        // too few hits left without the outliers
        assert_eq!(q.effective_pvalue(3), 1e-6);
        assert!(QualityRank::Good < QualityRank::Bad);
    }
}
