//! Track quality and relations between the tracks of a pass.
//!
//! Each track gets the chi-square p-value of its hits, its outliers and a rank:
//!
//! ```text
//! p-value < min_pvalue                        bad  (+2)
//! missing hits >= max_missing_hits            bad  (+2)
//! missing hits == max_missing_hits - 1        poor (+1)
//! less than 4 hits without the outliers       poor (+1)
//! ```
//!
//! with `Good` for a null score, `Poor` for 1 and `Bad` above. The p-value used is
//! the one without the outliers when at least three hits are left.
//!
//! Once every track is built, tracks holding the same hits are twins: only the best
//! one (rank, then effective p-value) survives. Inclusions and partial overlaps of
//! the hit sets are recorded on both tracks.
use std::collections::BTreeSet;

use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::debug;

use crate::track::{QualityRank, Track2, TrackQuality};

use super::LttcParams;

/// Probability for a chi-square variable with `ndof` degrees of freedom to exceed
/// `chi2`; 1 without any degree of freedom.
pub(super) fn chi2_pvalue(chi2: f64, ndof: usize) -> f64 {
    if ndof == 0 {
        return 1.0;
    }
    ChiSquared::new(ndof as f64).map_or(0.0, |d| d.sf(chi2.max(0.0)))
}

/// Quality of a track from the normalised residuals of its hits.
///
/// Arguments
/// -----------------
/// * `residuals`: `(input index, normalised residual)` of every hit of the track.
/// * `nparams`: number of fitted parameters of the trajectory.
/// * `missing_hits`: number of untriggered cells crossed by the track.
pub(super) fn assess(
    residuals: &[(usize, f64)],
    nparams: usize,
    missing_hits: usize,
    params: &LttcParams,
) -> TrackQuality {
    let chi2: f64 = residuals.iter().map(|(_, r)| r * r).sum();
    let ndof = residuals.len().saturating_sub(nparams);
    let (outliers, kept): (Vec<_>, Vec<_>) = residuals
        .iter()
        .partition(|(_, r)| r.abs() > params.outlier_nsigma);
    let no_outliers_chi2: f64 = kept.iter().map(|(_, r)| r * r).sum();
    let no_outliers_ndof = kept.len().saturating_sub(nparams);

    let mut quality = TrackQuality {
        pvalue: chi2_pvalue(chi2, ndof),
        outliers: outliers.iter().map(|(i, _)| *i).collect(),
        no_outliers_chi2,
        no_outliers_ndof,
        no_outliers_pvalue: chi2_pvalue(no_outliers_chi2, no_outliers_ndof),
        rank: QualityRank::Good,
    };

    let mut score = 0;
    if quality.effective_pvalue(residuals.len()) < params.min_pvalue {
        score += 2;
    }
    if missing_hits >= params.max_missing_hits {
        score += 2;
    } else if missing_hits + 1 == params.max_missing_hits {
        score += 1;
    }
    if kept.len() < 4 {
        score += 1;
    }
    quality.rank = match score {
        0 => QualityRank::Good,
        1 => QualityRank::Poor,
        _ => QualityRank::Bad,
    };
    quality
}

/// `true` when `a` is a better track than its twin `b`.
fn is_better(a: &Track2, b: &Track2) -> bool {
    match a.quality.rank.cmp(&b.quality.rank) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => a.effective_pvalue() >= b.effective_pvalue(),
    }
}

/// Drop twin tracks, renumber the survivors and record their relations.
///
/// Return
/// ----------
/// * The number of dropped twins.
pub(super) fn link_tracks(tracks: &mut Vec<Track2>) -> usize {
    let mut dropped = BTreeSet::new();
    for i in 0..tracks.len() {
        for j in (i + 1)..tracks.len() {
            if dropped.contains(&i) || dropped.contains(&j) || tracks[i].hits != tracks[j].hits {
                continue;
            }
            let loser = if is_better(&tracks[i], &tracks[j]) { j } else { i };
            debug!(kept = i + j - loser, dropped = loser, "twin tracks");
            dropped.insert(loser);
        }
    }
    let mut k = 0;
    tracks.retain(|_| {
        k += 1;
        !dropped.contains(&(k - 1))
    });

    for (id, t) in tracks.iter_mut().enumerate() {
        t.id = id;
        t.relations = Default::default();
        t.shared_hits.clear();
    }
    for i in 0..tracks.len() {
        for j in (i + 1)..tracks.len() {
            let common: BTreeSet<usize> =
                tracks[i].hits.intersection(&tracks[j].hits).copied().collect();
            if common.is_empty() {
                continue;
            }
            let (ni, nj) = (tracks[i].nhits(), tracks[j].nhits());
            if common.len() == nj {
                tracks[i].relations.superset_of.insert(j);
                tracks[j].relations.subset_of.insert(i);
            } else if common.len() == ni {
                tracks[j].relations.superset_of.insert(i);
                tracks[i].relations.subset_of.insert(j);
            } else {
                tracks[i].relations.overlaps.insert(j);
                tracks[j].relations.overlaps.insert(i);
            }
            tracks[i].shared_hits.extend(common.iter().copied());
            tracks[j].shared_hits.extend(common);
        }
    }
    dropped.len()
}

#[cfg(test)]
mod quality_tests {
    use super::*;
    use crate::geometry::line2::Line2;
    use crate::geometry::polyline::Polyline2;
    use crate::track::{TrackRelations, TrackShape};
    use approx::assert_relative_eq;

    fn track(id: usize, hits: &[usize], rank: QualityRank, pvalue: f64) -> Track2 {
        Track2 {
            id,
            shape: TrackShape::Line,
            curve: Line2::new(0.0, 1.0, -(id as f64)).unwrap().into(),
            hits: hits.iter().copied().collect(),
            polyline: Polyline2::new(),
            kink: None,
            cuts: vec![],
            chi2: 1.0,
            ndof: hits.len().saturating_sub(2),
            delayed: false,
            missing_hits: vec![],
            shared_hits: BTreeSet::new(),
            quality: TrackQuality {
                pvalue,
                rank,
                ..TrackQuality::default()
            },
            relations: TrackRelations::default(),
        }
    }

    #[test]
    fn test_chi2_pvalue() {
        assert_eq!(chi2_pvalue(3.0, 0), 1.0);
        assert_relative_eq!(chi2_pvalue(0.0, 4), 1.0);
        // exp(-x/2) for two degrees of freedom
        assert_relative_eq!(chi2_pvalue(3.0, 2), (-1.5_f64).exp(), epsilon = 1e-12);
        assert!(chi2_pvalue(100.0, 3) < 1e-15);
    }

    #[test]
    fn test_assess_outliers_and_rank() {
        let params = LttcParams::default();
        let clean: Vec<(usize, f64)> = (0..8).map(|i| (i, 0.3)).collect();
        let q = assess(&clean, 2, 0, &params);
        assert!(q.outliers.is_empty());
        assert_eq!(q.rank, QualityRank::Good);
        assert!(q.pvalue > 0.99);

        // one hit far off the trajectory
        let mut dirty = clean.clone();
        dirty[3].1 = 6.0;
        let q = assess(&dirty, 2, 0, &params);
        assert_eq!(q.outliers, BTreeSet::from([3]));
        assert!(q.pvalue < params.min_pvalue);
        assert_eq!(q.no_outliers_ndof, 5);
        assert_relative_eq!(q.no_outliers_chi2, 7.0 * 0.09, epsilon = 1e-12);
        // the outlier free p-value saves the rank
        assert_eq!(q.rank, QualityRank::Good);

        // one missing hit short of the limit
        let q = assess(&clean, 2, params.max_missing_hits - 1, &params);
        assert_eq!(q.rank, QualityRank::Poor);
        let q = assess(&clean, 2, params.max_missing_hits, &params);
        assert_eq!(q.rank, QualityRank::Bad);
        let q = assess(&clean[..3], 2, 0, &params);
        assert_eq!(q.rank, QualityRank::Poor);
    }

    #[test]
    fn test_twins_are_dropped() {
        let mut tracks = vec![
            track(0, &[1, 2, 3, 4], QualityRank::Poor, 0.5),
            track(1, &[7, 8, 9], QualityRank::Good, 0.5),
            track(2, &[1, 2, 3, 4], QualityRank::Good, 0.1),
        ];
        assert_eq!(link_tracks(&mut tracks), 1);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].hits, BTreeSet::from([7, 8, 9]));
        assert_eq!(tracks[1].quality.rank, QualityRank::Good);
        assert_eq!(tracks[1].id, 1);
        assert!(tracks.iter().all(|t| t.relations.is_empty() && t.shared_hits.is_empty()));

        // same rank: the larger p-value wins
        let mut tracks = vec![
            track(0, &[1, 2, 3], QualityRank::Good, 0.1),
            track(1, &[1, 2, 3], QualityRank::Good, 0.6),
        ];
        assert_eq!(link_tracks(&mut tracks), 1);
        assert_eq!(tracks[0].quality.pvalue, 0.6);
        assert_eq!(tracks[0].id, 0);
    }

    #[test]
    fn test_contained_and_overlapping_tracks() {
        let mut tracks = vec![
            track(0, &[1, 2, 3, 4, 5], QualityRank::Good, 0.5),
            track(1, &[2, 3, 4], QualityRank::Good, 0.5),
            track(2, &[5, 6, 7, 8], QualityRank::Good, 0.5),
            track(3, &[10, 11, 12], QualityRank::Good, 0.5),
        ];
        assert_eq!(link_tracks(&mut tracks), 0);
        assert_eq!(tracks[0].relations.superset_of, BTreeSet::from([1]));
        assert_eq!(tracks[1].relations.subset_of, BTreeSet::from([0]));
        assert_eq!(tracks[0].relations.overlaps, BTreeSet::from([2]));
        assert_eq!(tracks[2].relations.overlaps, BTreeSet::from([0]));
        assert!(tracks[3].relations.is_empty());
        assert_eq!(tracks[0].shared_hits, BTreeSet::from([2, 3, 4, 5]));
        assert_eq!(tracks[2].shared_hits, BTreeSet::from([5]));
    }
}
