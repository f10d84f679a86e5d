//! Kink search on straight candidates.
//!
//! Two situations are handled:
//!
//! * **split**: a single line holds every hit but a two-arm fit, split somewhere
//!   along the track, improves the chi-square by more than `kink_chi2_threshold`;
//! * **merge**: two line candidates of the same group meet at an intercept lying
//!   beyond one end of each of them, close to both and inside the tracker. The last
//!   wire of an arm may sit past the true kink by up to half a cell diagonal, so an
//!   intercept that close to an end still counts as beyond it.
//!
//! In both cases the result is a [`KinkedCandidate`] whose trajectory is a
//! [`KinkedCurve2`] built on a [`Segment2`] running from the far end of the first arm
//! to the kink.
use std::collections::BTreeSet;
use std::f64::consts::SQRT_2;
use std::sync::Arc;

use tracing::debug;

use crate::geometry::curves::{Curve, KinkedCurve2};
use crate::geometry::line2::Line2;
use crate::geometry::segment2::Segment2;
use crate::geometry::{cross, Point2};
use crate::lttc_errors::LttcError;
use crate::track::KinkInfo;
use crate::tracker::{Tracker, TrackerHit};

use super::candidate::{chi2, contact_points, Candidate, Model};
use super::LttcParams;

/// Two straight arms meeting at `point`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct KinkedCandidate {
    pub first: Candidate,
    pub second: Candidate,
    pub point: Point2,
}

impl KinkedCandidate {
    pub(super) fn chi2(&self) -> f64 {
        self.first.chi2 + self.second.chi2
    }

    /// Two parameters per arm.
    pub(super) fn ndof(&self) -> usize {
        (self.first.hits.len() + self.second.hits.len()).saturating_sub(4)
    }

    pub(super) fn hits(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .first
            .hits
            .iter()
            .chain(self.second.hits.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

fn as_line(c: &Candidate) -> Option<Line2> {
    match c.model {
        Model::Line(l) => Some(l),
        Model::Circle(_) => None,
    }
}

/// Fit a straight arm on `selected`, starting from the contacts seen by `seed`.
fn fit_arm(
    seed: &Model,
    hits: &[TrackerHit],
    selected: &[usize],
    min_err: f64,
) -> Option<Candidate> {
    let mut model = *seed;
    for _ in 0..2 {
        let contacts = contact_points(&model, hits, selected);
        model = Model::Line(Line2::fit(&contacts).ok()?);
    }
    let chi2 = chi2(&model, hits, selected, min_err);
    Some(Candidate {
        model,
        hits: selected.to_vec(),
        chi2,
    })
}

/// Curvilinear range of the contact points of `selected` on `line`.
fn s_range(line: &Line2, hits: &[TrackerHit], selected: &[usize]) -> (f64, f64) {
    let model = Model::Line(*line);
    selected
        .iter()
        .map(|&i| line.curvilinear(&model.contact_point(&hits[i])))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s), hi.max(s))
        })
}

/// Best two-arm split of a straight candidate.
///
/// The hits are ordered along the line; each split leaving at least
/// `min_kink_arm_hits` on both sides is fitted with two lines. The split with the
/// largest chi-square improvement is kept when the improvement exceeds
/// `kink_chi2_threshold` and the arms meet inside the tracker within `kink_max_gap`
/// of the innermost hit of each arm.
pub(super) fn split(
    candidate: &Candidate,
    hits: &[TrackerHit],
    tracker: &Tracker,
    params: &LttcParams,
) -> Option<KinkedCandidate> {
    let line = as_line(candidate)?;
    let arm = params.min_kink_arm_hits;
    if candidate.hits.len() < 2 * arm {
        return None;
    }
    let mut ordered = candidate.hits.clone();
    ordered.sort_by(|&a, &b| {
        line.curvilinear(&hits[a].position)
            .total_cmp(&line.curvilinear(&hits[b].position))
    });

    let mut best: Option<(f64, KinkedCandidate)> = None;
    for k in arm..=(ordered.len() - arm) {
        let (left, right) = ordered.split_at(k);
        let (Some(first), Some(second)) = (
            fit_arm(&candidate.model, hits, left, params.min_drift_error),
            fit_arm(&candidate.model, hits, right, params.min_drift_error),
        ) else {
            continue;
        };
        let gain = candidate.chi2 - (first.chi2 + second.chi2);
        if gain <= params.kink_chi2_threshold || best.as_ref().is_some_and(|(g, _)| *g >= gain) {
            continue;
        }
        let (Some(l1), Some(l2)) = (as_line(&first), as_line(&second)) else {
            continue;
        };
        let Some(point) = l1.intersection(&l2) else {
            continue;
        };
        let inner_first = hits[left[left.len() - 1]].position;
        let inner_second = hits[right[0]].position;
        let close = nalgebra::distance(&point, &inner_first) <= params.kink_max_gap
            && nalgebra::distance(&point, &inner_second) <= params.kink_max_gap;
        if close && tracker.contains(&point) {
            best = Some((
                gain,
                KinkedCandidate {
                    first,
                    second,
                    point,
                },
            ));
        }
    }
    if let Some((gain, k)) = &best {
        debug!(gain, x = k.point.x, y = k.point.y, "kink found by split");
    }
    best.map(|(_, k)| k)
}

/// Join two straight candidates meeting beyond one end of each.
///
/// The intercept must lie inside the tracker, outside the curvilinear span of the
/// contact points of both lines shrunk by half a cell diagonal at each end (never in
/// the middle of a track) and within `kink_max_gap` of the closest end of each.
pub(super) fn merge(
    a: &Candidate,
    b: &Candidate,
    hits: &[TrackerHit],
    tracker: &Tracker,
    params: &LttcParams,
) -> Option<KinkedCandidate> {
    let (la, lb) = (as_line(a)?, as_line(b)?);
    let point = la.intersection(&lb)?;
    if !tracker.contains(&point) {
        return None;
    }
    let tolerance = SQRT_2 * tracker.rcell();
    for (line, c) in [(&la, a), (&lb, b)] {
        let (lo, hi) = s_range(line, hits, &c.hits);
        let s = line.curvilinear(&point);
        if s > lo + tolerance && s < hi - tolerance {
            return None;
        }
        let gap = (s - lo).abs().min((s - hi).abs());
        if gap > params.kink_max_gap {
            return None;
        }
    }
    debug!(x = point.x, y = point.y, "kink found by merge");
    Some(KinkedCandidate {
        first: a.clone(),
        second: b.clone(),
        point,
    })
}

/// Wire of `selected` the farthest from `point`, projected on `line`.
fn far_end(line: &Line2, hits: &[TrackerHit], selected: &[usize], point: &Point2) -> Option<Point2> {
    selected
        .iter()
        .map(|&i| line.orthogonal_projection(&hits[i].position))
        .max_by(|p, q| {
            nalgebra::distance(p, point).total_cmp(&nalgebra::distance(q, point))
        })
}

/// Trajectory of a kinked candidate.
///
/// Return
/// ----------
/// * The kinked curve, its kink description and the curvilinear length of the two
///   arms (the curve is sampled on `[0, length]`).
pub(super) fn kinked_curve(
    k: &KinkedCandidate,
    hits: &[TrackerHit],
) -> Result<(Curve, KinkInfo, f64), LttcError> {
    let invalid = || LttcError::InvalidCurve("kink arms are not straight".into());
    let l1 = as_line(&k.first).ok_or_else(invalid)?;
    let l2 = as_line(&k.second).ok_or_else(invalid)?;
    let start = far_end(&l1, hits, &k.first.hits, &k.point).ok_or_else(invalid)?;
    let stop = far_end(&l2, hits, &k.second.hits, &k.point).ok_or_else(invalid)?;

    let base = Segment2::new(start, k.point)?;
    let outgoing = Segment2::new(k.point, stop)?;
    let (d1, d2) = (base.direction(), outgoing.direction());
    let angle = cross(&d1, &d2).atan2(d1.dot(&d2));
    let s_pivot = base.length();
    let curve = KinkedCurve2::new(Arc::new(Curve::Segment(base)), s_pivot, angle)?;
    let arm = |c: &Candidate| -> BTreeSet<usize> { c.hits.iter().map(|&i| hits[i].index).collect() };
    let info = KinkInfo {
        point: k.point,
        s: s_pivot,
        angle,
        arms: [arm(&k.first), arm(&k.second)],
    };
    Ok((curve.into(), info, s_pivot + outgoing.length()))
}
