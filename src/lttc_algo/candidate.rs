//! Track models shared by the circle, line and kink searches: residuals of drift
//! hits, association, contact points and iterative refit.
use crate::geometry::circle::Circle;
use crate::geometry::line2::Line2;
use crate::geometry::Point2;
use crate::lttc_errors::LttcError;
use crate::tracker::TrackerHit;

use super::LttcParams;

/// Number of associate-then-refit iterations of [`refine`].
const MAX_REFITS: usize = 4;

/// Fitted trajectory of a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Model {
    Line(Line2),
    Circle(Circle),
}

impl Model {
    /// Signed distance from a wire to the trajectory.
    pub(super) fn signed_distance(&self, p: &Point2) -> f64 {
        match self {
            Model::Line(l) => l.signed_distance(p),
            Model::Circle(c) => c.signed_dist(p),
        }
    }

    pub(super) fn nparams(&self) -> usize {
        match self {
            Model::Line(_) => 2,
            Model::Circle(_) => 3,
        }
    }

    /// Normalised residual `(|d| - r) / σ` of a hit, with `σ` floored at `min_err`.
    pub(super) fn residual(&self, hit: &TrackerHit, min_err: f64) -> f64 {
        let d = self.signed_distance(&hit.position).abs();
        (d - hit.drift_radius) / hit.drift_radius_err.max(min_err)
    }

    /// Point of the drift circle of `hit` closest to the trajectory.
    pub(super) fn contact_point(&self, hit: &TrackerHit) -> Point2 {
        let sd = self.signed_distance(&hit.position);
        let sign = if sd < 0.0 { -1.0 } else { 1.0 };
        let toward = match self {
            Model::Line(l) => l.normal(),
            Model::Circle(c) => {
                let u = hit.position - c.center();
                let n = u.norm();
                if n == 0.0 {
                    return hit.position;
                }
                u / n
            }
        };
        hit.position - sign * hit.drift_radius * toward
    }

    /// Fit a model of the same family through `points`.
    pub(super) fn refit(&self, points: &[Point2]) -> Result<Model, LttcError> {
        match self {
            Model::Line(_) => Line2::fit(points).map(Model::Line),
            Model::Circle(_) => Circle::fit(points).map(Model::Circle),
        }
    }

    fn is_acceptable(&self, params: &LttcParams) -> bool {
        match self {
            Model::Line(l) => l.theta().is_finite() && l.r().is_finite(),
            Model::Circle(c) => {
                c.radius() >= params.min_radius
                    && c.radius() <= params.max_radius
                    && c.center().x.is_finite()
                    && c.center().y.is_finite()
            }
        }
    }
}

/// A model with its associated hits.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Candidate {
    pub model: Model,
    /// Positions of the hits in the accepted hit collection, sorted.
    pub hits: Vec<usize>,
    pub chi2: f64,
}

impl Candidate {
    pub(super) fn ndof(&self) -> usize {
        self.hits.len().saturating_sub(self.model.nparams())
    }

    fn reduced_chi2(&self) -> f64 {
        match self.ndof() {
            0 => f64::INFINITY,
            n => self.chi2 / n as f64,
        }
    }

    /// More hits first, then smaller reduced chi-square.
    pub(super) fn is_better_than(&self, other: &Candidate) -> bool {
        match self.hits.len().cmp(&other.hits.len()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.reduced_chi2() < other.reduced_chi2(),
        }
    }
}

/// Hits of `pool` whose normalised residual is within `association_nsigma`.
pub(super) fn associate(
    model: &Model,
    hits: &[TrackerHit],
    pool: &[usize],
    params: &LttcParams,
) -> Vec<usize> {
    pool.iter()
        .copied()
        .filter(|&i| {
            model.residual(&hits[i], params.min_drift_error).abs() <= params.association_nsigma
        })
        .collect()
}

pub(super) fn chi2(model: &Model, hits: &[TrackerHit], selected: &[usize], min_err: f64) -> f64 {
    selected
        .iter()
        .map(|&i| model.residual(&hits[i], min_err).powi(2))
        .sum()
}

pub(super) fn contact_points(model: &Model, hits: &[TrackerHit], selected: &[usize]) -> Vec<Point2> {
    selected
        .iter()
        .map(|&i| model.contact_point(&hits[i]))
        .collect()
}

/// Associate hits to a seed model and refit it on their contact points until the
/// association is stable.
///
/// Return
/// ----------
/// * `None` when fewer than `min_track_hits` hits remain associated.
pub(super) fn refine(
    seed: Model,
    hits: &[TrackerHit],
    pool: &[usize],
    params: &LttcParams,
) -> Option<Candidate> {
    let mut model = seed;
    let mut assoc = associate(&model, hits, pool, params);
    for _ in 0..MAX_REFITS {
        if assoc.len() < params.min_track_hits {
            return None;
        }
        let contacts = contact_points(&model, hits, &assoc);
        match model.refit(&contacts) {
            Ok(m) if m.is_acceptable(params) => model = m,
            _ => break,
        }
        let next = associate(&model, hits, pool, params);
        if next == assoc {
            break;
        }
        assoc = next;
    }
    if assoc.len() < params.min_track_hits {
        return None;
    }
    let chi2 = chi2(&model, hits, &assoc, params.min_drift_error);
    Some(Candidate {
        model,
        hits: assoc,
        chi2,
    })
}
