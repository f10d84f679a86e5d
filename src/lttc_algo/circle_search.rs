//! # Circle search
//!
//! Triplets of hits are turned into the circles tangent to their three drift
//! circles. For hits at `p_i` with drift radius `r_i`, a circle `(c, R)` is tangent
//! to the drift circle `i` when
//!
//! ```text
//! |p_i - c| = R + s_i r_i        with s_i = ±1
//! ```
//!
//! (`s_i = +1` when the wire lies outside the track circle). Subtracting the first
//! equation from the two others gives a linear system in `c` whose solution is affine
//! in `R`; substituting back yields a quadratic in `R`. The eight sign combinations
//! give every geometric solution, each with a positive radius exactly once.
//!
//! Every accepted circle votes in three [`UHistogram`] marginals (`x`, `y`, `R`) of
//! its hit group, filled through the Legendre transform of the circle at `θ = 0` and
//! `θ = π/2`. The `x` marginal seeds the circle search; once a track claims hits the
//! marginals are refilled from the surviving votes.
use std::f64::consts::FRAC_PI_2;
use std::fmt;

use itertools::Itertools;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::geometry::circle::{are_aligned, Circle};
use crate::geometry::Point2;
use crate::histogram::uhistogram::UHistogram;
use crate::legendre::LegendreTransform;
use crate::lttc_errors::LttcError;
use crate::tracker::TrackerHit;

use super::algo::{CancelToken, RunStats};
use super::LttcParams;

/// Positions of three hits in the accepted hit collection, increasing.
pub(super) type Triplet = [usize; 3];

/// Number of triplets between two cancellation checks.
pub(super) const CANCEL_CHECK_PERIOD: usize = 1024;

/// A circle vote of a triplet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct CircleVote {
    pub center: Point2,
    pub radius: f64,
    pub weight: f64,
    pub triplet: Triplet,
}

fn compatible(a: &TrackerHit, b: &TrackerHit, params: &LttcParams) -> bool {
    match a.cell.distance(&b.cell) {
        Some(d) if d <= params.max_cell_distance => {
            nalgebra::distance(&a.position, &b.position) >= params.min_hit_separation
        }
        _ => false,
    }
}

/// Enumerate the triplets of a group of hits.
///
/// Every pair of a triplet lies on the same side, within `max_cell_distance` cells
/// and at least `min_hit_separation` apart. Once `limit` triplets are stored the
/// remaining ones are only counted in `stats.triplets_truncated`.
///
/// Arguments
/// -----------------
/// * `hits`: accepted hit collection.
/// * `group`: increasing positions of the group members in `hits`.
/// * `limit`: number of triplets that may still be stored.
///
/// Return
/// ----------
/// * The stored triplets, or [`LttcError::Cancelled`].
pub(super) fn enumerate_triplets(
    hits: &[TrackerHit],
    group: &[usize],
    limit: usize,
    params: &LttcParams,
    cancel: &CancelToken,
    stats: &mut RunStats,
) -> Result<Vec<Triplet>, LttcError> {
    let n = group.len();
    // neighbours[a] holds the later members of the group compatible with member a
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|a| {
            ((a + 1)..n)
                .filter(|&b| compatible(&hits[group[a]], &hits[group[b]], params))
                .collect()
        })
        .collect();

    let mut triplets = Vec::new();
    let mut seen = 0usize;
    for a in 0..n {
        for &b in &neighbours[a] {
            for &c in &neighbours[b] {
                if neighbours[a].binary_search(&c).is_err() {
                    continue;
                }
                seen += 1;
                if seen % CANCEL_CHECK_PERIOD == 0 && cancel.is_cancelled() {
                    return Err(LttcError::Cancelled);
                }
                if triplets.len() < limit {
                    triplets.push([group[a], group[b], group[c]]);
                } else {
                    stats.triplets_truncated += 1;
                }
            }
        }
    }

    let combinations = if n >= 3 { n * (n - 1) * (n - 2) / 6 } else { 0 };
    stats.triplets_enumerated += triplets.len();
    stats.triplets_pruned += combinations - seen;
    if seen > triplets.len() {
        warn!(
            stored = triplets.len(),
            dropped = seen - triplets.len(),
            "triplet cap reached"
        );
    }
    Ok(triplets)
}

/// Circles tangent to the drift circles of three hits.
///
/// Return
/// ----------
/// * Every solution with a positive finite radius whose tangency residuals stay
///   within `tangency_nsigma` drift errors; empty when the wires are aligned.
pub(super) fn tangent_circles(h: [&TrackerHit; 3], params: &LttcParams) -> SmallVec<[Circle; 8]> {
    let mut found = SmallVec::new();
    let [p1, p2, p3] = [h[0].position, h[1].position, h[2].position];
    if are_aligned(&p1, &p2, &p3, params.collinearity_tolerance) {
        return found;
    }
    // work in the frame of the first wire
    let q2 = p2 - p1;
    let q3 = p3 - p1;
    let (a2, b2) = (2.0 * q2.x, 2.0 * q2.y);
    let (a3, b3) = (2.0 * q3.x, 2.0 * q3.y);
    let det = a2 * b3 - a3 * b2;
    let r = [h[0].drift_radius, h[1].drift_radius, h[2].drift_radius];

    for signs in (0..3).map(|_| [1.0, -1.0]).multi_cartesian_product() {
        // a null drift radius gives the same equations for both signs
        if signs.iter().zip(r.iter()).any(|(s, ri)| *s < 0.0 && *ri == 0.0) {
            continue;
        }
        let sr = [signs[0] * r[0], signs[1] * r[1], signs[2] * r[2]];
        let c2 = 2.0 * (sr[1] - sr[0]);
        let c3 = 2.0 * (sr[2] - sr[0]);
        let d2 = q2.norm_squared() - (r[1] * r[1] - r[0] * r[0]);
        let d3 = q3.norm_squared() - (r[2] * r[2] - r[0] * r[0]);

        // center = (x0, y0) + R (xr, yr)
        let x0 = (d2 * b3 - d3 * b2) / det;
        let xr = (c3 * b2 - c2 * b3) / det;
        let y0 = (a2 * d3 - a3 * d2) / det;
        let yr = (a3 * c2 - a2 * c3) / det;

        let qa = xr * xr + yr * yr - 1.0;
        let qb = 2.0 * (x0 * xr + y0 * yr - sr[0]);
        let qc = x0 * x0 + y0 * y0 - r[0] * r[0];
        let roots: SmallVec<[f64; 2]> = if qa.abs() < 1e-12 {
            if qb == 0.0 {
                SmallVec::new()
            } else {
                smallvec::smallvec![-qc / qb]
            }
        } else {
            let disc = qb * qb - 4.0 * qa * qc;
            if disc < 0.0 {
                SmallVec::new()
            } else {
                let sq = disc.sqrt();
                smallvec::smallvec![(-qb + sq) / (2.0 * qa), (-qb - sq) / (2.0 * qa)]
            }
        };

        for radius in roots {
            if !(radius.is_finite() && radius > 0.0) {
                continue;
            }
            let center = p1 + nalgebra::Vector2::new(x0 + xr * radius, y0 + yr * radius);
            let tangent = (0..3).all(|i| {
                let expected = radius + sr[i];
                let tol = params.tangency_nsigma * h[i].drift_radius_err.max(params.min_drift_error);
                expected >= 0.0 && (nalgebra::distance(&h[i].position, &center) - expected).abs() <= tol
            });
            if !tangent {
                continue;
            }
            if let Ok(c) = Circle::new(center, radius) {
                if !found.iter().any(|f: &Circle| same_circle(f, &c)) {
                    trace!(x = center.x, y = center.y, r = radius, "tangent circle");
                    found.push(c);
                }
            }
        }
    }
    found
}

fn same_circle(a: &Circle, b: &Circle) -> bool {
    let tol = 1e-9 * a.radius().max(1.0);
    nalgebra::distance(&a.center(), &b.center()) <= tol && (a.radius() - b.radius()).abs() <= tol
}

/// Circles through the contact points of `circle` moved by ± the drift errors.
///
/// The contact of hit `i` is `c + R u_i` with `u_i` the unit vector from the center
/// to the wire; it is moved along `u_i`. Aligned blurred triplets are skipped.
pub(super) fn blurred_circles(
    circle: &Circle,
    h: [&TrackerHit; 3],
    tolerance: f64,
) -> SmallVec<[Circle; 8]> {
    let c = circle.center();
    let mut contacts = [Point2::origin(); 3];
    let mut dirs = [nalgebra::Vector2::zeros(); 3];
    for i in 0..3 {
        let u = h[i].position - c;
        let n = u.norm();
        if n == 0.0 {
            return SmallVec::new();
        }
        dirs[i] = u / n;
        contacts[i] = c + circle.radius() * dirs[i];
    }
    (0..3)
        .map(|_| [1.0, -1.0])
        .multi_cartesian_product()
        .filter_map(|s| {
            let moved: Vec<Point2> = (0..3)
                .map(|i| contacts[i] + s[i] * h[i].drift_radius_err * dirs[i])
                .collect();
            Circle::build_circle(&moved[0], &moved[1], &moved[2], tolerance).ok()
        })
        .collect()
}

/// Marginal histograms of the circle votes of a hit group.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleHistograms {
    pub hx: UHistogram,
    pub hy: UHistogram,
    pub hr: UHistogram,
}

impl CircleHistograms {
    pub fn new(x_step: f64, y_step: f64, r_step: f64) -> Result<Self, LttcError> {
        Ok(CircleHistograms {
            hx: UHistogram::new(0.0, x_step)?,
            hy: UHistogram::new(0.0, y_step)?,
            hr: UHistogram::new(0.0, r_step)?,
        })
    }

    /// Vote for `circle`. The center and radius are read from its Legendre transform:
    /// `x = (concave + convex) / 2` at `θ = 0`, `y` the same at `θ = π/2`, and
    /// `R = (concave - convex) / 2`.
    pub fn fill(&mut self, circle: &Circle, weight: f64) -> Result<(), LttcError> {
        self.fill_parts(&circle.center(), circle.radius(), weight)
    }

    fn fill_parts(&mut self, center: &Point2, radius: f64, weight: f64) -> Result<(), LttcError> {
        let lt = LegendreTransform::new(center.x, center.y, radius);
        let v0 = lt.eval(0.0);
        let v90 = lt.eval(FRAC_PI_2);
        self.hx.fill_weighted(0.5 * (v0.concave + v0.convex), weight)?;
        self.hy.fill_weighted(0.5 * (v90.concave + v90.convex), weight)?;
        self.hr.fill_weighted(0.5 * (v0.concave - v0.convex), weight)?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.hx.clear();
        self.hy.clear();
        self.hr.clear();
    }

    /// Replace the content by the given votes.
    pub(super) fn refill<'v>(
        &mut self,
        votes: impl Iterator<Item = &'v CircleVote>,
    ) -> Result<(), LttcError> {
        self.clear();
        for v in votes {
            self.fill_parts(&v.center, v.radius, v.weight)?;
        }
        Ok(())
    }

    /// Dump the three histograms, each preceded by a `# name` line and followed by
    /// two blank lines (gnuplot data blocks).
    pub fn store<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for (name, h) in [("hx", &self.hx), ("hy", &self.hy), ("hr", &self.hr)] {
            writeln!(out, "# {name}")?;
            h.store(out)?;
            writeln!(out)?;
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Bucket with the highest windowed content; ties go to the lowest bucket.
fn mode(h: &UHistogram, half_width: i64) -> Option<i64> {
    h.iter()
        .map(|(i, _)| (i, h.window_sum(i, half_width)))
        .fold(None, |best: Option<(i64, f64)>, (i, w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((i, w)),
        })
        .map(|(i, _)| i)
}

/// Best circle among the live votes.
///
/// The mode of the `x` marginal of `marginals` is found first; the `y` marginal is
/// then built from the votes inside the `x` window only, and the `R` marginal from
/// the votes inside both windows, so that peaks of different tracks are not mixed.
///
/// Arguments
/// -----------------
/// * `marginals`: histograms filled with exactly the live `votes`.
/// * `votes`: live votes of the group.
///
/// Return
/// ----------
/// * The circle made of the window means and its vote weight, `None` when no vote is
///   alive or the weight stays under `min_circle_votes`.
pub(super) fn best_circle<'v>(
    marginals: &CircleHistograms,
    votes: impl Iterator<Item = &'v CircleVote> + Clone,
    params: &LttcParams,
) -> Result<Option<(Circle, f64)>, LttcError> {
    let w = params.peak_window;
    let hx = &marginals.hx;
    let Some(ix) = mode(hx, w) else {
        return Ok(None);
    };
    let in_x = |v: &&CircleVote| hx.index(v.center.x).abs_diff(ix) <= w.unsigned_abs();

    let mut hy = UHistogram::new(marginals.hy.xref(), marginals.hy.xstep())?;
    for v in votes.clone().filter(in_x) {
        hy.fill_weighted(v.center.y, v.weight)?;
    }
    let Some(iy) = mode(&hy, w) else {
        return Ok(None);
    };
    let in_y = |v: &&CircleVote| hy.index(v.center.y).abs_diff(iy) <= w.unsigned_abs();

    let mut hr = UHistogram::new(marginals.hr.xref(), marginals.hr.xstep())?;
    for v in votes.filter(in_x).filter(in_y) {
        hr.fill_weighted(v.radius, v.weight)?;
    }
    let Some(ir) = mode(&hr, w) else {
        return Ok(None);
    };
    let weight = hr.window_sum(ir, w);
    if weight < params.min_circle_votes {
        return Ok(None);
    }
    let (Some(x), Some(y), Some(r)) = (
        hx.window_mean(ix, w),
        hy.window_mean(iy, w),
        hr.window_mean(ir, w),
    ) else {
        return Ok(None);
    };
    Ok(Circle::new(Point2::new(x, y), r).ok().map(|c| (c, weight)))
}

#[cfg(test)]
mod circle_search_tests {
    use super::*;
    use crate::tracker::{CellId, Tracker};
    use approx::assert_relative_eq;

    fn hit(trk: &Tracker, index: usize, cell: CellId, truth: &Circle) -> TrackerHit {
        let p = trk.cell_position(&cell);
        TrackerHit::from_cell(trk, index, cell, truth.dist(&p), 0.3)
    }

    #[test]
    fn test_tangent_circles_contain_truth() {
        let trk = Tracker::default();
        let truth = Circle::new(Point2::new(300.0, -400.0), 500.0).unwrap();
        let cells = [
            CellId::new(1, 0, 66),
            CellId::new(1, 3, 68),
            CellId::new(1, 6, 72),
        ];
        let hits: Vec<TrackerHit> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| hit(&trk, i, *c, &truth))
            .collect();
        let circles = tangent_circles([&hits[0], &hits[1], &hits[2]], &LttcParams::default());
        assert!(!circles.is_empty() && circles.len() <= 8);
        assert!(circles
            .iter()
            .any(|c| same_circle_tol(c, &truth, 1e-5)));
        for c in &circles {
            for h in &hits {
                let d = nalgebra::distance(&h.position, &c.center());
                let ok = (d - c.radius() - h.drift_radius).abs() < 1e-5
                    || (d - c.radius() + h.drift_radius).abs() < 1e-5;
                assert!(ok, "circle {c} is not tangent to hit {h}");
            }
        }
    }

    fn same_circle_tol(a: &Circle, b: &Circle, tol: f64) -> bool {
        nalgebra::distance(&a.center(), &b.center()) < tol && (a.radius() - b.radius()).abs() < tol
    }

    #[test]
    fn test_aligned_wires_give_no_circle() {
        let trk = Tracker::default();
        let hits: Vec<TrackerHit> = (0..3)
            .map(|l| TrackerHit::from_cell(&trk, l, CellId::new(0, l as u32, 10), 5.0, 0.3))
            .collect();
        assert!(tangent_circles([&hits[0], &hits[1], &hits[2]], &LttcParams::default()).is_empty());
    }

    #[test]
    fn test_null_radii_reduce_to_circumcircle() {
        let trk = Tracker::default();
        let mk = |i: usize, x: f64, y: f64| TrackerHit {
            position: Point2::new(x, y),
            drift_radius: 0.0,
            ..TrackerHit::from_cell(&trk, i, CellId::new(1, 0, 0), 0.0, 0.3)
        };
        let hits = [mk(0, 0.0, 0.0), mk(1, 100.0, 0.0), mk(2, 50.0, 50.0)];
        let circles = tangent_circles([&hits[0], &hits[1], &hits[2]], &LttcParams::default());
        assert_eq!(circles.len(), 1);
        assert_relative_eq!(circles[0].center(), Point2::new(50.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(circles[0].radius(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_triplet_pruning() {
        let trk = Tracker::default();
        let cells = [
            CellId::new(1, 0, 10),
            CellId::new(1, 1, 11),
            CellId::new(1, 2, 12),
            CellId::new(1, 8, 60),
            CellId::new(0, 1, 11),
        ];
        let hits: Vec<TrackerHit> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| TrackerHit::from_cell(&trk, i, *c, 5.0, 0.3))
            .collect();
        let params = LttcParams::default();
        let mut stats = RunStats::default();
        let group = [0, 1, 2, 3];
        let t = enumerate_triplets(&hits, &group, 100, &params, &CancelToken::new(), &mut stats)
            .unwrap();
        assert_eq!(t, vec![[0, 1, 2]]);
        assert_eq!(stats.triplets_enumerated, 1);
        assert_eq!(stats.triplets_pruned, 3);

        let mut stats = RunStats::default();
        let t = enumerate_triplets(&hits, &group, 0, &params, &CancelToken::new(), &mut stats)
            .unwrap();
        assert!(t.is_empty());
        assert_eq!(stats.triplets_truncated, 1);
    }

    #[test]
    fn test_histograms_and_best_circle() {
        let params = LttcParams::default();
        let mut hists = CircleHistograms::new(5.0, 5.0, 5.0).unwrap();
        let truth = Circle::new(Point2::new(120.0, -40.0), 300.0).unwrap();
        hists.fill(&truth, 1.0).unwrap();
        assert_eq!(hists.hx.count(24), 1.0);
        assert_eq!(hists.hy.count(-8), 1.0);
        assert_eq!(hists.hr.count(60), 1.0);

        let mut votes = Vec::new();
        for k in 0..10 {
            let dx = 0.1 * k as f64;
            votes.push(CircleVote {
                center: Point2::new(120.0 + dx, -40.0 - dx),
                radius: 300.0 + dx,
                weight: 1.0,
                triplet: [0, 1, 2],
            });
        }
        // a lonely vote far away with the same x
        votes.push(CircleVote {
            center: Point2::new(120.0, 500.0),
            radius: 80.0,
            weight: 1.0,
            triplet: [3, 4, 5],
        });
        let mut marginals = CircleHistograms::new(5.0, 5.0, 5.0).unwrap();
        marginals.refill(votes.iter()).unwrap();
        assert_eq!(marginals.hx.entries(), 11);
        let (c, w) = best_circle(&marginals, votes.iter(), &params).unwrap().unwrap();
        assert_eq!(w, 10.0);
        assert!((c.center().x - 120.0).abs() < 2.5);
        assert!((c.center().y + 40.0).abs() < 2.5);
        assert!((c.radius() - 300.0).abs() < 2.5);

        // once the ten votes are gone, the lonely one wins
        let lonely = &votes[10..];
        marginals.refill(lonely.iter()).unwrap();
        let (c, w) = best_circle(&marginals, lonely.iter(), &params).unwrap().unwrap();
        assert_eq!(w, 1.0);
        assert!((c.radius() - 80.0).abs() < 2.5);

        marginals.refill(std::iter::empty()).unwrap();
        assert!(marginals.hx.is_empty());
        assert!(best_circle(&marginals, std::iter::empty::<&CircleVote>(), &params)
            .unwrap()
            .is_none());

        let mut out = String::new();
        hists.store(&mut out).unwrap();
        assert!(out.starts_with("# hx\n24 120 1\n"));
    }
}
