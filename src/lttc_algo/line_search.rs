//! Straight track search in Legendre `(θ, r)` space.
//!
//! Each hit votes along both branches of its Legendre transform in a coarse map
//! covering `θ ∈ [0, π)` and every distance reachable in the tracker. The highest
//! coarse bins seed fine maps spanning two coarse bins on each side, filled with the
//! Gauss kernel by the hits still available; the best refined peak is the line seed.
use std::f64::consts::PI;

use tracing::trace;

use crate::geometry::line2::Line2;
use crate::histogram::rt_map::RtMap;
use crate::legendre::LegendreTransform;
use crate::lttc_errors::LttcError;
use crate::tracker::{Tracker, TrackerHit};

use super::LttcParams;

/// Half width of the fine map, in coarse bins.
const FINE_SPAN: f64 = 2.0;

/// Number of coarse bins zoomed on per search.
const COARSE_SEEDS: usize = 4;

/// Coarse map covering every line crossing the tracker.
pub(super) fn coarse_map(tracker: &Tracker, params: &LttcParams) -> Result<RtMap, LttcError> {
    let (xmax, ymin, ymax) = tracker.bounds();
    let rmax = xmax.hypot(ymin.abs().max(ymax.abs())) + tracker.rcell();
    RtMap::new(
        0.0,
        PI,
        params.line_theta_bins,
        -rmax,
        rmax,
        params.line_r_bins,
    )
}

fn transform(hit: &TrackerHit) -> LegendreTransform {
    LegendreTransform::new(hit.position.x, hit.position.y, hit.drift_radius)
}

/// Add (`weight > 0`) or withdraw (`weight < 0`) the single bin votes of a hit.
pub(super) fn vote(map: &mut RtMap, hit: &TrackerHit, weight: f64) -> usize {
    map.fill_legendre(&transform(hit), None, weight)
}

/// Fold `(θ, r)` back into `θ ∈ [0, π]`.
fn fold_theta(theta: f64, r: f64) -> (f64, f64) {
    if theta < 0.0 {
        (theta + PI, -r)
    } else if theta > PI {
        (theta - PI, -r)
    } else {
        (theta, r)
    }
}

/// Zoom on a coarse bin and return the refined fine peak `(θ, r, content)`.
fn zoom(
    coarse: &RtMap,
    ibin: usize,
    hits: &[TrackerHit],
    pool: &[usize],
    params: &LttcParams,
) -> Result<Option<(f64, f64, f64)>, LttcError> {
    let Some((it, ir)) = coarse.bin_to_indexes(ibin) else {
        return Ok(None);
    };
    let (tc, rc) = (coarse.t_center(it), coarse.r_center(ir));
    let (ht, hr) = (FINE_SPAN * coarse.dt(), FINE_SPAN * coarse.dr());
    let nt = ((2.0 * ht / params.line_fine_delta_theta).ceil() as usize).max(1);
    let nr = ((2.0 * hr / params.line_fine_delta_r).ceil() as usize).max(1);
    let mut fine = RtMap::new(tc - ht, tc + ht, nt, rc - hr, rc + hr, nr)?;
    for &i in pool {
        fine.fill_legendre(&transform(&hits[i]), Some(params.gauss_threshold), 1.0);
    }
    let Some((fbin, content)) = fine.peak() else {
        return Ok(None);
    };
    Ok(fine
        .refine_peak(fbin, 1)
        .map(|(theta, r)| (theta, r, content)))
}

/// Line seed from the coarse map of a group.
///
/// The `COARSE_SEEDS` highest coarse bins above `line_vote_threshold` are zoomed on;
/// the fine peak with the largest content wins, so a track whose votes straddle two
/// coarse bins is not lost to a ghost bin.
///
/// Arguments
/// -----------------
/// * `coarse`: coarse map of the group, holding the votes of `pool` only.
/// * `hits`: accepted hit collection.
/// * `pool`: positions of the hits still available in the group.
///
/// Return
/// ----------
/// * `None` when the coarse peak is under `line_vote_threshold`.
pub(super) fn best_line(
    coarse: &RtMap,
    hits: &[TrackerHit],
    pool: &[usize],
    params: &LttcParams,
) -> Result<Option<Line2>, LttcError> {
    let mut best: Option<(f64, f64, f64)> = None;
    for ibin in coarse.sorted_bins().into_iter().take(COARSE_SEEDS) {
        if coarse.bin(ibin) < params.line_vote_threshold {
            break;
        }
        if let Some(found) = zoom(coarse, ibin, hits, pool, params)? {
            if best.map_or(true, |b| found.2 > b.2) {
                best = Some(found);
            }
        }
    }
    let Some((theta, r, content)) = best else {
        return Ok(None);
    };
    let (theta, r) = fold_theta(theta, r);
    trace!(theta, r, content, "line seed");
    Line2::make_from_theta_r(theta, r).map(Some)
}

#[cfg(test)]
mod line_search_tests {
    use super::*;
    use crate::geometry::Point2;
    use crate::tracker::CellId;

    #[test]
    fn test_fold_theta() {
        assert_eq!(fold_theta(-0.1, 5.0), (PI - 0.1, -5.0));
        assert_eq!(fold_theta(0.3, 5.0), (0.3, 5.0));
        let (t, r) = fold_theta(PI + 0.2, 1.0);
        assert!((t - 0.2).abs() < 1e-12 && r == -1.0);
    }

    #[test]
    fn test_vote_and_withdraw() {
        let trk = Tracker::default();
        let params = LttcParams::default();
        let mut map = coarse_map(&trk, &params).unwrap();
        let h = TrackerHit::from_cell(&trk, 0, CellId::new(1, 2, 40), 7.0, 0.3);
        let n = vote(&mut map, &h, 1.0);
        assert_eq!(n, 2 * params.line_theta_bins);
        assert!(map.peak().is_some());
        vote(&mut map, &h, -1.0);
        assert!(map.bins().iter().all(|b| *b == 0.0));
    }

    #[test]
    fn test_best_line_on_straight_track() {
        let trk = Tracker::default();
        let params = LttcParams::default();
        // y = 0.4 x + 100 on side 1
        let truth = Line2::make_from_start_stop(&Point2::new(0.0, 100.0), &Point2::new(100.0, 140.0))
            .unwrap();
        let hits: Vec<TrackerHit> = (0..9u32)
            .filter_map(|layer| {
                let x = trk.cell_position(&CellId::new(1, layer, 0)).x;
                let cell = trk.locate(&Point2::new(x, 0.4 * x + 100.0))?;
                let p = trk.cell_position(&cell);
                Some(TrackerHit::from_cell(&trk, layer as usize, cell, truth.distance(&p), 0.3))
            })
            .collect();
        assert_eq!(hits.len(), 9);
        let pool: Vec<usize> = (0..hits.len()).collect();
        let mut map = coarse_map(&trk, &params).unwrap();
        for h in &hits {
            vote(&mut map, h, 1.0);
        }
        let line = best_line(&map, &hits, &pool, &params).unwrap().unwrap();
        for h in &hits {
            let residual = (line.distance(&h.position) - h.drift_radius).abs();
            assert!(residual < 2.0, "residual {residual} for {h}");
        }

        let strict = LttcParams::builder().line_vote_threshold(50.0).build().unwrap();
        assert!(best_line(&map, &hits, &pool, &strict).unwrap().is_none());
    }
}
