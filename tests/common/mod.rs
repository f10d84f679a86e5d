#![allow(dead_code)]

use std::collections::BTreeSet;

use lttc::geometry::circle::Circle;
use lttc::geometry::line2::Line2;
use lttc::geometry::segment2::Segment2;
use lttc::geometry::Point2;
use lttc::tracker::{CellId, Tracker, TrackerHit};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Drift radius uncertainty of the generated hits (mm).
pub const DRIFT_ERR: f64 = 0.3;

pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42_u64) // seed for reproducibility
}

/// Cells visited by a densely sampled path, in path order.
fn visited_cells(tracker: &Tracker, path: impl Iterator<Item = Point2>) -> Vec<CellId> {
    let mut seen = BTreeSet::new();
    let mut cells = Vec::new();
    for p in path {
        if let Some(cell) = tracker.locate(&p) {
            if seen.insert(cell) {
                cells.push(cell);
            }
        }
    }
    cells
}

/// One hit per cell whose wire lies within a cell radius of the trajectory.
fn make_hits(
    tracker: &Tracker,
    cells: Vec<CellId>,
    first_index: usize,
    distance: impl Fn(&Point2) -> f64,
    noise: f64,
    rng: &mut StdRng,
) -> Vec<TrackerHit> {
    let mut hits = Vec::new();
    for cell in cells {
        let d = distance(&tracker.cell_position(&cell));
        if d > tracker.rcell() {
            continue;
        }
        let r = if noise > 0.0 {
            (d + rng.random_range(-noise..=noise)).max(0.0)
        } else {
            d
        };
        hits.push(TrackerHit::from_cell(
            tracker,
            first_index + hits.len(),
            cell,
            r,
            DRIFT_ERR,
        ));
    }
    hits
}

/// Hits of a straight track from `start` to `stop`.
pub fn hits_on_segment(
    tracker: &Tracker,
    start: Point2,
    stop: Point2,
    first_index: usize,
    noise: f64,
    rng: &mut StdRng,
) -> Vec<TrackerHit> {
    let line = Line2::make_from_start_stop(&start, &stop).unwrap();
    let n = nalgebra::distance(&start, &stop).ceil() as usize;
    let path = (0..=n).map(|i| start + (stop - start) * (i as f64 / n as f64));
    let cells = visited_cells(tracker, path);
    make_hits(tracker, cells, first_index, |p| line.distance(p), noise, rng)
}

/// Hits of a circular track between the polar angles `phi1` and `phi2`.
pub fn hits_on_arc(
    tracker: &Tracker,
    circle: &Circle,
    phi1: f64,
    phi2: f64,
    first_index: usize,
    noise: f64,
    rng: &mut StdRng,
) -> Vec<TrackerHit> {
    let n = (circle.radius() * (phi2 - phi1).abs()).ceil() as usize;
    let c = circle.center();
    let path = (0..=n).map(|i| {
        let phi = phi1 + (phi2 - phi1) * i as f64 / n as f64;
        Point2::new(c.x + circle.radius() * phi.cos(), c.y + circle.radius() * phi.sin())
    });
    let cells = visited_cells(tracker, path);
    make_hits(tracker, cells, first_index, |p| circle.dist(p), noise, rng)
}

/// Hits of a track following the polyline through `nodes` (kinked tracks).
pub fn hits_on_path(
    tracker: &Tracker,
    nodes: &[Point2],
    first_index: usize,
    noise: f64,
    rng: &mut StdRng,
) -> Vec<TrackerHit> {
    let segments: Vec<Segment2> = nodes
        .windows(2)
        .map(|w| Segment2::new(w[0], w[1]).unwrap())
        .collect();
    let path = nodes.windows(2).flat_map(|w| {
        let n = nalgebra::distance(&w[0], &w[1]).ceil() as usize;
        let (a, b) = (w[0], w[1]);
        (0..=n).map(move |i| a + (b - a) * (i as f64 / n as f64))
    });
    let cells = visited_cells(tracker, path);
    let distance = |p: &Point2| {
        segments
            .iter()
            .map(|s| s.distance(p))
            .fold(f64::INFINITY, f64::min)
    };
    make_hits(tracker, cells, first_index, distance, noise, rng)
}

/// Concatenate hit lists, keeping the first hit of each cell, and renumber them.
pub fn merge_hits(lists: Vec<Vec<TrackerHit>>) -> Vec<TrackerHit> {
    let mut seen = BTreeSet::new();
    let mut hits = Vec::new();
    for h in lists.into_iter().flatten() {
        if seen.insert(h.cell) {
            hits.push(TrackerHit {
                index: hits.len(),
                ..h
            });
        }
    }
    hits
}
