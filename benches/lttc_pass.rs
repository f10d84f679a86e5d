use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lttc::constants::DEFAULT_COLLINEARITY_TOLERANCE;
use lttc::geometry::circle::Circle;
use lttc::geometry::line2::Line2;
use lttc::geometry::Point2;
use lttc::histogram::rt_map::RtMap;
use lttc::legendre::LegendreTransform;
use lttc::lttc_algo::{LttcAlgo, LttcParams};
use lttc::tracker::{Tracker, TrackerHit};

/// Hits of a straight track crossing one side of the tracker, with drift noise.
fn straight_track(tracker: &Tracker, rng: &mut StdRng, side: u8, first_index: usize) -> Vec<TrackerHit> {
    let (xmax, ymin, ymax) = tracker.bounds();
    let sign = if side == 0 { -1.0 } else { 1.0 };
    let y0 = rng.random_range(0.6 * ymin..0.6 * ymax);
    let slope = rng.random_range(-1.0..1.0);
    let start = Point2::new(sign * 35.0, y0);
    let stop = Point2::new(sign * (xmax - 20.0), y0 + slope * (xmax - 55.0));
    let line = Line2::make_from_start_stop(&start, &stop).unwrap();

    let mut seen = BTreeSet::new();
    let mut hits = Vec::new();
    for i in 0..=1000 {
        let p = start + (stop - start) * (i as f64 / 1000.0);
        let Some(cell) = tracker.locate(&p) else {
            continue;
        };
        if !seen.insert(cell) {
            continue;
        }
        let d = line.distance(&tracker.cell_position(&cell));
        if d > tracker.rcell() {
            continue;
        }
        let r = (d + rng.random_range(-0.2..0.2)).max(0.0);
        hits.push(TrackerHit::from_cell(tracker, first_index + hits.len(), cell, r, 0.3));
    }
    hits
}

fn two_track_event(tracker: &Tracker, rng: &mut StdRng) -> Vec<TrackerHit> {
    let mut hits = straight_track(tracker, rng, 0, 0);
    let n = hits.len();
    hits.extend(straight_track(tracker, rng, 1, n));
    hits
}

/// Full pass on random two-track events.
fn bench_full_pass(c: &mut Criterion) {
    let tracker = Tracker::default();
    let mut rng = StdRng::seed_from_u64(0xDEADBEEF);
    let params = LttcParams::default();

    c.bench_function("lttc/full_pass_two_tracks", |b| {
        b.iter_batched(
            || two_track_event(&tracker, &mut rng),
            |hits| {
                let mut algo = LttcAlgo::new(&tracker, params.clone()).unwrap();
                let output = algo.run(black_box(&hits)).unwrap();
                black_box(output);
            },
            BatchSize::SmallInput,
        )
    });
}

/// Legendre voting of one hit in the default coarse map.
fn bench_legendre_fill(c: &mut Criterion) {
    let tracker = Tracker::default();
    let params = LttcParams::default();
    let (xmax, _, ymax) = tracker.bounds();
    let rmax = xmax.hypot(ymax) + tracker.rcell();
    let mut map = RtMap::new(
        0.0,
        std::f64::consts::PI,
        params.line_theta_bins,
        -rmax,
        rmax,
        params.line_r_bins,
    )
    .unwrap();
    let lt = LegendreTransform::new(250.0, -120.0, 12.5);

    c.bench_function("lttc/legendre_fill_coarse", |b| {
        b.iter(|| black_box(map.fill_legendre(black_box(&lt), None, 1.0)))
    });
}

/// Circumcircles of random triplets.
fn bench_circumcircle(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xFEEDFACE);
    let samples = 10_000usize;

    c.bench_function("lttc/circumcircle", |b| {
        b.iter_batched(
            || {
                (0..samples)
                    .map(|_| {
                        let mut p = || Point2::new(rng.random_range(-500.0..500.0), rng.random_range(-500.0..500.0));
                        (p(), p(), p())
                    })
                    .collect::<Vec<_>>()
            },
            |cases| {
                for (p1, p2, p3) in cases {
                    let circle = Circle::make_circle(
                        black_box(&p1),
                        black_box(&p2),
                        black_box(&p3),
                        DEFAULT_COLLINEARITY_TOLERANCE,
                    );
                    black_box(circle);
                }
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_full_pass, bench_legendre_fill, bench_circumcircle);
criterion_main!(benches);
