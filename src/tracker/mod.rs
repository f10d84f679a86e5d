//! # Tracker geometry
//!
//! Planar model of a two-sided drift-cell tracker: the source foil lies on `x = 0`,
//! each side holds `nlayers × nrows` square cells of half width `rcell`.
//!
//! ```text
//!  side 0 (x < 0)                  foil                  side 1 (x > 0)
//! |calo| layer nl-1 ... layer 0 |skip| |skip| layer 0 ... layer nl-1 |calo|
//! ```
//!
//! Cell `(side, layer, row)` has its anode wire at
//!
//! ```text
//! x = ±(xmin + source_xskip + rcell (1 + 2 layer))      (negative on side 0)
//! y = ymin + xcalo_yskip + rcell (1 + 2 row)
//! ```
//!
//! The [`Tracker`] is the read-only geometry oracle of the track finder: it maps
//! cells to positions and back, and lists the cells crossed by a segment or a
//! polyline. Dead cells are described by [`TrackerConditions`].
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CALO_XSKIP, DEFAULT_CELL_RADIUS, DEFAULT_NLAYERS, DEFAULT_NROWS, DEFAULT_SOURCE_XSKIP,
    DEFAULT_XCALO_YSKIP, LENGTH_EPS, NSIDES,
};
use crate::geometry::polyline::Polyline2;
use crate::geometry::{is_valid_point, Point2, Vector2};
use crate::lttc_errors::LttcError;

pub mod cell_id;
pub mod tracker_hit;

pub use cell_id::CellId;
pub use tracker_hit::TrackerHit;

/// Dimensions of the drift-cell layout (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerLayout {
    pub rcell: f64,
    pub nlayers: u32,
    pub nrows: u32,
    pub source_xskip: f64,
    pub calo_xskip: f64,
    pub xcalo_yskip: f64,
}

impl Default for TrackerLayout {
    fn default() -> Self {
        TrackerLayout {
            rcell: DEFAULT_CELL_RADIUS,
            nlayers: DEFAULT_NLAYERS,
            nrows: DEFAULT_NROWS,
            source_xskip: DEFAULT_SOURCE_XSKIP,
            calo_xskip: DEFAULT_CALO_XSKIP,
            xcalo_yskip: DEFAULT_XCALO_YSKIP,
        }
    }
}

/// Running conditions of the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConditions {
    dead_cells: BTreeSet<CellId>,
}

impl TrackerConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_dead_cell(&self, cell: &CellId) -> bool {
        self.dead_cells.contains(cell)
    }

    pub fn add_dead_cell(&mut self, cell: CellId) {
        self.dead_cells.insert(cell);
    }

    pub fn remove_dead_cell(&mut self, cell: &CellId) {
        self.dead_cells.remove(cell);
    }

    pub fn dead_cells(&self) -> &BTreeSet<CellId> {
        &self.dead_cells
    }

    pub fn clear_dead_cells(&mut self) {
        self.dead_cells.clear();
    }
}

/// Geometry oracle of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    layout: TrackerLayout,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    conditions: TrackerConditions,
}

impl Default for Tracker {
    fn default() -> Self {
        Tracker::build(TrackerLayout::default())
    }
}

impl Tracker {
    /// Build a tracker from a layout.
    ///
    /// Return
    /// ----------
    /// * The tracker, or [`LttcError::InvalidParameter`] for a non-positive cell size,
    ///   negative gaps or an empty layout.
    pub fn new(layout: TrackerLayout) -> Result<Self, LttcError> {
        let gaps = [layout.source_xskip, layout.calo_xskip, layout.xcalo_yskip];
        if !(layout.rcell.is_finite() && layout.rcell > 0.0) {
            return Err(LttcError::InvalidParameter("rcell must be > 0".into()));
        }
        if gaps.iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(LttcError::InvalidParameter(
                "tracker gaps must be finite and >= 0".into(),
            ));
        }
        if layout.nlayers == 0 || layout.nrows == 0 {
            return Err(LttcError::InvalidParameter(
                "tracker needs at least one layer and one row".into(),
            ));
        }
        Ok(Tracker::build(layout))
    }

    fn build(layout: TrackerLayout) -> Self {
        let xmax = layout.source_xskip
            + layout.nlayers as f64 * 2.0 * layout.rcell
            + layout.calo_xskip;
        let dy = 2.0 * layout.xcalo_yskip + layout.nrows as f64 * 2.0 * layout.rcell;
        Tracker {
            layout,
            xmin: 0.0,
            xmax,
            ymin: -dy / 2.0,
            ymax: dy / 2.0,
            conditions: TrackerConditions::default(),
        }
    }

    pub fn with_conditions(mut self, conditions: TrackerConditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn conditions(&self) -> &TrackerConditions {
        &self.conditions
    }

    pub fn layout(&self) -> &TrackerLayout {
        &self.layout
    }

    pub fn rcell(&self) -> f64 {
        self.layout.rcell
    }

    /// `(xmax, ymin, ymax)`: the tracker spans `(-xmax, xmax) × (ymin, ymax)`.
    pub fn bounds(&self) -> (f64, f64, f64) {
        (self.xmax, self.ymin, self.ymax)
    }

    pub fn is_dead(&self, cell: &CellId) -> bool {
        self.conditions.has_dead_cell(cell)
    }

    /// True when the identifier designates an existing cell.
    pub fn has_cell(&self, cell: &CellId) -> bool {
        cell.side < NSIDES && cell.layer < self.layout.nlayers && cell.row < self.layout.nrows
    }

    /// Position of the anode wire of a cell.
    pub fn cell_position(&self, cell: &CellId) -> Point2 {
        let l = &self.layout;
        let mut x = self.xmin + l.source_xskip + l.rcell * (1.0 + 2.0 * cell.layer as f64);
        if cell.side == 0 {
            x = -x;
        }
        let y = self.ymin + l.xcalo_yskip + l.rcell * (1.0 + 2.0 * cell.row as f64);
        Point2::new(x, y)
    }

    /// Strictly inside the tracker volume (cells and gaps).
    pub fn contains(&self, p: &Point2) -> bool {
        p.x > -self.xmax && p.x < self.xmax && p.y > self.ymin && p.y < self.ymax
    }

    /// Cell containing `p`, `None` outside the cell area.
    pub fn locate(&self, p: &Point2) -> Option<CellId> {
        if !is_valid_point(p) {
            return None;
        }
        let l = &self.layout;
        let side = if p.x < 0.0 { 0 } else { 1 };
        let absx = p.x.abs();
        let x0 = self.xmin + l.source_xskip;
        let y0 = self.ymin + l.xcalo_yskip;
        if absx < x0 || absx > self.xmax - l.calo_xskip {
            return None;
        }
        if p.y < y0 || p.y > self.ymax - l.xcalo_yskip {
            return None;
        }
        let layer = (((absx - x0) / (2.0 * l.rcell)) as u32).min(l.nlayers - 1);
        let row = (((p.y - y0) / (2.0 * l.rcell)) as u32).min(l.nrows - 1);
        Some(CellId::new(side, layer, row))
    }

    /// Cells whose square is crossed by the segment `[start, stop]`.
    ///
    /// A cell counts as crossed when the part of the segment inside its square is
    /// longer than a nanometre, so a segment only grazing a corner is ignored.
    ///
    /// Arguments
    /// -----------------
    /// * `start`, `stop`: segment ends; they may lie outside the tracker.
    ///
    /// Return
    /// ----------
    /// * The ordered set of crossed cells (possibly empty).
    /// * [`LttcError::DegenerateSegment`] when the ends coincide, or
    ///   [`LttcError::NonFiniteValue`] for non-finite coordinates.
    pub fn intersect_segment(
        &self,
        start: &Point2,
        stop: &Point2,
    ) -> Result<BTreeSet<CellId>, LttcError> {
        for v in [start.x, start.y, stop.x, stop.y] {
            if !v.is_finite() {
                return Err(LttcError::NonFiniteValue(v));
            }
        }
        let d = stop - start;
        if d.norm() < LENGTH_EPS {
            return Err(LttcError::DegenerateSegment);
        }
        let l = &self.layout;
        let pitch = 2.0 * l.rcell;
        let y0 = self.ymin + l.xcalo_yskip;
        let row_of = |y: f64| ((y - y0) / pitch).floor();
        let rlo = (row_of(start.y.min(stop.y)) - 1.0).max(0.0) as u32;
        let rhi = (row_of(start.y.max(stop.y)) + 1.0).min(l.nrows as f64 - 1.0);
        let mut crossed = BTreeSet::new();
        if rhi < 0.0 {
            return Ok(crossed);
        }
        let rhi = rhi as u32;
        for side in 0..NSIDES {
            let on_side = if side == 0 {
                start.x.min(stop.x) < 0.0
            } else {
                start.x.max(stop.x) >= 0.0
            };
            if !on_side {
                continue;
            }
            for layer in 0..l.nlayers {
                for row in rlo..=rhi {
                    let cell = CellId::new(side, layer, row);
                    let c = self.cell_position(&cell);
                    if let Some((t0, t1)) = clip_to_square(start, &d, &c, l.rcell) {
                        if (t1 - t0) * d.norm() > 1e-6 {
                            crossed.insert(cell);
                        }
                    }
                }
            }
        }
        Ok(crossed)
    }

    /// Union of the cells crossed by the consecutive segments of a polyline.
    pub fn intersect_polyline(&self, polyline: &Polyline2) -> Result<BTreeSet<CellId>, LttcError> {
        let mut crossed = BTreeSet::new();
        for w in polyline.points().windows(2) {
            if nalgebra::distance(&w[0], &w[1]) < LENGTH_EPS {
                continue;
            }
            crossed.extend(self.intersect_segment(&w[0], &w[1])?);
        }
        Ok(crossed)
    }
}

/// Liang–Barsky clipping of `start + t·d` (`t ∈ [0, 1]`) against the axis aligned
/// square of half width `half` centred on `c`.
fn clip_to_square(start: &Point2, d: &Vector2, c: &Point2, half: f64) -> Option<(f64, f64)> {
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let checks = [
        (-d.x, start.x - (c.x - half)),
        (d.x, (c.x + half) - start.x),
        (-d.y, start.y - (c.y - half)),
        (d.y, (c.y + half) - start.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q <= 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}
