//! # LTTC driver
//!
//! [`LttcAlgo`] runs one track finding pass over the hits of an event. It borrows the
//! [`Tracker`] geometry and owns every working buffer of the pass (triplets, circle
//! votes, histograms, Legendre maps), which are released by [`LttcAlgo::terminate`]
//! or [`LttcAlgo::reset`].
//!
//! ## States
//!
//! ```text
//! Initialized --prepare--> Prepared --step 1--> Step1Done --step 2--> Step2Done
//!      ^                                                                  |
//!      |                                                               step 3
//!    reset                                                                v
//!      +------------------ Terminated <--terminate-- Step3Done <----------+
//! ```
//!
//! Calling an operation from another state returns [`LttcError::StepOutOfOrder`].
//! A [`CancelToken`] is checked between the steps and periodically inside the triplet
//! loops; a cancelled pass returns [`LttcError::Cancelled`] and must be reset.
//!
//! ## Hit groups
//!
//! Hits are processed per group of tracker side and timing class (prompt or delayed):
//! triplets, circle marginals, Legendre maps and track candidates never mix two
//! groups. Only the final hit sharing and twin detection look across tracks.
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::DPI;
use crate::geometry::circle::Circle;
use crate::geometry::curves::{Curve, Curve2};
use crate::geometry::line2::Line2;
use crate::geometry::Vector2;
use crate::histogram::rt_map::RtMap;
use crate::lttc_errors::LttcError;
use crate::missing_hits::{MissingHitReason, MissingHitsFinder};
use crate::track::{CutKind, KinkInfo, Track2, TrackCut, TrackRelations, TrackShape};
use crate::tracker::{Tracker, TrackerHit};

use super::candidate::{associate, chi2, refine, Candidate, Model};
use super::circle_search::{self, CircleHistograms, CircleVote, Triplet, CANCEL_CHECK_PERIOD};
use super::kink::{self, KinkedCandidate};
use super::line_search;
use super::quality;
use super::LttcParams;

/// Weight of each blurred circle vote.
const BLUR_WEIGHT: f64 = 1.0 / 8.0;

/// Largest distance (mm) between the position of a hit and the wire of its cell.
const POSITION_TOLERANCE: f64 = 1e-3;

/// Position of the driver in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgoState {
    Initialized,
    Prepared,
    Step1Done,
    Step2Done,
    Step3Done,
    Terminated,
}

impl fmt::Display for AlgoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlgoState::Initialized => "initialized",
            AlgoState::Prepared => "prepared",
            AlgoState::Step1Done => "step 1 done",
            AlgoState::Step2Done => "step 2 done",
            AlgoState::Step3Done => "step 3 done",
            AlgoState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Shared cancellation flag.
///
/// Clones share the same flag, so a token kept by another thread can stop a pass
/// running in this one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub input_hits: usize,
    /// Hits failing validation or outside the tracker layout.
    pub rejected_hits: usize,
    pub dead_cell_hits: usize,
    /// Hits whose position is not the wire of their cell.
    pub misplaced_hits: usize,
    pub triplets_enumerated: usize,
    /// Triplets removed by the cell distance or separation cuts.
    pub triplets_pruned: usize,
    /// Triplets dropped once `max_triplets` was reached.
    pub triplets_truncated: usize,
    /// Triplets without any tangent circle (aligned wires, no real solution).
    pub degenerate_triplets: usize,
    pub rejected_radius: usize,
    pub circle_votes: usize,
    pub blurred_votes: usize,
    pub line_votes: usize,
    pub candidates: usize,
    pub kinks: usize,
    /// Hits added to a track while already held by another one.
    pub shared_hits: usize,
    /// Tracks dropped for holding non-finite values or a degenerate trajectory.
    pub dropped_tracks: usize,
    /// Tracks dropped for holding the same hits as a better one.
    pub twin_tracks: usize,
    pub tracks: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "LTTC Run Statistics")?;
            writeln!(f, "-------------------")?;
            writeln!(f, "  input hits          : {}", self.input_hits)?;
            writeln!(f, "  rejected hits       : {}", self.rejected_hits)?;
            writeln!(f, "  dead cell hits      : {}", self.dead_cell_hits)?;
            writeln!(f, "  misplaced hits      : {}", self.misplaced_hits)?;
            writeln!(f, "  triplets enumerated : {}", self.triplets_enumerated)?;
            writeln!(f, "  triplets pruned     : {}", self.triplets_pruned)?;
            writeln!(f, "  triplets truncated  : {}", self.triplets_truncated)?;
            writeln!(f, "  degenerate triplets : {}", self.degenerate_triplets)?;
            writeln!(f, "  rejected radius     : {}", self.rejected_radius)?;
            writeln!(f, "  circle votes        : {}", self.circle_votes)?;
            writeln!(f, "  blurred votes       : {}", self.blurred_votes)?;
            writeln!(f, "  line votes          : {}", self.line_votes)?;
            writeln!(f, "  candidates          : {}", self.candidates)?;
            writeln!(f, "  kinks               : {}", self.kinks)?;
            writeln!(f, "  shared hits         : {}", self.shared_hits)?;
            writeln!(f, "  dropped tracks      : {}", self.dropped_tracks)?;
            writeln!(f, "  twin tracks         : {}", self.twin_tracks)?;
            write!(f, "  tracks              : {}", self.tracks)
        } else {
            write!(
                f,
                "RunStats(hits={}, rejected={}, triplets={}, circle_votes={}, tracks={})",
                self.input_hits,
                self.rejected_hits + self.dead_cell_hits + self.misplaced_hits,
                self.triplets_enumerated,
                self.circle_votes,
                self.tracks
            )
        }
    }
}

/// Result of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LttcOutput {
    pub tracks: Vec<Track2>,
    /// Input indexes of the accepted hits left out of every track.
    pub unclustered_hits: Vec<usize>,
    /// Input indexes of the hits refused by [`LttcAlgo::prepare`].
    pub rejected_hits: Vec<usize>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    side: u8,
    delayed: bool,
}

impl GroupKey {
    fn of(hit: &TrackerHit) -> Self {
        GroupKey {
            side: hit.cell.side,
            delayed: hit.delayed,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Group {
    /// Positions of the group hits in the accepted collection.
    members: Vec<usize>,
    /// Members not yet claimed by a track.
    pool: Vec<usize>,
    /// Marginals of the live circle votes of the group.
    circles: Option<CircleHistograms>,
    /// Some votes died since `circles` was filled.
    stale: bool,
    coarse: Option<RtMap>,
}

/// A candidate before its conversion into a track.
#[derive(Debug, Clone)]
enum ProtoTrack {
    Smooth(Candidate),
    Kinked(KinkedCandidate),
}

impl ProtoTrack {
    fn hits(&self) -> Vec<usize> {
        match self {
            ProtoTrack::Smooth(c) => c.hits.clone(),
            ProtoTrack::Kinked(k) => k.hits(),
        }
    }
}

/// `(input index, normalised residual)` of the hits of a candidate.
fn residuals<'h>(
    hits: &'h [TrackerHit],
    c: &'h Candidate,
    min_err: f64,
) -> impl Iterator<Item = (usize, f64)> + 'h {
    c.hits
        .iter()
        .map(move |&i| (hits[i].index, c.model.residual(&hits[i], min_err)))
}

/// Driver of a track finding pass.
#[derive(Debug)]
pub struct LttcAlgo<'a> {
    tracker: &'a Tracker,
    params: LttcParams,
    state: AlgoState,
    cancel: CancelToken,
    hits: Vec<TrackerHit>,
    rejected: Vec<usize>,
    groups: BTreeMap<GroupKey, Group>,
    triplets: Vec<Triplet>,
    votes: Vec<CircleVote>,
    tracks: Vec<Track2>,
    stats: RunStats,
}

impl<'a> LttcAlgo<'a> {
    /// Create a driver.
    ///
    /// Arguments
    /// -----------------
    /// * `tracker`: geometry oracle, borrowed for the lifetime of the driver.
    /// * `params`: configuration, validated with the [`super::LttcParamsBuilder`] rules.
    ///
    /// Return
    /// ----------
    /// * A driver in the [`AlgoState::Initialized`] state, or
    ///   [`LttcError::InvalidParameter`].
    pub fn new(tracker: &'a Tracker, params: LttcParams) -> Result<Self, LttcError> {
        params.validate()?;
        Ok(LttcAlgo {
            tracker,
            params,
            state: AlgoState::Initialized,
            cancel: CancelToken::new(),
            hits: Vec::new(),
            rejected: Vec::new(),
            groups: BTreeMap::new(),
            triplets: Vec::new(),
            votes: Vec::new(),
            tracks: Vec::new(),
            stats: RunStats::default(),
        })
    }

    /// Install a cancellation token shared with the caller.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> AlgoState {
        self.state
    }

    pub fn params(&self) -> &LttcParams {
        &self.params
    }

    pub fn tracker(&self) -> &Tracker {
        self.tracker
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Hits accepted by [`LttcAlgo::prepare`].
    pub fn hits(&self) -> &[TrackerHit] {
        &self.hits
    }

    /// Triplets of step 1, as positions in [`LttcAlgo::hits`].
    pub fn triplets(&self) -> &[[usize; 3]] {
        &self.triplets
    }

    /// Circle vote marginals of a group, filled in step 2 and refilled from the
    /// surviving votes each time step 3 extracts a track of the group.
    pub fn circle_histograms(&self, side: u8, delayed: bool) -> Option<&CircleHistograms> {
        self.groups
            .get(&GroupKey { side, delayed })
            .and_then(|g| g.circles.as_ref())
    }

    /// Coarse Legendre map of a group, available from step 2.
    pub fn line_map(&self, side: u8, delayed: bool) -> Option<&RtMap> {
        self.groups
            .get(&GroupKey { side, delayed })
            .and_then(|g| g.coarse.as_ref())
    }

    /// Tracks of step 3.
    pub fn tracks(&self) -> &[Track2] {
        &self.tracks
    }

    fn expect_state(&self, expected: AlgoState) -> Result<(), LttcError> {
        if self.state != expected {
            return Err(LttcError::StepOutOfOrder {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    fn check_cancel(&self) -> Result<(), LttcError> {
        if self.cancel.is_cancelled() {
            warn!(state = %self.state, "track finding pass cancelled");
            return Err(LttcError::Cancelled);
        }
        Ok(())
    }

    /// Load the hits of an event.
    ///
    /// Hits failing [`TrackerHit::validate`] or outside the tracker layout are counted
    /// in `rejected_hits`, hits away from the wire of their cell in `misplaced_hits`
    /// and hits on dead cells in `dead_cell_hits`. None of them takes part in the
    /// pass.
    pub fn prepare(&mut self, hits: &[TrackerHit]) -> Result<(), LttcError> {
        self.expect_state(AlgoState::Initialized)?;
        self.stats.input_hits = hits.len();
        for hit in hits {
            if let Err(e) = hit.validate() {
                debug!(error = %e, "hit rejected");
                self.stats.rejected_hits += 1;
                self.rejected.push(hit.index);
                continue;
            }
            if !self.tracker.has_cell(&hit.cell) {
                debug!(index = hit.index, cell = %hit.cell, "hit outside the tracker layout");
                self.stats.rejected_hits += 1;
                self.rejected.push(hit.index);
                continue;
            }
            let wire = self.tracker.cell_position(&hit.cell);
            if nalgebra::distance(&wire, &hit.position) > POSITION_TOLERANCE {
                warn!(
                    index = hit.index,
                    cell = %hit.cell,
                    x = hit.position.x,
                    y = hit.position.y,
                    "hit position does not match its cell"
                );
                self.stats.misplaced_hits += 1;
                self.rejected.push(hit.index);
                continue;
            }
            if self.tracker.is_dead(&hit.cell) {
                debug!(index = hit.index, cell = %hit.cell, "hit on a dead cell");
                self.stats.dead_cell_hits += 1;
                self.rejected.push(hit.index);
                continue;
            }
            let pos = self.hits.len();
            self.hits.push(*hit);
            self.groups
                .entry(GroupKey::of(hit))
                .or_default()
                .members
                .push(pos);
        }
        for g in self.groups.values_mut() {
            g.pool = g.members.clone();
        }
        debug!(
            accepted = self.hits.len(),
            rejected = self.rejected.len(),
            groups = self.groups.len(),
            "hits prepared"
        );
        self.state = AlgoState::Prepared;
        Ok(())
    }

    /// Run the three steps.
    pub fn do_steps(&mut self) -> Result<(), LttcError> {
        self.expect_state(AlgoState::Prepared)?;
        self.do_step_1()?;
        self.do_step_2()?;
        self.do_step_3()
    }

    /// Step 1: pruned triplet enumeration, group by group, under the global
    /// `max_triplets` cap.
    pub fn do_step_1(&mut self) -> Result<(), LttcError> {
        self.expect_state(AlgoState::Prepared)?;
        self.check_cancel()?;
        let mut triplets = Vec::new();
        for g in self.groups.values() {
            let limit = self.params.max_triplets.saturating_sub(triplets.len());
            triplets.extend(circle_search::enumerate_triplets(
                &self.hits,
                &g.members,
                limit,
                &self.params,
                &self.cancel,
                &mut self.stats,
            )?);
        }
        self.triplets = triplets;
        debug!(
            triplets = self.triplets.len(),
            pruned = self.stats.triplets_pruned,
            truncated = self.stats.triplets_truncated,
            "step 1 done"
        );
        self.state = AlgoState::Step1Done;
        Ok(())
    }

    /// Step 2: circle votes of every triplet and line votes of every hit.
    pub fn do_step_2(&mut self) -> Result<(), LttcError> {
        self.expect_state(AlgoState::Step1Done)?;
        self.check_cancel()?;
        let p = &self.params;
        for g in self.groups.values_mut() {
            g.circles = Some(CircleHistograms::new(p.x_step, p.y_step, p.r_step)?);
        }
        for (n, t) in self.triplets.iter().enumerate() {
            if n % CANCEL_CHECK_PERIOD == 0 && self.cancel.is_cancelled() {
                return Err(LttcError::Cancelled);
            }
            let h = [&self.hits[t[0]], &self.hits[t[1]], &self.hits[t[2]]];
            let Some(marginals) = self
                .groups
                .get_mut(&GroupKey::of(h[0]))
                .and_then(|g| g.circles.as_mut())
            else {
                continue;
            };
            let circles = circle_search::tangent_circles(h, p);
            if circles.is_empty() {
                self.stats.degenerate_triplets += 1;
                continue;
            }
            let in_window = |c: &Circle| c.radius() >= p.min_radius && c.radius() <= p.max_radius;
            for c in circles {
                if !in_window(&c) {
                    self.stats.rejected_radius += 1;
                    continue;
                }
                marginals.fill(&c, 1.0)?;
                self.votes.push(CircleVote {
                    center: c.center(),
                    radius: c.radius(),
                    weight: 1.0,
                    triplet: *t,
                });
                self.stats.circle_votes += 1;
                if !p.blur_circles {
                    continue;
                }
                for b in circle_search::blurred_circles(&c, h, p.collinearity_tolerance) {
                    if !in_window(&b) {
                        continue;
                    }
                    marginals.fill(&b, BLUR_WEIGHT)?;
                    self.votes.push(CircleVote {
                        center: b.center(),
                        radius: b.radius(),
                        weight: BLUR_WEIGHT,
                        triplet: *t,
                    });
                    self.stats.blurred_votes += 1;
                }
            }
        }

        for g in self.groups.values_mut() {
            if g.members.len() < p.min_track_hits {
                continue;
            }
            let mut map = line_search::coarse_map(self.tracker, p)?;
            for &i in &g.members {
                self.stats.line_votes += line_search::vote(&mut map, &self.hits[i], 1.0);
            }
            g.coarse = Some(map);
        }
        debug!(
            circle_votes = self.stats.circle_votes,
            blurred_votes = self.stats.blurred_votes,
            degenerate = self.stats.degenerate_triplets,
            line_votes = self.stats.line_votes,
            "step 2 done"
        );
        self.state = AlgoState::Step2Done;
        Ok(())
    }

    /// Best circle or line candidate over every group, with its group.
    fn best_candidate(&self, alive: &[bool]) -> Result<Option<(GroupKey, Candidate)>, LttcError> {
        let p = &self.params;
        let mut best: Option<(GroupKey, Candidate)> = None;
        let mut consider = |key: GroupKey, c: Option<Candidate>| {
            if let Some(c) = c {
                if best.as_ref().map_or(true, |(_, b)| c.is_better_than(b)) {
                    best = Some((key, c));
                }
            }
        };
        for (&key, g) in &self.groups {
            if g.pool.len() < p.min_track_hits {
                continue;
            }
            let votes = self
                .votes
                .iter()
                .zip(alive.iter())
                .filter(|(v, a)| **a && GroupKey::of(&self.hits[v.triplet[0]]) == key)
                .map(|(v, _)| v);
            if let Some(marginals) = &g.circles {
                if let Some((circle, _)) = circle_search::best_circle(marginals, votes, p)? {
                    consider(key, refine(Model::Circle(circle), &self.hits, &g.pool, p));
                }
            }
            if let Some(coarse) = &g.coarse {
                if let Some(line) = line_search::best_line(coarse, &self.hits, &g.pool, p)? {
                    consider(key, refine(Model::Line(line), &self.hits, &g.pool, p));
                }
            }
        }
        Ok(best)
    }

    /// Remove the hits of a candidate from its group: pool, line votes and circle votes.
    fn claim(&mut self, key: GroupKey, candidate: &Candidate, alive: &mut [bool]) {
        let owned = |i: &usize| candidate.hits.binary_search(i).is_ok();
        let mut killed = false;
        for (v, a) in self.votes.iter().zip(alive.iter_mut()) {
            if *a && v.triplet.iter().any(owned) {
                *a = false;
                killed = true;
            }
        }
        if let Some(g) = self.groups.get_mut(&key) {
            g.pool.retain(|i| !owned(i));
            if let Some(map) = g.coarse.as_mut() {
                for i in &candidate.hits {
                    line_search::vote(map, &self.hits[*i], -1.0);
                }
            }
            g.stale |= killed;
        }
    }

    /// Refill the circle marginals of the groups that lost votes.
    fn refresh_marginals(&mut self, alive: &[bool]) -> Result<(), LttcError> {
        let (hits, votes) = (&self.hits, &self.votes);
        for (key, g) in self.groups.iter_mut().filter(|(_, g)| g.stale) {
            if let Some(marginals) = g.circles.as_mut() {
                marginals.refill(
                    votes
                        .iter()
                        .zip(alive.iter())
                        .filter(|(v, a)| **a && GroupKey::of(&hits[v.triplet[0]]) == *key)
                        .map(|(v, _)| v),
                )?;
            }
            g.stale = false;
        }
        Ok(())
    }

    /// Give every smooth track the hits of the other tracks of its group that it fits.
    fn share_hits(&mut self, protos: &mut [(GroupKey, ProtoTrack)]) {
        let owners: Vec<(GroupKey, Vec<usize>)> =
            protos.iter().map(|(k, p)| (*k, p.hits())).collect();
        for (n, (key, proto)) in protos.iter_mut().enumerate() {
            let ProtoTrack::Smooth(c) = proto else {
                continue;
            };
            let key = *key;
            let mut foreign: Vec<usize> = owners
                .iter()
                .enumerate()
                .filter(|(m, (k, _))| *m != n && *k == key)
                .flat_map(|(_, (_, h))| h.iter().copied())
                .filter(|i| c.hits.binary_search(i).is_err())
                .collect();
            foreign.sort_unstable();
            foreign.dedup();
            let extra = associate(&c.model, &self.hits, &foreign, &self.params);
            if extra.is_empty() {
                continue;
            }
            debug!(hits = ?extra, "hits shared with another track");
            self.stats.shared_hits += extra.len();
            c.hits.extend(extra);
            c.hits.sort_unstable();
            c.chi2 = chi2(&c.model, &self.hits, &c.hits, self.params.min_drift_error);
        }
    }

    /// Step 3: iterative candidate extraction, kink search and track assembly.
    pub fn do_step_3(&mut self) -> Result<(), LttcError> {
        self.expect_state(AlgoState::Step2Done)?;
        let mut alive = vec![true; self.votes.len()];
        let mut found: Vec<(GroupKey, Candidate)> = Vec::new();
        loop {
            self.check_cancel()?;
            if found.len() >= self.params.max_tracks {
                warn!(max_tracks = self.params.max_tracks, "track cap reached");
                break;
            }
            self.refresh_marginals(&alive)?;
            let Some((key, candidate)) = self.best_candidate(&alive)? else {
                break;
            };
            debug!(
                side = key.side,
                delayed = key.delayed,
                hits = candidate.hits.len(),
                chi2 = candidate.chi2,
                "candidate extracted"
            );
            self.claim(key, &candidate, &mut alive);
            found.push((key, candidate));
        }
        self.stats.candidates = found.len();

        let mut protos = if self.params.kink_search {
            self.find_kinks(found)
        } else {
            found
                .into_iter()
                .map(|(k, c)| (k, ProtoTrack::Smooth(c)))
                .collect()
        };
        if self.params.share_hits {
            self.share_hits(&mut protos);
        }

        let mut tracks = Vec::with_capacity(protos.len());
        for (key, proto) in protos {
            match self.build_track(tracks.len(), key, proto) {
                Ok(track) if track.is_finite() => tracks.push(track),
                Ok(track) => {
                    warn!(id = track.id, "track with non-finite values dropped");
                    self.stats.dropped_tracks += 1;
                }
                Err(e) => {
                    warn!(error = %e, "degenerate track dropped");
                    self.stats.dropped_tracks += 1;
                }
            }
        }
        self.stats.twin_tracks = quality::link_tracks(&mut tracks);
        self.stats.tracks = tracks.len();
        self.tracks = tracks;
        debug!(
            candidates = self.stats.candidates,
            kinks = self.stats.kinks,
            shared_hits = self.stats.shared_hits,
            twins = self.stats.twin_tracks,
            tracks = self.stats.tracks,
            "step 3 done"
        );
        self.state = AlgoState::Step3Done;
        Ok(())
    }

    /// Split kinked lines, then merge pairs of lines meeting at a kink.
    fn find_kinks(&mut self, found: Vec<(GroupKey, Candidate)>) -> Vec<(GroupKey, ProtoTrack)> {
        let mut protos: Vec<(GroupKey, ProtoTrack)> = found
            .into_iter()
            .map(|(key, c)| {
                match kink::split(&c, &self.hits, self.tracker, &self.params) {
                    Some(k) => (key, ProtoTrack::Kinked(k)),
                    None => (key, ProtoTrack::Smooth(c)),
                }
            })
            .collect();

        loop {
            let n = protos.len();
            let merged = (0..n)
                .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
                .find_map(|(i, j)| match (&protos[i], &protos[j]) {
                    ((ki, ProtoTrack::Smooth(a)), (kj, ProtoTrack::Smooth(b))) if ki == kj => {
                        kink::merge(a, b, &self.hits, self.tracker, &self.params)
                            .map(|k| (i, j, k))
                    }
                    _ => None,
                });
            let Some((i, j, k)) = merged else {
                break;
            };
            let key = protos[i].0;
            protos.remove(j);
            protos[i] = (key, ProtoTrack::Kinked(k));
        }
        self.stats.kinks = protos
            .iter()
            .filter(|(_, p)| matches!(p, ProtoTrack::Kinked(_)))
            .count();
        protos
    }

    /// Curvilinear span of the wires of `selected` on a circle, unwrapped around
    /// their mean direction.
    fn arc_range(&self, circle: &Circle, selected: &[usize]) -> (f64, f64) {
        let c = circle.center();
        let mean = selected.iter().fold(Vector2::zeros(), |acc, &i| {
            let u = self.hits[i].position - c;
            let n = u.norm();
            if n > 0.0 {
                acc + u / n
            } else {
                acc
            }
        });
        let phi0 = mean.y.atan2(mean.x);
        selected
            .iter()
            .map(|&i| {
                let u = self.hits[i].position - c;
                let mut d = (u.y.atan2(u.x) - phi0) % DPI;
                if d > PI {
                    d -= DPI;
                } else if d <= -PI {
                    d += DPI;
                }
                circle.radius() * (phi0 + d)
            })
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s), hi.max(s))
            })
    }

    fn line_range(&self, line: &Line2, selected: &[usize]) -> (f64, f64) {
        selected
            .iter()
            .map(|&i| line.curvilinear(&self.hits[i].position))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s), hi.max(s))
            })
    }

    /// Extrapolate the trajectory beyond both ends of `[lo, hi]` until it reaches the
    /// source foil or leaves the tracker.
    fn find_cuts(
        &self,
        curve: &Curve,
        lo: f64,
        hi: f64,
        side: u8,
        reach: f64,
    ) -> Result<Vec<TrackCut>, LttcError> {
        let step = 0.5 * self.tracker.rcell();
        let nsteps = (reach / step).ceil() as usize;
        let mut cuts = Vec::new();
        for (origin, dir) in [(lo, -1.0), (hi, 1.0)] {
            let mut s_prev = origin;
            let mut prev = curve.compute(origin)?;
            for k in 1..=nsteps {
                let s = origin + dir * step * k as f64;
                let p = curve.compute(s)?;
                let crossed = if side == 0 { p.x >= 0.0 } else { p.x <= 0.0 };
                if crossed {
                    let t = if prev.x != p.x {
                        prev.x / (prev.x - p.x)
                    } else {
                        1.0
                    };
                    cuts.push(TrackCut {
                        s: s_prev + (s - s_prev) * t.clamp(0.0, 1.0),
                        kind: CutKind::SourceFoil,
                    });
                    break;
                }
                if !self.tracker.contains(&p) {
                    cuts.push(TrackCut {
                        s,
                        kind: CutKind::TrackerExit,
                    });
                    break;
                }
                s_prev = s;
                prev = p;
            }
        }
        cuts.sort_by(|a, b| a.s.total_cmp(&b.s));
        Ok(cuts)
    }

    fn build_track(&self, id: usize, key: GroupKey, proto: ProtoTrack) -> Result<Track2, LttcError> {
        let min_err = self.params.min_drift_error;
        let (fit_residuals, nparams): (Vec<(usize, f64)>, usize) = match &proto {
            ProtoTrack::Smooth(c) => (residuals(&self.hits, c, min_err).collect(), c.model.nparams()),
            ProtoTrack::Kinked(k) => (
                residuals(&self.hits, &k.first, min_err)
                    .chain(residuals(&self.hits, &k.second, min_err))
                    .collect(),
                4,
            ),
        };
        let (xmax, ymin, ymax) = self.tracker.bounds();
        let reach = (2.0 * xmax).hypot(ymax - ymin);
        let (shape, curve, lo, hi, kink, positions, chi2, ndof, reach): (
            TrackShape,
            Curve,
            f64,
            f64,
            Option<KinkInfo>,
            Vec<usize>,
            f64,
            usize,
            f64,
        ) = match proto {
            ProtoTrack::Smooth(c) => {
                let ndof = c.ndof();
                match c.model {
                    Model::Line(l) => {
                        let (lo, hi) = self.line_range(&l, &c.hits);
                        (TrackShape::Line, l.into(), lo, hi, None, c.hits, c.chi2, ndof, reach)
                    }
                    Model::Circle(ci) => {
                        let (lo, hi) = self.arc_range(&ci, &c.hits);
                        let free = 0.5 * (DPI * ci.radius() - (hi - lo)).max(0.0);
                        (
                            TrackShape::Circle,
                            ci.into(),
                            lo,
                            hi,
                            None,
                            c.hits,
                            c.chi2,
                            ndof,
                            reach.min(free),
                        )
                    }
                }
            }
            ProtoTrack::Kinked(k) => {
                let (curve, info, length) = kink::kinked_curve(&k, &self.hits)?;
                (
                    TrackShape::Kink,
                    curve,
                    0.0,
                    length,
                    Some(info),
                    k.hits(),
                    k.chi2(),
                    k.ndof(),
                    reach,
                )
            }
        };

        let polyline = curve.generate_samples(lo, hi, self.params.nsamples)?;
        let cuts = self.find_cuts(&curve, lo, hi, key.side, reach)?;
        let owned: BTreeSet<usize> = positions.iter().copied().collect();
        let missing_hits = if self.params.find_missing_hits {
            MissingHitsFinder::new(self.tracker, &self.hits, &owned)
                .with_delayed(key.delayed)
                .with_expected_distance_err(self.params.min_drift_error)
                .find_along_polyline(&polyline)?
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let untriggered = missing_hits
            .iter()
            .filter(|m| m.reason == MissingHitReason::NoTrigger)
            .count();
        let quality = quality::assess(&fit_residuals, nparams, untriggered, &self.params);

        Ok(Track2 {
            id,
            shape,
            curve,
            hits: positions.iter().map(|&i| self.hits[i].index).collect(),
            polyline,
            kink,
            cuts,
            chi2,
            ndof,
            delayed: key.delayed,
            missing_hits,
            shared_hits: BTreeSet::new(),
            quality,
            relations: TrackRelations::default(),
        })
    }

    /// Hand over the tracks of the pass and release the working storage.
    pub fn terminate(&mut self) -> Result<LttcOutput, LttcError> {
        self.expect_state(AlgoState::Step3Done)?;
        let clustered: BTreeSet<usize> = self
            .tracks
            .iter()
            .flat_map(|t| t.hits.iter().copied())
            .collect();
        let unclustered_hits = self
            .hits
            .iter()
            .map(|h| h.index)
            .filter(|i| !clustered.contains(i))
            .collect();
        let output = LttcOutput {
            tracks: std::mem::take(&mut self.tracks),
            unclustered_hits,
            rejected_hits: std::mem::take(&mut self.rejected),
            stats: self.stats.clone(),
        };
        self.clear_storage();
        info!(
            tracks = output.tracks.len(),
            unclustered = output.unclustered_hits.len(),
            rejected = output.rejected_hits.len(),
            "track finding pass terminated"
        );
        self.state = AlgoState::Terminated;
        Ok(output)
    }

    fn clear_storage(&mut self) {
        self.hits.clear();
        self.rejected.clear();
        self.groups.clear();
        self.triplets.clear();
        self.votes.clear();
        self.tracks.clear();
    }

    /// Return to [`AlgoState::Initialized`] from any state, dropping every result.
    pub fn reset(&mut self) {
        self.clear_storage();
        self.stats = RunStats::default();
        self.state = AlgoState::Initialized;
    }

    /// `prepare`, `do_steps` and `terminate` in one call.
    ///
    /// See also
    /// ------------
    /// * [`LttcAlgo::reset`] – needed before running a second event.
    pub fn run(&mut self, hits: &[TrackerHit]) -> Result<LttcOutput, LttcError> {
        self.prepare(hits)?;
        self.do_steps()?;
        self.terminate()
    }
}
