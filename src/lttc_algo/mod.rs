//! # LTTC track finding parameters
//!
//! This module defines the [`LttcParams`] configuration struct and its builder, which
//! control how the **Legendre transform tracker clustering** pass enumerates hit
//! triplets, votes for circles and lines, extracts candidates and searches kinks.
//!
//! ## Pipeline overview
//!
//! 1. **Triplet enumeration** ([`LttcAlgo::do_step_1`])
//!    Hits are grouped by tracker side and timing class; triplets are formed inside a
//!    group when every pair is within `max_cell_distance` cells and `min_hit_separation`
//!    apart. At most `max_triplets` triplets are kept.
//!
//! 2. **Voting** ([`LttcAlgo::do_step_2`])
//!    Every triplet yields the circles tangent to its three drift circles (radius in
//!    `[min_radius, max_radius]`). Each circle, plus up to eight blurred copies when
//!    `blur_circles` is set, votes in the `x`, `y` and radius histograms of steps
//!    `x_step`, `y_step`, `r_step`. In parallel every hit fills a coarse
//!    `line_theta_bins × line_r_bins` Legendre map of its group.
//!
//! 3. **Extraction** ([`LttcAlgo::do_step_3`])
//!    The best circle candidate (mode search with a `peak_window` half width) and the
//!    best line candidate (coarse peak above `line_vote_threshold`, then a fine map of
//!    resolution `line_fine_delta_theta × line_fine_delta_r` filled with a Gauss kernel
//!    cut at `gauss_threshold`) compete; the one with more hits within
//!    `association_nsigma` wins, is refitted and becomes a track. Optional kink search
//!    then splits or merges straight tracks when it improves the chi-square by more
//!    than `kink_chi2_threshold`.
//!
//! 4. **Quality** ([`LttcAlgo::do_step_3`], after extraction)
//!    With `share_hits`, every smooth track also takes the hits of the other tracks
//!    of its group that it fits. Each track then gets a chi-square p-value, its
//!    outliers (residual above `outlier_nsigma`) and a rank from `min_pvalue` and
//!    `max_missing_hits`. Tracks with identical hit sets are twins and only the best
//!    ranked one is kept; contained and overlapping tracks are recorded.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lttc::lttc_algo::LttcParams;
//!
//! let params = LttcParams::builder()
//!     .max_cell_distance(3)
//!     .min_radius(50.0)
//!     .kink_chi2_threshold(20.0)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```
//!
//! ## See also
//!
//! * [`LttcAlgo`] – the driver consuming these parameters.
//! * [`crate::track::Track2`] – the produced tracks.
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COLLINEARITY_TOLERANCE, DEFAULT_NSAMPLES};
use crate::lttc_errors::LttcError;

pub mod algo;
mod candidate;
mod circle_search;
mod kink;
mod line_search;
mod quality;

pub use algo::{AlgoState, CancelToken, LttcAlgo, LttcOutput, RunStats};
pub use circle_search::CircleHistograms;

/// Configuration of a track finding pass.
///
/// Fields
/// -----------------
/// **Triplet pruning**
/// * `max_cell_distance` – maximal Chebyshev cell distance between two hits of a triplet.
/// * `min_hit_separation` – minimal distance (mm) between two wires of a triplet.
/// * `max_triplets` – hard cap on the number of triplets; extra triplets are dropped and counted.
///
/// **Circle fit**
/// * `collinearity_tolerance` – relative tolerance of the three point collinearity test.
/// * `min_radius`, `max_radius` – accepted radius window (mm) of the tangent circles.
/// * `tangency_nsigma` – tolerance on the tangency of a solution to its drift circles.
/// * `blur_circles` – also vote with the eight circles through the contacts moved by ± the drift error.
///
/// **Circle histograms**
/// * `x_step`, `y_step`, `r_step` – bucket widths (mm).
/// * `peak_window` – half width (buckets) of the mode search window.
/// * `min_circle_votes` – minimal vote weight of a circle candidate.
///
/// **Line maps**
/// * `line_theta_bins`, `line_r_bins` – coarse Legendre map size.
/// * `line_vote_threshold` – minimal coarse peak content of a line candidate.
/// * `line_fine_delta_theta`, `line_fine_delta_r` – fine map resolution (rad, mm).
/// * `gauss_threshold` – probability cut of the Gauss kernel used in the fine map.
///
/// **Association**
/// * `association_nsigma` – maximal normalised residual of an associated hit.
/// * `min_drift_error` – floor (mm) on the drift radius error in residuals.
/// * `min_track_hits` – minimal number of hits of a track.
/// * `max_tracks` – maximal number of tracks per pass.
///
/// **Kinks**
/// * `kink_search` – enable the kink search.
/// * `kink_chi2_threshold` – chi-square improvement required to accept a kink.
/// * `min_kink_arm_hits` – minimal number of hits on each arm.
/// * `kink_max_gap` – maximal distance (mm) between a kink and the closest hit of each arm.
///
/// **Output**
/// * `nsamples` – number of samples of the track polylines.
/// * `find_missing_hits` – classify the cells crossed by each track without a hit.
///
/// **Quality**
/// * `share_hits` – let a track take the hits of the other tracks of its group that it fits.
/// * `outlier_nsigma` – normalised residual above which a track hit is an outlier.
/// * `min_pvalue` – p-value under which a track is badly ranked.
/// * `max_missing_hits` – number of untriggered crossed cells at which a track is badly ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LttcParams {
    // --- Triplet pruning ---
    pub max_cell_distance: u32,
    pub min_hit_separation: f64,
    pub max_triplets: usize,

    // --- Circle fit ---
    pub collinearity_tolerance: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    pub tangency_nsigma: f64,
    pub blur_circles: bool,

    // --- Circle histograms ---
    pub x_step: f64,
    pub y_step: f64,
    pub r_step: f64,
    pub peak_window: i64,
    pub min_circle_votes: f64,

    // --- Line maps ---
    pub line_theta_bins: usize,
    pub line_r_bins: usize,
    pub line_vote_threshold: f64,
    pub line_fine_delta_theta: f64,
    pub line_fine_delta_r: f64,
    pub gauss_threshold: f64,

    // --- Association ---
    pub association_nsigma: f64,
    pub min_drift_error: f64,
    pub min_track_hits: usize,
    pub max_tracks: usize,

    // --- Kinks ---
    pub kink_search: bool,
    pub kink_chi2_threshold: f64,
    pub min_kink_arm_hits: usize,
    pub kink_max_gap: f64,

    // --- Output ---
    pub nsamples: usize,
    pub find_missing_hits: bool,

    // --- Quality ---
    pub share_hits: bool,
    pub outlier_nsigma: f64,
    pub min_pvalue: f64,
    pub max_missing_hits: usize,
}

impl LttcParams {
    /// Construct a new [`LttcParams`] with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`LttcParamsBuilder`] initialised with the default values.
    ///
    /// # See also
    /// * [`LttcParamsBuilder::build`] – validation rules.
    pub fn builder() -> LttcParamsBuilder {
        LttcParamsBuilder::new()
    }

    /// Check a set of parameters built without the builder.
    pub fn validate(&self) -> Result<(), LttcError> {
        LttcParamsBuilder {
            params: self.clone(),
        }
        .build()
        .map(|_| ())
    }
}

impl Default for LttcParams {
    fn default() -> Self {
        LttcParams {
            max_cell_distance: 4,
            min_hit_separation: 1.0,
            max_triplets: 200_000,

            collinearity_tolerance: DEFAULT_COLLINEARITY_TOLERANCE,
            min_radius: 10.0,
            max_radius: 1.0e5,
            tangency_nsigma: 3.0,
            blur_circles: true,

            x_step: 5.0,
            y_step: 5.0,
            r_step: 5.0,
            peak_window: 2,
            min_circle_votes: 1.0,

            line_theta_bins: 1000,
            line_r_bins: 1000,
            line_vote_threshold: 3.0,
            line_fine_delta_theta: 1.5e-3,
            line_fine_delta_r: 0.2,
            gauss_threshold: 0.05,

            association_nsigma: 5.0,
            min_drift_error: 0.2,
            min_track_hits: 3,
            max_tracks: 10,

            kink_search: true,
            kink_chi2_threshold: 10.0,
            min_kink_arm_hits: 3,
            kink_max_gap: 100.0,

            nsamples: DEFAULT_NSAMPLES,
            find_missing_hits: true,

            share_hits: true,
            outlier_nsigma: 2.0,
            min_pvalue: 1e-3,
            max_missing_hits: 4,
        }
    }
}

/// Builder for [`LttcParams`], with validation.
#[derive(Debug, Clone)]
pub struct LttcParamsBuilder {
    params: LttcParams,
}

impl Default for LttcParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LttcParamsBuilder {
    /// Create a new builder initialised with default values.
    pub fn new() -> Self {
        Self {
            params: LttcParams::default(),
        }
    }

    // --- Triplet pruning ---
    pub fn max_cell_distance(mut self, v: u32) -> Self {
        self.params.max_cell_distance = v;
        self
    }
    pub fn min_hit_separation(mut self, v: f64) -> Self {
        self.params.min_hit_separation = v;
        self
    }
    pub fn max_triplets(mut self, v: usize) -> Self {
        self.params.max_triplets = v;
        self
    }

    // --- Circle fit ---
    pub fn collinearity_tolerance(mut self, v: f64) -> Self {
        self.params.collinearity_tolerance = v;
        self
    }
    pub fn min_radius(mut self, v: f64) -> Self {
        self.params.min_radius = v;
        self
    }
    pub fn max_radius(mut self, v: f64) -> Self {
        self.params.max_radius = v;
        self
    }
    pub fn tangency_nsigma(mut self, v: f64) -> Self {
        self.params.tangency_nsigma = v;
        self
    }
    pub fn blur_circles(mut self, v: bool) -> Self {
        self.params.blur_circles = v;
        self
    }

    // --- Circle histograms ---
    pub fn x_step(mut self, v: f64) -> Self {
        self.params.x_step = v;
        self
    }
    pub fn y_step(mut self, v: f64) -> Self {
        self.params.y_step = v;
        self
    }
    pub fn r_step(mut self, v: f64) -> Self {
        self.params.r_step = v;
        self
    }
    pub fn peak_window(mut self, v: i64) -> Self {
        self.params.peak_window = v;
        self
    }
    pub fn min_circle_votes(mut self, v: f64) -> Self {
        self.params.min_circle_votes = v;
        self
    }

    // --- Line maps ---
    pub fn line_theta_bins(mut self, v: usize) -> Self {
        self.params.line_theta_bins = v;
        self
    }
    pub fn line_r_bins(mut self, v: usize) -> Self {
        self.params.line_r_bins = v;
        self
    }
    pub fn line_vote_threshold(mut self, v: f64) -> Self {
        self.params.line_vote_threshold = v;
        self
    }
    pub fn line_fine_delta_theta(mut self, v: f64) -> Self {
        self.params.line_fine_delta_theta = v;
        self
    }
    pub fn line_fine_delta_r(mut self, v: f64) -> Self {
        self.params.line_fine_delta_r = v;
        self
    }
    pub fn gauss_threshold(mut self, v: f64) -> Self {
        self.params.gauss_threshold = v;
        self
    }

    // --- Association ---
    pub fn association_nsigma(mut self, v: f64) -> Self {
        self.params.association_nsigma = v;
        self
    }
    pub fn min_drift_error(mut self, v: f64) -> Self {
        self.params.min_drift_error = v;
        self
    }
    pub fn min_track_hits(mut self, v: usize) -> Self {
        self.params.min_track_hits = v;
        self
    }
    pub fn max_tracks(mut self, v: usize) -> Self {
        self.params.max_tracks = v;
        self
    }

    // --- Kinks ---
    pub fn kink_search(mut self, v: bool) -> Self {
        self.params.kink_search = v;
        self
    }
    pub fn kink_chi2_threshold(mut self, v: f64) -> Self {
        self.params.kink_chi2_threshold = v;
        self
    }
    pub fn min_kink_arm_hits(mut self, v: usize) -> Self {
        self.params.min_kink_arm_hits = v;
        self
    }
    pub fn kink_max_gap(mut self, v: f64) -> Self {
        self.params.kink_max_gap = v;
        self
    }

    // --- Output ---
    pub fn nsamples(mut self, v: usize) -> Self {
        self.params.nsamples = v;
        self
    }
    pub fn find_missing_hits(mut self, v: bool) -> Self {
        self.params.find_missing_hits = v;
        self
    }

    // --- Quality ---
    pub fn share_hits(mut self, v: bool) -> Self {
        self.params.share_hits = v;
        self
    }
    pub fn outlier_nsigma(mut self, v: f64) -> Self {
        self.params.outlier_nsigma = v;
        self
    }
    pub fn min_pvalue(mut self, v: f64) -> Self {
        self.params.min_pvalue = v;
        self
    }
    pub fn max_missing_hits(mut self, v: usize) -> Self {
        self.params.max_missing_hits = v;
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Return true iff a <= b and comparable (i.e., not NaN).
    #[inline]
    fn le(a: f64, b: f64) -> bool {
        matches!(a.partial_cmp(&b), Some(Less) | Some(Equal))
    }

    /// Finalize the builder and produce an [`LttcParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `max_cell_distance >= 1`, `max_triplets >= 1`.
    /// * `min_hit_separation >= 0`.
    /// * `collinearity_tolerance > 0`, `tangency_nsigma > 0`.
    /// * `0 <= min_radius <= max_radius`, `max_radius > 0`.
    /// * `x_step`, `y_step`, `r_step > 0`, `peak_window >= 0`, `min_circle_votes >= 0`.
    /// * `line_theta_bins >= 1`, `line_r_bins >= 1`, `line_vote_threshold > 0`.
    /// * `line_fine_delta_theta > 0`, `line_fine_delta_r > 0`, `0 < gauss_threshold < 1`.
    /// * `association_nsigma > 0`, `min_drift_error > 0`, `min_track_hits >= 3`.
    /// * `kink_chi2_threshold >= 0`, `min_kink_arm_hits >= 2`, `kink_max_gap > 0`.
    /// * `nsamples >= 2`.
    /// * `outlier_nsigma > 0`, `0 <= min_pvalue <= 1`, `max_missing_hits >= 1`.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(LttcParams)` if all values are valid.
    /// * `Err(LttcError::InvalidParameter)` naming the first violated rule.
    pub fn build(self) -> Result<LttcParams, LttcError> {
        let p = &self.params;
        let fail = |msg: &str| Err(LttcError::InvalidParameter(msg.into()));

        // --- Counts ---
        if p.max_cell_distance == 0 {
            return fail("max_cell_distance must be >= 1");
        }
        if p.max_triplets == 0 {
            return fail("max_triplets must be >= 1");
        }
        if p.line_theta_bins == 0 || p.line_r_bins == 0 {
            return fail("line map sizes must be >= 1");
        }
        if p.min_track_hits < 3 {
            return fail("min_track_hits must be >= 3");
        }
        if p.min_kink_arm_hits < 2 {
            return fail("min_kink_arm_hits must be >= 2");
        }
        if p.nsamples < 2 {
            return fail("nsamples must be >= 2");
        }
        if p.peak_window < 0 {
            return fail("peak_window must be >= 0");
        }
        if p.max_missing_hits == 0 {
            return fail("max_missing_hits must be >= 1");
        }

        // --- Non-negativity checks (accept zero) ---
        if !Self::ge0(p.min_hit_separation) {
            return fail("min_hit_separation must be >= 0");
        }
        if !Self::ge0(p.min_circle_votes) {
            return fail("min_circle_votes must be >= 0");
        }
        if !Self::ge0(p.kink_chi2_threshold) {
            return fail("kink_chi2_threshold must be >= 0");
        }

        // --- Strictly positive checks (> 0) ---
        let positives = [
            (p.collinearity_tolerance, "collinearity_tolerance must be > 0"),
            (p.tangency_nsigma, "tangency_nsigma must be > 0"),
            (p.x_step, "x_step must be > 0"),
            (p.y_step, "y_step must be > 0"),
            (p.r_step, "r_step must be > 0"),
            (p.line_vote_threshold, "line_vote_threshold must be > 0"),
            (p.line_fine_delta_theta, "line_fine_delta_theta must be > 0"),
            (p.line_fine_delta_r, "line_fine_delta_r must be > 0"),
            (p.association_nsigma, "association_nsigma must be > 0"),
            (p.min_drift_error, "min_drift_error must be > 0"),
            (p.kink_max_gap, "kink_max_gap must be > 0"),
            (p.outlier_nsigma, "outlier_nsigma must be > 0"),
        ];
        for (v, msg) in positives {
            if !Self::gt0(v) || !v.is_finite() {
                return fail(msg);
            }
        }

        // --- Ranges ---
        if !(Self::ge0(p.min_radius) && Self::gt0(p.max_radius) && Self::le(p.min_radius, p.max_radius))
        {
            return fail("require 0 <= min_radius <= max_radius and max_radius > 0");
        }
        if !(Self::gt0(p.gauss_threshold) && p.gauss_threshold < 1.0) {
            return fail("gauss_threshold must lie in (0, 1)");
        }
        if !(Self::ge0(p.min_pvalue) && Self::le(p.min_pvalue, 1.0)) {
            return fail("min_pvalue must lie in [0, 1]");
        }

        Ok(self.params)
    }
}

impl fmt::Display for LttcParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 50; // width reserved for "name = value"
            writeln!(f, "LTTC Track Finding Parameters")?;
            writeln!(f, "-----------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Triplet pruning]")?;
            line!("max_cell_distance     = {}", self.max_cell_distance, "Max cell distance in a triplet")?;
            line!("min_hit_separation    = {:.3} mm", self.min_hit_separation, "Min wire separation in a triplet")?;
            line!("max_triplets          = {}", self.max_triplets, "Hard cap on enumerated triplets")?;

            writeln!(f, "\n[Circle fit]")?;
            line!("collinearity_tolerance= {:.1e}", self.collinearity_tolerance, "Relative collinearity tolerance")?;
            line!("min_radius            = {:.1} mm", self.min_radius, "Smallest accepted radius")?;
            line!("max_radius            = {:.1} mm", self.max_radius, "Largest accepted radius")?;
            line!("tangency_nsigma       = {:.2}", self.tangency_nsigma, "Tangency check tolerance")?;
            line!("blur_circles          = {}", self.blur_circles, "Vote with blurred circles")?;

            writeln!(f, "\n[Circle histograms]")?;
            line!("x_step                = {:.2} mm", self.x_step, "Center x bucket width")?;
            line!("y_step                = {:.2} mm", self.y_step, "Center y bucket width")?;
            line!("r_step                = {:.2} mm", self.r_step, "Radius bucket width")?;
            line!("peak_window           = {}", self.peak_window, "Mode search half width (buckets)")?;
            line!("min_circle_votes      = {:.2}", self.min_circle_votes, "Min votes of a circle candidate")?;

            writeln!(f, "\n[Line maps]")?;
            line!("line_theta_bins       = {}", self.line_theta_bins, "Coarse map theta bins")?;
            line!("line_r_bins           = {}", self.line_r_bins, "Coarse map r bins")?;
            line!("line_vote_threshold   = {:.2}", self.line_vote_threshold, "Min coarse peak content")?;
            line!("line_fine_delta_theta = {:.1e} rad", self.line_fine_delta_theta, "Fine map theta resolution")?;
            line!("line_fine_delta_r     = {:.3} mm", self.line_fine_delta_r, "Fine map r resolution")?;
            line!("gauss_threshold       = {:.3}", self.gauss_threshold, "Gauss kernel probability cut")?;

            writeln!(f, "\n[Association]")?;
            line!("association_nsigma    = {:.2}", self.association_nsigma, "Max normalised residual")?;
            line!("min_drift_error       = {:.3} mm", self.min_drift_error, "Drift error floor")?;
            line!("min_track_hits        = {}", self.min_track_hits, "Min hits per track")?;
            line!("max_tracks            = {}", self.max_tracks, "Max tracks per pass")?;

            writeln!(f, "\n[Kinks]")?;
            line!("kink_search           = {}", self.kink_search, "Enable kink search")?;
            line!("kink_chi2_threshold   = {:.2}", self.kink_chi2_threshold, "Required chi2 improvement")?;
            line!("min_kink_arm_hits     = {}", self.min_kink_arm_hits, "Min hits per kink arm")?;
            line!("kink_max_gap          = {:.1} mm", self.kink_max_gap, "Max kink to arm distance")?;

            writeln!(f, "\n[Output]")?;
            line!("nsamples              = {}", self.nsamples, "Samples per track polyline")?;
            line!("find_missing_hits     = {}", self.find_missing_hits, "Classify missing hits")?;

            writeln!(f, "\n[Quality]")?;
            line!("share_hits            = {}", self.share_hits, "Share hits between fitting tracks")?;
            line!("outlier_nsigma        = {:.2}", self.outlier_nsigma, "Outlier residual threshold")?;
            line!("min_pvalue            = {:.1e}", self.min_pvalue, "P-value of a well ranked track")?;
            line!("max_missing_hits      = {}", self.max_missing_hits, "Missing hits of a badly ranked track")?;

            Ok(())
        } else {
            write!(
                f,
                "LttcParams(max_cell_distance={}, max_triplets={}, radius∈[{:.1},{:.1}]mm, steps=({:.1},{:.1},{:.1})mm, line_map={}x{}, nsigma={:.1}, kink_search={})",
                self.max_cell_distance,
                self.max_triplets,
                self.min_radius,
                self.max_radius,
                self.x_step,
                self.y_step,
                self.r_step,
                self.line_theta_bins,
                self.line_r_bins,
                self.association_nsigma,
                self.kink_search
            )
        }
    }
}

#[cfg(test)]
mod lttc_params_tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let p = LttcParams::builder().build().unwrap();
        assert_eq!(p, LttcParams::default());
        assert_eq!(p.nsamples, DEFAULT_NSAMPLES);
    }

    #[test]
    fn test_builder_overrides() {
        let p = LttcParams::builder()
            .max_cell_distance(2)
            .min_radius(25.0)
            .max_radius(2000.0)
            .blur_circles(false)
            .kink_search(false)
            .build()
            .unwrap();
        assert_eq!(p.max_cell_distance, 2);
        assert_eq!(p.min_radius, 25.0);
        assert!(!p.blur_circles);
        assert!(!p.kink_search);
    }

    #[test]
    fn test_builder_validation() {
        assert!(LttcParams::builder().max_cell_distance(0).build().is_err());
        assert!(LttcParams::builder().x_step(0.0).build().is_err());
        assert!(LttcParams::builder().r_step(f64::NAN).build().is_err());
        assert!(LttcParams::builder()
            .min_radius(100.0)
            .max_radius(10.0)
            .build()
            .is_err());
        assert!(LttcParams::builder().gauss_threshold(1.0).build().is_err());
        assert!(LttcParams::builder().min_track_hits(2).build().is_err());
        assert!(LttcParams::builder().nsamples(1).build().is_err());
        assert!(LttcParams::builder().min_pvalue(1.5).build().is_err());
        assert!(LttcParams::builder().outlier_nsigma(0.0).build().is_err());
        assert!(LttcParams::builder().max_missing_hits(0).build().is_err());
        assert_eq!(
            LttcParams::builder().max_triplets(0).build(),
            Err(LttcError::InvalidParameter(
                "max_triplets must be >= 1".into()
            ))
        );
    }

    #[test]
    fn test_display() {
        let p = LttcParams::default();
        let short = format!("{p}");
        assert!(short.starts_with("LttcParams(max_cell_distance=4"));
        let table = format!("{p:#}");
        assert!(table.contains("[Triplet pruning]"));
        assert!(table.contains("# Hard cap on enumerated triplets"));
        assert!(table.contains("[Kinks]"));
        assert!(table.contains("[Quality]"));
    }
}
