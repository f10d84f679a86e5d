//! # Uniform histogram
//!
//! [`UHistogram`] accumulates weights in buckets of constant width `xstep` anchored at
//! `xref`. Buckets are created on demand and kept in a [`BTreeMap`] ordered by
//! bucket index, so the histogram never needs a predefined range.
//!
//! ## Bucket rule
//!
//! ```text
//! index(x) = round((x - xref) / xstep)      (ties rounded away from zero)
//! value(i) = xref + i · xstep               (bucket center)
//! ```
//!
//! The bucket `i` therefore covers `[value(i) - xstep/2, value(i) + xstep/2)` for
//! positive indexes, with the tie at `±xstep/2` going to the bucket farther from
//! `xref`. Finite values whose index would leave `[-MAX_BUCKET_INDEX, MAX_BUCKET_INDEX]`
//! are accumulated in the two edge buckets, which act as underflow and overflow bins.
use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::lttc_errors::LttcError;

/// Largest bucket index (2^52, where every integer is still exactly representable as
/// a `f64`).
pub const MAX_BUCKET_INDEX: i64 = 1 << 52;

#[derive(Debug, Clone, PartialEq)]
pub struct UHistogram {
    xref: f64,
    xstep: f64,
    counts: BTreeMap<i64, f64>,
    xmin: f64,
    xmax: f64,
    entries: usize,
    total_weight: f64,
}

impl UHistogram {
    /// Create an empty histogram.
    ///
    /// Arguments
    /// -----------------
    /// * `xref`: center of bucket 0 (finite).
    /// * `xstep`: bucket width (finite and strictly positive).
    ///
    /// Return
    /// ----------
    /// * The histogram, or [`LttcError::InvalidHistogramStep`] /
    ///   [`LttcError::NonFiniteValue`] on a bad grid.
    pub fn new(xref: f64, xstep: f64) -> Result<Self, LttcError> {
        if !xref.is_finite() {
            return Err(LttcError::NonFiniteValue(xref));
        }
        if !(xstep.is_finite() && xstep > 0.0) {
            return Err(LttcError::InvalidHistogramStep(xstep));
        }
        Ok(UHistogram {
            xref,
            xstep,
            counts: BTreeMap::new(),
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            entries: 0,
            total_weight: 0.0,
        })
    }

    pub fn xref(&self) -> f64 {
        self.xref
    }

    pub fn xstep(&self) -> f64 {
        self.xstep
    }

    /// Bucket index of a finite value.
    ///
    /// Saturates for values beyond the `i64` range; see [`UHistogram::checked_index`].
    #[inline]
    pub fn index(&self, x: f64) -> i64 {
        ((x - self.xref) / self.xstep).round() as i64
    }

    /// Bucket index of `x`, or [`LttcError::HistogramOverflow`] when it lies beyond
    /// [`MAX_BUCKET_INDEX`].
    pub fn checked_index(&self, x: f64) -> Result<i64, LttcError> {
        let q = ((x - self.xref) / self.xstep).round();
        if !(q.abs() <= MAX_BUCKET_INDEX as f64) {
            return Err(LttcError::HistogramOverflow(x));
        }
        Ok(q as i64)
    }

    /// Center of bucket `i`.
    #[inline]
    pub fn value(&self, i: i64) -> f64 {
        self.xref + i as f64 * self.xstep
    }

    /// Add one unit of weight to the bucket containing `x`.
    pub fn fill(&mut self, x: f64) -> Result<i64, LttcError> {
        self.fill_weighted(x, 1.0)
    }

    /// Add `weight` to the bucket containing `x`.
    ///
    /// Return
    /// ----------
    /// * The index of the filled bucket.
    /// * [`LttcError::NonFiniteValue`] for a non-finite `x` or `weight`, and
    ///   [`LttcError::InvalidParameter`] for a negative weight, since bucket
    ///   contents never decrease.
    ///
    /// A finite `x` beyond [`MAX_BUCKET_INDEX`] buckets from `xref` goes to the edge
    /// bucket on its side.
    pub fn fill_weighted(&mut self, x: f64, weight: f64) -> Result<i64, LttcError> {
        if !x.is_finite() {
            return Err(LttcError::NonFiniteValue(x));
        }
        if !weight.is_finite() {
            return Err(LttcError::NonFiniteValue(weight));
        }
        if weight < 0.0 {
            return Err(LttcError::InvalidParameter(format!(
                "histogram weight must be >= 0, got {weight}"
            )));
        }
        let i = match self.checked_index(x) {
            Ok(i) => i,
            Err(_) => {
                warn!(x, xref = self.xref, xstep = self.xstep, "value beyond the bucket range");
                if x > self.xref {
                    MAX_BUCKET_INDEX
                } else {
                    -MAX_BUCKET_INDEX
                }
            }
        };
        *self.counts.entry(i).or_insert(0.0) += weight;
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.entries += 1;
        self.total_weight += weight;
        Ok(i)
    }

    /// Accumulated weight of bucket `i` (0 for a never filled bucket).
    pub fn count(&self, i: i64) -> f64 {
        self.counts.get(&i).copied().unwrap_or(0.0)
    }

    /// Smallest filled value.
    pub fn xmin(&self) -> Option<f64> {
        (self.entries > 0).then_some(self.xmin)
    }

    /// Largest filled value.
    pub fn xmax(&self) -> Option<f64> {
        (self.entries > 0).then_some(self.xmax)
    }

    pub fn imin(&self) -> Option<i64> {
        self.counts.keys().next().copied()
    }

    pub fn imax(&self) -> Option<i64> {
        self.counts.keys().next_back().copied()
    }

    /// Number of fill calls since creation or the last [`UHistogram::clear`].
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Filled buckets, ordered by index.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.counts.iter().map(|(i, w)| (*i, *w))
    }

    /// Saturated bucket range `[i - half_width, i + half_width]`; a negative width is
    /// taken as zero.
    fn window(i: i64, half_width: i64) -> std::ops::RangeInclusive<i64> {
        let hw = half_width.max(0);
        i.saturating_sub(hw)..=i.saturating_add(hw)
    }

    /// Sum of the bucket contents in `[i - half_width, i + half_width]`.
    pub fn window_sum(&self, i: i64, half_width: i64) -> f64 {
        self.counts
            .range(Self::window(i, half_width))
            .map(|(_, w)| *w)
            .sum()
    }

    /// Weighted mean of the bucket centers in `[i - half_width, i + half_width]`.
    pub fn window_mean(&self, i: i64, half_width: i64) -> Option<f64> {
        let (sw, swx) = self
            .counts
            .range(Self::window(i, half_width))
            .fold((0.0, 0.0), |(sw, swx), (j, w)| {
                (sw + w, swx + w * self.value(*j))
            });
        (sw > 0.0).then(|| swx / sw)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.xmin = f64::INFINITY;
        self.xmax = f64::NEG_INFINITY;
        self.entries = 0;
        self.total_weight = 0.0;
    }

    /// Write the filled buckets as `index center weight` lines.
    pub fn store<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for (i, w) in self.iter() {
            writeln!(out, "{} {} {}", i, self.value(i), w)?;
        }
        Ok(())
    }
}

impl fmt::Display for UHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UHistogram(xref={}, xstep={}, buckets={}, entries={}, weight={})",
            self.xref,
            self.xstep,
            self.counts.len(),
            self.entries,
            self.total_weight
        )
    }
}

#[cfg(test)]
mod uhistogram_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_step() {
        assert_eq!(
            UHistogram::new(0.0, 0.0),
            Err(LttcError::InvalidHistogramStep(0.0))
        );
        assert!(UHistogram::new(0.0, -1.0).is_err());
        assert!(UHistogram::new(0.0, f64::NAN).is_err());
        assert!(UHistogram::new(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_fill_read_round_trip() {
        let mut h = UHistogram::new(0.0, 0.05).unwrap();
        h.fill(0.074).unwrap();
        assert_eq!(h.index(0.074), 1);
        assert_relative_eq!(h.count(h.index(0.074)), 1.0);

        h.fill_weighted(0.06, 2.5).unwrap();
        h.fill_weighted(0.04, 0.5).unwrap();
        assert_relative_eq!(h.count(1), 4.0);
        assert_relative_eq!(h.count(7), 0.0);
        assert_eq!(h.entries(), 3);
        assert_relative_eq!(h.total_weight(), 4.0);
    }

    #[test]
    fn test_tie_rule() {
        let h = UHistogram::new(0.0, 1.0).unwrap();
        assert_eq!(h.index(0.5), 1);
        assert_eq!(h.index(-0.5), -1);
        assert_eq!(h.index(0.49), 0);
        assert_eq!(h.index(2.5), 3);
        assert_relative_eq!(h.value(-3), -3.0);
    }

    #[test]
    fn test_range_grows_and_clear() {
        let mut h = UHistogram::new(10.0, 2.0).unwrap();
        assert_eq!(h.imin(), None);
        assert_eq!(h.xmax(), None);
        h.fill(4.0).unwrap();
        h.fill(31.0).unwrap();
        h.fill(12.2).unwrap();
        assert_eq!(h.imin(), Some(-3));
        assert_eq!(h.imax(), Some(11));
        assert_eq!(h.xmin(), Some(4.0));
        assert_eq!(h.xmax(), Some(31.0));
        let keys: Vec<i64> = h.iter().map(|(i, _)| i).collect();
        assert_eq!(keys, vec![-3, 1, 11]);

        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.iter().count(), 0);
    }

    #[test]
    fn test_rejected_fills() {
        let mut h = UHistogram::new(0.0, 1.0).unwrap();
        assert!(h.fill(f64::NAN).is_err());
        assert!(h.fill_weighted(1.0, -2.0).is_err());
        assert!(h.fill_weighted(1.0, f64::INFINITY).is_err());
        assert!(h.is_empty());
    }

    #[test]
    fn test_far_values_and_extreme_windows() {
        let mut h = UHistogram::new(0.0, 1.0).unwrap();
        assert_eq!(h.checked_index(1e300), Err(LttcError::HistogramOverflow(1e300)));
        assert_eq!(h.checked_index(MAX_BUCKET_INDEX as f64), Ok(MAX_BUCKET_INDEX));
        assert_eq!(h.index(1e300), i64::MAX);

        // far values land in the edge buckets
        assert_eq!(h.fill(1e300), Ok(MAX_BUCKET_INDEX));
        assert_eq!(h.fill_weighted(-1e300, 2.0), Ok(-MAX_BUCKET_INDEX));
        assert_eq!(h.imin(), Some(-MAX_BUCKET_INDEX));
        assert_eq!(h.imax(), Some(MAX_BUCKET_INDEX));
        assert_relative_eq!(h.total_weight(), 3.0);

        h.fill(3.0).unwrap();
        assert_relative_eq!(h.window_sum(i64::MAX, 1), 0.0);
        assert_relative_eq!(h.window_sum(i64::MIN, 4), 0.0);
        assert_relative_eq!(h.window_sum(3, i64::MAX), 4.0);
        assert_relative_eq!(h.window_sum(3, -2), 1.0);
        assert_eq!(h.window_mean(i64::MAX, 1), None);
        assert_relative_eq!(h.window_mean(3, 10).unwrap(), 3.0);
    }

    #[test]
    fn test_window_helpers_and_store() {
        let mut h = UHistogram::new(0.0, 1.0).unwrap();
        h.fill_weighted(9.0, 1.0).unwrap();
        h.fill_weighted(10.0, 2.0).unwrap();
        h.fill_weighted(11.0, 1.0).unwrap();
        h.fill_weighted(20.0, 5.0).unwrap();
        assert_relative_eq!(h.window_sum(10, 1), 4.0);
        assert_relative_eq!(h.window_mean(10, 1).unwrap(), 10.0);
        assert_eq!(h.window_mean(50, 2), None);

        let mut dump = String::new();
        h.store(&mut dump).unwrap();
        assert_eq!(dump.lines().count(), 4);
        assert!(dump.contains("20 20 5"));
    }
}
