//! # Legendre `(θ, r)` map
//!
//! Dense two dimensional histogram on `[tmin, tmax) × [rmin, rmax)` with `nt × nr`
//! bins. Bin `(it, ir)` is stored at the flat index `ir · nt + it` and covers
//! `[tmin + it·dt, tmin + (it+1)·dt) × [rmin + ir·dr, rmin + (ir+1)·dr)`.
//!
//! Votes are either added to a single bin or spread over the neighbouring bins with
//! the [`LtGaussFunc`] kernel. In the latter case the kernel extends as far as its
//! value stays above the requested probability threshold, and only the weights above
//! that threshold are kept.
use std::fmt;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::legendre::{LegendreTransform, LtGaussFunc};
use crate::lttc_errors::LttcError;

/// Bins lower than this value are considered empty when sorting.
const EMPTY_BIN: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct RtMap {
    tmin: f64,
    tmax: f64,
    nt: usize,
    dt: f64,
    rmin: f64,
    rmax: f64,
    nr: usize,
    dr: f64,
    bins: Vec<f64>,
}

impl RtMap {
    /// Create an empty map.
    ///
    /// Arguments
    /// -----------------
    /// * `tmin`, `tmax`: angular range (radians), `tmin < tmax`.
    /// * `nt`: number of angular bins (> 0).
    /// * `rmin`, `rmax`: distance range (mm), `rmin < rmax`.
    /// * `nr`: number of distance bins (> 0).
    ///
    /// Return
    /// ----------
    /// * The zero filled map, or [`LttcError::InvalidParameter`].
    pub fn new(
        tmin: f64,
        tmax: f64,
        nt: usize,
        rmin: f64,
        rmax: f64,
        nr: usize,
    ) -> Result<Self, LttcError> {
        let finite = [tmin, tmax, rmin, rmax].iter().all(|v| v.is_finite());
        if !finite || tmin >= tmax || rmin >= rmax || nt == 0 || nr == 0 {
            return Err(LttcError::InvalidParameter(format!(
                "invalid (theta, r) map: t=[{tmin}, {tmax}) x {nt}, r=[{rmin}, {rmax}) x {nr}"
            )));
        }
        Ok(RtMap {
            tmin,
            tmax,
            nt,
            dt: (tmax - tmin) / nt as f64,
            rmin,
            rmax,
            nr,
            dr: (rmax - rmin) / nr as f64,
            bins: vec![0.0; nt * nr],
        })
    }

    pub fn nt(&self) -> usize {
        self.nt
    }

    pub fn nr(&self) -> usize {
        self.nr
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn dr(&self) -> f64 {
        self.dr
    }

    pub fn t_range(&self) -> (f64, f64) {
        (self.tmin, self.tmax)
    }

    pub fn r_range(&self) -> (f64, f64) {
        (self.rmin, self.rmax)
    }

    pub fn t_to_index(&self, t: f64) -> Option<usize> {
        if !(t >= self.tmin && t < self.tmax) {
            return None;
        }
        Some((((t - self.tmin) / self.dt) as usize).min(self.nt - 1))
    }

    pub fn r_to_index(&self, r: f64) -> Option<usize> {
        if !(r >= self.rmin && r < self.rmax) {
            return None;
        }
        Some((((r - self.rmin) / self.dr) as usize).min(self.nr - 1))
    }

    /// Center of the angular bin `it`.
    pub fn t_center(&self, it: usize) -> f64 {
        self.tmin + (it as f64 + 0.5) * self.dt
    }

    /// Center of the distance bin `ir`.
    pub fn r_center(&self, ir: usize) -> f64 {
        self.rmin + (ir as f64 + 0.5) * self.dr
    }

    pub fn bin_index(&self, it: usize, ir: usize) -> Option<usize> {
        (it < self.nt && ir < self.nr).then(|| ir * self.nt + it)
    }

    pub fn bin_to_indexes(&self, ibin: usize) -> Option<(usize, usize)> {
        (ibin < self.bins.len()).then(|| (ibin % self.nt, ibin / self.nt))
    }

    pub fn bin(&self, ibin: usize) -> f64 {
        self.bins.get(ibin).copied().unwrap_or(0.0)
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Add a vote centred on bin `(it0, ir0)`.
    ///
    /// Arguments
    /// -----------------
    /// * `it0`, `ir0`: indexes of the central bin; out of range votes are ignored.
    /// * `gauss_threshold`: `None` for a single bin vote, or `Some(p)` with `0 < p < 1`
    ///   to spread `weight · g` over every bin where the kernel value `g` stays `>= p`.
    /// * `weight`: vote weight.
    pub fn fill_bin(&mut self, it0: usize, ir0: usize, gauss_threshold: Option<f64>, weight: f64) {
        let Some(ibin0) = self.bin_index(it0, ir0) else {
            return;
        };
        let threshold = match gauss_threshold {
            Some(p) if p > 0.0 && p < 1.0 => p,
            _ => {
                self.bins[ibin0] += weight;
                return;
            }
        };
        let reach = LtGaussFunc::reach(threshold);
        // the kernel is defined in units of one bin on each axis
        let di = reach as usize;
        let itmin = it0.saturating_sub(di);
        let itmax = (it0 + di).min(self.nt - 1);
        let irmin = ir0.saturating_sub(di);
        let irmax = (ir0 + di).min(self.nr - 1);
        let kernel = LtGaussFunc::new(self.t_center(it0), self.dt, self.r_center(ir0), self.dr);
        for it in itmin..=itmax {
            let tt = self.t_center(it);
            for ir in irmin..=irmax {
                let g = weight * kernel.eval(tt, self.r_center(ir));
                if g >= threshold {
                    self.bins[ir * self.nt + it] += g;
                }
            }
        }
    }

    /// Fill the map with both branches of the Legendre transform of a drift circle,
    /// sampled at the center of every angular bin.
    ///
    /// Return
    /// ----------
    /// * The number of votes that fell inside the map.
    pub fn fill_legendre(
        &mut self,
        lt: &LegendreTransform,
        gauss_threshold: Option<f64>,
        weight: f64,
    ) -> usize {
        let mut nvotes = 0;
        for it in 0..self.nt {
            let v = lt.eval(self.t_center(it));
            let branches = if lt.r > 0.0 {
                [Some(v.concave), Some(v.convex)]
            } else {
                [Some(v.concave), None]
            };
            for r in branches.into_iter().flatten() {
                if let Some(ir) = self.r_to_index(r) {
                    self.fill_bin(it, ir, gauss_threshold, weight);
                    nvotes += 1;
                }
            }
        }
        nvotes
    }

    /// Zero every bin below `threshold`.
    ///
    /// Return
    /// ----------
    /// * The number of non empty bins that were zeroed.
    pub fn apply_threshold(&mut self, threshold: f64) -> usize {
        let mut zeroed = 0;
        for b in self.bins.iter_mut().filter(|b| **b > 0.0) {
            if *b < threshold {
                *b = 0.0;
                zeroed += 1;
            }
        }
        zeroed
    }

    /// Non empty bin indexes sorted by decreasing content (ties by increasing index).
    pub fn sorted_bins(&self) -> Vec<usize> {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= EMPTY_BIN)
            .sorted_by_key(|(i, v)| (std::cmp::Reverse(OrderedFloat(**v)), *i))
            .map(|(i, _)| i)
            .collect()
    }

    /// Highest bin and its content.
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.sorted_bins().first().map(|&i| (i, self.bins[i]))
    }

    /// Weighted mean `(θ, r)` of the bins around `ibin` within `half_width` bins on
    /// each axis.
    pub fn refine_peak(&self, ibin: usize, half_width: usize) -> Option<(f64, f64)> {
        let (it0, ir0) = self.bin_to_indexes(ibin)?;
        let mut sw = 0.0;
        let mut st = 0.0;
        let mut sr = 0.0;
        for it in it0.saturating_sub(half_width)..=(it0 + half_width).min(self.nt - 1) {
            for ir in ir0.saturating_sub(half_width)..=(ir0 + half_width).min(self.nr - 1) {
                let w = self.bins[ir * self.nt + it];
                sw += w;
                st += w * self.t_center(it);
                sr += w * self.r_center(ir);
            }
        }
        (sw > 0.0).then(|| (st / sw, sr / sw))
    }

    pub fn clear(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0.0);
    }

    /// Write the map as `t r value` lines, one block per angular bin (gnuplot friendly).
    pub fn store<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for it in 0..self.nt {
            writeln!(out, "#@theta={}", self.t_center(it))?;
            for ir in 0..self.nr {
                writeln!(
                    out,
                    "{} {} {}",
                    self.t_center(it),
                    self.r_center(ir),
                    self.bins[ir * self.nt + it]
                )?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod rt_map_tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_indexing() {
        let m = RtMap::new(0.0, PI, 10, -100.0, 100.0, 20).unwrap();
        assert_relative_eq!(m.dr(), 10.0);
        assert_eq!(m.r_to_index(-100.0), Some(0));
        assert_eq!(m.r_to_index(99.9), Some(19));
        assert_eq!(m.r_to_index(100.0), None);
        assert_eq!(m.t_to_index(-0.1), None);
        assert_eq!(m.bin_index(3, 2), Some(23));
        assert_eq!(m.bin_to_indexes(23), Some((3, 2)));
        assert_eq!(m.bin_index(10, 0), None);
        assert!(RtMap::new(0.0, PI, 0, -1.0, 1.0, 2).is_err());
        assert!(RtMap::new(0.0, PI, 2, 1.0, 1.0, 2).is_err());
    }

    #[test]
    fn test_single_and_gauss_fill() {
        let mut m = RtMap::new(0.0, 1.0, 20, 0.0, 20.0, 20).unwrap();
        m.fill_bin(10, 10, None, 2.0);
        assert_relative_eq!(m.bin(m.bin_index(10, 10).unwrap()), 2.0);

        m.clear();
        m.fill_bin(10, 10, Some(0.05), 1.0);
        let center = m.bin(m.bin_index(10, 10).unwrap());
        let side = m.bin(m.bin_index(11, 10).unwrap());
        let far = m.bin(m.bin_index(14, 10).unwrap());
        assert_relative_eq!(center, 1.0);
        assert_relative_eq!(side, (-0.5f64).exp(), epsilon = 1e-12);
        assert_eq!(far, 0.0);
        // kernel cut at the threshold
        assert!(m.bins().iter().all(|b| *b == 0.0 || *b >= 0.05));
    }

    #[test]
    fn test_legendre_fill_finds_line() {
        // hits on the line y = 10.5 (theta = pi/2), null drift radius
        let mut m = RtMap::new(0.0, PI, 180, -50.0, 50.0, 100).unwrap();
        for x in [-30.0, -10.0, 5.0, 25.0] {
            m.fill_legendre(&LegendreTransform::new(x, 10.5, 0.0), None, 1.0);
        }
        let (ibin, value) = m.peak().unwrap();
        assert_relative_eq!(value, 4.0);
        let (it, ir) = m.bin_to_indexes(ibin).unwrap();
        assert!((m.t_center(it) - PI / 2.0).abs() < 2.0 * m.dt());
        assert!((m.r_center(ir) - 10.5).abs() < 2.0 * m.dr());
    }

    #[test]
    fn test_threshold_and_sort() {
        let mut m = RtMap::new(0.0, 1.0, 4, 0.0, 4.0, 4).unwrap();
        m.fill_bin(0, 0, None, 1.0);
        m.fill_bin(1, 1, None, 5.0);
        m.fill_bin(2, 2, None, 3.0);
        assert_eq!(m.sorted_bins(), vec![5, 10, 0]);
        assert_eq!(m.apply_threshold(2.0), 1);
        assert_eq!(m.sorted_bins(), vec![5, 10]);
        let (t, r) = m.refine_peak(5, 1).unwrap();
        assert!(t > m.t_center(1) && r > m.r_center(1));

        let mut dump = String::new();
        m.store(&mut dump).unwrap();
        assert_eq!(dump.matches("#@theta").count(), 4);
    }
}
