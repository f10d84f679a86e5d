//! # Vote accumulators
//!
//! * [`uhistogram::UHistogram`] – sparse one dimensional histogram with a fixed bucket
//!   width and a range that grows with the filled values. The circle finder keeps one
//!   per circle parameter (`x` center, `y` center, radius).
//! * [`rt_map::RtMap`] – dense two dimensional histogram in Legendre `(θ, r)` space,
//!   used by the straight-line finder.
pub mod rt_map;
pub mod uhistogram;
