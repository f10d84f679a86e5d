//! # lttc
//!
//! Track finding in a planar drift-chamber tracker by Legendre transform and circle
//! voting (LTTC). Hits are Geiger drift cells measured as circles around their anode
//! wire; the [`lttc_algo::LttcAlgo`] driver turns a collection of hits into straight,
//! circular and kinked [`track::Track2`] trajectories, with their cuts on the source
//! foil and tracker walls and the cells they cross without firing.
//!
//! ```rust,no_run
//! use lttc::lttc_algo::{LttcAlgo, LttcParams};
//! use lttc::tracker::{CellId, Tracker, TrackerHit};
//!
//! let tracker = Tracker::default();
//! let hits: Vec<TrackerHit> = (0..6)
//!     .map(|l| TrackerHit::from_cell(&tracker, l as usize, CellId::new(1, l, 30), 5.0, 0.3))
//!     .collect();
//! let mut algo = LttcAlgo::new(&tracker, LttcParams::default()).unwrap();
//! let output = algo.run(&hits).unwrap();
//! for track in &output.tracks {
//!     println!("{track}");
//! }
//! ```
pub mod constants;
pub mod geometry;
pub mod histogram;
pub mod legendre;
pub mod lttc_algo;
pub mod lttc_errors;
pub mod missing_hits;
pub mod track;
pub mod tracker;
