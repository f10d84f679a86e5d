use thiserror::Error;

use crate::lttc_algo::AlgoState;

#[derive(Error, Debug, Clone)]
pub enum LttcError {
    #[error("Invalid LTTC parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid curve: {0}")]
    InvalidCurve(String),

    #[error("Degenerate triplet: the three points are aligned or coincident")]
    DegenerateTriplet,

    #[error("Degenerate segment: start and stop points coincide")]
    DegenerateSegment,

    #[error("Invalid line: {0}")]
    InvalidLine(String),

    #[error("Invalid histogram step: {0} (must be finite and > 0)")]
    InvalidHistogramStep(f64),

    #[error("Non finite value: {0}")]
    NonFiniteValue(f64),

    #[error("Histogram value {0} falls outside the representable bucket range")]
    HistogramOverflow(f64),

    #[error("Invalid sampling request: {0}")]
    InvalidSampling(String),

    #[error("Invalid tracker hit #{index}: {reason}")]
    InvalidHit { index: usize, reason: String },

    #[error("Algorithm step called out of order: expected state {expected:?}, found {found:?}")]
    StepOutOfOrder { expected: AlgoState, found: AlgoState },

    #[error("Track finding pass was cancelled")]
    Cancelled,

    #[error("Fit failed: {0}")]
    FitFailed(String),
}

impl PartialEq for LttcError {
    fn eq(&self, other: &Self) -> bool {
        use LttcError::*;
        match (self, other) {
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (InvalidCurve(a), InvalidCurve(b)) => a == b,
            (InvalidLine(a), InvalidLine(b)) => a == b,
            (InvalidSampling(a), InvalidSampling(b)) => a == b,
            (FitFailed(a), FitFailed(b)) => a == b,

            // NaN payloads never compare equal, so only the bit patterns matter here
            (InvalidHistogramStep(a), InvalidHistogramStep(b)) => a.to_bits() == b.to_bits(),
            (NonFiniteValue(a), NonFiniteValue(b)) => a.to_bits() == b.to_bits(),
            (HistogramOverflow(a), HistogramOverflow(b)) => a.to_bits() == b.to_bits(),

            (
                InvalidHit {
                    index: i1,
                    reason: r1,
                },
                InvalidHit {
                    index: i2,
                    reason: r2,
                },
            ) => i1 == i2 && r1 == r2,
            (
                StepOutOfOrder {
                    expected: e1,
                    found: f1,
                },
                StepOutOfOrder {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,

            (DegenerateTriplet, DegenerateTriplet) => true,
            (DegenerateSegment, DegenerateSegment) => true,
            (Cancelled, Cancelled) => true,

            _ => false,
        }
    }
}
