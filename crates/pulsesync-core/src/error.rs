use crate::types::Clock;
use thiserror::Error;

/// Inputs that indicate a bug in the caller rather than bad data.
///
/// Construction stops at the first malformed input; nothing is recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedInput {
    #[error("unit scale must be positive and finite, got {0}")]
    NonPositiveScale(f64),

    #[error("pulse sequence {clock} is empty")]
    Empty { clock: Clock },

    #[error("pulse sequence {clock} has a non-finite value at index {index}")]
    NonFinite { clock: Clock, index: usize },

    #[error("pulse sequence {clock} has a negative value {value} at index {index}")]
    Negative {
        clock: Clock,
        index: usize,
        value: f64,
    },

    #[error(
        "pulse sequence {clock} is not strictly increasing at index {index} ({previous} -> {value})"
    )]
    NotIncreasing {
        clock: Clock,
        index: usize,
        previous: f64,
        value: f64,
    },

    #[error("invalid alignment config: {0}")]
    InvalidConfig(&'static str),

    #[error("event window {start_ms}..{end_ms} ms does not cover a whole sample")]
    InvalidWindow { start_ms: f64, end_ms: f64 },

    #[error("event windows span {found} samples, expected {expected}")]
    MismatchedWindows { expected: usize, found: usize },
}

/// The two pulse sequences could not be reconciled into a trustworthy
/// clock model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentFailure {
    #[error("only {found} pulses could be matched, at least {required} are required")]
    InsufficientMatches { found: usize, required: usize },

    #[error("a clock model needs at least two matched pulses, got {found}")]
    TooFewPairs { found: usize },

    #[error("fitted rate ratio {slope} lies outside [{min}, {max}]")]
    ImplausibleRate { slope: f64, min: f64, max: f64 },

    #[error("maximum fit residual {max_residual_ms:.3} ms exceeds {tolerance_ms:.3} ms")]
    ExcessiveResidual {
        max_residual_ms: f64,
        tolerance_ms: f64,
    },

    #[error(
        "matched {matched} of {expected} overlapping pulses, coverage {coverage:.2} is below {required:.2}"
    )]
    LowCoverage {
        matched: usize,
        expected: usize,
        coverage: f64,
        required: f64,
    },

    #[error(
        "unrelated pulse trains would match this well {chance_alignments:.3} times by chance, at most {allowed} is accepted"
    )]
    Inconclusive {
        chance_alignments: f64,
        allowed: f64,
    },
}

/// Error returned when an [Aligner](crate::Aligner) cannot be constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    #[error("sync pulses could not be aligned: {0}")]
    Failed(#[from] AlignmentFailure),
}

impl AlignError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, AlignError::Malformed(_))
    }

    pub fn is_alignment_failure(&self) -> bool {
        matches!(self, AlignError::Failed(_))
    }
}

/// Error raised while pairing record names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(
        "behaviour record {behavior} matches several physiology records: {}",
        .candidates.join(", ")
    )]
    Ambiguous {
        behavior: String,
        candidates: Vec<String>,
    },
}
