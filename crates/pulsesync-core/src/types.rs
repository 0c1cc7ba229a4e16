use crate::error::MalformedInput;
use std::{fmt, ops::RangeInclusive};

/// Identifies which of the two recordings a pulse sequence belongs to.
///
/// Clock A is the reference stream (behavioural events, milliseconds).
/// Clock B is the stream being mapped onto it (sampled physiology, native
/// units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Clock {
    A,
    B,
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clock::A => f.write_str("A"),
            Clock::B => f.write_str("B"),
        }
    }
}

/// Milliseconds per native unit of a pulse sequence.
///
/// For a sampled recording this is `1000 / sampling_rate_hz`. The value is
/// always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnitScale(f64);

impl UnitScale {
    /// The scale of a sequence that is already in milliseconds.
    pub const MILLISECONDS: UnitScale = UnitScale(1.0);

    pub fn new(ms_per_unit: f64) -> Result<Self, MalformedInput> {
        if ms_per_unit.is_finite() && ms_per_unit > 0.0 {
            Ok(Self(ms_per_unit))
        } else {
            Err(MalformedInput::NonPositiveScale(ms_per_unit))
        }
    }

    /// Scale for sample indices recorded at `sampling_rate_hz`.
    pub fn from_sampling_rate(sampling_rate_hz: f64) -> Result<Self, MalformedInput> {
        Self::new(1000.0 / sampling_rate_hz)
    }

    pub fn ms_per_unit(self) -> f64 {
        self.0
    }
}

/// A pulse that was identified in both sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedPair {
    /// Index into the clock A sequence.
    pub a: usize,
    /// Index into the clock B sequence.
    pub b: usize,
}

impl MatchedPair {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }
}

/// The inferred pairing between the two pulse sequences.
///
/// Pairs are strictly increasing in both indices. The correspondence spans
/// a contiguous index range on each side; pulses inside the span that have
/// no partner were dropped by the other recording.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Correspondence {
    pairs: Vec<MatchedPair>,
}

impl Correspondence {
    pub(crate) fn from_pairs(pairs: Vec<MatchedPair>) -> Self {
        debug_assert!(
            pairs.windows(2).all(|w| w[0].a < w[1].a && w[0].b < w[1].b),
            "correspondence must be strictly monotonic"
        );
        Self { pairs }
    }

    pub fn pairs(&self) -> &[MatchedPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn first(&self) -> Option<MatchedPair> {
        self.pairs.first().copied()
    }

    pub fn last(&self) -> Option<MatchedPair> {
        self.pairs.last().copied()
    }

    /// Index range covered in the clock A sequence.
    pub fn span_a(&self) -> Option<RangeInclusive<usize>> {
        Some(self.first()?.a..=self.last()?.a)
    }

    /// Index range covered in the clock B sequence.
    pub fn span_b(&self) -> Option<RangeInclusive<usize>> {
        Some(self.first()?.b..=self.last()?.b)
    }

    /// Number of clock A pulses inside the span with no partner in B.
    pub fn missing_in_b(&self) -> usize {
        self.span_a()
            .map(|span| span.count() - self.pairs.len())
            .unwrap_or(0)
    }

    /// Number of clock B pulses inside the span with no partner in A.
    pub fn missing_in_a(&self) -> usize {
        self.span_b()
            .map(|span| span.count() - self.pairs.len())
            .unwrap_or(0)
    }
}
