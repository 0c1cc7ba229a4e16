use crate::{
    config::AlignConfig,
    error::{AlignError, AlignmentFailure},
    matcher,
    model::ClockModel,
    normalize::{rescale, validate_sequence},
    types::{Clock, Correspondence, UnitScale},
};
use std::ops::RangeInclusive;
use tracing::debug;

/// Converts timestamps between two clocks that recorded the same sync
/// pulse train.
///
/// Clock A timestamps are in milliseconds. Clock B timestamps are in the
/// native unit of that recording (typically sample indices), and
/// `unit_scale_b` converts them to milliseconds.
///
/// An aligner is immutable once built and can be shared freely between
/// threads for conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Aligner {
    model: ClockModel,
    correspondence: Correspondence,
    unit_scale_b: UnitScale,
    matched_span_a: RangeInclusive<f64>,
}

impl Aligner {
    /// Builds an aligner with the default [AlignConfig].
    pub fn new(
        pulse_times_a: &[f64],
        pulse_times_b: &[f64],
        unit_scale_b: f64,
    ) -> Result<Self, AlignError> {
        Self::with_config(
            pulse_times_a,
            pulse_times_b,
            unit_scale_b,
            &AlignConfig::default(),
        )
    }

    /// Builds an aligner with custom matching and fitting parameters.
    ///
    /// Malformed input is reported before any matching is attempted.
    pub fn with_config(
        pulse_times_a: &[f64],
        pulse_times_b: &[f64],
        unit_scale_b: f64,
        config: &AlignConfig,
    ) -> Result<Self, AlignError> {
        config.validate()?;
        let unit_scale_b = UnitScale::new(unit_scale_b)?;
        validate_sequence(Clock::A, pulse_times_a)?;
        validate_sequence(Clock::B, pulse_times_b)?;

        let pulse_ms_b = rescale(pulse_times_b, unit_scale_b);
        let correspondence = matcher::match_pulses(pulse_times_a, &pulse_ms_b, config)?;
        let model = ClockModel::fit(pulse_times_a, &pulse_ms_b, &correspondence, config)?;

        let matched_span_a = correspondence
            .first()
            .zip(correspondence.last())
            .map(|(first, last)| pulse_times_a[first.a]..=pulse_times_a[last.a])
            .ok_or(AlignmentFailure::TooFewPairs { found: 0 })?;

        debug!(
            pulses_a = pulse_times_a.len(),
            pulses_b = pulse_times_b.len(),
            matched = correspondence.len(),
            missing_in_a = correspondence.missing_in_a(),
            missing_in_b = correspondence.missing_in_b(),
            "aligner constructed"
        );

        Ok(Self {
            model,
            correspondence,
            unit_scale_b,
            matched_span_a,
        })
    }

    /// Converts clock A milliseconds to clock B native units.
    ///
    /// Times outside the matched pulse range are extrapolated.
    pub fn a_to_b(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.a_to_b_one(t)).collect()
    }

    /// Converts clock B native units to clock A milliseconds.
    ///
    /// Times outside the matched pulse range are extrapolated.
    pub fn b_to_a(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.b_to_a_one(t)).collect()
    }

    pub fn a_to_b_one(&self, t: f64) -> f64 {
        self.model.a_to_b(t) / self.unit_scale_b.ms_per_unit()
    }

    pub fn b_to_a_one(&self, t: f64) -> f64 {
        self.model.b_to_a(t * self.unit_scale_b.ms_per_unit())
    }

    /// The fitted model, mapping clock A ms onto clock B ms.
    pub fn model(&self) -> &ClockModel {
        &self.model
    }

    pub fn correspondence(&self) -> &Correspondence {
        &self.correspondence
    }

    pub fn unit_scale_b(&self) -> UnitScale {
        self.unit_scale_b
    }

    /// Clock A times of the first and last matched pulse. Conversions
    /// outside this range are extrapolations.
    pub fn matched_span_a(&self) -> RangeInclusive<f64> {
        self.matched_span_a.clone()
    }
}
