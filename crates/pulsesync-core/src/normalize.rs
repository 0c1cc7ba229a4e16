//! Validation and unit conversion of raw pulse sequences.

use crate::{
    error::MalformedInput,
    types::{Clock, UnitScale},
};
use itertools::Itertools;

/// Rescales a pulse sequence from native units into milliseconds.
///
/// Fails only when `unit_scale` is not a positive, finite number.
pub fn normalize(sequence: &[f64], unit_scale: f64) -> Result<Vec<f64>, MalformedInput> {
    let unit_scale = UnitScale::new(unit_scale)?;
    Ok(rescale(sequence, unit_scale))
}

pub(crate) fn rescale(sequence: &[f64], unit_scale: UnitScale) -> Vec<f64> {
    let factor = unit_scale.ms_per_unit();
    sequence.iter().map(|&value| value * factor).collect()
}

/// Checks that a pulse sequence is non-empty, finite, non-negative and
/// strictly increasing.
pub fn validate_sequence(clock: Clock, sequence: &[f64]) -> Result<(), MalformedInput> {
    if sequence.is_empty() {
        return Err(MalformedInput::Empty { clock });
    }

    for (index, &value) in sequence.iter().enumerate() {
        if !value.is_finite() {
            return Err(MalformedInput::NonFinite { clock, index });
        }
        if value < 0.0 {
            return Err(MalformedInput::Negative {
                clock,
                index,
                value,
            });
        }
    }

    if let Some((index, (&previous, &value))) = sequence
        .iter()
        .tuple_windows()
        .enumerate()
        .find(|(_, (previous, value))| value <= previous)
    {
        return Err(MalformedInput::NotIncreasing {
            clock,
            index: index + 1,
            previous,
            value,
        });
    }

    Ok(())
}
