//! Windows of a clock B trace locked to clock A events.

use crate::{aligner::Aligner, error::MalformedInput, types::Clock};
use std::ops::Range;
use tracing::debug;

/// Trace windows cut around a set of events, all of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTraces {
    offsets: Range<i64>,
    ms_per_sample: f64,
    windows: Vec<Vec<f64>>,
    clipped: Vec<usize>,
}

impl EventTraces {
    /// Cuts a window of `trace` around every event.
    ///
    /// Event times are clock A milliseconds. `trace` holds one value per
    /// clock B unit, so `trace[k]` was recorded at clock B time `k`.
    /// `window_ms` is relative to the event, e.g. `-1000.0..4000.0`.
    ///
    /// Events are placed on the sample at or before their converted time,
    /// and the window bounds are truncated to whole samples. A window that
    /// would run off either end of the trace is skipped and its event index
    /// is reported by [clipped](Self::clipped).
    pub fn extract(
        aligner: &Aligner,
        event_times_ms: &[f64],
        trace: &[f64],
        window_ms: Range<f64>,
    ) -> Result<Self, MalformedInput> {
        let invalid_window = || MalformedInput::InvalidWindow {
            start_ms: window_ms.start,
            end_ms: window_ms.end,
        };
        if !(window_ms.start.is_finite() && window_ms.end.is_finite()) {
            return Err(invalid_window());
        }
        if let Some(index) = event_times_ms.iter().position(|t| !t.is_finite()) {
            return Err(MalformedInput::NonFinite {
                clock: Clock::A,
                index,
            });
        }

        let ms_per_sample = aligner.unit_scale_b().ms_per_unit();
        let offsets =
            (window_ms.start / ms_per_sample) as i64..(window_ms.end / ms_per_sample) as i64;
        if offsets.is_empty() {
            return Err(invalid_window());
        }

        let mut windows = Vec::with_capacity(event_times_ms.len());
        let mut clipped = Vec::new();

        for (index, &t) in event_times_ms.iter().enumerate() {
            let sample = aligner.a_to_b_one(t).floor() as i64;
            let bound = |offset: i64| {
                sample
                    .checked_add(offset)
                    .and_then(|k| usize::try_from(k).ok())
            };

            let window = bound(offsets.start)
                .zip(bound(offsets.end))
                .and_then(|(start, end)| trace.get(start..end));
            match window {
                Some(window) => windows.push(window.to_vec()),
                None => clipped.push(index),
            }
        }

        debug!(
            events = event_times_ms.len(),
            clipped = clipped.len(),
            window_samples = offsets.end.saturating_sub(offsets.start),
            "extracted event windows"
        );

        Ok(Self {
            offsets,
            ms_per_sample,
            windows,
            clipped,
        })
    }

    /// Windows of the events that fit inside the trace, in event order.
    pub fn windows(&self) -> &[Vec<f64>] {
        &self.windows
    }

    /// Indices of the events whose window ran off the trace.
    pub fn clipped(&self) -> &[usize] {
        &self.clipped
    }

    /// Number of samples in every window.
    pub fn window_len(&self) -> usize {
        let len = self.offsets.end.saturating_sub(self.offsets.start);
        usize::try_from(len).unwrap_or(usize::MAX)
    }

    /// Time of each window sample relative to its event, in milliseconds.
    pub fn relative_time_ms(&self) -> Vec<f64> {
        self.offsets
            .clone()
            .map(|offset| offset as f64 * self.ms_per_sample)
            .collect()
    }

    /// Sample-wise mean of the windows, or `None` when no window fit.
    pub fn mean(&self) -> Option<Vec<f64>> {
        mean_of(self.windows.iter().map(Vec::as_slice))
    }
}

/// Sample-wise mean over the windows of several sessions, weighting every
/// event equally.
///
/// Returns `Ok(None)` when no session has a window. Sessions must share the
/// window length, which holds when they were recorded at the same rate.
pub fn pooled_mean<'a>(
    sessions: impl IntoIterator<Item = &'a EventTraces>,
) -> Result<Option<Vec<f64>>, MalformedInput> {
    let sessions: Vec<&EventTraces> = sessions.into_iter().collect();
    if let Some((first, rest)) = sessions.split_first() {
        let expected = first.window_len();
        if let Some(other) = rest.iter().find(|other| other.window_len() != expected) {
            return Err(MalformedInput::MismatchedWindows {
                expected,
                found: other.window_len(),
            });
        }
    }

    Ok(mean_of(
        sessions
            .iter()
            .flat_map(|session| session.windows.iter().map(Vec::as_slice)),
    ))
}

fn mean_of<'a>(windows: impl IntoIterator<Item = &'a [f64]>) -> Option<Vec<f64>> {
    let mut windows = windows.into_iter();
    let mut sum = windows.next()?.to_vec();
    let mut count = 1usize;

    for window in windows {
        for (total, value) in sum.iter_mut().zip(window) {
            *total += value;
        }
        count += 1;
    }

    let count = count as f64;
    sum.iter_mut().for_each(|total| *total /= count);
    Some(sum)
}
