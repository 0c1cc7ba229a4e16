//! Pulse correspondence search.
//!
//! Both sequences record the same physical pulse train, but either may have
//! dropped pulses and they start at different moments. The matcher tests
//! hypotheses formed by two anchor pairs. The first anchor fixes the offset
//! and the second fixes the rate ratio between the clocks. Each hypothesis
//! is then extended pulse by pulse, so the best-supported hypothesis yields
//! the longest consistent run of matched pulses.
//!
//! The first anchor always involves one of the first
//! [search_depth](crate::AlignConfig::search_depth) pulses of either
//! sequence. The first matched pulse of the run is therefore early in at
//! least one recording, whichever recording started first.

use crate::{
    config::AlignConfig,
    error::AlignmentFailure,
    types::{Correspondence, MatchedPair},
};
use itertools::iproduct;
use tracing::debug;

/// How many pulses after the first anchor are tried as the second anchor.
/// Up to `ANCHOR_SPAN - 1` pulses may be missing between the two anchors.
const ANCHOR_SPAN: usize = 3;

/// Finds the longest run of pulses that line up between two sequences.
///
/// Both sequences must be strictly increasing and expressed in the same
/// unit (milliseconds). The returned correspondence excludes leading and
/// trailing pulses that have no partner.
///
/// Hypotheses are ranked by the number of matched pulses. Ties go to the
/// smaller sum of squared prediction errors, then to the hypothesis
/// enumerated first in `(i, j, i2, j2)` order.
pub fn match_pulses(
    a: &[f64],
    b: &[f64],
    config: &AlignConfig,
) -> Result<Correspondence, AlignmentFailure> {
    let mut best: Option<Candidate> = None;
    let mut hypotheses = 0usize;

    for (i, j) in first_anchors(a.len(), b.len(), config.search_depth) {
        let i_end = (i + 1 + ANCHOR_SPAN).min(a.len());
        let j_end = (j + 1 + ANCHOR_SPAN).min(b.len());

        for (i2, j2) in iproduct!(i + 1..i_end, j + 1..j_end) {
            hypotheses += 1;
            let first = MatchedPair::new(i, j);
            let second = MatchedPair::new(i2, j2);

            let Some(candidate) = extend(a, b, first, second, config) else {
                continue;
            };

            if best
                .as_ref()
                .is_none_or(|best| candidate.is_better_than(best))
            {
                best = Some(candidate);
            }
        }
    }

    let found = best.as_ref().map_or(0, |best| best.pairs.len());
    debug!(
        hypotheses,
        found,
        sq_error = best.as_ref().map(|best| best.sq_error),
        "pulse correspondence search finished"
    );

    match best {
        Some(best) if found >= config.min_matched_pulses => {
            Ok(Correspondence::from_pairs(best.pairs))
        }
        _ => Err(AlignmentFailure::InsufficientMatches {
            found,
            required: config.min_matched_pulses,
        }),
    }
}

/// A matched run produced by one hypothesis.
#[derive(Debug)]
struct Candidate {
    pairs: Vec<MatchedPair>,
    sq_error: f64,
}

impl Candidate {
    fn is_better_than(&self, other: &Candidate) -> bool {
        match self.pairs.len().cmp(&other.pairs.len()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => self.sq_error < other.sq_error,
            std::cmp::Ordering::Less => false,
        }
    }
}

/// Enumerates first anchors `(i, j)` where `i` or `j` lies within the
/// leading `depth` pulses of its sequence.
fn first_anchors(len_a: usize, len_b: usize, depth: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len_a).flat_map(move |i| {
        let j_end = if i < depth { len_b } else { depth.min(len_b) };
        (0..j_end).map(move |j| (i, j))
    })
}

/// Number of two-anchor hypotheses [match_pulses] enumerates for sequences
/// of these lengths, before the rate bounds discard any.
pub(crate) fn hypothesis_count(len_a: usize, len_b: usize, depth: usize) -> usize {
    let seconds = |len: usize, index: usize| ANCHOR_SPAN.min(len.saturating_sub(index + 1));
    let sum = |len: usize, range: std::ops::Range<usize>| -> usize {
        range.map(|index| seconds(len, index)).sum()
    };

    let leading_a = depth.min(len_a);
    let leading_b = depth.min(len_b);
    sum(len_a, 0..leading_a) * sum(len_b, 0..len_b)
        + sum(len_a, leading_a..len_a) * sum(len_b, 0..leading_b)
}

/// Extends a two-anchor hypothesis along both sequences.
///
/// Returns `None` when the anchors imply an implausible rate ratio.
fn extend(
    a: &[f64],
    b: &[f64],
    first: MatchedPair,
    second: MatchedPair,
    config: &AlignConfig,
) -> Option<Candidate> {
    let tolerance = config.match_tolerance_ms;
    let mut rate = (b[second.b] - b[first.b]) / (a[second.a] - a[first.a]);
    if !(config.min_rate..=config.max_rate).contains(&rate) {
        return None;
    }

    let mut pairs = vec![first, second];
    let mut sq_error = 0.0;
    let mut last = second;
    let mut next_b = second.b + 1;
    let mut misses = 0;

    'walk: for k in second.a + 1..a.len() {
        if next_b >= b.len() {
            break;
        }

        // The rate is known only to within 2 * tolerance over the baseline
        // between the first anchor and the last match, so the acceptance
        // window grows with the distance extrapolated.
        let step = a[k] - a[last.a];
        let baseline = a[last.a] - a[first.a];
        let window = tolerance + 2.0 * tolerance * step / baseline;
        let predicted = b[last.b] + rate * step;

        // B pulses that fall before the prediction were dropped by A.
        let mut skipped = 0;
        while next_b < b.len() && b[next_b] < predicted - window {
            if skipped == config.max_gap {
                break 'walk;
            }
            next_b += 1;
            skipped += 1;
        }

        let nearest = (next_b..(next_b + 2).min(b.len()))
            .filter(|&q| (b[q] - predicted).abs() <= window)
            .min_by(|&p, &q| {
                (b[p] - predicted)
                    .abs()
                    .total_cmp(&(b[q] - predicted).abs())
            });

        match nearest {
            Some(q) => {
                let error = b[q] - predicted;
                sq_error += error * error;
                last = MatchedPair::new(k, q);
                pairs.push(last);
                rate = (b[last.b] - b[first.b]) / (a[last.a] - a[first.a]);
                next_b = q + 1;
                misses = 0;
            }
            None => {
                // The A pulse was dropped by B.
                misses += 1;
                if misses > config.max_gap {
                    break;
                }
            }
        }
    }

    Some(Candidate { pairs, sq_error })
}
