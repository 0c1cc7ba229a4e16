//! Affine clock model fitted from matched pulses.

use crate::{
    config::AlignConfig,
    error::AlignmentFailure,
    matcher,
    types::{Correspondence, MatchedPair},
};
use tracing::debug;

/// Maps clock A milliseconds onto clock B milliseconds:
/// `b = slope * a + intercept`.
///
/// The slope is always positive and finite, so the model is invertible on
/// the whole real line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClockModel {
    slope: f64,
    intercept: f64,
    matched_pulses: usize,
    max_residual_ms: f64,
    rms_residual_ms: f64,
}

impl ClockModel {
    /// Least-squares fit over the matched pulse pairs.
    ///
    /// `a` and `b` are the full sequences in milliseconds; the
    /// correspondence selects which elements take part in the fit.
    pub fn fit(
        a: &[f64],
        b: &[f64],
        correspondence: &Correspondence,
        config: &AlignConfig,
    ) -> Result<Self, AlignmentFailure> {
        let pairs = correspondence.pairs();
        if pairs.len() < 2 {
            return Err(AlignmentFailure::TooFewPairs { found: pairs.len() });
        }

        let (slope, intercept) = least_squares(a, b, pairs);
        if !slope.is_finite() || !(config.min_rate..=config.max_rate).contains(&slope) {
            return Err(AlignmentFailure::ImplausibleRate {
                slope,
                min: config.min_rate,
                max: config.max_rate,
            });
        }

        let (max_residual_ms, sum_sq) = pairs
            .iter()
            .map(|pair| b[pair.b] - (slope * a[pair.a] + intercept))
            .fold((0.0f64, 0.0f64), |(max, sum_sq), residual| {
                (max.max(residual.abs()), sum_sq + residual * residual)
            });
        let rms_residual_ms = (sum_sq / pairs.len() as f64).sqrt();

        if max_residual_ms > config.max_residual_ms {
            return Err(AlignmentFailure::ExcessiveResidual {
                max_residual_ms,
                tolerance_ms: config.max_residual_ms,
            });
        }

        let model = Self {
            slope,
            intercept,
            matched_pulses: pairs.len(),
            max_residual_ms,
            rms_residual_ms,
        };
        model.check_support(a, b, config)?;

        debug!(
            slope,
            intercept,
            matched = pairs.len(),
            max_residual_ms,
            rms_residual_ms,
            "fitted clock model"
        );

        Ok(model)
    }

    /// Checks that the matched run explains the overlap of the two
    /// recordings and is unlikely to have arisen between unrelated trains.
    ///
    /// The overlap holds the A pulses that project into B's recorded span
    /// and the B pulses inside A's projected span. The larger of the two
    /// counts is the number of pulses that should have matched, so most
    /// pulses on both sides must be accounted for.
    ///
    /// Under unrelated trains each overlapping pulse beyond the two anchors
    /// lands within the match tolerance of a B pulse with probability
    /// `p = 2 * tolerance * density_b`. The number of searched hypotheses
    /// times `C(trials, hits) * p^hits` bounds how many equally good
    /// alignments chance alone would produce.
    fn check_support(
        &self,
        a: &[f64],
        b: &[f64],
        config: &AlignConfig,
    ) -> Result<(), AlignmentFailure> {
        let tolerance = config.match_tolerance_ms;
        let (Some(&a_first), Some(&a_last), Some(&b_first), Some(&b_last)) =
            (a.first(), a.last(), b.first(), b.last())
        else {
            return Ok(());
        };

        let b_window = (b_first - tolerance)..=(b_last + tolerance);
        let a_window = (self.a_to_b(a_first) - tolerance)..=(self.a_to_b(a_last) + tolerance);

        let a_in_b = a
            .iter()
            .filter(|&&t| b_window.contains(&self.a_to_b(t)))
            .count();
        let b_in_a: Vec<f64> = b.iter().copied().filter(|t| a_window.contains(t)).collect();

        let matched = self.matched_pulses;
        let expected = a_in_b.max(b_in_a.len()).max(matched);
        let coverage = matched as f64 / expected as f64;

        if coverage < config.min_coverage {
            return Err(AlignmentFailure::LowCoverage {
                matched,
                expected,
                coverage,
                required: config.min_coverage,
            });
        }

        let chance_probability = match (b_in_a.first(), b_in_a.last()) {
            (Some(&first), Some(&last)) if last > first => {
                let density = (b_in_a.len() - 1) as f64 / (last - first);
                (2.0 * tolerance * density).min(1.0)
            }
            _ => 1.0,
        };

        let hits = matched.saturating_sub(2);
        let trials = expected.saturating_sub(2);
        let hypotheses = matcher::hypothesis_count(a.len(), b.len(), config.search_depth);
        let chance_alignments = (hypotheses as f64).ln()
            + ln_binomial(trials, hits)
            + hits as f64 * chance_probability.ln();
        let chance_alignments = chance_alignments.exp();

        debug!(
            matched,
            expected,
            coverage,
            chance_probability,
            chance_alignments,
            "checked overlap support"
        );

        if chance_alignments > config.max_chance_alignments {
            return Err(AlignmentFailure::Inconclusive {
                chance_alignments,
                allowed: config.max_chance_alignments,
            });
        }
        Ok(())
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Slope of the inverse map, `1 / slope`.
    pub fn inverse_slope(&self) -> f64 {
        1.0 / self.slope
    }

    /// Intercept of the inverse map, `-intercept / slope`.
    pub fn inverse_intercept(&self) -> f64 {
        -self.intercept / self.slope
    }

    pub fn matched_pulses(&self) -> usize {
        self.matched_pulses
    }

    /// Largest absolute residual over the matched pulses, in clock B ms.
    pub fn max_residual_ms(&self) -> f64 {
        self.max_residual_ms
    }

    pub fn rms_residual_ms(&self) -> f64 {
        self.rms_residual_ms
    }

    pub fn a_to_b(&self, t: f64) -> f64 {
        self.slope * t + self.intercept
    }

    pub fn b_to_a(&self, t: f64) -> f64 {
        (t - self.intercept) / self.slope
    }
}

/// Natural log of the binomial coefficient `C(n, k)`, for `k <= n`.
fn ln_binomial(n: usize, k: usize) -> f64 {
    (1..=k)
        .map(|i| ((n - k + i) as f64 / i as f64).ln())
        .sum()
}

/// Ordinary least squares on mean-centred data.
fn least_squares(a: &[f64], b: &[f64], pairs: &[MatchedPair]) -> (f64, f64) {
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|pair| a[pair.a]).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|pair| b[pair.b]).sum::<f64>() / n;

    let (sxx, sxy) = pairs.iter().fold((0.0, 0.0), |(sxx, sxy), pair| {
        let dx = a[pair.a] - mean_a;
        let dy = b[pair.b] - mean_b;
        (sxx + dx * dx, sxy + dx * dy)
    });

    let slope = sxy / sxx;
    (slope, mean_b - slope * mean_a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_pairs(n: usize) -> Correspondence {
        Correspondence::from_pairs((0..n).map(|i| MatchedPair::new(i, i)).collect())
    }

    #[test]
    fn test_fit_identity() {
        let a = [0.0, 1000.0, 2000.0, 3000.0];
        let model = ClockModel::fit(&a, &a, &identity_pairs(4), &AlignConfig::default()).unwrap();
        assert!((model.slope() - 1.0).abs() < 1e-12);
        assert!(model.intercept().abs() < 1e-9);
        assert_eq!(model.matched_pulses(), 4);
        assert_eq!(model.max_residual_ms(), 0.0);
    }

    #[test]
    fn test_fit_offset_and_rate() {
        let a = [0.0, 700.0, 1500.0, 2900.0, 3100.0];
        let b: Vec<f64> = a.iter().map(|t| 1.5 * t + 250.0).collect();
        let model = ClockModel::fit(&a, &b, &identity_pairs(5), &AlignConfig::default()).unwrap();
        assert!((model.slope() - 1.5).abs() < 1e-12);
        assert!((model.intercept() - 250.0).abs() < 1e-9);
        assert!((model.inverse_slope() - 1.0 / 1.5).abs() < 1e-12);
        assert!((model.inverse_intercept() + 250.0 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_fit_averages_jitter() {
        let a = [0.0, 1000.0, 2000.0, 3000.0];
        let b = [1.0, 999.0, 2001.0, 2999.0];
        let model = ClockModel::fit(&a, &b, &identity_pairs(4), &AlignConfig::default()).unwrap();
        assert!((model.slope() - 1.0).abs() < 1e-3);
        assert!(model.max_residual_ms() <= 1.5);
        assert!(model.rms_residual_ms() > 0.0);
    }

    #[test]
    fn test_fit_requires_two_pairs() {
        let a = [0.0, 1000.0];
        let err = ClockModel::fit(&a, &a, &identity_pairs(1), &AlignConfig::default()).unwrap_err();
        assert_eq!(err, AlignmentFailure::TooFewPairs { found: 1 });
    }

    #[test]
    fn test_fit_rejects_implausible_rate() {
        let a = [0.0, 1000.0, 2000.0];
        let b = [0.0, 10_000.0, 20_000.0];
        let err = ClockModel::fit(&a, &b, &identity_pairs(3), &AlignConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AlignmentFailure::ImplausibleRate { slope, .. } if (slope - 10.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_fit_rejects_excessive_residual() {
        let a = [0.0, 1000.0, 2000.0, 3000.0];
        let b = [0.0, 1030.0, 1970.0, 3000.0];
        let err = ClockModel::fit(&a, &b, &identity_pairs(4), &AlignConfig::default()).unwrap_err();
        assert!(matches!(err, AlignmentFailure::ExcessiveResidual { .. }));
    }

    #[test]
    fn test_fit_rejects_low_coverage() {
        // Three matched pulses while both recordings share twelve.
        let a: Vec<f64> = (0..12).map(|i| i as f64 * 1000.0).collect();
        let pairs = Correspondence::from_pairs(vec![
            MatchedPair::new(0, 0),
            MatchedPair::new(1, 1),
            MatchedPair::new(2, 2),
        ]);
        let err = ClockModel::fit(&a, &a, &pairs, &AlignConfig::default()).unwrap_err();
        assert_eq!(
            err,
            AlignmentFailure::LowCoverage {
                matched: 3,
                expected: 12,
                coverage: 0.25,
                required: 0.5,
            }
        );
    }

    #[test]
    fn test_coverage_counts_only_overlap() {
        // A keeps recording long after B stops; only the overlap counts.
        let a: Vec<f64> = (0..20).map(|i| i as f64 * 1000.0).collect();
        let b: Vec<f64> = a[..8].iter().map(|t| t + 500.0).collect();
        let model = ClockModel::fit(&a, &b, &identity_pairs(8), &AlignConfig::default()).unwrap();
        assert_eq!(model.matched_pulses(), 8);
    }

    #[test]
    fn test_coverage_counts_unmatched_pulses_on_both_sides() {
        // Only every fourth A pulse has a partner, although B spans them all.
        let a: Vec<f64> = (0..12).map(|i| i as f64 * 1000.0).collect();
        let b = [a[0], a[4], a[8]];
        let pairs = Correspondence::from_pairs(vec![
            MatchedPair::new(0, 0),
            MatchedPair::new(4, 1),
            MatchedPair::new(8, 2),
        ]);
        let err = ClockModel::fit(&a, &b, &pairs, &AlignConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AlignmentFailure::LowCoverage {
                matched: 3,
                expected: 9,
                ..
            }
        ));
    }

    #[test]
    fn test_fit_rejects_alignment_explained_by_chance() {
        // Two anchors and a single confirming pulse.
        let a = [0.0, 1000.0, 2000.0];
        let err = ClockModel::fit(&a, &a, &identity_pairs(3), &AlignConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AlignmentFailure::Inconclusive { chance_alignments, allowed }
                if (chance_alignments - 0.18).abs() < 1e-9 && allowed == 0.05
        ));

        let lenient = AlignConfig::default().with_max_chance_alignments(0.5);
        assert!(ClockModel::fit(&a, &a, &identity_pairs(3), &lenient).is_ok());
    }

    #[test]
    fn test_chance_bound_grows_with_tolerance() {
        let a = [0.0, 1000.0, 2000.0, 3000.0];
        assert!(ClockModel::fit(&a, &a, &identity_pairs(4), &AlignConfig::default()).is_ok());

        let coarse = AlignConfig::default()
            .with_match_tolerance(40.0)
            .with_max_residual(40.0);
        let err = ClockModel::fit(&a, &a, &identity_pairs(4), &coarse).unwrap_err();
        assert!(matches!(err, AlignmentFailure::Inconclusive { .. }));
    }

    #[test]
    fn test_ln_binomial() {
        assert_eq!(ln_binomial(5, 0), 0.0);
        assert!((ln_binomial(5, 2) - 10f64.ln()).abs() < 1e-12);
        assert!((ln_binomial(40, 40)).abs() < 1e-12);
    }

    #[test]
    fn test_conversion_round_trip() {
        let a = [0.0, 700.0, 1500.0, 2900.0];
        let b: Vec<f64> = a.iter().map(|t| 0.75 * t + 12_345.0).collect();
        let model = ClockModel::fit(&a, &b, &identity_pairs(4), &AlignConfig::default()).unwrap();

        for t in [-1e6, -3.5, 0.0, 1234.5, 9.9e7] {
            let back = model.b_to_a(model.a_to_b(t));
            assert!((back - t).abs() <= 1e-9 * t.abs().max(1.0));

            let forward = model.a_to_b(model.b_to_a(t));
            assert!((forward - t).abs() <= 1e-9 * t.abs().max(1.0));
        }
    }
}
