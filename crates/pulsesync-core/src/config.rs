use crate::error::MalformedInput;

/// Tuning parameters for matching and fitting pulse trains.
///
/// All tolerances are in milliseconds and apply after clock B has been
/// rescaled to milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignConfig {
    /// The fewest matched pulses that count as a correspondence.
    pub min_matched_pulses: usize,
    /// How many leading pulses of each sequence are tried as the first
    /// anchor of a match hypothesis.
    pub search_depth: usize,
    /// The most consecutive pulses on either side that may go unmatched
    /// before the matched run is considered finished.
    pub max_gap: usize,
    /// How far a pulse may land from its predicted position and still match.
    pub match_tolerance_ms: f64,
    /// The largest residual the fitted clock model may leave on any matched
    /// pulse.
    pub max_residual_ms: f64,
    /// Lower bound of the plausible clock B / clock A rate ratio.
    pub min_rate: f64,
    /// Upper bound of the plausible clock B / clock A rate ratio.
    pub max_rate: f64,
    /// The smallest fraction of overlapping pulses that must be matched.
    pub min_coverage: f64,
    /// Upper bound on the number of alignments as good as the accepted one
    /// that unrelated pulse trains would be expected to produce by chance.
    pub max_chance_alignments: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            min_matched_pulses: 3,
            search_depth: 8,
            max_gap: 10,
            match_tolerance_ms: 10.0,
            max_residual_ms: 10.0,
            min_rate: 0.25,
            max_rate: 4.0,
            min_coverage: 0.5,
            max_chance_alignments: 0.05,
        }
    }
}

impl AlignConfig {
    /// Both clocks sampled at 1 kHz or faster with accurately known rates.
    pub fn high_resolution() -> Self {
        Self {
            min_matched_pulses: 5,
            match_tolerance_ms: 2.0,
            max_residual_ms: 2.0,
            min_rate: 0.9,
            max_rate: 1.1,
            ..Self::default()
        }
    }

    /// Clock B sampled slowly (tens of Hz), so pulse times are coarse.
    pub fn low_resolution() -> Self {
        Self {
            match_tolerance_ms: 40.0,
            max_residual_ms: 40.0,
            ..Self::default()
        }
    }

    pub fn with_min_matched_pulses(mut self, min_matched_pulses: usize) -> Self {
        self.min_matched_pulses = min_matched_pulses;
        self
    }

    pub fn with_search_depth(mut self, search_depth: usize) -> Self {
        self.search_depth = search_depth;
        self
    }

    pub fn with_max_gap(mut self, max_gap: usize) -> Self {
        self.max_gap = max_gap;
        self
    }

    pub fn with_match_tolerance(mut self, match_tolerance_ms: f64) -> Self {
        self.match_tolerance_ms = match_tolerance_ms;
        self
    }

    pub fn with_max_residual(mut self, max_residual_ms: f64) -> Self {
        self.max_residual_ms = max_residual_ms;
        self
    }

    pub fn with_rate_range(mut self, min_rate: f64, max_rate: f64) -> Self {
        self.min_rate = min_rate;
        self.max_rate = max_rate;
        self
    }

    pub fn with_min_coverage(mut self, min_coverage: f64) -> Self {
        self.min_coverage = min_coverage;
        self
    }

    pub fn with_max_chance_alignments(mut self, max_chance_alignments: f64) -> Self {
        self.max_chance_alignments = max_chance_alignments;
        self
    }

    /// Checks that the parameters describe a usable search.
    pub fn validate(&self) -> Result<(), MalformedInput> {
        use MalformedInput::InvalidConfig;

        if self.min_matched_pulses < 2 {
            return Err(InvalidConfig("min_matched_pulses must be at least 2"));
        }
        if self.search_depth == 0 {
            return Err(InvalidConfig("search_depth must be at least 1"));
        }
        if !(self.match_tolerance_ms.is_finite() && self.match_tolerance_ms > 0.0) {
            return Err(InvalidConfig("match_tolerance_ms must be positive"));
        }
        if !(self.max_residual_ms.is_finite() && self.max_residual_ms > 0.0) {
            return Err(InvalidConfig("max_residual_ms must be positive"));
        }
        if !(self.min_rate.is_finite() && self.max_rate.is_finite()) {
            return Err(InvalidConfig("rate bounds must be finite"));
        }
        if !(self.min_rate > 0.0 && self.min_rate <= self.max_rate) {
            return Err(InvalidConfig("rate bounds must satisfy 0 < min_rate <= max_rate"));
        }
        if !(0.0..=1.0).contains(&self.min_coverage) {
            return Err(InvalidConfig("min_coverage must lie within [0, 1]"));
        }
        if self.max_chance_alignments.is_nan() || self.max_chance_alignments <= 0.0 {
            return Err(InvalidConfig("max_chance_alignments must be positive"));
        }
        Ok(())
    }
}
