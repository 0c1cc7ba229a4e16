use rand::{Rng, rngs::StdRng, seq::SliceRandom};
use std::collections::BTreeSet;

pub const SAMPLING_RATE_HZ: f64 = 130.0;

pub fn ms_per_sample() -> f64 {
    1000.0 / SAMPLING_RATE_HZ
}

/// A pulse train with random inter-pulse intervals between 100 and 1900 ms,
/// rounded to whole milliseconds.
pub fn random_train(rng: &mut StdRng, len: usize) -> Vec<f64> {
    let mut t = 0.0;
    (0..len)
        .map(|_| {
            t += rng.random_range(100.0..1900.0);
            f64::round(t)
        })
        .collect()
}

/// Picks `count` distinct indices from `range`.
#[allow(dead_code)]
pub fn pick_indices(
    rng: &mut StdRng,
    range: std::ops::Range<usize>,
    count: usize,
) -> BTreeSet<usize> {
    let mut indices: Vec<usize> = range.collect();
    indices.shuffle(rng);
    indices.into_iter().take(count).collect()
}

/// Two recordings of the same pulse train, with the ground truth needed to
/// check an alignment.
#[allow(dead_code)]
pub struct Recording {
    pub pulse_times_a: Vec<f64>,
    pub pulse_samples_b: Vec<f64>,
    pub offset_ms: f64,
    pub drift: f64,
    /// Pulses kept by both recordings.
    pub shared: usize,
}

#[allow(dead_code)]
impl Recording {
    /// Clock B sample index of a clock A time.
    pub fn true_sample(&self, t_ms: f64) -> f64 {
        (t_ms * self.drift + self.offset_ms) / ms_per_sample()
    }
}

/// RecordingBuilder simulates a behaviour system and a sampled acquisition
/// system logging the same pulses.
#[allow(dead_code)]
pub struct RecordingBuilder {
    train: Vec<f64>,
    offset_ms: f64,
    drift: f64,
    drop_a: BTreeSet<usize>,
    drop_b: BTreeSet<usize>,
}

#[allow(dead_code)]
impl RecordingBuilder {
    pub fn new(train: Vec<f64>) -> Self {
        Self {
            train,
            offset_ms: 0.0,
            drift: 1.0,
            drop_a: BTreeSet::new(),
            drop_b: BTreeSet::new(),
        }
    }

    pub fn offset_ms(mut self, offset_ms: f64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    /// Clock B runs `ppm` parts per million faster than clock A.
    pub fn drift_ppm(mut self, ppm: f64) -> Self {
        self.drift = 1.0 + ppm * 1e-6;
        self
    }

    pub fn drop_a(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.drop_a.extend(indices);
        self
    }

    pub fn drop_b(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.drop_b.extend(indices);
        self
    }

    pub fn build(self) -> Recording {
        let sample_ms = ms_per_sample();
        let pulse_times_a = self
            .train
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.drop_a.contains(index))
            .map(|(_, &t)| t)
            .collect();
        let pulse_samples_b = self
            .train
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.drop_b.contains(index))
            .map(|(_, &t)| f64::round((t * self.drift + self.offset_ms) / sample_ms))
            .collect();
        let shared = (0..self.train.len())
            .filter(|index| !self.drop_a.contains(index) && !self.drop_b.contains(index))
            .count();

        Recording {
            pulse_times_a,
            pulse_samples_b,
            offset_ms: self.offset_ms,
            drift: self.drift,
            shared,
        }
    }
}
