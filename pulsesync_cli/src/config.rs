//! Configuration parsing and validation for the pulsesync command.

use eyre::{Result, WrapErr, ensure};
use pulsesync_core::{AlignConfig, AmbiguityPolicy};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Folder with one behaviour record per session.
    pub behaviour_dir: PathBuf,

    /// Folder with one physiology record per session.
    pub physiology_dir: PathBuf,

    /// Only files with this extension count as behaviour records.
    #[serde(default = "default_behaviour_extension")]
    pub behaviour_extension: String,

    /// Only files with this extension count as physiology records.
    #[serde(default = "default_physiology_extension")]
    pub physiology_extension: String,

    /// Where the sync pulse lists of each record are found.
    #[serde(default)]
    pub pulses: PulseFileConfig,

    pub physiology: PhysiologyConfig,

    /// Matching and fitting parameters.
    #[serde(default)]
    pub alignment: AlignmentConfig,

    #[serde(default)]
    pub records: RecordsConfig,

    /// Maximum number of sessions aligned at once.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .wrap_err_with(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.jobs > 0, "jobs must be greater than zero");

        ensure!(
            !self.behaviour_extension.is_empty() && !self.physiology_extension.is_empty(),
            "Record extensions cannot be empty"
        );

        ensure!(
            !self.pulses.behaviour_suffix.is_empty() && !self.pulses.physiology_suffix.is_empty(),
            "Pulse file suffixes cannot be empty"
        );

        let rate = self.physiology.sampling_rate_hz;
        ensure!(
            rate.is_finite() && rate > 0.0,
            "physiology.sampling_rate_hz must be positive, got {}",
            rate
        );

        self.to_align_config()
            .validate()
            .wrap_err("Invalid alignment section")?;

        Ok(())
    }

    /// Convert to the pulsesync-core AlignConfig.
    pub fn to_align_config(&self) -> AlignConfig {
        let alignment = &self.alignment;
        AlignConfig {
            min_matched_pulses: alignment.min_matched_pulses,
            search_depth: alignment.search_depth,
            max_gap: alignment.max_gap,
            match_tolerance_ms: as_millis_f64(alignment.match_tolerance),
            max_residual_ms: as_millis_f64(alignment.max_residual),
            min_rate: alignment.min_rate,
            max_rate: alignment.max_rate,
            min_coverage: alignment.min_coverage,
            max_chance_alignments: alignment.max_chance_alignments,
        }
    }
}

fn default_behaviour_extension() -> String {
    "txt".to_string()
}

fn default_physiology_extension() -> String {
    "ppd".to_string()
}

fn default_jobs() -> usize {
    4
}

/// Suffixes appended to a record's file name to find its pulse list.
#[derive(Debug, Clone, Deserialize)]
pub struct PulseFileConfig {
    #[serde(default = "default_pulse_suffix")]
    pub behaviour_suffix: String,

    #[serde(default = "default_pulse_suffix")]
    pub physiology_suffix: String,
}

impl Default for PulseFileConfig {
    fn default() -> Self {
        Self {
            behaviour_suffix: default_pulse_suffix(),
            physiology_suffix: default_pulse_suffix(),
        }
    }
}

fn default_pulse_suffix() -> String {
    ".pulses".to_string()
}

/// Acquisition parameters of the physiology system.
#[derive(Debug, Clone, Deserialize)]
pub struct PhysiologyConfig {
    /// Physiology pulse lists hold sample indices at this rate.
    pub sampling_rate_hz: f64,
}

/// Alignment parameters. Missing keys take the library defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub min_matched_pulses: usize,
    pub search_depth: usize,
    pub max_gap: usize,

    /// How far a pulse may stray from its predicted position.
    #[serde(with = "humantime_serde")]
    pub match_tolerance: Duration,

    /// Largest fit residual accepted for a session.
    #[serde(with = "humantime_serde")]
    pub max_residual: Duration,

    pub min_rate: f64,
    pub max_rate: f64,
    pub min_coverage: f64,

    /// Largest expected number of chance alignments between unrelated
    /// pulse trains.
    pub max_chance_alignments: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        let defaults = AlignConfig::default();
        Self {
            min_matched_pulses: defaults.min_matched_pulses,
            search_depth: defaults.search_depth,
            max_gap: defaults.max_gap,
            match_tolerance: from_millis_f64(defaults.match_tolerance_ms),
            max_residual: from_millis_f64(defaults.max_residual_ms),
            min_rate: defaults.min_rate,
            max_rate: defaults.max_rate,
            min_coverage: defaults.min_coverage,
            max_chance_alignments: defaults.max_chance_alignments,
        }
    }
}

/// Record pairing options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsConfig {
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

fn from_millis_f64(millis: f64) -> Duration {
    Duration::from_nanos((millis * 1e6).round() as u64)
}
