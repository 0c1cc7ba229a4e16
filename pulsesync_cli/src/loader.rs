//! Reading record listings and sync pulse lists from disk.
//!
//! Each record has a pulse list next to it, named after the record file
//! plus a suffix (`m001-2019-01-01-153000.txt.pulses`). A pulse list holds
//! one number per line. Blank lines and everything after a `#` are
//! ignored.

use crate::config::Config;
use eyre::{Result, WrapErr, ensure};
use pulsesync_core::{PulseData, PulseLoader, SessionPair, UnitScale};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Lists the file names in `dir` that carry `extension`, sorted by name.
pub fn list_records(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .wrap_err_with(|| format!("Failed to list record folder: {}", dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.wrap_err_with(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != extension) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            records.push(name.to_string());
        }
    }
    records.sort();

    debug!(dir = %dir.display(), extension, count = records.len(), "listed records");
    Ok(records)
}

/// Parses the contents of a pulse list.
pub fn parse_pulse_list(text: &str) -> Result<Vec<f64>> {
    let mut pulses = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let value = line.split('#').next().unwrap_or_default().trim();
        if value.is_empty() {
            continue;
        }
        let pulse: f64 = value
            .parse()
            .wrap_err_with(|| format!("Invalid pulse time {value:?} on line {}", index + 1))?;
        pulses.push(pulse);
    }
    Ok(pulses)
}

/// Reads a pulse list file.
pub fn read_pulse_list(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read pulse list: {}", path.display()))?;
    let pulses =
        parse_pulse_list(&text).wrap_err_with(|| format!("In pulse list {}", path.display()))?;
    ensure!(!pulses.is_empty(), "Pulse list {} is empty", path.display());
    Ok(pulses)
}

/// Loads the pulse lists that sit beside each record.
///
/// Behaviour pulse lists are in milliseconds, physiology pulse lists in
/// sample indices.
#[derive(Debug, Clone)]
pub struct PulseListLoader {
    behaviour_dir: PathBuf,
    physiology_dir: PathBuf,
    behaviour_suffix: String,
    physiology_suffix: String,
    unit_scale_b: UnitScale,
}

impl PulseListLoader {
    pub fn new(
        behaviour_dir: impl Into<PathBuf>,
        physiology_dir: impl Into<PathBuf>,
        sampling_rate_hz: f64,
    ) -> Result<Self> {
        let unit_scale_b = UnitScale::from_sampling_rate(sampling_rate_hz)
            .wrap_err("Invalid physiology sampling rate")?;
        Ok(Self {
            behaviour_dir: behaviour_dir.into(),
            physiology_dir: physiology_dir.into(),
            behaviour_suffix: ".pulses".to_string(),
            physiology_suffix: ".pulses".to_string(),
            unit_scale_b,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            &config.behaviour_dir,
            &config.physiology_dir,
            config.physiology.sampling_rate_hz,
        )?
        .with_suffixes(
            &config.pulses.behaviour_suffix,
            &config.pulses.physiology_suffix,
        ))
    }

    pub fn with_suffixes(mut self, behaviour: &str, physiology: &str) -> Self {
        self.behaviour_suffix = behaviour.to_string();
        self.physiology_suffix = physiology.to_string();
        self
    }

    fn behaviour_pulses(&self, record: &str) -> PathBuf {
        self.behaviour_dir
            .join(format!("{record}{}", self.behaviour_suffix))
    }

    fn physiology_pulses(&self, record: &str) -> PathBuf {
        self.physiology_dir
            .join(format!("{record}{}", self.physiology_suffix))
    }
}

impl PulseLoader for PulseListLoader {
    fn load(&self, pair: &SessionPair, physiology: &str) -> Result<PulseData> {
        let pulse_times_a = read_pulse_list(self.behaviour_pulses(&pair.behavior))?;
        let pulse_samples_b = read_pulse_list(self.physiology_pulses(physiology))?;
        Ok(PulseData {
            pulse_times_a,
            pulse_samples_b,
            unit_scale_b: self.unit_scale_b.ms_per_unit(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsesync_core::{KeyExtractor, SubjectDateKey};

    #[test]
    fn test_parse_pulse_list() {
        let text = "# exported pulses\n100\n\n1100.5  # second pulse\n  2100\n";
        assert_eq!(parse_pulse_list(text).unwrap(), vec![100.0, 1100.5, 2100.0]);
    }

    #[test]
    fn test_parse_pulse_list_reports_line() {
        let err = parse_pulse_list("100\n200\nabc\n").unwrap_err();
        assert!(format!("{err}").contains("line 3"));
    }

    #[test]
    fn test_list_records_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "m002-2019-01-01.txt",
            "m001-2019-01-01.txt",
            "m001-2019-01-01.txt.pulses",
            "notes.md",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("old.txt")).unwrap();

        let records = list_records(dir.path(), "txt").unwrap();
        assert_eq!(records, ["m001-2019-01-01.txt", "m002-2019-01-01.txt"]);
    }

    #[test]
    fn test_list_records_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_records(dir.path().join("absent"), "txt").is_err());
    }

    #[test]
    fn test_loader_reads_sidecar_files() {
        let behaviour = tempfile::tempdir().unwrap();
        let physiology = tempfile::tempdir().unwrap();
        fs::write(
            behaviour.path().join("m001-2019-01-01.txt.pulses"),
            "0\n1000\n2000\n",
        )
        .unwrap();
        fs::write(
            physiology.path().join("m001-2019-01-01.ppd.sync"),
            "130\n260\n390\n",
        )
        .unwrap();

        let loader = PulseListLoader::new(behaviour.path(), physiology.path(), 130.0)
            .unwrap()
            .with_suffixes(".pulses", ".sync");
        let pair = SessionPair {
            behavior: "m001-2019-01-01.txt".to_string(),
            physiology: Some("m001-2019-01-01.ppd".to_string()),
            key: SubjectDateKey.extract("m001-2019-01-01.txt"),
        };

        let data = loader.load(&pair, "m001-2019-01-01.ppd").unwrap();
        assert_eq!(data.pulse_times_a, vec![0.0, 1000.0, 2000.0]);
        assert_eq!(data.pulse_samples_b, vec![130.0, 260.0, 390.0]);
        assert!((data.unit_scale_b - 1000.0 / 130.0).abs() < 1e-12);
    }

    #[test]
    fn test_loader_rejects_empty_pulse_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pulses");
        fs::write(&path, "# nothing here\n").unwrap();
        assert!(read_pulse_list(&path).is_err());
    }

    #[test]
    fn test_loader_rejects_bad_sampling_rate() {
        assert!(PulseListLoader::new("b", "p", -1.0).is_err());
    }
}
