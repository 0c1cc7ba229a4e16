//! YAML report of a batch run.

use eyre::{Result, WrapErr};
use indexmap::IndexMap;
use pulsesync_core::{BatchReport, ClockModel, SessionKey};
use serde::Serialize;
use std::{fs, path::Path};

#[derive(Debug, Serialize)]
struct Report<'a> {
    /// Aligned sessions keyed by behaviour record.
    aligned: IndexMap<&'a str, AlignedEntry<'a>>,
    missing: &'a [String],
    orphaned: &'a [String],
    failures: Vec<FailureEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct AlignedEntry<'a> {
    physiology: &'a str,
    session: &'a SessionKey,
    model: &'a ClockModel,
    missing_in_a: usize,
    missing_in_b: usize,
    /// Clock A times of the first and last matched pulse.
    matched_span_ms: [f64; 2],
}

#[derive(Debug, Serialize)]
struct FailureEntry<'a> {
    behaviour: &'a str,
    physiology: &'a str,
    reason: String,
}

/// Renders the report as YAML.
pub fn render(report: &BatchReport) -> Result<String> {
    let aligned = report
        .aligned
        .iter()
        .map(|session| {
            let correspondence = session.aligner.correspondence();
            let span = session.aligner.matched_span_a();
            let entry = AlignedEntry {
                physiology: &session.physiology,
                session: &session.key,
                model: session.aligner.model(),
                missing_in_a: correspondence.missing_in_a(),
                missing_in_b: correspondence.missing_in_b(),
                matched_span_ms: [*span.start(), *span.end()],
            };
            (session.behavior.as_str(), entry)
        })
        .collect();

    let failures = report
        .failures
        .iter()
        .map(|failure| FailureEntry {
            behaviour: &failure.behavior,
            physiology: &failure.physiology,
            reason: failure.reason.to_string(),
        })
        .collect();

    let report = Report {
        aligned,
        missing: &report.missing,
        orphaned: &report.orphaned,
        failures,
    };
    serde_yaml::to_string(&report).wrap_err("Failed to serialize report")
}

/// Writes the YAML report to `path`.
pub fn write(report: &BatchReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let yaml = render(report)?;
    fs::write(path, yaml)
        .wrap_err_with(|| format!("Failed to write report: {}", path.display()))
}
