//! Aligning many recording sessions at once.

use crate::{
    aligner::Aligner,
    config::AlignConfig,
    error::AlignError,
    records::{RecordPairing, SessionKey, SessionPair},
};
use eyre::{WrapErr, ensure};
use futures::{StreamExt, TryStreamExt, stream};
use std::{fmt, sync::Arc};
use tracing::{info, warn};

/// Sync pulses of one session, as read from its two records.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseData {
    /// Clock A pulse times in milliseconds.
    pub pulse_times_a: Vec<f64>,
    /// Clock B pulse times in native units.
    pub pulse_samples_b: Vec<f64>,
    /// Milliseconds per clock B unit.
    pub unit_scale_b: f64,
}

/// Reads the sync pulses of a paired session.
pub trait PulseLoader: Sync {
    fn load(&self, pair: &SessionPair, physiology: &str) -> eyre::Result<PulseData>;
}

impl<F> PulseLoader for F
where
    F: Fn(&SessionPair, &str) -> eyre::Result<PulseData> + Sync,
{
    fn load(&self, pair: &SessionPair, physiology: &str) -> eyre::Result<PulseData> {
        self(pair, physiology)
    }
}

/// A session whose clocks were aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSession {
    pub behavior: String,
    pub physiology: String,
    pub key: SessionKey,
    pub aligner: Aligner,
}

/// Why a paired session could not be aligned.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The loader could not produce pulse data.
    Load(String),
    Align(AlignError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Load(message) => write!(f, "could not load pulses: {message}"),
            FailureReason::Align(err) => write!(f, "{err}"),
        }
    }
}

/// A paired session that could not be aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub behavior: String,
    pub physiology: String,
    pub reason: FailureReason,
}

/// Outcome of a batch run. Every list keeps the order of the input pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub aligned: Vec<AlignedSession>,
    /// Behaviour records with no physiology counterpart.
    pub missing: Vec<String>,
    /// Physiology records with no behaviour counterpart.
    pub orphaned: Vec<String>,
    pub failures: Vec<SyncFailure>,
}

impl BatchReport {
    /// True when every record was paired and every pair aligned.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty() && self.failures.is_empty()
    }

    fn from_outcomes(outcomes: impl IntoIterator<Item = Outcome>, orphaned: Vec<String>) -> Self {
        let mut report = BatchReport {
            orphaned,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Aligned(session) => report.aligned.push(session),
                Outcome::Missing(behavior) => report.missing.push(behavior),
                Outcome::Failed(failure) => report.failures.push(failure),
            }
        }
        report
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paired = self.aligned.len() + self.failures.len();
        writeln!(
            f,
            "Matching behaviour and physiology data found for {paired} sessions."
        )?;
        write!(f, "Sync pulses aligned for {} sessions.", self.aligned.len())?;

        if !self.missing.is_empty() {
            write!(
                f,
                "\n\nNo matching physiology record found for behaviour sessions:"
            )?;
            for behavior in &self.missing {
                write!(f, "\n    {behavior}")?;
            }
        }

        if !self.orphaned.is_empty() {
            write!(
                f,
                "\n\nNo matching behaviour session found for physiology records:"
            )?;
            for physiology in &self.orphaned {
                write!(f, "\n    {physiology}")?;
            }
        }

        if !self.failures.is_empty() {
            write!(f, "\n\nSync pulses could not be aligned for sessions:")?;
            for failure in &self.failures {
                write!(
                    f,
                    "\n    {} : {} ({})",
                    failure.behavior, failure.physiology, failure.reason
                )?;
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
enum Outcome {
    Aligned(AlignedSession),
    Missing(String),
    Failed(SyncFailure),
}

/// Aligns every paired session, one after another.
///
/// Per-session failures are collected in the report and never stop the
/// batch.
pub fn align_sessions<L>(pairing: RecordPairing, loader: &L, config: &AlignConfig) -> BatchReport
where
    L: PulseLoader + ?Sized,
{
    let RecordPairing { pairs, orphaned } = pairing;
    let outcomes: Vec<_> = pairs
        .into_iter()
        .map(|pair| align_one(pair, loader, config))
        .collect();
    BatchReport::from_outcomes(outcomes, orphaned)
}

/// Aligns paired sessions on the blocking thread pool, with at most `jobs`
/// sessions in flight.
///
/// The report is identical to the one [align_sessions] produces for the
/// same input. An error is returned only for an invalid job count or a
/// panicked alignment task.
pub async fn align_sessions_concurrent<L>(
    pairing: RecordPairing,
    loader: Arc<L>,
    config: AlignConfig,
    jobs: usize,
) -> eyre::Result<BatchReport>
where
    L: PulseLoader + Send + 'static,
{
    ensure!(jobs > 0, "at least one alignment job is required");

    let RecordPairing { pairs, orphaned } = pairing;
    let config = Arc::new(config);

    let mut outcomes: Vec<(usize, Outcome)> = stream::iter(pairs.into_iter().enumerate())
        .map(|(index, pair)| {
            let loader = Arc::clone(&loader);
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || (index, align_one(pair, &*loader, &config)))
        })
        .buffer_unordered(jobs)
        .map(|joined| joined.wrap_err("alignment task did not complete"))
        .try_collect()
        .await?;

    outcomes.sort_by_key(|(index, _)| *index);
    Ok(BatchReport::from_outcomes(
        outcomes.into_iter().map(|(_, outcome)| outcome),
        orphaned,
    ))
}

fn align_one<L>(pair: SessionPair, loader: &L, config: &AlignConfig) -> Outcome
where
    L: PulseLoader + ?Sized,
{
    let SessionPair {
        behavior,
        physiology,
        key,
    } = &pair;
    let (Some(physiology), Some(key)) = (physiology, key) else {
        return Outcome::Missing(behavior.clone());
    };

    let failed = |reason| {
        Outcome::Failed(SyncFailure {
            behavior: behavior.clone(),
            physiology: physiology.clone(),
            reason,
        })
    };

    let data = match loader.load(&pair, physiology) {
        Ok(data) => data,
        Err(err) => {
            warn!(%behavior, %physiology, "failed to load sync pulses: {err:#}");
            return failed(FailureReason::Load(format!("{err:#}")));
        }
    };

    match Aligner::with_config(
        &data.pulse_times_a,
        &data.pulse_samples_b,
        data.unit_scale_b,
        config,
    ) {
        Ok(aligner) => {
            let model = aligner.model();
            info!(
                %behavior,
                %physiology,
                slope = model.slope(),
                intercept = model.intercept(),
                matched_pulses = model.matched_pulses(),
                max_residual_ms = model.max_residual_ms(),
                "aligned session"
            );
            Outcome::Aligned(AlignedSession {
                behavior: behavior.clone(),
                physiology: physiology.clone(),
                key: key.clone(),
                aligner,
            })
        }
        Err(err) => {
            warn!(%behavior, %physiology, "sync pulses could not be aligned: {err}");
            failed(FailureReason::Align(err))
        }
    }
}
