//! This library aligns two independently clocked recordings of the same
//! experiment through a train of sync pulses that both of them logged.
//!
//! Clock A is the reference (behavioural events, in milliseconds) and clock
//! B is mapped onto it (sampled physiology, in native units such as sample
//! indices). Either recording may have dropped pulses or started at a
//! different moment. The [Aligner] finds which pulses correspond, fits an
//! affine clock model and converts timestamps in both directions.
//!
//! # Usage
//!
//! ```rust
//! use pulsesync_core::{AlignConfig, Aligner};
//!
//! # fn main() -> Result<(), pulsesync_core::AlignError> {
//! // Sync pulses seen by the behaviour system, in milliseconds.
//! let pulse_times_a = [0.0, 1000.0, 2000.0, 3000.0, 4000.0];
//!
//! // The same pulses seen by a 130 Hz acquisition system, which started
//! // 5 seconds earlier and dropped the third pulse.
//! let pulse_samples_b = [650.0, 780.0, 1040.0, 1170.0];
//! let unit_scale_b = 1000.0 / 130.0;
//!
//! let aligner = Aligner::with_config(
//!     &pulse_times_a,
//!     &pulse_samples_b,
//!     unit_scale_b,
//!     &AlignConfig::default(),
//! )?;
//! assert_eq!(aligner.correspondence().len(), 4);
//!
//! // Behavioural event times converted to sample indices.
//! let samples = aligner.a_to_b(&[500.0, 2500.0]);
//! assert!((samples[0] - 715.0).abs() < 1e-6);
//! assert!((samples[1] - 975.0).abs() < 1e-6);
//! # Ok(())
//! # }
//! ```
//!
//! Whole experiment folders are handled by pairing record names with a
//! [RecordMatcher] and aligning each pair with [align_sessions] or
//! [align_sessions_concurrent]. [EventTraces] cuts a clock B signal around
//! clock A events and [pooled_mean] averages those windows across sessions.

mod aligner;
mod batch;
mod config;
mod error;
mod events;
mod matcher;
mod model;
mod normalize;
mod records;
mod types;

pub use aligner::Aligner;
pub use batch::{
    AlignedSession, BatchReport, FailureReason, PulseData, PulseLoader, SyncFailure,
    align_sessions, align_sessions_concurrent,
};
pub use config::AlignConfig;
pub use error::{AlignError, AlignmentFailure, MalformedInput, RecordError};
pub use events::{EventTraces, pooled_mean};
pub use matcher::match_pulses;
pub use model::ClockModel;
pub use normalize::{normalize, validate_sequence};
pub use records::{
    AmbiguityPolicy, KeyExtractor, RecordMatcher, RecordPairing, SessionKey, SessionPair,
    SubjectDateKey,
};
pub use types::{Clock, Correspondence, MatchedPair, UnitScale};
