//! pulsesync-cli - align whole experiment folders through their sync pulses.
//!
//! The `pulsesync` command pairs behaviour records with physiology records
//! from the same session, loads the sync pulses exported next to each
//! record and aligns every pair with
//! [pulsesync-core](../pulsesync_core/index.html).
//!
//! # Configuration
//!
//! The command requires a YAML configuration file specifying:
//! - The behaviour and physiology record folders and extensions
//! - The suffixes of the pulse list files
//! - The physiology sampling rate
//! - Optional alignment parameters and record ambiguity policy
//!
//! See the `config/example.yaml` file for a complete example.

pub mod config;
pub mod loader;
pub mod report;

pub use config::Config;
pub use loader::PulseListLoader;
