//! Forge automation.
//!
//! This module provides:
//! - Settings and button targets
//! - Forge UI state detection from recognized text
//! - Input drivers for holding, clicking and key taps
//! - The macro runner (hold / sell / report cycle)
//! - The periodic scan monitor

pub mod config;
pub mod detection;
pub mod input;
pub mod monitor;
pub mod runner;
pub mod state;

pub use config::{get_config, init_config};
pub use input::{DryRunInput, InputDriver};
pub use monitor::{scan_text, ScanMonitor};
pub use runner::{Collaborators, MacroRunner, StartOutcome};
pub use state::RunState;

#[cfg(windows)]
pub use input::SendInputDriver;
