//! CLI command implementations.
//!
//! Each submodule owns the configuration struct and handler for one
//! subcommand: `scan` inventories and classifies projects, `sweep`
//! deletes confirmed candidates.

pub mod scan;
pub mod sweep;

pub use scan::{handle_scan, ScanConfig};
pub use sweep::{handle_sweep, SweepConfig};
