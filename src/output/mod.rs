//! Output module for reporting on the frontier
//!
//! This module handles:
//! - Loading task and document counts from a store
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, FrontierStatistics};
