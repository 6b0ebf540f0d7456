//! Output module for reporting on the crawled graph
//!
//! Statistics are read straight from the store and printed by the `--stats`
//! command.

pub mod stats;

pub use stats::{load_statistics, print_statistics, GraphStatistics};
