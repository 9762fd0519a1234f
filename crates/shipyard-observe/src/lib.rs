//! Process-wide `tracing` setup for shipyard workers.
//!
//! Diagnostics always go to stderr; stdout is left to the payload the worker reports.

mod logger;
pub use logger::*;
