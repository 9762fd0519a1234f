//! Cancellable subprocess execution for handlers and builders.
//!
//! Output is forwarded byte-for-byte into the context's log writers, so line splitting and
//! sequencing stay with [`shipyard_logbus::LogWriter`].

mod error;
pub use error::ExecError;

mod proc;
pub use proc::{ProcConfig, ProcOutput, run};

mod util;
