use shipyard_core::{PlatformError, PluginError};
use shipyard_logbus::BusError;
use shipyard_observe::LoggerError;
use thiserror::Error;

/// Startup failures; once dispatch begins every outcome is an exit code instead.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("logger setup failed: {0}")]
    Logger(#[from] LoggerError),
    #[error("plugin registration failed: {0}")]
    Plugins(#[from] PluginError),
    #[error("platform client setup failed: {0}")]
    Platform(#[from] PlatformError),
    #[error("bus configuration rejected: {0}")]
    Bus(#[from] BusError),
    #[error("signal handler setup failed: {0}")]
    Signal(#[from] std::io::Error),
}
