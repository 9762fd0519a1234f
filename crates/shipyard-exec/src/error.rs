use shipyard_core::{ContextError, HandlerError, PluginError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("missing program")]
    MissingProgram,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with code {code}")]
    NonZeroExit { program: String, code: i32 },
    #[error("{program} was killed by a signal")]
    KilledBySignal { program: String },
    #[error("interrupted: {0}")]
    Interrupted(#[from] ContextError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Attribute the failure to `plugin`, keeping interruptions distinguishable.
    pub fn into_plugin(self, plugin: &str) -> PluginError {
        match self {
            ExecError::Interrupted(e) => PluginError::Interrupted(e),
            other => PluginError::failed(plugin, other),
        }
    }
}

impl From<ExecError> for HandlerError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Interrupted(e) => HandlerError::Interrupted(e),
            other => HandlerError::Command(other.to_string()),
        }
    }
}
