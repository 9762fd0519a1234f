use thiserror::Error;

/// Why an [`crate::ExecutionContext`] no longer admits work.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("unknown builder: {0}")]
    UnknownBuilder(String),
    #[error("unknown registry: {0}")]
    UnknownRegistry(String),
    #[error("plugin {0} is already registered")]
    Duplicate(String),
    #[error("plugin table is already installed")]
    AlreadyInstalled,
    #[error("invalid options for {plugin}: {reason}")]
    Config { plugin: String, reason: String },
    #[error("{plugin} failed: {reason}")]
    Failed { plugin: String, reason: String },
    #[error("invalid pipeline transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("interrupted: {0}")]
    Interrupted(#[from] ContextError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub fn config(plugin: impl Into<String>, reason: impl ToString) -> Self {
        PluginError::Config {
            plugin: plugin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn failed(plugin: impl Into<String>, reason: impl ToString) -> Self {
        PluginError::Failed {
            plugin: plugin.into(),
            reason: reason.to_string(),
        }
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, PluginError::Interrupted(_))
    }
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Request(String),
    #[error("platform rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("interrupted: {0}")]
    Interrupted(#[from] ContextError),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    /// Parameters do not fit the handler; never retried.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("interrupted: {0}")]
    Interrupted(#[from] ContextError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Unexpected task variant for the handler it was routed to.
    pub fn unexpected_task(handler: &str, got: shipyard_model::TaskKind) -> Self {
        HandlerError::Validation(format!("handler {handler} cannot run a {got} task"))
    }
}
