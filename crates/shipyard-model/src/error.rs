use thiserror::Error;

/// Failures while turning raw task parameters into a [`crate::Task`].
///
/// The two variants map to distinct process exit codes, so they must never be merged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Parameters are missing or not well-formed at all.
    #[error("parse error: {0}")]
    Parse(String),
    /// Parameters are well-formed but do not fit the requested task kind.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn parse(msg: impl Into<String>) -> Self {
        ModelError::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ModelError::Validation(msg.into())
    }
}
