mod domain;
pub use domain::*;

mod kind;
pub use kind::*;

mod event;
pub use event::{EndStatus, LogEndEvent, LogEvent, LogStream};

mod artifact;
pub use artifact::{Artifact, ArtifactKind, Fingerprint, Reference};

mod error;
pub use error::ModelError;

/// Phase every log writer starts in before a handler switches it.
pub const INITIAL_PHASE: &str = "init";
