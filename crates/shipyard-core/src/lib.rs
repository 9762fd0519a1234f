pub mod error;
pub use error::{ContextError, HandlerError, PlatformError, PluginError};

pub mod context;
pub use context::ExecutionContext;

pub mod plugin;
pub use plugin::{Builder, Pipeline, PipelineState, PluginTable, Registry};

pub mod handler;
pub use handler::{Handler, HandlerOutcome, HandlerRouter};

pub mod platform;
pub use platform::{Deployed, Platform};

pub mod dispatch;
pub use dispatch::{DispatchConfig, Dispatcher, ExitCode};
