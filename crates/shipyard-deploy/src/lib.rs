//! Deployment handlers, one per task kind, and the platform clients they report to.

pub mod source;

pub mod handler;
pub use handler::{
    DeployImageHandler, DeployRepositoryHandler, DestroyJobHandler, RedeployRepositoryHandler,
    register_handlers,
};

pub mod platform;
pub use platform::{
    ENV_PLATFORM_TOKEN, ENV_PLATFORM_URL, HttpPlatform, LocalPlatform, PlatformConfig,
};

/// Phase tag for checkout output.
pub const PHASE_CLONE: &str = "clone";
/// Phase tag for platform rollout output.
pub const PHASE_DEPLOY: &str = "deploy";
/// Phase tag for teardown output.
pub const PHASE_DESTROY: &str = "destroy";
