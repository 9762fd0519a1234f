use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shipyard_model::{Reference, TaskIds};

use crate::{ExecutionContext, PlatformError};

/// Result of rolling a service onto a published reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployed {
    #[serde(default)]
    pub url: Option<String>,
}

/// The orchestration platform the handlers report to.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Point the service of `ids` at `reference`.
    async fn deploy(
        &self,
        ctx: &ExecutionContext,
        ids: &TaskIds,
        reference: &Reference,
    ) -> Result<Deployed, PlatformError>;

    /// Release the infrastructure allocated to the job of `ids`.
    async fn destroy(
        &self,
        ctx: &ExecutionContext,
        ids: &TaskIds,
        reason: &str,
    ) -> Result<(), PlatformError>;
}
