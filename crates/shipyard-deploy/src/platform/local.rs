use async_trait::async_trait;
use shipyard_core::{Deployed, ExecutionContext, Platform, PlatformError};
use shipyard_model::{Reference, TaskIds};
use tracing::info;

/// Platform stand-in for runs without an API endpoint: rollouts are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPlatform;

#[async_trait]
impl Platform for LocalPlatform {
    async fn deploy(
        &self,
        ctx: &ExecutionContext,
        ids: &TaskIds,
        reference: &Reference,
    ) -> Result<Deployed, PlatformError> {
        ctx.ensure_active()?;
        info!(
            target: "shipyard.deploy",
            service = %ids.service_id,
            location = %reference.location,
            digest = %reference.digest,
            "rollout recorded locally"
        );
        Ok(Deployed {
            url: reference.url.clone(),
        })
    }

    async fn destroy(
        &self,
        ctx: &ExecutionContext,
        ids: &TaskIds,
        reason: &str,
    ) -> Result<(), PlatformError> {
        ctx.ensure_active()?;
        info!(target: "shipyard.deploy", job = %ids.job_id, reason, "teardown recorded locally");
        Ok(())
    }
}
