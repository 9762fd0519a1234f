use std::sync::Arc;

use async_trait::async_trait;
use shipyard_core::{ExecutionContext, Handler, HandlerError, HandlerOutcome, Platform};
use shipyard_model::{Task, TaskKind};
use tracing::info;

use crate::PHASE_DESTROY;

pub struct DestroyJobHandler {
    platform: Arc<dyn Platform>,
}

impl DestroyJobHandler {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Handler for DestroyJobHandler {
    fn name(&self) -> &'static str {
        "destroy-job"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::DestroyJob
    }

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<HandlerOutcome, HandlerError> {
        let Task::DestroyJob { ids, params } = task else {
            return Err(HandlerError::unexpected_task(self.name(), task.kind()));
        };
        ctx.set_phase(PHASE_DESTROY).await;
        ctx.log_stdout(&format!("destroying job {} ({})", ids.job_id, params.reason))
            .await;

        self.platform.destroy(ctx, ids, &params.reason).await?;

        info!(target: "shipyard.deploy", job = %ids.job_id, "job destroyed");
        ctx.log_stdout("job destroyed").await;
        Ok(HandlerOutcome::new(format!("destroyed job {}", ids.job_id)))
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::PlatformError;
    use shipyard_model::{ImageDeploy, JobDestroy};

    use super::*;
    use crate::handler::testing::{Call, FakePlatform, ctx, ids};

    fn task(reason: &str) -> Task {
        Task::DestroyJob {
            ids: ids(),
            params: JobDestroy {
                reason: reason.into(),
            },
        }
    }

    #[tokio::test]
    async fn destroys_through_platform() {
        let platform = Arc::new(FakePlatform::default());
        let (ctx, bus) = ctx(&std::env::temp_dir());

        let out = DestroyJobHandler::new(platform.clone())
            .handle(&ctx, &task("service deleted"))
            .await
            .unwrap();

        assert_eq!(out.summary, "destroyed job job-1");
        assert_eq!(platform.calls(), [Call::Destroy(ids(), "service deleted".into())]);
        let logs = bus.logs();
        assert!(logs.iter().all(|e| e.phase == PHASE_DESTROY));
        assert_eq!(logs[0].message, "destroying job job-1 (service deleted)\n");
    }

    #[tokio::test]
    async fn platform_rejection_is_an_error() {
        let platform = Arc::new(FakePlatform::rejecting());
        let (ctx, _bus) = ctx(&std::env::temp_dir());
        let err = DestroyJobHandler::new(platform)
            .handle(&ctx, &task("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Platform(PlatformError::Rejected { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn other_task_kinds_are_refused() {
        let platform = Arc::new(FakePlatform::default());
        let (ctx, _bus) = ctx(&std::env::temp_dir());
        let image = Task::DeployImage {
            ids: ids(),
            params: ImageDeploy {
                image: "nginx".into(),
                registry: None,
                credential: None,
            },
        };
        let err = DestroyJobHandler::new(platform.clone())
            .handle(&ctx, &image)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
        assert!(platform.calls().is_empty());
    }
}
