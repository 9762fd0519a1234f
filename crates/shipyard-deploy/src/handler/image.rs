use std::sync::Arc;

use async_trait::async_trait;
use shipyard_core::{
    ExecutionContext, Handler, HandlerError, HandlerOutcome, Pipeline, Platform, PluginTable,
    Registry,
};
use shipyard_model::{Artifact, Task, TaskKind};
use shipyard_plugins::{PassthroughRegistry, builder::image_fingerprint};

use super::roll_out;

/// Roll out a prebuilt image, optionally mirroring it through a registry first.
pub struct DeployImageHandler {
    plugins: Arc<PluginTable>,
    platform: Arc<dyn Platform>,
}

impl DeployImageHandler {
    pub fn new(plugins: Arc<PluginTable>, platform: Arc<dyn Platform>) -> Self {
        Self { plugins, platform }
    }
}

#[async_trait]
impl Handler for DeployImageHandler {
    fn name(&self) -> &'static str {
        "deploy-image"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::DeployImage
    }

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<HandlerOutcome, HandlerError> {
        let Task::DeployImage { ids, params } = task else {
            return Err(HandlerError::unexpected_task(self.name(), task.kind()));
        };
        let registry: Box<dyn Registry> = match &params.registry {
            Some(spec) => self.plugins.registry(spec)?,
            None => Box::new(PassthroughRegistry),
        };

        let image = params.image.trim();
        let mut artifact = Artifact::image(image, image_fingerprint(image, None));
        if let Some(credential) = &params.credential {
            artifact = artifact.with_metadata("credential", credential.as_str());
        }

        let reference = Pipeline::new()
            .push(ctx, registry.as_ref(), artifact)
            .await?;
        let deployed = roll_out(ctx, self.platform.as_ref(), ids, &reference).await?;

        let summary = match &deployed.url {
            Some(url) => format!("deployed {image} at {url}"),
            None => format!("deployed {image}"),
        };
        Ok(HandlerOutcome::new(summary).with_reference(reference))
    }
}
