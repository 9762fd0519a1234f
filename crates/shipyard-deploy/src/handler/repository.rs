use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use shipyard_core::{
    ExecutionContext, Handler, HandlerError, HandlerOutcome, Pipeline, Platform, PluginTable,
};
use shipyard_model::{RepositoryDeploy, Task, TaskIds, TaskKind};
use tracing::{debug, info, warn};

use super::roll_out;
use crate::source;

/// Clone, build, publish and roll out a repository.
pub struct DeployRepositoryHandler {
    plugins: Arc<PluginTable>,
    platform: Arc<dyn Platform>,
}

impl DeployRepositoryHandler {
    pub fn new(plugins: Arc<PluginTable>, platform: Arc<dyn Platform>) -> Self {
        Self { plugins, platform }
    }
}

#[async_trait]
impl Handler for DeployRepositoryHandler {
    fn name(&self) -> &'static str {
        "deploy-repository"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::DeployRepository
    }

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<HandlerOutcome, HandlerError> {
        let Task::DeployRepository { ids, params } = task else {
            return Err(HandlerError::unexpected_task(self.name(), task.kind()));
        };
        let git_ref = params.source.git_ref.clone();
        deliver(ctx, &self.plugins, self.platform.as_ref(), ids, params, &git_ref, None).await
    }
}

/// Rebuild a repository at a pinned commit.
pub struct RedeployRepositoryHandler {
    plugins: Arc<PluginTable>,
    platform: Arc<dyn Platform>,
}

impl RedeployRepositoryHandler {
    pub fn new(plugins: Arc<PluginTable>, platform: Arc<dyn Platform>) -> Self {
        Self { plugins, platform }
    }
}

#[async_trait]
impl Handler for RedeployRepositoryHandler {
    fn name(&self) -> &'static str {
        "redeploy-repository"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::RedeployRepository
    }

    async fn handle(
        &self,
        ctx: &ExecutionContext,
        task: &Task,
    ) -> Result<HandlerOutcome, HandlerError> {
        let Task::RedeployRepository { ids, params } = task else {
            return Err(HandlerError::unexpected_task(self.name(), task.kind()));
        };
        info!(
            target: "shipyard.deploy",
            previous = %params.previous_deployment_id,
            commit = %params.commit,
            "redeploying"
        );
        ctx.log_stdout(&format!(
            "redeploying {} from deployment {}",
            params.commit, params.previous_deployment_id
        ))
        .await;
        deliver(
            ctx,
            &self.plugins,
            self.platform.as_ref(),
            ids,
            &params.deploy,
            params.commit.trim(),
            Some(params.commit.trim()),
        )
        .await
    }
}

async fn deliver(
    ctx: &ExecutionContext,
    plugins: &PluginTable,
    platform: &dyn Platform,
    ids: &TaskIds,
    params: &RepositoryDeploy,
    git_ref: &str,
    pinned: Option<&str>,
) -> Result<HandlerOutcome, HandlerError> {
    // Unknown plugins and bad options fail before anything is fetched.
    let builder = plugins.builder(&params.builder)?;
    let registry = plugins.registry(&params.registry)?;

    let dir = scratch_dir(ctx, ids);
    let res = async {
        let checkout = source::checkout(ctx, &params.source, git_ref, &dir).await?;
        if let Some(commit) = pinned
            && !checkout.commit.starts_with(commit)
        {
            return Err(HandlerError::Validation(format!(
                "fetched {} but commit {commit} was requested",
                checkout.commit
            )));
        }

        let build_ctx = ctx.clone().with_workdir(&checkout.build_dir);
        let reference = Pipeline::new()
            .run(&build_ctx, builder.as_ref(), registry.as_ref())
            .await?
            .with_metadata("commit", checkout.commit.as_str());

        let deployed = roll_out(ctx, platform, ids, &reference).await?;
        let summary = match &deployed.url {
            Some(url) => format!("deployed {} at {url}", short(&checkout.commit)),
            None => format!("deployed {}", short(&checkout.commit)),
        };
        Ok(HandlerOutcome::new(summary).with_reference(reference))
    }
    .await;

    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => debug!(target: "shipyard.deploy", dir = %dir.display(), "scratch dir removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(target: "shipyard.deploy", dir = %dir.display(), "no scratch dir to remove")
        }
        Err(e) => {
            warn!(target: "shipyard.deploy", dir = %dir.display(), error = %e, "scratch dir not removed")
        }
    }
    res
}

/// Fresh directory directly below the workdir, whatever the deployment id contains.
fn scratch_dir(ctx: &ExecutionContext, ids: &TaskIds) -> PathBuf {
    ctx.workdir().join(format!(
        "{}-{}",
        path_token(ids.deployment_id.as_str()),
        uuid::Uuid::new_v4().simple()
    ))
}

/// One path component made of `[A-Za-z0-9_-]`, at most 64 chars.
fn path_token(raw: &str) -> String {
    raw.chars()
        .take(64)
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect()
}

fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
