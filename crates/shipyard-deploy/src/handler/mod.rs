mod repository;
pub use repository::{DeployRepositoryHandler, RedeployRepositoryHandler};

mod image;
pub use image::DeployImageHandler;

mod destroy;
pub use destroy::DestroyJobHandler;

use std::sync::Arc;

use shipyard_core::{
    Deployed, ExecutionContext, HandlerError, HandlerRouter, Platform, PluginTable,
};
use shipyard_model::{Reference, TaskIds};

use crate::PHASE_DEPLOY;

/// Register the handler of every task kind.
pub fn register_handlers(
    router: &mut HandlerRouter,
    plugins: Arc<PluginTable>,
    platform: Arc<dyn Platform>,
) {
    router.register(Arc::new(DeployRepositoryHandler::new(
        Arc::clone(&plugins),
        Arc::clone(&platform),
    )));
    router.register(Arc::new(RedeployRepositoryHandler::new(
        Arc::clone(&plugins),
        Arc::clone(&platform),
    )));
    router.register(Arc::new(DeployImageHandler::new(plugins, Arc::clone(&platform))));
    router.register(Arc::new(DestroyJobHandler::new(platform)));
}

/// Roll the service onto `reference`.
pub(crate) async fn roll_out(
    ctx: &ExecutionContext,
    platform: &dyn Platform,
    ids: &TaskIds,
    reference: &Reference,
) -> Result<Deployed, HandlerError> {
    ctx.set_phase(PHASE_DEPLOY).await;
    ctx.log_stdout(&format!("deploying {} ({})", reference.location, reference.digest))
        .await;
    let deployed = platform.deploy(ctx, ids, reference).await?;
    if let Some(url) = &deployed.url {
        ctx.log_stdout(&format!("service available at {url}")).await;
    }
    Ok(deployed)
}
