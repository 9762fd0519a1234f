//! Builder / Registry contracts.
//!
//! A [`Builder`] turns source input into an [`Artifact`]; a [`Registry`] publishes exactly one
//! artifact and answers with a [`Reference`]. Handlers look both up by name in the process-wide
//! [`PluginTable`] and drive them through a [`Pipeline`].

mod pipeline;
pub use pipeline::{Pipeline, PipelineState};

mod table;
pub use table::{BuilderFactory, PluginTable, RegistryFactory, install, installed};

use async_trait::async_trait;
use shipyard_model::{Artifact, Reference};

use crate::{ExecutionContext, PluginError};

#[async_trait]
pub trait Builder: Send + Sync {
    fn name(&self) -> &str;

    /// Produce an artifact. Implementations must fail fast on an expired or cancelled context.
    async fn build(&self, ctx: &ExecutionContext) -> Result<Artifact, PluginError>;
}

#[async_trait]
pub trait Registry: Send + Sync {
    fn name(&self) -> &str;

    /// Publish `artifact`. It is consumed here and never reused.
    async fn push(
        &self,
        ctx: &ExecutionContext,
        artifact: Artifact,
    ) -> Result<Reference, PluginError>;
}
