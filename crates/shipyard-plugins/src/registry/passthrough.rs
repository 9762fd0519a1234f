use async_trait::async_trait;
use serde::Deserialize;
use shipyard_core::{ExecutionContext, PluginError, Registry};
use shipyard_model::{Artifact, PluginOptions, Reference};

use crate::builder::decode;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PassthroughOptions {}

/// Publishes nothing; the artifact's location becomes the reference.
#[derive(Debug, Default)]
pub struct PassthroughRegistry;

impl PassthroughRegistry {
    pub const NAME: &'static str = "passthrough";

    pub fn from_options(options: &PluginOptions) -> Result<Self, PluginError> {
        let _: PassthroughOptions = decode(Self::NAME, options)?;
        Ok(Self)
    }
}

#[async_trait]
impl Registry for PassthroughRegistry {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn push(
        &self,
        ctx: &ExecutionContext,
        artifact: Artifact,
    ) -> Result<Reference, PluginError> {
        ctx.ensure_active()?;
        let mut reference = Reference::new(artifact.location, artifact.fingerprint);
        reference.metadata = artifact.metadata;
        Ok(reference)
    }
}
