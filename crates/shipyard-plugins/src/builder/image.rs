use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use shipyard_core::{Builder, ExecutionContext, PluginError};
use shipyard_model::{Artifact, Fingerprint, PluginOptions};

use super::decode;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageOptions {
    pub image: String,
    /// Known content digest of the image, with or without the `sha256:` prefix.
    #[serde(default)]
    pub digest: Option<String>,
}

/// Build step for already-built images: the artifact is the reference itself.
pub struct ImageBuilder {
    opts: ImageOptions,
}

impl ImageBuilder {
    pub const NAME: &'static str = "image";

    pub fn new(opts: ImageOptions) -> Result<Self, PluginError> {
        if opts.image.trim().is_empty() {
            return Err(PluginError::config(Self::NAME, "image must not be empty"));
        }
        Ok(Self { opts })
    }

    pub fn from_options(options: &PluginOptions) -> Result<Self, PluginError> {
        Self::new(decode(Self::NAME, options)?)
    }
}

/// Fingerprint of an image reference: its declared digest, else the hash of the reference text.
pub fn image_fingerprint(image: &str, digest: Option<&str>) -> Fingerprint {
    match digest {
        Some(d) => Fingerprint::sha256(d.trim_start_matches("sha256:")),
        None => Fingerprint::sha256(hex::encode(Sha256::digest(image.as_bytes()))),
    }
}

#[async_trait]
impl Builder for ImageBuilder {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn build(&self, ctx: &ExecutionContext) -> Result<Artifact, PluginError> {
        ctx.ensure_active()?;
        ctx.log_stdout(&format!("using prebuilt image {}", self.opts.image))
            .await;
        let fp = image_fingerprint(&self.opts.image, self.opts.digest.as_deref());
        Ok(Artifact::image(&self.opts.image, fp).with_metadata("source", "prebuilt"))
    }
}
