use std::{collections::BTreeSet, path::PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use shipyard_core::{ExecutionContext, PluginError, Registry};
use shipyard_model::{Artifact, ArtifactKind, PluginOptions, Reference};
use tracing::debug;

use crate::{
    builder::{decode, resolve},
    digest,
};

/// Checksum manifest written next to published files.
pub const SHA256SUMS: &str = "SHA256SUMS";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalOptions {
    pub destination: PathBuf,
}

/// Copies artifact files into a directory and writes a checksum manifest.
pub struct LocalRegistry {
    opts: LocalOptions,
}

impl LocalRegistry {
    pub const NAME: &'static str = "local";

    pub fn new(opts: LocalOptions) -> Result<Self, PluginError> {
        if opts.destination.as_os_str().is_empty() {
            return Err(PluginError::config(Self::NAME, "destination must not be empty"));
        }
        Ok(Self { opts })
    }

    pub fn from_options(options: &PluginOptions) -> Result<Self, PluginError> {
        Self::new(decode(Self::NAME, options)?)
    }
}

#[async_trait]
impl Registry for LocalRegistry {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn push(
        &self,
        ctx: &ExecutionContext,
        artifact: Artifact,
    ) -> Result<Reference, PluginError> {
        ctx.ensure_active()?;
        if artifact.kind == ArtifactKind::Image || artifact.files.is_empty() {
            return Err(PluginError::failed(
                Self::NAME,
                "artifact has no files to store",
            ));
        }

        let dest = resolve(ctx, &self.opts.destination);
        tokio::fs::create_dir_all(&dest).await?;

        let root = PathBuf::from(&artifact.location);
        let mut names = BTreeSet::new();
        let mut copied = Vec::with_capacity(artifact.files.len());
        for file in &artifact.files {
            ctx.ensure_active()?;
            let name = digest::relative_name(&root, file);
            if !names.insert(name.clone()) {
                return Err(PluginError::failed(
                    Self::NAME,
                    format!("two artifact files would be stored as {name}"),
                ));
            }
            let target = dest.join(&name);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(file, &target).await?;
            debug!(target: "shipyard.plugin", from = %file.display(), to = %target.display(), "copied");
            copied.push(target);
        }

        let digests = digest::digest_files(&dest, copied).await?;
        tokio::fs::write(dest.join(SHA256SUMS), digest::checksums(&digests)).await?;
        ctx.log_stdout(&format!("stored {} file(s) in {}", digests.len(), dest.display()))
            .await;

        let published = digest::fingerprint(&digests);
        if published != artifact.fingerprint {
            return Err(PluginError::failed(
                Self::NAME,
                format!("copied files hash to {published}, expected {}", artifact.fingerprint),
            ));
        }

        Ok(Reference::new(dest.display().to_string(), published)
            .with_url(format!("file://{}", dest.display()))
            .with_metadata("files", digests.len().to_string()))
    }
}
