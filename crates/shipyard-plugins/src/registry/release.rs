use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use serde::{Deserialize, Serialize};
use shipyard_core::{ExecutionContext, PluginError, Registry};
use shipyard_model::{Artifact, ArtifactKind, PluginOptions, Reference};
use tracing::{debug, info};

use super::SHA256SUMS;
use crate::{builder::decode, digest};

fn default_api_url() -> String {
    "https://api.github.com".into()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseRegistryOptions {
    /// `owner/name`.
    pub repository: String,
    pub token: String,
    pub tag: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub generate_notes: bool,
    /// Upload a `SHA256SUMS` asset next to the binaries.
    #[serde(default = "default_true")]
    pub checksums: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    draft: bool,
    prerelease: bool,
    generate_release_notes: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedRelease {
    id: u64,
    html_url: String,
    upload_url: String,
}

/// Publishes binary sets as a release on a GitHub-compatible forge.
pub struct ReleaseRegistry {
    opts: ReleaseRegistryOptions,
    client: Client,
}

impl ReleaseRegistry {
    pub const NAME: &'static str = "release";

    pub fn new(opts: ReleaseRegistryOptions) -> Result<Self, PluginError> {
        let parts: Vec<_> = opts.repository.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(PluginError::config(
                Self::NAME,
                format!("repository {:?} is not of the form owner/name", opts.repository),
            ));
        }
        if opts.tag.trim().is_empty() {
            return Err(PluginError::config(Self::NAME, "tag must not be empty"));
        }
        if opts.token.trim().is_empty() {
            return Err(PluginError::config(Self::NAME, "token must not be empty"));
        }
        Url::parse(&opts.api_url).map_err(|e| PluginError::config(Self::NAME, e))?;

        let client = Client::builder()
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PluginError::config(Self::NAME, e))?;
        Ok(Self { opts, client })
    }

    pub fn from_options(options: &PluginOptions) -> Result<Self, PluginError> {
        Self::new(decode(Self::NAME, options)?)
    }

    fn failed(reason: impl ToString) -> PluginError {
        PluginError::failed(Self::NAME, reason)
    }

    async fn create_release(&self, ctx: &ExecutionContext) -> Result<CreatedRelease, PluginError> {
        let url = format!(
            "{}/repos/{}/releases",
            self.opts.api_url.trim_end_matches('/'),
            self.opts.repository
        );
        let body = CreateRelease {
            tag_name: &self.opts.tag,
            name: self.opts.title.as_deref().unwrap_or(&self.opts.tag),
            draft: self.opts.draft,
            prerelease: self.opts.prerelease,
            generate_release_notes: self.opts.generate_notes,
        };
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.opts.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send();

        let response = ctx.guard(request).await?.map_err(Self::failed)?;
        let status = response.status();
        if status != StatusCode::CREATED && !status.is_success() {
            let text = ctx.guard(response.text()).await?.unwrap_or_default();
            return Err(Self::failed(format!("create release returned {status}: {text}")));
        }
        ctx.guard(response.json::<CreatedRelease>())
            .await?
            .map_err(|e| Self::failed(format!("invalid release response: {e}")))
    }

    async fn upload(
        &self,
        ctx: &ExecutionContext,
        upload_url: &Url,
        name: &str,
        body: Vec<u8>,
    ) -> Result<(), PluginError> {
        ctx.ensure_active()?;
        let mut url = upload_url.clone();
        url.query_pairs_mut().append_pair("name", name);

        let request = self
            .client
            .post(url)
            .bearer_auth(&self.opts.token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send();
        let response = ctx.guard(request).await?.map_err(Self::failed)?;
        let status = response.status();
        if !status.is_success() {
            let text = ctx.guard(response.text()).await?.unwrap_or_default();
            return Err(Self::failed(format!("upload of {name} returned {status}: {text}")));
        }
        ctx.log_stdout(&format!("uploaded {name}")).await;
        debug!(target: "shipyard.plugin", asset = name, "release asset uploaded");
        Ok(())
    }
}

/// Strip the RFC 6570 template suffix, e.g. `.../assets{?name,label}`.
fn upload_base(template: &str) -> Result<Url, PluginError> {
    let base = template.split('{').next().unwrap_or(template);
    Url::parse(base).map_err(|e| ReleaseRegistry::failed(format!("invalid upload url: {e}")))
}

#[async_trait]
impl Registry for ReleaseRegistry {
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
            return Err(Self::failed("artifact has no files to attach"));
        }

        // Asset names are flat: nested paths become `os_app` style names.
        let mut digests =
            digest::digest_files(Path::new(&artifact.location), artifact.files.clone()).await?;
        for d in &mut digests {
            d.name = d.name.replace('/', "_");
        }
        if let Some(dup) = digest::duplicate_name(&digests) {
            return Err(Self::failed(format!("two artifact files would upload as asset {dup}")));
        }

        let release = self.create_release(ctx).await?;
        ctx.log_stdout(&format!("created release {} ({})", self.opts.tag, release.html_url))
            .await;
        let upload_url = upload_base(&release.upload_url)?;

        for d in &digests {
            let bytes = tokio::fs::read(&d.path).await?;
            self.upload(ctx, &upload_url, &d.name, bytes).await?;
        }
        if self.opts.checksums {
            let sums = digest::checksums(&digests).into_bytes();
            self.upload(ctx, &upload_url, SHA256SUMS, sums).await?;
        }

        info!(
            target: "shipyard.plugin",
            repository = %self.opts.repository,
            tag = %self.opts.tag,
            assets = digests.len(),
            "release published"
        );
        Ok(Reference::new(release.html_url.clone(), artifact.fingerprint)
            .with_url(release.html_url)
            .with_metadata("release_id", release.id.to_string())
            .with_metadata("tag", self.opts.tag.clone()))
    }
}
