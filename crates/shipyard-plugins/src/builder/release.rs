use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use async_trait::async_trait;
use serde::Deserialize;
use shipyard_core::{Builder, ExecutionContext, PluginError};
use shipyard_exec::ProcConfig;
use shipyard_model::{Artifact, ArtifactKind, PluginOptions};
use tokio::time::Instant;
use tracing::info;

use super::{decode, resolve};
use crate::digest;

/// `os/arch` pair of one cross-compilation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub os: String,
    pub arch: String,
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() && !arch.contains('/') => {
                Ok(Target {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
            _ => Err(format!("target {s:?} is not of the form os/arch")),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn default_source_path() -> String {
    ".".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_targets() -> Vec<String> {
    vec!["linux/amd64".into()]
}

fn default_command() -> String {
    "go".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseOptions {
    /// Binary base name.
    pub name: String,
    /// Package path handed to the toolchain.
    #[serde(default = "default_source_path")]
    pub source_path: String,
    pub version: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub ldflags: Option<String>,
    /// Toolchain executable.
    #[serde(default = "default_command")]
    pub command: String,
}

/// Cross-compiles one binary per target platform.
pub struct ReleaseBuilder {
    opts: ReleaseOptions,
    targets: Vec<Target>,
}

impl ReleaseBuilder {
    pub const NAME: &'static str = "release";

    pub fn new(opts: ReleaseOptions) -> Result<Self, PluginError> {
        if opts.name.trim().is_empty() {
            return Err(PluginError::config(Self::NAME, "name must not be empty"));
        }
        if opts.version.trim().is_empty() {
            return Err(PluginError::config(Self::NAME, "version must not be empty"));
        }
        if opts.targets.is_empty() {
            return Err(PluginError::config(Self::NAME, "at least one target is required"));
        }
        let targets = opts
            .targets
            .iter()
            .map(|t| t.parse::<Target>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PluginError::config(Self::NAME, e))?;
        Ok(Self { opts, targets })
    }

    pub fn from_options(options: &PluginOptions) -> Result<Self, PluginError> {
        Self::new(decode(Self::NAME, options)?)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    fn binary_name(&self, target: &Target) -> String {
        let ext = if target.os == "windows" { ".exe" } else { "" };
        format!(
            "{}_{}_{}_{}{ext}",
            self.opts.name, self.opts.version, target.os, target.arch
        )
    }
}

#[async_trait]
impl Builder for ReleaseBuilder {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn build(&self, ctx: &ExecutionContext) -> Result<Artifact, PluginError> {
        ctx.ensure_active()?;
        let started = Instant::now();

        let out_dir = resolve(ctx, &self.opts.output_dir);
        tokio::fs::create_dir_all(&out_dir).await?;

        let mut files = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            ctx.ensure_active()?;
            let path = out_dir.join(self.binary_name(target));
            ctx.log_stdout(&format!("building {} {} for {target}", self.opts.name, self.opts.version))
                .await;

            let mut cfg = ProcConfig::new(&self.opts.command)
                .arg("build")
                .arg("-o")
                .arg(path.display().to_string());
            if let Some(ldflags) = &self.opts.ldflags {
                cfg = cfg.arg("-ldflags").arg(ldflags);
            }
            let cfg = cfg
                .arg(&self.opts.source_path)
                .env("GOOS", &target.os)
                .env("GOARCH", &target.arch)
                .env("CGO_ENABLED", "0")
                .cwd(ctx.workdir());

            shipyard_exec::run(ctx, &cfg)
                .await
                .map_err(|e| e.into_plugin(Self::NAME))?;
            if !path.is_file() {
                return Err(PluginError::failed(
                    Self::NAME,
                    format!("toolchain did not produce {}", path.display()),
                ));
            }
            files.push(path);
        }

        let digests = digest::digest_files(&out_dir, files.clone()).await?;
        info!(
            target: "shipyard.plugin",
            name = %self.opts.name,
            version = %self.opts.version,
            binaries = files.len(),
            "release binaries built"
        );

        Ok(Artifact {
            kind: ArtifactKind::Binaries,
            location: out_dir.display().to_string(),
            files,
            fingerprint: digest::fingerprint(&digests),
            size_bytes: digests.iter().map(|d| d.size).sum(),
            build_duration: started.elapsed(),
            metadata: BTreeMap::from([
                ("name".to_string(), self.opts.name.clone()),
                ("version".to_string(), self.opts.version.clone()),
                (
                    "targets".to_string(),
                    self.targets
                        .iter()
                        .map(Target::to_string)
                        .collect::<Vec<_>>()
                        .join(","),
                ),
            ]),
        })
    }
}
