use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use shipyard_core::{Builder, ExecutionContext, PluginError};
use shipyard_exec::ProcConfig;
use shipyard_model::{Artifact, ArtifactKind, PluginOptions};
use tokio::time::Instant;

use super::{decode, resolve};
use crate::digest;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandOptions {
    /// Shell command line run in the source tree.
    pub command: String,
    /// File or directory the command produces, relative to `working_dir`.
    pub output: PathBuf,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Runs an arbitrary build command and fingerprints what it produced.
pub struct CommandBuilder {
    opts: CommandOptions,
}

impl CommandBuilder {
    pub const NAME: &'static str = "command";

    pub fn new(opts: CommandOptions) -> Result<Self, PluginError> {
        if opts.command.trim().is_empty() {
            return Err(PluginError::config(Self::NAME, "command must not be empty"));
        }
        Ok(Self { opts })
    }

    pub fn from_options(options: &PluginOptions) -> Result<Self, PluginError> {
        Self::new(decode(Self::NAME, options)?)
    }
}

#[async_trait]
impl Builder for CommandBuilder {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn build(&self, ctx: &ExecutionContext) -> Result<Artifact, PluginError> {
        ctx.ensure_active()?;
        let started = Instant::now();

        let cwd = match &self.opts.working_dir {
            Some(dir) => resolve(ctx, dir),
            None => ctx.workdir().clone(),
        };
        let mut cfg = ProcConfig::shell(&self.opts.command).cwd(&cwd);
        for (k, v) in &self.opts.env {
            cfg = cfg.env(k, v);
        }
        shipyard_exec::run(ctx, &cfg)
            .await
            .map_err(|e| e.into_plugin(Self::NAME))?;

        let output = if self.opts.output.is_absolute() {
            self.opts.output.clone()
        } else {
            cwd.join(&self.opts.output)
        };
        let files = digest::collect_files(&output).map_err(|e| {
            PluginError::failed(Self::NAME, format!("output {} unreadable: {e}", output.display()))
        })?;
        if files.is_empty() {
            return Err(PluginError::failed(
                Self::NAME,
                format!("output {} contains no files", output.display()),
            ));
        }
        let digests = digest::digest_files(&output, files.clone()).await?;

        let kind = if output.is_dir() {
            ArtifactKind::Binaries
        } else {
            ArtifactKind::Package
        };
        Ok(Artifact {
            kind,
            location: output.display().to_string(),
            files,
            fingerprint: digest::fingerprint(&digests),
            size_bytes: digests.iter().map(|d| d.size).sum(),
            build_duration: started.elapsed(),
            metadata: BTreeMap::from([("command".to_string(), self.opts.command.clone())]),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use shipyard_logbus::{LogWriter, MemoryBus};
    use shipyard_model::{LogStream, TaskIds};

    use super::*;

    fn ctx(dir: &std::path::Path) -> (ExecutionContext, Arc<MemoryBus>) {
        let bus = Arc::new(MemoryBus::new());
        let ids = TaskIds::new("d", "j", "s", "o");
        let out = Arc::new(LogWriter::new(bus.clone(), ids.clone(), LogStream::Stdout));
        let err = Arc::new(LogWriter::new(bus.clone(), ids, LogStream::Stderr));
        let ctx = ExecutionContext::new(Duration::from_secs(30))
            .with_writers(out, err)
            .with_workdir(dir);
        (ctx, bus)
    }

    fn options(command: &str, output: &str) -> PluginOptions {
        PluginOptions::new()
            .with("command", command)
            .with("output", output)
    }

    #[tokio::test]
    async fn builds_and_fingerprints_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, bus) = ctx(dir.path());
        let b = CommandBuilder::from_options(&options(
            "mkdir -p out && echo building && printf bin > out/app",
            "out",
        ))
        .unwrap();

        let artifact = b.build(&ctx).await.unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Binaries);
        assert_eq!(artifact.files, [dir.path().join("out/app")]);
        assert_eq!(artifact.size_bytes, 3);
        assert!(artifact.fingerprint.as_str().starts_with("sha256:"));
        assert!(bus.logs().iter().any(|e| e.message == "building\n"));
    }

    #[tokio::test]
    async fn env_is_passed_to_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _bus) = ctx(dir.path());
        let opts = options("printf \"$TARGET\" > out.txt", "out.txt")
            .with("env", serde_json::json!({"TARGET": "release"}));
        let artifact = CommandBuilder::from_options(&opts).unwrap().build(&ctx).await.unwrap();

        assert_eq!(artifact.kind, ArtifactKind::Package);
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "release");
    }

    #[tokio::test]
    async fn failing_command_is_a_plugin_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _bus) = ctx(dir.path());
        let b = CommandBuilder::from_options(&options("exit 7", "out")).unwrap();
        let err = b.build(&ctx).await.unwrap_err();
        assert!(matches!(err, PluginError::Failed { .. }));
        assert!(err.to_string().contains("code 7"));
    }

    #[tokio::test]
    async fn missing_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _bus) = ctx(dir.path());
        let b = CommandBuilder::from_options(&options("true", "nothing-here")).unwrap();
        let err = b.build(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("nothing-here"));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let opts = options("make", "out").with("cache", true);
        assert!(matches!(
            CommandBuilder::from_options(&opts).err().unwrap(),
            PluginError::Config { .. }
        ));
        let blank = options("  ", "out");
        assert!(CommandBuilder::from_options(&blank).is_err());
    }

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, bus) = ctx(dir.path());
        ctx.cancel();
        let b = CommandBuilder::from_options(&options("echo hi", "out")).unwrap();
        assert!(b.build(&ctx).await.unwrap_err().is_interrupted());
        assert!(bus.logs().is_empty());
    }
}
