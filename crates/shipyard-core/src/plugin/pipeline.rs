use std::fmt;

use shipyard_model::{Artifact, Reference};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{Builder, ExecutionContext, PluginError, Registry};

/// Phase tag for build output.
pub const PHASE_BUILD: &str = "build";
/// Phase tag for registry output.
pub const PHASE_REGISTRY: &str = "registry";

/// Lifecycle of one build/push invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Configured,
    Building,
    Built,
    BuildFailed,
    BuildCancelled,
    Pushing,
    Pushed,
    PushFailed,
    PushCancelled,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Configured, Building)
                | (Configured, Pushing)
                | (Building, Built | BuildFailed | BuildCancelled)
                | (Built, Pushing)
                | (Pushing, Pushed | PushFailed | PushCancelled)
        )
    }

    /// No further transition is possible. `Built` is excluded: a push may still follow.
    pub fn is_terminal(self) -> bool {
        use PipelineState::*;
        matches!(
            self,
            BuildFailed | BuildCancelled | Pushed | PushFailed | PushCancelled
        )
    }

    pub fn is_success(self) -> bool {
        matches!(self, PipelineState::Built | PipelineState::Pushed)
    }

    pub fn as_str(self) -> &'static str {
        use PipelineState::*;
        match self {
            Configured => "configured",
            Building => "building",
            Built => "built",
            BuildFailed => "build_failed",
            BuildCancelled => "build_cancelled",
            Pushing => "pushing",
            Pushed => "pushed",
            PushFailed => "push_failed",
            PushCancelled => "push_cancelled",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one builder and one registry through [`PipelineState`].
///
/// No retries happen here; a plugin may retry internally.
#[derive(Debug)]
pub struct Pipeline {
    state: PipelineState,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Configured,
        }
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), PluginError> {
        if !self.state.can_transition_to(next) {
            return Err(PluginError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub async fn build(
        &mut self,
        ctx: &ExecutionContext,
        builder: &dyn Builder,
    ) -> Result<Artifact, PluginError> {
        self.advance(PipelineState::Building)?;
        ctx.set_phase(PHASE_BUILD).await;

        let started = Instant::now();
        let outcome = match ctx.guard(builder.build(ctx)).await {
            Ok(res) => res,
            Err(e) => Err(PluginError::from(e)),
        };

        match outcome {
            Ok(mut artifact) => {
                if artifact.build_duration.is_zero() {
                    artifact.build_duration = started.elapsed();
                }
                self.advance(PipelineState::Built)?;
                info!(
                    target: "shipyard.plugin",
                    builder = builder.name(),
                    location = %artifact.location,
                    fingerprint = %artifact.fingerprint,
                    "build finished"
                );
                Ok(artifact)
            }
            Err(e) => {
                let next = if e.is_interrupted() {
                    PipelineState::BuildCancelled
                } else {
                    PipelineState::BuildFailed
                };
                self.advance(next)?;
                warn!(target: "shipyard.plugin", builder = builder.name(), state = %next, error = %e, "build did not finish");
                Err(e)
            }
        }
    }

    pub async fn push(
        &mut self,
        ctx: &ExecutionContext,
        registry: &dyn Registry,
        artifact: Artifact,
    ) -> Result<Reference, PluginError> {
        self.advance(PipelineState::Pushing)?;
        ctx.set_phase(PHASE_REGISTRY).await;

        let outcome = match ctx.guard(registry.push(ctx, artifact)).await {
            Ok(res) => res,
            Err(e) => Err(PluginError::from(e)),
        };

        match outcome {
            Ok(reference) => {
                self.advance(PipelineState::Pushed)?;
                info!(
                    target: "shipyard.plugin",
                    registry = registry.name(),
                    location = %reference.location,
                    digest = %reference.digest,
                    "push finished"
                );
                Ok(reference)
            }
            Err(e) => {
                let next = if e.is_interrupted() {
                    PipelineState::PushCancelled
                } else {
                    PipelineState::PushFailed
                };
                self.advance(next)?;
                warn!(target: "shipyard.plugin", registry = registry.name(), state = %next, error = %e, "push did not finish");
                Err(e)
            }
        }
    }

    /// Build with `builder` and publish the result through `registry`.
    pub async fn run(
        &mut self,
        ctx: &ExecutionContext,
        builder: &dyn Builder,
        registry: &dyn Registry,
    ) -> Result<Reference, PluginError> {
        let artifact = self.build(ctx, builder).await?;
        self.push(ctx, registry, artifact).await
    }
}
