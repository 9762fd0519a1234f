use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{DeploymentId, ModelError, PluginSpec, TaskIds, TaskRequest};

/// Kind of work a dispatched worker process performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Clone a repository, build it and publish the result.
    DeployRepository,
    /// Rebuild an exact commit of an earlier repository deployment.
    RedeployRepository,
    /// Deploy an already-built container image.
    DeployImage,
    /// Tear down the infrastructure allocated to a job.
    DestroyJob,
}

impl TaskKind {
    /// Returns the wire identifier of the kind.
    ///
    /// This is used for parsing the scheduler payload, logging and routing:
    /// - `"deploy_repository"`
    /// - `"redeploy_repository"`
    /// - `"deploy_image"`
    /// - `"destroy_job"`
    pub fn kind(&self) -> &'static str {
        match self {
            TaskKind::DeployRepository => "deploy_repository",
            TaskKind::RedeployRepository => "redeploy_repository",
            TaskKind::DeployImage => "deploy_image",
            TaskKind::DestroyJob => "destroy_job",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl FromStr for TaskKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deploy_repository" => Ok(TaskKind::DeployRepository),
            "redeploy_repository" => Ok(TaskKind::RedeployRepository),
            "deploy_image" => Ok(TaskKind::DeployImage),
            "destroy_job" => Ok(TaskKind::DestroyJob),
            other => Err(ModelError::parse(format!("unknown task type: {other:?}"))),
        }
    }
}

/// Where repository source code comes from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RepositorySource {
    /// Clone URL.
    pub url: String,
    /// Branch, tag or commit to check out.
    #[serde(rename = "ref", default = "default_git_ref")]
    pub git_ref: String,
    /// Directory inside the repository to build from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdirectory: Option<PathBuf>,
}

fn default_git_ref() -> String {
    "main".to_string()
}

/// Parameters of [`TaskKind::DeployRepository`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDeploy {
    pub source: RepositorySource,
    /// Builder plugin producing the artifact.
    pub builder: PluginSpec,
    /// Registry plugin publishing the artifact.
    pub registry: PluginSpec,
}

/// Parameters of [`TaskKind::RedeployRepository`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRedeploy {
    /// Deployment whose source is rebuilt.
    pub previous_deployment_id: DeploymentId,
    /// Exact commit the previous deployment was built from.
    pub commit: String,
    #[serde(flatten)]
    pub deploy: RepositoryDeploy,
}

/// Parameters of [`TaskKind::DeployImage`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageDeploy {
    /// Image reference (e.g. `"registry.example.com/app:1.2"`).
    pub image: String,
    /// Optional registry to mirror the image into before deploying.
    ///
    /// If `None`, the image reference is deployed as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<PluginSpec>,
    /// Name of the stored credential the platform pulls the image with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Parameters of [`TaskKind::DestroyJob`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobDestroy {
    #[serde(default = "default_destroy_reason")]
    pub reason: String,
}

fn default_destroy_reason() -> String {
    "requested".to_string()
}

/// A fully validated task description.
///
/// Built once per process invocation and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    DeployRepository {
        ids: TaskIds,
        params: RepositoryDeploy,
    },
    RedeployRepository {
        ids: TaskIds,
        params: RepositoryRedeploy,
    },
    DeployImage {
        ids: TaskIds,
        params: ImageDeploy,
    },
    DestroyJob {
        ids: TaskIds,
        params: JobDestroy,
    },
}

impl Task {
    /// Validate a parsed request against the shape its kind requires.
    pub fn from_request(req: TaskRequest) -> Result<Self, ModelError> {
        let TaskRequest { kind, ids, payload } = req;
        let task = match kind {
            TaskKind::DeployRepository => {
                let params: RepositoryDeploy = decode(kind, payload)?;
                validate_repository(&params)?;
                Task::DeployRepository { ids, params }
            }
            TaskKind::RedeployRepository => {
                let params: RepositoryRedeploy = decode(kind, payload)?;
                validate_repository(&params.deploy)?;
                if params.commit.trim().is_empty() {
                    return Err(ModelError::validation("commit must not be empty"));
                }
                reject_option_like("commit", &params.commit)?;
                if params.previous_deployment_id.is_empty() {
                    return Err(ModelError::validation(
                        "previous_deployment_id must not be empty",
                    ));
                }
                Task::RedeployRepository { ids, params }
            }
            TaskKind::DeployImage => {
                let params: ImageDeploy = decode(kind, payload)?;
                if params.image.trim().is_empty() {
                    return Err(ModelError::validation("image must not be empty"));
                }
                if let Some(registry) = &params.registry {
                    validate_plugin("registry", registry)?;
                }
                Task::DeployImage { ids, params }
            }
            TaskKind::DestroyJob => {
                let params: JobDestroy = decode(kind, payload)?;
                Task::DestroyJob { ids, params }
            }
        };
        Ok(task)
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::DeployRepository { .. } => TaskKind::DeployRepository,
            Task::RedeployRepository { .. } => TaskKind::RedeployRepository,
            Task::DeployImage { .. } => TaskKind::DeployImage,
            Task::DestroyJob { .. } => TaskKind::DestroyJob,
        }
    }

    pub fn ids(&self) -> &TaskIds {
        match self {
            Task::DeployRepository { ids, .. }
            | Task::RedeployRepository { ids, .. }
            | Task::DeployImage { ids, .. }
            | Task::DestroyJob { ids, .. } => ids,
        }
    }
}

fn decode<T: DeserializeOwned>(
    kind: TaskKind,
    payload: serde_json::Map<String, serde_json::Value>,
) -> Result<T, ModelError> {
    serde_json::from_value(serde_json::Value::Object(payload))
        .map_err(|e| ModelError::validation(format!("invalid {kind} parameters: {e}")))
}

fn validate_repository(params: &RepositoryDeploy) -> Result<(), ModelError> {
    if params.source.url.trim().is_empty() {
        return Err(ModelError::validation("source.url must not be empty"));
    }
    if params.source.git_ref.trim().is_empty() {
        return Err(ModelError::validation("source.ref must not be empty"));
    }
    reject_option_like("source.url", &params.source.url)?;
    reject_option_like("source.ref", &params.source.git_ref)?;
    validate_plugin("builder", &params.builder)?;
    validate_plugin("registry", &params.registry)
}

/// Git reads a leading `-` as an option even in positional slots.
fn reject_option_like(field: &str, value: &str) -> Result<(), ModelError> {
    if value.trim_start().starts_with('-') {
        return Err(ModelError::validation(format!(
            "{field} must not start with '-'"
        )));
    }
    Ok(())
}

fn validate_plugin(role: &str, spec: &PluginSpec) -> Result<(), ModelError> {
    if spec.name.trim().is_empty() {
        return Err(ModelError::validation(format!("{role}.name must not be empty")));
    }
    Ok(())
}
