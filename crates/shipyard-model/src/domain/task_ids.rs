use serde::{Deserialize, Serialize};

use crate::{DeploymentId, JobId, ModelError, OwnerId, ServiceId};

/// Identifiers every task carries regardless of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIds {
    pub deployment_id: DeploymentId,
    pub job_id: JobId,
    pub service_id: ServiceId,
    pub owner_id: OwnerId,
}

impl TaskIds {
    pub fn new(
        deployment_id: impl Into<DeploymentId>,
        job_id: impl Into<JobId>,
        service_id: impl Into<ServiceId>,
        owner_id: impl Into<OwnerId>,
    ) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            job_id: job_id.into(),
            service_id: service_id.into(),
            owner_id: owner_id.into(),
        }
    }

    /// Reject blank identifiers; every published event is keyed by them.
    pub fn validate(&self) -> Result<(), ModelError> {
        let fields = [
            ("deployment_id", self.deployment_id.is_empty()),
            ("job_id", self.job_id.is_empty()),
            ("service_id", self.service_id.is_empty()),
            ("owner_id", self.owner_id.is_empty()),
        ];
        match fields.iter().find(|(_, empty)| *empty) {
            Some((name, _)) => Err(ModelError::parse(format!("{name} must not be empty"))),
            None => Ok(()),
        }
    }
}
