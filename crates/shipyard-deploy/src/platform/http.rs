use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use shipyard_core::{Deployed, ExecutionContext, Platform, PlatformError};
use shipyard_model::{DeploymentId, JobId, OwnerId, Reference, ServiceId, TaskIds};
use tracing::{debug, instrument};

use super::PlatformConfig;

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    deployment_id: &'a DeploymentId,
    job_id: &'a JobId,
    owner_id: &'a OwnerId,
    reference: &'a Reference,
}

#[derive(Debug, Serialize)]
struct DestroyRequest<'a> {
    deployment_id: &'a DeploymentId,
    service_id: &'a ServiceId,
    owner_id: &'a OwnerId,
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Platform API client.
///
/// - `POST {url}/v1/services/{service_id}/deployments`
/// - `POST {url}/v1/jobs/{job_id}/destroy`
pub struct HttpPlatform {
    base: String,
    token: Option<String>,
    client: Client,
}

impl HttpPlatform {
    pub fn new(cfg: &PlatformConfig) -> Result<Self, PlatformError> {
        cfg.validate()?;
        let base = cfg.url.clone().unwrap_or_default();
        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        Ok(Self {
            base,
            token: cfg.token.clone(),
            client,
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        ctx: &ExecutionContext,
        path: &str,
        body: &B,
    ) -> Result<Response, PlatformError> {
        let mut request = self.client.post(format!("{}{path}", self.base)).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = ctx
            .guard(request.send())
            .await?
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = ctx.guard(response.text()).await?.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        Err(PlatformError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    #[instrument(level = "debug", skip_all, fields(service = %ids.service_id))]
    async fn deploy(
        &self,
        ctx: &ExecutionContext,
        ids: &TaskIds,
        reference: &Reference,
    ) -> Result<Deployed, PlatformError> {
        let body = DeployRequest {
            deployment_id: &ids.deployment_id,
            job_id: &ids.job_id,
            owner_id: &ids.owner_id,
            reference,
        };
        let path = format!("/v1/services/{}/deployments", ids.service_id);
        let response = self.post(ctx, &path, &body).await?;
        let deployed = ctx
            .guard(response.json::<Deployed>())
            .await?
            .map_err(|e| PlatformError::Request(format!("invalid deploy response: {e}")))?;
        debug!(target: "shipyard.deploy", url = ?deployed.url, "platform accepted rollout");
        Ok(deployed)
    }

    #[instrument(level = "debug", skip_all, fields(job = %ids.job_id))]
    async fn destroy(
        &self,
        ctx: &ExecutionContext,
        ids: &TaskIds,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let body = DestroyRequest {
            deployment_id: &ids.deployment_id,
            service_id: &ids.service_id,
            owner_id: &ids.owner_id,
            reason,
        };
        let path = format!("/v1/jobs/{}/destroy", ids.job_id);
        self.post(ctx, &path, &body).await?;
        Ok(())
    }
}
