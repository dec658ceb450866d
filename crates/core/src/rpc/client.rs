//! Typed caller for a remote worker.

use crate::registry::{RegistryClient, RegistryError};
use reqwest::{StatusCode, Url};
use rn_protocol::{
    BusyResponse, ErrorBody, JobTicket, KillResponse, RunScriptRequest, ScriptOutcome,
    StartRequest, StartResponse, WorkerStatus, ERROR_CODE_WORKER_BUSY,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The worker refused the job because another one is active.
    #[error("Worker is busy: {0}")]
    WorkerBusy(String),

    /// The worker rejected the request.
    #[error("Worker rejected the request ({status}, {code}): {message}")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Worker at {url} is unreachable: {source}")]
    Unreachable { url: String, source: reqwest::Error },

    #[error("Invalid worker URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Worker HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Reply to `run_script`, depending on whether the call waited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    Accepted(JobTicket),
    Finished(ScriptOutcome),
}

/// Client for one worker's RPC endpoint.
///
/// No request timeout is set: a waiting `start` or `run_script` lasts as
/// long as the job.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    base_url: Url,
    client: reqwest::Client,
}

impl WorkerClient {
    /// Client for the worker at `address`.
    pub fn new(address: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(address).map_err(|e| ClientError::InvalidUrl {
            url: address.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: address.to_string(),
                reason: "URL cannot have path segments".to_string(),
            });
        }
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Resolve `name` through the registry and connect to it.
    pub async fn connect(registry: &RegistryClient, name: &str) -> Result<Self, ClientError> {
        let record = registry.lookup(name).await?;
        tracing::debug!(name, address = %record.address, "Resolved worker");
        Self::new(&record.address)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, operation: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(operation);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Unreachable {
                url: self.base_url.to_string(),
                source,
            })?;
        check(response).await
    }

    async fn get<T: DeserializeOwned>(&self, operation: &str) -> Result<T, ClientError> {
        Ok(self.send(self.client.get(self.url(operation))).await?.json().await?)
    }

    pub async fn status(&self) -> Result<WorkerStatus, ClientError> {
        self.get("status").await
    }

    pub async fn is_busy(&self) -> Result<bool, ClientError> {
        let reply: BusyResponse = self.get("is_busy").await?;
        Ok(reply.busy)
    }

    pub async fn start(&self, request: &StartRequest) -> Result<StartResponse, ClientError> {
        let response = self
            .send(self.client.post(self.url("start")).json(request))
            .await?;
        Ok(response.json().await?)
    }

    /// Submit a script; waits for the outcome when `request.wait` is set.
    pub async fn run_script(&self, request: &RunScriptRequest) -> Result<ScriptReply, ClientError> {
        let response = self
            .send(self.client.post(self.url("run_script")).json(request))
            .await?;
        if request.wait {
            Ok(ScriptReply::Finished(response.json().await?))
        } else {
            Ok(ScriptReply::Accepted(response.json().await?))
        }
    }

    /// Ask the worker to stop its job. Returns whether a job was running.
    pub async fn kill(&self) -> Result<bool, ClientError> {
        let response = self.send(self.client.post(self.url("kill"))).await?;
        let reply: KillResponse = response.json().await?;
        Ok(reply.terminated)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
        code: status.as_str().to_string(),
        error: text,
    });

    if status == StatusCode::CONFLICT && body.code == ERROR_CODE_WORKER_BUSY {
        return Err(ClientError::WorkerBusy(body.error));
    }
    Err(ClientError::Rejected {
        status,
        code: body.code,
        message: body.error,
    })
}
