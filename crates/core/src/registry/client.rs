//! Registry client.

use reqwest::{StatusCode, Url};
use rn_protocol::{NameRecord, Registration};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// The registry did not answer.
    #[error("Name registry at {url} is unreachable: {source}")]
    Unreachable { url: String, source: reqwest::Error },

    #[error("No worker registered as '{name}'")]
    NotFound { name: String },

    /// The registry answered with an unexpected status.
    #[error("Name registry rejected the request with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Invalid registry URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Registry HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for the name registry routes.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let parsed = Url::parse(base_url).map_err(|e| RegistryError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl {
                url: base_url.to_string(),
                reason: "URL cannot have path segments".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: parsed,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn names_url(&self, name: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("names");
            if let Some(name) = name {
                segments.push(name);
            }
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RegistryError> {
        request
            .send()
            .await
            .map_err(|source| RegistryError::Unreachable {
                url: self.base_url.to_string(),
                source,
            })
    }

    /// Register `name -> address`, replacing any previous entry.
    pub async fn register(&self, name: &str, address: &str) -> Result<(), RegistryError> {
        let response = self
            .send(self.client.put(self.names_url(Some(name))).json(&Registration {
                address: address.to_string(),
            }))
            .await?;
        ensure_success(response).await?;
        tracing::info!(name, address, registry = %self.base_url, "Registered with name registry");
        Ok(())
    }

    /// Remove `name`. Removing an unknown name is not an error.
    pub async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let response = self
            .send(self.client.delete(self.names_url(Some(name))))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(name, "Name was not registered");
            return Ok(());
        }
        ensure_success(response).await?;
        tracing::info!(name, "Unregistered from name registry");
        Ok(())
    }

    /// Resolve `name` to its address.
    pub async fn lookup(&self, name: &str) -> Result<NameRecord, RegistryError> {
        let response = self
            .send(self.client.get(self.names_url(Some(name))))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn list(&self) -> Result<Vec<NameRecord>, RegistryError> {
        let response = self.send(self.client.get(self.names_url(None))).await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RegistryError::Rejected { status, body })
}
