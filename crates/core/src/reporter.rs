//! Completion reporting to the run ledger.
//!
//! When a job with a run id ends, the worker tells the ledger the final exit
//! code with `GET <ledger>/runlog/<run_id>?status=<exit_code>`. Delivery is
//! best effort: the outcome is logged, never retried and never returned to
//! the caller.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Final status of one job, addressed to its ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub run_id: String,
    pub exit_code: i32,
}

/// Receives completion reports from the run controller.
///
/// Implementations must not fail: a report that cannot be delivered is
/// logged and dropped.
#[async_trait]
pub trait CompletionReporter: Send + Sync {
    async fn report(&self, report: &CompletionReport);
}

/// Reporter for workers that have no ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

#[async_trait]
impl CompletionReporter for NoopReporter {
    async fn report(&self, report: &CompletionReport) {
        tracing::debug!(run_id = %report.run_id, exit_code = report.exit_code, "No ledger configured, report dropped");
    }
}

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("Invalid ledger URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Sends completion reports to the run ledger over HTTP.
#[derive(Debug, Clone)]
pub struct LedgerReporter {
    base_url: Url,
    client: reqwest::Client,
}

impl LedgerReporter {
    /// Create a reporter for the ledger at `base_url`.
    ///
    /// `timeout` bounds each callback so a slow ledger cannot hold up the
    /// end of a job.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReporterError> {
        let parsed = Url::parse(base_url).map_err(|e| ReporterError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ReporterError::InvalidUrl {
                url: base_url.to_string(),
                reason: "URL cannot have path segments".to_string(),
            });
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: parsed,
            client,
        })
    }

    /// URL of the ledger entry for `run_id`.
    pub fn endpoint(&self, run_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("runlog").push(run_id);
        }
        url
    }
}

#[async_trait]
impl CompletionReporter for LedgerReporter {
    async fn report(&self, report: &CompletionReport) {
        let url = self.endpoint(&report.run_id);
        tracing::info!(%url, exit_code = report.exit_code, "Updating run log");

        let result = self
            .client
            .get(url.clone())
            .query(&[("status", report.exit_code)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() || response.status().is_redirection() => {
                tracing::info!(run_id = %report.run_id, status = %response.status(), "Run log updated");
            }
            Ok(response) => {
                tracing::warn!(run_id = %report.run_id, status = %response.status(), "Run ledger rejected status update");
            }
            Err(e) => {
                tracing::warn!(run_id = %report.run_id, %url, error = %e, "Failed to notify run ledger");
            }
        }
    }
}
