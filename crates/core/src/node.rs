//! Worker bootstrap.
//!
//! A [`Node`] ties the pieces of a worker together: it builds the run
//! controller from a [`WorkerConfig`], serves the RPC routes, and keeps the
//! worker's entry in the name registry for as long as it serves.

use crate::config::{advertise_url, resolve_name};
use crate::controller::RunController;
use crate::process::ProcessRunner;
use crate::registry::{RegistryClient, RegistryError};
use crate::reporter::{CompletionReporter, LedgerReporter, NoopReporter, ReporterError};
use crate::rpc;
use rn_protocol::WorkerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Time allowed for a killed job to exit, on top of the report timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ServeError {
    /// The worker could not register itself; it is unreachable by name.
    #[error("Name registry unavailable: {0}")]
    RegistryUnavailable(#[source] RegistryError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Reporter(#[from] ReporterError),
}

/// A configured worker, ready to serve.
pub struct Node {
    name: String,
    address: String,
    config: WorkerConfig,
    controller: Arc<RunController>,
}

impl Node {
    /// Build the worker described by `config`.
    ///
    /// An empty `ledger_url` disables completion reports.
    pub fn new(config: WorkerConfig) -> Result<Self, ServeError> {
        let name = resolve_name(&config);
        let address = advertise_url(&config, &name);

        let reporter: Arc<dyn CompletionReporter> = if config.ledger_url.trim().is_empty() {
            tracing::warn!("No ledger URL configured, completion reports are disabled");
            Arc::new(NoopReporter)
        } else {
            Arc::new(LedgerReporter::new(
                &config.ledger_url,
                Duration::from_secs(config.notify_timeout_secs),
            )?)
        };

        let controller = Arc::new(RunController::new(
            name.clone(),
            config.work_root.clone(),
            ProcessRunner::new(config.process_log.clone()),
            reporter,
        ));

        Ok(Self {
            name,
            address,
            config,
            controller,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL registered in the name registry.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn controller(&self) -> &Arc<RunController> {
        &self.controller
    }

    /// Bind the configured listen address and serve until `shutdown` fires.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServeError> {
        let addr = self.config.listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// Registration happens before the first request is accepted; if the
    /// registry is unreachable the worker does not start. On shutdown the
    /// entry is removed best effort.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServeError> {
        let span = tracing::info_span!("worker", name = %self.name);
        self.run(listener, shutdown).instrument(span).await
    }

    async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), ServeError> {
        let registry = RegistryClient::new(&self.config.registry_url)
            .map_err(ServeError::RegistryUnavailable)?;

        if let Err(e) = registry.register(&self.name, &self.address).await {
            tracing::error!(registry = %self.config.registry_url, error = %e, "Could not register worker");
            return Err(ServeError::RegistryUnavailable(e));
        }

        let local_addr = listener.local_addr()?;
        tracing::info!(
            %local_addr,
            address = %self.address,
            work_root = %self.config.work_root.display(),
            "Worker started"
        );

        let router = rpc::router(Arc::clone(&self.controller), &self.name);
        let controller = Arc::clone(&self.controller);
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                // Waiting requests only drain once their job has ended
                controller.kill().await;
            })
            .await;

        // The last job is still reported before the worker leaves the registry
        let grace = Duration::from_secs(self.config.notify_timeout_secs) + SHUTDOWN_GRACE;
        self.controller.shutdown(grace).await;
        if let Err(e) = registry.unregister(&self.name).await {
            tracing::warn!(error = %e, "Failed to unregister worker");
        }
        tracing::info!("Worker stopped");

        served.map_err(ServeError::from)
    }
}
