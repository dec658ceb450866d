//! In-memory name server.
//!
//! Routes:
//!
//! | Route                  | Effect                               |
//! |------------------------|--------------------------------------|
//! | `PUT /names/{name}`    | register or replace, body [`Registration`] |
//! | `GET /names/{name}`    | resolve to a [`NameRecord`]          |
//! | `DELETE /names/{name}` | unregister                           |
//! | `GET /names`           | all records, sorted by name          |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rn_protocol::{ErrorBody, NameRecord, Registration, ERROR_CODE_NOT_FOUND};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Name to address table.
#[derive(Debug, Default)]
pub struct NameServer {
    names: RwLock<BTreeMap<String, String>>,
}

impl NameServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, replacing any previous address.
    ///
    /// Returns the address it replaced.
    pub async fn register(&self, name: &str, address: &str) -> Option<String> {
        let previous = self
            .names
            .write()
            .await
            .insert(name.to_string(), address.to_string());
        match &previous {
            Some(old) if old != address => {
                tracing::warn!(name, old, new = address, "Name re-registered with new address")
            }
            _ => tracing::info!(name, address, "Name registered"),
        }
        previous
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.names.write().await.remove(name).is_some();
        if removed {
            tracing::info!(name, "Name unregistered");
        }
        removed
    }

    pub async fn lookup(&self, name: &str) -> Option<NameRecord> {
        self.names.read().await.get(name).map(|address| NameRecord {
            name: name.to_string(),
            address: address.clone(),
        })
    }

    /// All records, ordered by name.
    pub async fn list(&self) -> Vec<NameRecord> {
        self.names
            .read()
            .await
            .iter()
            .map(|(name, address)| NameRecord {
                name: name.clone(),
                address: address.clone(),
            })
            .collect()
    }

    /// HTTP routes over this table.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/names", get(list_names))
            .route(
                "/names/{name}",
                get(lookup_name).put(register_name).delete(unregister_name),
            )
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            )
            .with_state(self)
    }
}

struct UnknownName(String);

impl IntoResponse for UnknownName {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: ERROR_CODE_NOT_FOUND.to_string(),
            error: format!("No worker registered as '{}'", self.0),
        };
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}

async fn list_names(State(server): State<Arc<NameServer>>) -> Json<Vec<NameRecord>> {
    Json(server.list().await)
}

async fn lookup_name(
    State(server): State<Arc<NameServer>>,
    Path(name): Path<String>,
) -> Result<Json<NameRecord>, UnknownName> {
    server.lookup(&name).await.map(Json).ok_or(UnknownName(name))
}

async fn register_name(
    State(server): State<Arc<NameServer>>,
    Path(name): Path<String>,
    Json(registration): Json<Registration>,
) -> Json<NameRecord> {
    server.register(&name, &registration.address).await;
    Json(NameRecord {
        name,
        address: registration.address,
    })
}

async fn unregister_name(
    State(server): State<Arc<NameServer>>,
    Path(name): Path<String>,
) -> Result<StatusCode, UnknownName> {
    if server.unregister(&name).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(UnknownName(name))
    }
}

/// Serve a fresh name server on `listener` until `shutdown` is cancelled.
pub async fn serve_name_server(
    listener: TcpListener,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let router = Arc::new(NameServer::new()).router();
    tracing::info!(addr = ?listener.local_addr().ok(), "Name server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Name server stopped");
    Ok(())
}
