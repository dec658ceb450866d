//! HTTP routes over a [`RunController`].

use crate::controller::error::WorkerError;
use crate::controller::RunController;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rn_protocol::{
    BusyResponse, ErrorBody, KillResponse, RunScriptRequest, StartRequest, WorkerStatus,
    ERROR_CODE_INTERNAL, ERROR_CODE_INVALID_JOB, ERROR_CODE_WORKER_BUSY,
};
use std::sync::Arc;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Error returned by the route handlers.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct RpcError(#[from] WorkerError);

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            WorkerError::Busy { .. } => (StatusCode::CONFLICT, ERROR_CODE_WORKER_BUSY),
            WorkerError::InvalidJob(_) => (StatusCode::BAD_REQUEST, ERROR_CODE_INVALID_JOB),
            WorkerError::CreateDir { .. } | WorkerError::JobAborted { .. } => {
                tracing::error!(error = %self.0, "Job request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ERROR_CODE_INTERNAL)
            }
        };

        let body = ErrorBody {
            code: code.to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type Controller = Arc<RunController>;

/// Build the worker's router.
///
/// Every request is traced in a span carrying the worker `name`.
pub fn router(controller: Controller, name: &str) -> Router {
    let worker = name.to_string();
    Router::new()
        .route("/is_busy", get(is_busy))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/run_script", post(run_script))
        .route("/kill", post(kill))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    tracing::info_span!(
                        "rpc",
                        worker = %worker,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(controller)
}

async fn is_busy(State(controller): State<Controller>) -> Json<BusyResponse> {
    Json(BusyResponse {
        busy: controller.is_busy().await,
    })
}

async fn status(State(controller): State<Controller>) -> Json<WorkerStatus> {
    Json(controller.status().await)
}

async fn start(
    State(controller): State<Controller>,
    Json(request): Json<StartRequest>,
) -> Result<Response, RpcError> {
    let wait = request.wait;
    let response = controller.start(request).await?;
    let status = if wait {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(response)).into_response())
}

async fn run_script(
    State(controller): State<Controller>,
    Json(request): Json<RunScriptRequest>,
) -> Result<Response, RpcError> {
    if request.wait {
        let outcome = controller.run_script(request).await?;
        Ok((StatusCode::OK, Json(outcome)).into_response())
    } else {
        let ticket = controller.submit_script(request).await?;
        Ok((StatusCode::ACCEPTED, Json(ticket)).into_response())
    }
}

async fn kill(State(controller): State<Controller>) -> Json<KillResponse> {
    Json(KillResponse {
        terminated: controller.kill().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRunner;
    use crate::reporter::NoopReporter;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(root: &std::path::Path) -> Router {
        let controller = Arc::new(RunController::new(
            "w1",
            root,
            ProcessRunner::new("stdout.log"),
            Arc::new(NoopReporter),
        ));
        router(controller, "w1")
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_error_mapping() {
        let busy = RpcError(WorkerError::Busy {
            running: "sleep 5".to_string(),
        });
        assert_eq!(busy.into_response().status(), StatusCode::CONFLICT);

        let invalid = RpcError(WorkerError::InvalidJob("bad".to_string()));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let create = RpcError(WorkerError::CreateDir {
            path: "x".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert_eq!(
            create.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let aborted = RpcError(WorkerError::JobAborted {
            job_id: uuid::Uuid::nil(),
        });
        assert_eq!(
            aborted.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_idle_status() {
        let temp_dir = tempfile::tempdir().unwrap();
        let router = test_router(temp_dir.path());

        let response = router
            .clone()
            .oneshot(Request::get("/is_busy").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let busy: BusyResponse = body_json(response).await;
        assert!(!busy.busy);

        let response = router
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status: WorkerStatus = body_json(response).await;
        assert_eq!(status.name, "w1");
        assert_eq!(status.exit_code, -1);
    }

    #[tokio::test]
    async fn test_kill_idle_worker() {
        let temp_dir = tempfile::tempdir().unwrap();
        let response = test_router(temp_dir.path())
            .oneshot(Request::post("/kill").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let kill: KillResponse = body_json(response).await;
        assert!(!kill.terminated);
    }

    #[tokio::test]
    async fn test_invalid_job_is_bad_request() {
        let temp_dir = tempfile::tempdir().unwrap();
        let response = test_router(temp_dir.path())
            .oneshot(post_json(
                "/run_script",
                serde_json::json!({"lines": ["echo A"], "project": "..", "series": "AA"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorBody = body_json(response).await;
        assert_eq!(error.code, "INVALID_JOB");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_and_wait() {
        let temp_dir = tempfile::tempdir().unwrap();
        let response = test_router(temp_dir.path())
            .oneshot(post_json(
                "/start",
                serde_json::json!({
                    "command": "exit 5",
                    "cwd": temp_dir.path(),
                    "wait": true
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let started: rn_protocol::StartResponse = body_json(response).await;
        assert_eq!(started.exit_code, Some(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_script_and_wait() {
        let temp_dir = tempfile::tempdir().unwrap();
        let response = test_router(temp_dir.path())
            .oneshot(post_json(
                "/run_script",
                serde_json::json!({
                    "lines": [":: setup", "echo A", "exit 1", "echo B"],
                    "project": "soundcast",
                    "series": "AA",
                    "wait": true
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let outcome: rn_protocol::ScriptOutcome = body_json(response).await;
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.steps_run, 2);
        assert_eq!(outcome.steps_total, 3);

        let log = std::fs::read_to_string(temp_dir.path().join("soundcast/AA/stdout.log")).unwrap();
        assert_eq!(log, "A\n");
    }
}
