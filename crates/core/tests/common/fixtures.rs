//! Fixtures for building controllers and requests.

use super::reporters::RecordingReporter;
use rn_core::controller::RunController;
use rn_core::process::ProcessRunner;
use rn_protocol::RunScriptRequest;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A controller working under `root`, with its recording reporter.
#[allow(dead_code)]
pub fn create_controller(root: &Path) -> (Arc<RunController>, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::default());
    let controller = Arc::new(RunController::new(
        "test-worker",
        root,
        ProcessRunner::new("stdout.log"),
        reporter.clone(),
    ));
    (controller, reporter)
}

/// A script request for `project/series` reporting to `run_id`.
#[allow(dead_code)]
pub fn script_request(lines: &[&str], run_id: &str, wait: bool) -> RunScriptRequest {
    RunScriptRequest {
        lines: lines.iter().map(|line| line.to_string()).collect(),
        project: "soundcast".to_string(),
        series: "AA".to_string(),
        run_id: Some(run_id.to_string()),
        wait,
    }
}

/// Poll until the controller reports `busy == expected`.
#[allow(dead_code)]
pub async fn wait_for_busy(controller: &RunController, expected: bool, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while controller.is_busy().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for worker state");
}

/// Poll until `path` exists.
#[allow(dead_code)]
pub async fn wait_for_file(path: &Path, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for file");
}

/// Poll until `command` is the step being run.
#[allow(dead_code)]
pub async fn wait_for_command(controller: &RunController, command: &str, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while controller.status().await.command.as_deref() != Some(command) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for command");
}
