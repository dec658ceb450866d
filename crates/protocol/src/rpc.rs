//! Worker RPC protocol.
//!
//! This module defines the request and response bodies of the operations a
//! worker exposes to remote callers:
//!
//! | Operation    | Request            | Response                          |
//! |--------------|--------------------|-----------------------------------|
//! | `is_busy`    | -                  | [`BusyResponse`]                  |
//! | `status`     | -                  | [`WorkerStatus`](crate::WorkerStatus) |
//! | `start`      | [`StartRequest`]   | [`StartResponse`]                 |
//! | `run_script` | [`RunScriptRequest`] | [`JobTicket`] or [`ScriptOutcome`] |
//! | `kill`       | -                  | [`KillResponse`]                  |
//!
//! Rejections are reported with an [`ErrorBody`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ts_rs::TS;
use uuid::Uuid;

/// Error code sent when a job is submitted to a busy worker.
pub const ERROR_CODE_WORKER_BUSY: &str = "WORKER_BUSY";

/// Error code sent when a job request is malformed.
pub const ERROR_CODE_INVALID_JOB: &str = "INVALID_JOB";

/// Error code sent for worker-side failures such as an uncreatable directory.
pub const ERROR_CODE_INTERNAL: &str = "INTERNAL_ERROR";

/// Error code sent by the name server for an unknown name.
pub const ERROR_CODE_NOT_FOUND: &str = "NOT_FOUND";

/// Launch a single command.
///
/// ```json
/// { "command": "python run.py", "cwd": "proj/AA", "wait": false, "run_id": "42" }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct StartRequest {
    /// Shell command line to execute.
    pub command: String,

    /// Working directory for the command; the worker's own when absent.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Block the call until the command exits.
    #[serde(default)]
    pub wait: bool,

    /// Run ledger identifier to report completion to.
    #[serde(default)]
    pub run_id: Option<String>,
}

impl StartRequest {
    /// A non-blocking request without working directory or run id.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            wait: false,
            run_id: None,
        }
    }
}

/// Reply to `start`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct StartResponse {
    #[ts(type = "string")]
    pub job_id: Uuid,

    /// Exit code when the request waited for completion.
    pub exit_code: Option<i32>,
}

/// Run a multi-line script as one job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct RunScriptRequest {
    /// Script lines in execution order; `::` comments and blanks are skipped.
    pub lines: Vec<String>,

    /// Project identifier, first component of the job directory.
    pub project: String,

    /// Series identifier (e.g. `AB`), second component of the job directory.
    pub series: String,

    /// Run ledger identifier to report completion to.
    #[serde(default)]
    pub run_id: Option<String>,

    /// Block the call until the script ends.
    #[serde(default)]
    pub wait: bool,
}

/// Acknowledgement of an accepted script that runs in the background.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct JobTicket {
    #[ts(type = "string")]
    pub job_id: Uuid,

    /// Directory the steps run in.
    pub cwd: PathBuf,

    /// Number of executable steps in the script.
    pub steps: usize,
}

/// Final result of a script.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct ScriptOutcome {
    #[ts(type = "string")]
    pub job_id: Uuid,

    /// Exit code of the last step that ran; `0` when every step succeeded.
    pub exit_code: i32,

    /// Steps that ran to completion, including a failing one.
    pub steps_run: usize,

    /// Executable steps in the script.
    pub steps_total: usize,
}

impl ScriptOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
pub struct BusyResponse {
    pub busy: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
pub struct KillResponse {
    /// Whether a running job was asked to stop.
    pub terminated: bool,
}

/// JSON body of every rejected call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
}
