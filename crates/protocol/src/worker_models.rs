//! Runtime worker state models.
//!
//! This module defines the structures reported by a worker when it is
//! asked for its status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ts_rs::TS;
use uuid::Uuid;

/// Exit code reported while a job is running or before any job completed.
pub const EXIT_CODE_PENDING: i32 = -1;

/// Exit code recorded when the OS could not start a step.
pub const EXIT_CODE_LAUNCH_FAILURE: i32 = 8;

/// Exit code recorded when a kill stops a script between two steps.
///
/// Matches what a shell reports for a process ended by SIGKILL.
pub const EXIT_CODE_KILLED: i32 = 137;

/// Lifecycle state of a worker's run controller.
///
/// A worker moves IDLE -> RUNNING when it accepts a job and back to IDLE
/// when the job ends. TERMINATING is entered by `kill` and lasts until the
/// live process has actually exited.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    /// No job is active; the worker accepts `start` and `run_script`.
    #[default]
    Idle,

    /// A job is executing.
    Running,

    /// A kill was requested and the live process has not exited yet.
    Terminating,
}

impl WorkerState {
    /// Whether a job is active in this state.
    pub fn is_busy(self) -> bool {
        !matches!(self, WorkerState::Idle)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerState::Idle => "IDLE",
            WorkerState::Running => "RUNNING",
            WorkerState::Terminating => "TERMINATING",
        };
        f.write_str(label)
    }
}

/// Point-in-time snapshot of a worker, as returned by `status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct WorkerStatus {
    /// Name the worker is registered under.
    pub name: String,

    /// Controller state.
    pub state: WorkerState,

    /// True while a job is executing.
    pub busy: bool,

    /// Exit code of the last completed job.
    ///
    /// `-1` while a job is running or before the first job completed.
    pub exit_code: i32,

    /// Command line currently executing, if any.
    pub command: Option<String>,

    /// Working directory of the current or most recent job.
    pub cwd: Option<PathBuf>,

    /// Caller-supplied run identifier of the active job.
    pub run_id: Option<String>,

    /// Identifier assigned by the worker when it accepted the job.
    #[ts(type = "string | null")]
    pub job_id: Option<Uuid>,

    /// When the current or most recent job was accepted.
    #[ts(type = "string | null")]
    pub started_at: Option<DateTime<Utc>>,

    /// Number of steps finished by the current or most recent job.
    pub steps_completed: usize,
}

impl WorkerStatus {
    /// Status of a worker that has never run a job.
    pub fn idle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: WorkerState::Idle,
            busy: false,
            exit_code: EXIT_CODE_PENDING,
            command: None,
            cwd: None,
            run_id: None,
            job_id: None,
            started_at: None,
            steps_completed: 0,
        }
    }

    /// The classic `(exit_code, busy, command, cwd)` view of the status.
    pub fn as_tuple(&self) -> (i32, bool, Option<&str>, Option<&Path>) {
        (
            self.exit_code,
            self.busy,
            self.command.as_deref(),
            self.cwd.as_deref(),
        )
    }
}
