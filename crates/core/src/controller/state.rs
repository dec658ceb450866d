//! Worker state machine.
//!
//! This module provides functions for moving a [`Worker`] through its job
//! lifecycle. The functions only mutate the record; locking and process
//! handling belong to the [`RunController`](super::RunController).

use crate::controller::error::{WorkerError, WorkerResult};
use chrono::{DateTime, Utc};
use rn_protocol::{WorkerState, WorkerStatus, EXIT_CODE_PENDING};
use std::path::PathBuf;
use uuid::Uuid;

/// Mutable state of the worker.
#[derive(Debug, Clone)]
pub struct Worker {
    pub name: String,
    pub state: WorkerState,
    pub command: Option<String>,
    pub cwd: Option<PathBuf>,
    pub exit_code: i32,
    pub run_id: Option<String>,
    pub job_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub steps_completed: usize,
}

/// What remains of a job once the worker is idle again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedJob {
    pub job_id: Option<Uuid>,
    pub run_id: Option<String>,
    pub exit_code: i32,
    pub steps_completed: usize,
}

/// Create an idle worker that has not run anything yet.
pub fn create_worker(name: String) -> Worker {
    Worker {
        name,
        state: WorkerState::Idle,
        command: None,
        cwd: None,
        exit_code: EXIT_CODE_PENDING,
        run_id: None,
        job_id: None,
        started_at: None,
        steps_completed: 0,
    }
}

/// Fail with [`WorkerError::Busy`] unless the worker is idle.
pub fn ensure_idle(worker: &Worker) -> WorkerResult<()> {
    if worker.state.is_busy() {
        return Err(WorkerError::Busy {
            running: worker
                .command
                .clone()
                .unwrap_or_else(|| "a script".to_string()),
        });
    }
    Ok(())
}

/// Transition IDLE -> RUNNING for a new job.
///
/// Records the job metadata and resets the exit code to `-1`. The previous
/// job's state is left untouched when the worker is busy.
pub fn accept_job(
    worker: &mut Worker,
    cwd: Option<PathBuf>,
    run_id: Option<String>,
) -> WorkerResult<Uuid> {
    ensure_idle(worker)?;

    let job_id = Uuid::new_v4();
    worker.state = WorkerState::Running;
    worker.command = None;
    worker.cwd = cwd;
    worker.exit_code = EXIT_CODE_PENDING;
    worker.run_id = run_id;
    worker.job_id = Some(job_id);
    worker.started_at = Some(Utc::now());
    worker.steps_completed = 0;
    Ok(job_id)
}

/// Record the command line that is about to run.
pub fn begin_step(worker: &mut Worker, command: &str) {
    worker.command = Some(command.to_string());
}

/// Record that the current step's process has exited.
pub fn end_step(worker: &mut Worker) {
    worker.command = None;
    worker.steps_completed += 1;
}

/// Transition RUNNING -> TERMINATING.
///
/// Returns `false` when the worker is idle and there is nothing to stop.
pub fn request_termination(worker: &mut Worker) -> bool {
    match worker.state {
        WorkerState::Idle => false,
        WorkerState::Running | WorkerState::Terminating => {
            worker.state = WorkerState::Terminating;
            true
        }
    }
}

/// Transition back to IDLE with the job's final exit code.
///
/// The working directory is kept so pollers can still see where the last
/// job ran; the run id is handed back for the completion report.
pub fn finish_job(worker: &mut Worker, exit_code: i32) -> FinishedJob {
    worker.state = WorkerState::Idle;
    worker.exit_code = exit_code;
    worker.command = None;

    FinishedJob {
        job_id: worker.job_id,
        run_id: worker.run_id.take(),
        exit_code,
        steps_completed: worker.steps_completed,
    }
}

/// Copy the worker into its wire representation.
pub fn snapshot(worker: &Worker) -> WorkerStatus {
    WorkerStatus {
        name: worker.name.clone(),
        state: worker.state,
        busy: worker.state.is_busy(),
        exit_code: worker.exit_code,
        command: worker.command.clone(),
        cwd: worker.cwd.clone(),
        run_id: worker.run_id.clone(),
        job_id: worker.job_id,
        started_at: worker.started_at,
        steps_completed: worker.steps_completed,
    }
}
