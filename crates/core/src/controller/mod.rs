//! Run controller.
//!
//! The [`RunController`] is the single authority over a worker: it accepts at
//! most one job at a time, runs the job's steps through its
//! [`ProcessRunner`], records the outcome and hands it to the
//! [`CompletionReporter`].
//!
//! Every accepted job runs on its own task. A caller that waits for the
//! outcome only listens for it, so dropping the caller never abandons the
//! job half way.
//!
//! State machine:
//!
//! ```text
//!            start / run_script                kill
//!   IDLE ─────────────────────────> RUNNING ──────────> TERMINATING
//!     ^                                │                     │
//!     └──────── job ends (success, failing step, killed) ────┘
//! ```

pub mod error;
pub mod state;

use crate::controller::error::{WorkerError, WorkerResult};
use crate::controller::state::{
    accept_job, begin_step, create_worker, end_step, ensure_idle, finish_job, request_termination,
    snapshot, Worker,
};
use crate::process::ProcessRunner;
use crate::reporter::{CompletionReport, CompletionReporter};
use crate::script::{is_step, Script};
use rn_protocol::{
    JobTicket, RunScriptRequest, ScriptOutcome, StartRequest, StartResponse, WorkerState,
    WorkerStatus, EXIT_CODE_KILLED,
};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// A script that has been accepted and is waiting to run.
struct ScriptJob {
    job_id: Uuid,
    cwd: PathBuf,
    steps: Vec<String>,
}

/// Single-worker job state machine.
///
/// Hold it in an `Arc`: jobs run on spawned tasks that keep their own handle
/// to the controller.
pub struct RunController {
    /// Root under which `<project>/<series>` job directories are created.
    work_root: PathBuf,

    /// Worker state, shared by the RPC handlers and the job tasks.
    worker: Mutex<Worker>,

    /// Task of the most recent job; only replaced while the worker lock is held.
    job_task: std::sync::Mutex<Option<JoinHandle<()>>>,

    runner: ProcessRunner,

    reporter: Arc<dyn CompletionReporter>,
}

impl RunController {
    /// Create a controller for the worker `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - Identity the worker is registered under
    /// * `work_root` - Directory that job directories are created in
    /// * `runner` - Process runner owning the worker's subprocess
    /// * `reporter` - Receiver of completion reports
    pub fn new(
        name: impl Into<String>,
        work_root: impl Into<PathBuf>,
        runner: ProcessRunner,
        reporter: Arc<dyn CompletionReporter>,
    ) -> Self {
        let name = name.into();
        tracing::info!(worker = %name, "Run controller ready");
        Self {
            work_root: work_root.into(),
            worker: Mutex::new(create_worker(name)),
            job_task: std::sync::Mutex::new(None),
            runner,
            reporter,
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Consistent snapshot of the worker.
    pub async fn status(&self) -> WorkerStatus {
        snapshot(&*self.worker.lock().await)
    }

    pub async fn is_busy(&self) -> bool {
        self.worker.lock().await.state.is_busy()
    }

    pub async fn is_available(&self) -> bool {
        !self.is_busy().await
    }

    /// Stop the active job.
    ///
    /// The live process, if any, is asked to terminate; the job then ends
    /// through the normal completion path and is still reported. On an idle
    /// worker this only logs. Returns whether a job was asked to stop.
    pub async fn kill(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if !request_termination(&mut worker) {
            tracing::info!("Kill requested on idle worker, nothing to terminate");
            return false;
        }
        let signalled = self.runner.terminate();
        tracing::info!(job_id = ?worker.job_id, command = ?worker.command, signalled, "Kill requested");
        true
    }

    /// Kill the active job and wait for it to be completed and reported.
    ///
    /// Gives up after `grace`; the job's processes are still killed when the
    /// runtime goes away.
    pub async fn shutdown(&self, grace: Duration) {
        if self.kill().await {
            tracing::warn!("Stopping running job for shutdown");
        }

        let task = self
            .job_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Job task failed during shutdown"),
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Job did not finish before shutdown")
            }
        }
    }

    /// Launch a single command as a job.
    ///
    /// With `wait` the call returns once the command has exited and the
    /// response carries its exit code. Otherwise it returns right after the
    /// launch. Either way the command is waited on by a job task, so a
    /// waiting caller that goes away leaves the job running to completion.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Busy`] if a job is active, [`WorkerError::InvalidJob`]
    /// for an empty command. A command that cannot be launched is not an
    /// error: the job ends with the launch-failure exit code.
    pub async fn start(self: &Arc<Self>, request: StartRequest) -> WorkerResult<StartResponse> {
        let StartRequest {
            command,
            cwd,
            wait,
            run_id,
        } = request;

        if !is_step(&command) {
            return Err(WorkerError::InvalidJob(
                "command is empty or a comment".to_string(),
            ));
        }
        let command = command.trim().to_string();

        let (tx, rx) = oneshot::channel();
        let job_id = {
            let mut worker = self.worker.lock().await;
            let job_id = accept_job(&mut worker, cwd.clone(), run_id)?;
            begin_step(&mut worker, &command);

            let controller = Arc::clone(self);
            let task = match self.runner.launch(&command, cwd.as_deref()) {
                Ok(execution) => execution.detach(move |exit_code| {
                    async move {
                        controller.finish_command(exit_code).await;
                        let _ = tx.send(exit_code);
                    }
                    .in_current_span()
                }),
                Err(e) => {
                    let exit_code = e.exit_code();
                    tokio::spawn(
                        async move {
                            controller.finish_command(exit_code).await;
                            let _ = tx.send(exit_code);
                        }
                        .in_current_span(),
                    )
                }
            };
            self.track(task);
            job_id
        };
        tracing::info!(%job_id, %command, cwd = ?cwd, wait, "Received command");

        let exit_code = if wait {
            Some(rx.await.map_err(|_| WorkerError::JobAborted { job_id })?)
        } else {
            None
        };
        Ok(StartResponse { job_id, exit_code })
    }

    /// Run a script as one job and return once it has ended.
    ///
    /// Creates `<work_root>/<project>/<series>` if needed, then runs every
    /// step in that directory in order. The first step exiting with a
    /// positive code aborts the rest of the script. Dropping the returned
    /// future stops the wait, not the script.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Busy`], [`WorkerError::InvalidJob`] or
    /// [`WorkerError::CreateDir`]; all are raised before anything runs.
    pub async fn run_script(
        self: &Arc<Self>,
        request: RunScriptRequest,
    ) -> WorkerResult<ScriptOutcome> {
        let (ticket, outcome) = self.spawn_script(request).await?;
        outcome.await.map_err(|_| WorkerError::JobAborted {
            job_id: ticket.job_id,
        })
    }

    /// Accept a script and run it on its own task.
    ///
    /// Rejections are returned synchronously, exactly as for
    /// [`run_script`](Self::run_script).
    pub async fn submit_script(
        self: &Arc<Self>,
        request: RunScriptRequest,
    ) -> WorkerResult<JobTicket> {
        let (ticket, _outcome) = self.spawn_script(request).await?;
        Ok(ticket)
    }

    /// Validate, prepare the job directory, then accept and spawn.
    ///
    /// Accepting the job and spawning its task happen under one lock with no
    /// await in between, so an accepted job always has a task.
    async fn spawn_script(
        self: &Arc<Self>,
        request: RunScriptRequest,
    ) -> WorkerResult<(JobTicket, oneshot::Receiver<ScriptOutcome>)> {
        let RunScriptRequest {
            lines,
            project,
            series,
            run_id,
            ..
        } = request;

        validate_component("project", &project)?;
        validate_component("series", &series)?;

        // Reject before touching the filesystem
        ensure_idle(&*self.worker.lock().await)?;

        let cwd = self.work_root.join(&project).join(&series);
        tokio::fs::create_dir_all(&cwd)
            .await
            .map_err(|source| WorkerError::CreateDir {
                path: cwd.clone(),
                source,
            })?;

        let steps = Script::new(lines).steps();
        let (tx, rx) = oneshot::channel();

        let mut worker = self.worker.lock().await;
        let job_id = accept_job(&mut worker, Some(cwd.clone()), run_id.clone())?;
        tracing::info!(%job_id, %project, %series, run_id = ?run_id, steps = steps.len(), "Script accepted");

        let ticket = JobTicket {
            job_id,
            cwd: cwd.clone(),
            steps: steps.len(),
        };
        let job = ScriptJob { job_id, cwd, steps };

        let controller = Arc::clone(self);
        let task = tokio::spawn(
            async move {
                let outcome = controller.execute_script(job).await;
                let _ = tx.send(outcome);
            }
            .in_current_span(),
        );
        self.track(task);
        drop(worker);

        Ok((ticket, rx))
    }

    fn track(&self, task: JoinHandle<()>) {
        *self
            .job_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    async fn execute_script(&self, job: ScriptJob) -> ScriptOutcome {
        let ScriptJob { job_id, cwd, steps } = job;
        let steps_total = steps.len();
        let mut exit_code = 0;
        let mut steps_run = 0;

        for (index, step) in steps.iter().enumerate() {
            let launched = {
                let mut worker = self.worker.lock().await;
                if worker.state == WorkerState::Terminating {
                    tracing::warn!(%job_id, remaining = steps_total - index, "Script stopped by kill");
                    exit_code = EXIT_CODE_KILLED;
                    break;
                }
                begin_step(&mut worker, step);
                self.runner.launch(step, Some(&cwd))
            };

            tracing::info!(%job_id, step = index + 1, command = %step, "RUN");
            exit_code = match launched {
                Ok(execution) => execution.wait().await,
                Err(e) => e.exit_code(),
            };
            steps_run += 1;
            end_step(&mut *self.worker.lock().await);

            if exit_code > 0 {
                tracing::error!(%job_id, step = index + 1, command = %step, exit_code, "Step failed, aborting script");
                break;
            }
        }

        self.complete(exit_code).await;

        ScriptOutcome {
            job_id,
            exit_code,
            steps_run,
            steps_total,
        }
    }

    async fn finish_command(&self, exit_code: i32) {
        end_step(&mut *self.worker.lock().await);
        self.complete(exit_code).await;
    }

    /// Return to IDLE, then report.
    ///
    /// The state transition is committed before the reporter runs, so the
    /// worker is idle whatever happens to the notification.
    async fn complete(&self, exit_code: i32) {
        let finished = finish_job(&mut *self.worker.lock().await, exit_code);
        tracing::info!(job_id = ?finished.job_id, exit_code, steps = finished.steps_completed, "ON-EXIT");

        if let Some(run_id) = finished.run_id {
            self.reporter
                .report(&CompletionReport { run_id, exit_code })
                .await;
        }

        if exit_code > 0 {
            tracing::error!(job_id = ?finished.job_id, exit_code, "Job failed");
        }
    }
}

/// Project and series become directory names: one plain component each.
fn validate_component(field: &str, value: &str) -> WorkerResult<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(WorkerError::InvalidJob(format!(
            "{field} must be a single directory name, got '{value}'"
        ))),
    }
}
