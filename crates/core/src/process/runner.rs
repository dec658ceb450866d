//! Single-slot process runner.

use rn_protocol::{EXIT_CODE_LAUNCH_FAILURE, EXIT_CODE_PENDING};
use std::fs::OpenOptions;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Reasons a command could not be started.
///
/// Every variant maps to [`EXIT_CODE_LAUNCH_FAILURE`] so callers can treat a
/// launch failure like any other failing step.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The runner already owns a live process.
    #[error("Runner already owns a live process: {command}")]
    Occupied { command: String },

    /// The process log could not be opened for appending.
    #[error("Failed to open process log {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The OS refused to start the shell.
    #[error("Failed to spawn command '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        EXIT_CODE_LAUNCH_FAILURE
    }
}

/// Point-in-time view of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Exit code of the last process; `-1` while one is alive.
    pub exit_code: i32,
    pub alive: bool,
}

struct LiveProcess {
    command: String,
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
}

struct Slot {
    live: Option<LiveProcess>,
    last_exit: i32,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the lifecycle of one OS process at a time.
///
/// The process handle never leaves the runner: callers only see exit codes
/// and the [`ProcessStatus`].
pub struct ProcessRunner {
    /// File name of the process log inside the working directory.
    log_name: String,
    slot: Arc<Mutex<Slot>>,
}

impl ProcessRunner {
    /// Create a runner appending process output to `log_name`.
    pub fn new(log_name: impl Into<String>) -> Self {
        Self {
            log_name: log_name.into(),
            slot: Arc::new(Mutex::new(Slot {
                live: None,
                last_exit: EXIT_CODE_PENDING,
            })),
        }
    }

    /// Start `command` through the platform shell.
    ///
    /// Standard output and error are both appended to the process log in
    /// `cwd` (or in the current directory when `cwd` is `None`).
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] if a process is already owned, the log file
    /// cannot be opened or the shell cannot be spawned.
    pub fn launch(&self, command: &str, cwd: Option<&Path>) -> Result<Execution, LaunchError> {
        let mut slot = lock(&self.slot);

        if let Some(live) = &slot.live {
            tracing::error!(running = %live.command, command, "Launch rejected, process still alive");
            return Err(LaunchError::Occupied {
                command: live.command.clone(),
            });
        }

        let child = match self.spawn_child(command, cwd) {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command, error = %e, "Process launch failed");
                slot.last_exit = e.exit_code();
                return Err(e);
            }
        };

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        tracing::debug!(command, pid = ?pid, "Process started");

        slot.live = Some(LiveProcess {
            command: command.to_string(),
            pid,
            kill_tx: Some(kill_tx),
        });
        slot.last_exit = EXIT_CODE_PENDING;

        Ok(Execution {
            command: command.to_string(),
            pid,
            child,
            kill_rx,
            slot: Arc::clone(&self.slot),
            finished: false,
        })
    }

    /// Launch `command` and wait for it to exit.
    ///
    /// Launch failures are logged and reported as their exit code.
    pub async fn run(&self, command: &str, cwd: Option<&Path>) -> i32 {
        match self.launch(command, cwd) {
            Ok(execution) => execution.wait().await,
            Err(e) => e.exit_code(),
        }
    }

    /// Ask the live process to stop.
    ///
    /// Does not wait for the exit, which is observed by whoever holds the
    /// [`Execution`]. Returns `false` when no process is owned.
    pub fn terminate(&self) -> bool {
        let mut slot = lock(&self.slot);
        match slot.live.as_mut() {
            Some(live) => {
                tracing::info!(command = %live.command, pid = ?live.pid, "Terminating process");
                match live.kill_tx.take() {
                    Some(kill_tx) => {
                        let _ = kill_tx.send(());
                    }
                    None => tracing::debug!(command = %live.command, "Termination already requested"),
                }
                true
            }
            None => {
                tracing::info!("Nothing to terminate");
                false
            }
        }
    }

    pub fn status(&self) -> ProcessStatus {
        let slot = lock(&self.slot);
        let alive = slot.live.is_some();
        ProcessStatus {
            exit_code: if alive {
                EXIT_CODE_PENDING
            } else {
                slot.last_exit
            },
            alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        lock(&self.slot).live.is_some()
    }

    fn spawn_child(&self, command: &str, cwd: Option<&Path>) -> Result<Child, LaunchError> {
        let log_path = match cwd {
            Some(dir) => dir.join(&self.log_name),
            None => PathBuf::from(&self.log_name),
        };

        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| LaunchError::LogFile {
                path: log_path.clone(),
                source,
            })?;
        let stderr = stdout.try_clone().map_err(|source| LaunchError::LogFile {
            path: log_path.clone(),
            source,
        })?;

        let mut cmd = shell_command(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(stdout));
        cmd.stderr(Stdio::from(stderr));
        cmd.kill_on_drop(true);
        // Own process group, so a kill reaches everything the shell started
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|source| LaunchError::Spawn {
            command: command.to_string(),
            source,
        })
    }
}

/// A launched process that has not been observed to exit yet.
///
/// Dropping an `Execution` without waiting kills the process group and frees
/// the runner.
pub struct Execution {
    command: String,
    /// Also the process group id on Unix.
    pid: Option<u32>,
    child: Child,
    kill_rx: oneshot::Receiver<()>,
    slot: Arc<Mutex<Slot>>,
    finished: bool,
}

impl Execution {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Suspend the caller until the process exits and return its exit code.
    ///
    /// A process ended by a signal reports `128 + signal`.
    pub async fn wait(mut self) -> i32 {
        let exited = tokio::select! {
            status = self.child.wait() => Some(status),
            Ok(()) = &mut self.kill_rx => None,
        };

        let status = match exited {
            Some(status) => status,
            None => {
                kill_process_group(self.pid);
                if let Err(e) = self.child.start_kill() {
                    tracing::warn!(command = %self.command, error = %e, "Failed to kill process");
                }
                self.child.wait().await
            }
        };

        let exit_code = match status {
            Ok(status) => exit_code_of(status),
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "Failed to wait for process");
                EXIT_CODE_LAUNCH_FAILURE
            }
        };

        let mut slot = lock(&self.slot);
        slot.live = None;
        slot.last_exit = exit_code;
        self.finished = true;
        tracing::debug!(command = %self.command, exit_code, "Process exited");

        exit_code
    }

    /// Wait on an independent task and hand the exit code to `on_exit`.
    ///
    /// `on_exit` runs on the spawned task, not on the caller's.
    pub fn detach<F, Fut>(self, on_exit: F) -> JoinHandle<()>
    where
        F: FnOnce(i32) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let exit_code = self.wait().await;
            on_exit(exit_code).await;
        })
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if !self.finished {
            kill_process_group(self.pid);
            let mut slot = lock(&self.slot);
            slot.live = None;
            slot.last_exit = EXIT_CODE_LAUNCH_FAILURE;
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // ESRCH once the whole group is gone
        tracing::debug!(pgid, error = %e, "Failed to signal process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(128)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
