//! Subprocess execution.
//!
//! This module provides:
//! - [`ProcessRunner`]: owns at most one live OS process and its log file
//! - [`Execution`]: handle used to wait for a launched process, inline or on
//!   a detached task
//!
//! # Execution Flow
//!
//! 1. [`ProcessRunner::launch`] spawns `sh -c <command>` (`cmd /C` on Windows)
//!    with stdout and stderr appended to the job's process log
//! 2. [`Execution::wait`] or [`Execution::detach`] observes the exit
//! 3. [`ProcessRunner::terminate`] may end the process early; the exit is
//!    still observed through the same path

pub mod runner;

pub use runner::{Execution, LaunchError, ProcessRunner, ProcessStatus};
