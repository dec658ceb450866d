//! Error types for job submission.
//!
//! Mostly rejections: a job that was accepted records its outcome as an exit
//! code. The exception is a waiting caller whose job task died before
//! delivering that code.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Reasons a worker refuses a job.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Another job is active on this worker.
    #[error("Worker is busy running {running}")]
    Busy { running: String },

    /// The request cannot describe a runnable job.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// The job directory could not be created.
    #[error("Failed to create job directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The job task ended without producing an outcome.
    #[error("Job {job_id} ended without an outcome")]
    JobAborted { job_id: Uuid },
}

/// Type alias for Result with WorkerError.
pub type WorkerResult<T> = Result<T, WorkerError>;
