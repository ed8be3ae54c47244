use thiserror::Error;

/// Errors raised synchronously by the scheduler API.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("task key must not be empty")]
    InvalidKey,

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),

    #[error("scheduler is closed to new submissions")]
    Closed,

    #[error("failed to start scheduler: {0}")]
    Startup(String),
}

/// Failure of a single task, delivered through its result handle.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task for key '{key}' failed: {source}")]
    Failed {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task for key '{key}' panicked: {message}")]
    Panicked { key: String, message: String },

    #[error("task for key '{key}' was abandoned before it ran")]
    Abandoned { key: String },
}

impl TaskError {
    /// Key of the task that failed.
    pub fn key(&self) -> &str {
        match self {
            TaskError::Failed { key, .. }
            | TaskError::Panicked { key, .. }
            | TaskError::Abandoned { key } => key,
        }
    }
}

/// Outcome of one submitted task.
pub type Outcome<R> = Result<R, TaskError>;
