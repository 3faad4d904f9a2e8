//! Error types for provisioning operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::aws::AwsError;
use crate::watch::{StackOperation, WatchError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    /// A template file could not be read from disk.
    #[error("failed to read template '{path}': {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stack finished without an output the next step depends on.
    #[error("stack '{stack}' is missing required output '{key}'")]
    MissingOutput { stack: String, key: String },

    #[error("stack '{stack}' not found")]
    StackNotFound { stack: String },

    /// The watcher observed a terminal failure status.
    #[error("stack {operation} failed for '{stack}': {reason}")]
    StackOperationFailed {
        stack: String,
        operation: StackOperation,
        reason: String,
    },

    /// The watcher exhausted its attempt budget.
    #[error("timed out waiting for stack {operation} on '{stack}'")]
    StackOperationTimedOut {
        stack: String,
        operation: StackOperation,
    },

    #[error("cancelled by operator")]
    Cancelled,
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
