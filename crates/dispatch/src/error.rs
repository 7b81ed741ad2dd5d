use thiserror::Error;

use crate::Pool;

/// Errors returned to a submitter.
///
/// Failures of the task itself never surface here; they are logged by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The pool is saturated and its policy is to refuse new work.
    #[error("{pool} pool is saturated, task rejected")]
    Rejected { pool: Pool },

    /// The pool no longer accepts work.
    #[error("{pool} pool is shut down")]
    ShutDown { pool: Pool },
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
