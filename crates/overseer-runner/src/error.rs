use thiserror::Error;

use crate::types::Pid;

/// All errors that can originate from process-runner operations.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The child process could not be spawned.
    #[error("spawn failed for `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The child was spawned but the OS reported no PID for it.
    #[error("spawned `{command}` but no PID was available")]
    PidUnavailable { command: String },

    /// No tracked child with that PID — already reaped, or never spawned here.
    #[error("no tracked child with PID {pid}")]
    UnknownPid { pid: Pid },

    /// Waiting on the child failed at the OS level.
    #[error("wait failed for PID {pid}: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: std::io::Error,
    },

    /// One or more PIDs in a terminate batch could not be signalled.
    #[error("failed to signal {failed} of {total} processes")]
    Terminate { failed: usize, total: usize },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, RunnerError>;
