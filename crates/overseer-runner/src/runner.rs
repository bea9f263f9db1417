//! The [`ProcessRunner`] contract and its default Tokio implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{Result, RunnerError};
use crate::types::{CommandSpec, ExitStatus, Pid};

/// Spawns and signals OS processes on behalf of missions and the scheduler.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Launch the process described by `spec` and return its PID.
    async fn spawn(&self, spec: &CommandSpec) -> Result<Pid>;

    /// Wait for the child with `pid` to exit. Suspends only the calling task.
    async fn wait(&self, pid: Pid) -> Result<ExitStatus>;

    /// Deliver a termination signal to every PID in the batch. Best effort:
    /// individual failures are aggregated, never retried.
    async fn terminate(&self, pids: &[Pid], forceful: bool) -> Result<()>;
}

/// Default runner backed by `tokio::process`.
///
/// Spawned children are parked in an internal map until `wait` reclaims
/// them, so a PID alone is enough to resume waiting from any task. The map
/// lock is held only around insert/remove, never across the wait itself.
pub struct TokioProcessRunner {
    children: Mutex<HashMap<Pid, Child>>,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn spawn(&self, spec: &CommandSpec) -> Result<Pid> {
        let child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            // The child must outlive any dropped handle — missions own
            // lifecycle through wait/terminate, not through Drop.
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                command: spec.command.clone(),
                source: e,
            })?;

        let pid = child.id().ok_or_else(|| RunnerError::PidUnavailable {
            command: spec.command.clone(),
        })?;

        self.children.lock().unwrap().insert(pid, child);
        debug!(pid, command = %spec.command, "child spawned");
        Ok(pid)
    }

    async fn wait(&self, pid: Pid) -> Result<ExitStatus> {
        // Take the child out of the map first; waiting happens lock-free so
        // unrelated spawns are never serialized behind a long-lived child.
        let mut child = self
            .children
            .lock()
            .unwrap()
            .remove(&pid)
            .ok_or(RunnerError::UnknownPid { pid })?;

        let status = child
            .wait()
            .await
            .map_err(|e| RunnerError::Wait { pid, source: e })?;

        debug!(pid, %status, "child exited");
        Ok(status.into())
    }

    async fn terminate(&self, pids: &[Pid], forceful: bool) -> Result<()> {
        if pids.is_empty() {
            return Ok(());
        }

        let mut failed = 0usize;
        for &pid in pids {
            if let Err(e) = signal(pid, forceful) {
                warn!(pid, "failed to signal process: {e}");
                failed += 1;
            }
        }

        if failed > 0 {
            Err(RunnerError::Terminate {
                failed,
                total: pids.len(),
            })
        } else {
            debug!(count = pids.len(), forceful, "signalled process batch");
            Ok(())
        }
    }
}

/// POSIX kill(2) is the most reliable way to terminate a child once the
/// `Child` handle has been handed to a waiting task.
#[cfg(unix)]
fn signal(pid: Pid, forceful: bool) -> std::io::Result<()> {
    let sig = if forceful { libc::SIGKILL } else { libc::SIGTERM };
    // Safety: pid came from our own spawn; worst case it is already gone
    // and kill reports ESRCH.
    let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn signal(pid: Pid, _forceful: bool) -> std::io::Result<()> {
    // Best effort via taskkill on non-Unix platforms.
    std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .output()
        .map(|_| ())
}
