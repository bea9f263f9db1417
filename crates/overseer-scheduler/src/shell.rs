//! Shell mission: spawns a command per firing and tracks its process.
//!
//! Per firing the body walks a fixed gate order — prepare hook, enabled
//! flag, overlap slot — then spawns, tracks the PID, waits for exit, and
//! routes the outcome to the finish or error hook. A panic anywhere inside
//! one firing is caught at the mission boundary and logged; it never
//! reaches the scheduler or a sibling mission.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use overseer_core::MissionDefinition;
use overseer_runner::{CommandSpec, ExitStatus, Pid, ProcessRunner, RunnerError};

use crate::error::Result;
use crate::mission::Mission;

/// Why one firing of a mission failed; handed to the error hook.
#[derive(Debug, Error)]
pub enum RunFailure {
    /// The prepare hook rejected the invocation before spawn.
    #[error("prepare hook failed: {0}")]
    Prepare(anyhow::Error),

    /// The process could not be spawned.
    #[error("spawn failed: {0}")]
    Spawn(#[source] RunnerError),

    /// Waiting on the child failed; its exit status is unknown.
    #[error("wait failed for PID {pid}: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: RunnerError,
    },

    /// The child exited with a failing status.
    #[error("PID {pid} exited with failing status ({status})")]
    Exit { pid: Pid, status: ExitStatus },
}

/// Runs before each spawn; an `Err` aborts the firing.
pub type PrepareHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;
/// Receives every failed firing. Its own failures are logged, never escalated.
pub type ErrorHook = Arc<dyn Fn(&RunFailure) -> anyhow::Result<()> + Send + Sync>;
/// Runs after a clean (zero) exit only.
pub type FinishHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A named shell command bound to a cron expression.
///
/// Hook policy: the finish hook fires only on a clean exit; the error hook
/// fires on any failure (prepare rejection, spawn error, wait error, or a
/// non-zero status). Exactly one of the two runs per spawned process.
pub struct ShellMission {
    name: String,
    cron_expr: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    overlapping: bool,
    permanent: bool,
    enabled: AtomicBool,
    /// Single run slot for non-overlapping missions; claimed before spawn,
    /// released after the PID is untracked.
    busy: AtomicBool,
    pids: Mutex<Vec<Pid>>,
    /// Broadcasts the tracked-PID count; `drained` waits for it to hit zero.
    drain_tx: watch::Sender<usize>,
    drain_rx: watch::Receiver<usize>,
    prepare_hook: Option<PrepareHook>,
    error_hook: Option<ErrorHook>,
    finish_hook: Option<FinishHook>,
    runner: Arc<dyn ProcessRunner>,
}

impl ShellMission {
    pub fn new(
        name: impl Into<String>,
        cron: impl Into<String>,
        command: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let (drain_tx, drain_rx) = watch::channel(0);
        Self {
            name: name.into(),
            cron_expr: cron.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            overlapping: false,
            permanent: false,
            enabled: AtomicBool::new(true),
            busy: AtomicBool::new(false),
            pids: Mutex::new(Vec::new()),
            drain_tx,
            drain_rx,
            prepare_hook: None,
            error_hook: None,
            finish_hook: None,
            runner,
        }
    }

    /// Build a mission from its on-disk definition record.
    pub fn from_definition(def: &MissionDefinition, runner: Arc<dyn ProcessRunner>) -> Self {
        let mut mission = Self::new(
            def.name.as_str(),
            def.cron.as_str(),
            def.command.as_str(),
            runner,
        )
        .overlapping(def.overlapping)
        .permanent(def.permanent)
        .enabled(def.enabled);
        mission.args = def.args.clone();
        mission.env = def.env.clone();
        mission
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn overlapping(mut self, yes: bool) -> Self {
        self.overlapping = yes;
        self
    }

    pub fn permanent(mut self, yes: bool) -> Self {
        self.permanent = yes;
        self
    }

    pub fn enabled(self, yes: bool) -> Self {
        self.enabled.store(yes, Ordering::Release);
        self
    }

    pub fn on_prepare(
        mut self,
        hook: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.prepare_hook = Some(Arc::new(hook));
        self
    }

    pub fn on_error(
        mut self,
        hook: impl Fn(&RunFailure) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn on_finish(
        mut self,
        hook: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.finish_hook = Some(Arc::new(hook));
        self
    }

    // -----------------------------------------------------------------------
    // Per-firing execution
    // -----------------------------------------------------------------------

    async fn execute(&self) {
        let spec = self.command_spec();

        if let Some(hook) = &self.prepare_hook {
            if let Err(e) = hook() {
                warn!(mission = %self.name, "prepare hook rejected firing: {e}");
                self.invoke_error_hook(&RunFailure::Prepare(e));
                return;
            }
        }

        if !self.enabled.load(Ordering::Acquire) {
            debug!(mission = %self.name, "disabled; firing skipped");
            return;
        }

        // Claiming the slot (rather than peeking at the PID set) closes the
        // window where two concurrent firings both see "no process" and
        // both spawn.
        let _slot = match self.claim_slot() {
            Some(guard) => guard,
            None => {
                debug!(mission = %self.name, "previous instance still running; firing skipped");
                return;
            }
        };

        let pid = match self.runner.spawn(&spec).await {
            Ok(pid) => pid,
            Err(e) => {
                error!(mission = %self.name, "spawn failed: {e}");
                self.invoke_error_hook(&RunFailure::Spawn(e));
                return;
            }
        };

        self.track(pid);
        info!(mission = %self.name, pid, "started");

        let status_label;
        match self.runner.wait(pid).await {
            Ok(status) => {
                status_label = status.to_string();
                if status.success {
                    if let Some(hook) = &self.finish_hook {
                        if let Err(e) = hook() {
                            warn!(mission = %self.name, "finish hook failed: {e}");
                        }
                    }
                } else {
                    self.invoke_error_hook(&RunFailure::Exit { pid, status });
                }
            }
            Err(source) => {
                status_label = source.to_string();
                self.invoke_error_hook(&RunFailure::Wait { pid, source });
            }
        }

        self.untrack(pid);
        info!(mission = %self.name, pid, status = %status_label, "finished");
    }

    fn command_spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new(self.command.as_str()).args(self.args.iter().cloned());
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }
        spec
    }

    fn invoke_error_hook(&self, failure: &RunFailure) {
        if let Some(hook) = &self.error_hook {
            if let Err(e) = hook(failure) {
                warn!(mission = %self.name, "error hook failed: {e}");
            }
        }
    }

    fn claim_slot(&self) -> Option<SlotGuard<'_>> {
        if self.overlapping {
            return Some(SlotGuard { slot: None });
        }
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                slot: Some(&self.busy),
            })
    }

    fn track(&self, pid: Pid) {
        let mut pids = self.pids.lock().unwrap();
        pids.push(pid);
        let _ = self.drain_tx.send(pids.len());
    }

    fn untrack(&self, pid: Pid) {
        let mut pids = self.pids.lock().unwrap();
        pids.retain(|p| *p != pid);
        let _ = self.drain_tx.send(pids.len());
    }
}

#[async_trait]
impl Mission for ShellMission {
    fn name(&self) -> &str {
        &self.name
    }

    fn cron(&self) -> &str {
        &self.cron_expr
    }

    async fn run(&self) {
        if let Err(panic) = AssertUnwindSafe(self.execute()).catch_unwind().await {
            error!(
                mission = %self.name,
                "firing panicked: {}",
                panic_message(panic.as_ref())
            );
        }
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    async fn stop(&self) -> Result<()> {
        let pids = self.pids();
        if pids.is_empty() {
            return Ok(());
        }
        info!(mission = %self.name, ?pids, "terminating tracked processes");
        self.runner.terminate(&pids, true).await?;
        Ok(())
    }

    fn pids(&self) -> Vec<Pid> {
        self.pids.lock().unwrap().clone()
    }

    fn is_permanent(&self) -> bool {
        self.permanent
    }

    fn is_running(&self) -> bool {
        !self.pids.lock().unwrap().is_empty()
    }

    async fn drained(&self) {
        let mut rx = self.drain_rx.clone();
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

/// Releases the non-overlapping run slot on drop, so every exit path —
/// including an unwinding panic — frees it.
struct SlotGuard<'a> {
    slot: Option<&'a AtomicBool>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot {
            slot.store(false, Ordering::Release);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
