//! The mission abstraction: anything that can be bound to a cron trigger.

use async_trait::async_trait;
use overseer_runner::Pid;

use crate::error::Result;

/// Capability set shared by every schedulable job kind.
///
/// The scheduler holds missions as `Arc<dyn Mission>`; new job kinds (e.g.
/// in-process callables) implement this trait alongside the built-in
/// [`ShellMission`](crate::ShellMission).
#[async_trait]
pub trait Mission: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// Cron expression this mission fires on.
    fn cron(&self) -> &str;

    /// One execution attempt; invoked once per clock firing. Must contain
    /// its own failures — nothing may propagate to the scheduler or to
    /// sibling missions.
    async fn run(&self);

    /// Allow future firings to spawn.
    fn enable(&self);

    /// Suppress future firings without touching in-flight instances.
    fn disable(&self);

    /// Forcefully terminate every process this mission currently tracks.
    async fn stop(&self) -> Result<()>;

    /// Point-in-time snapshot of tracked PIDs, safe for building a batched
    /// kill list.
    fn pids(&self) -> Vec<Pid>;

    /// Daemon-style mission, not expected to exit on its own.
    fn is_permanent(&self) -> bool;

    /// True while at least one process is tracked.
    fn is_running(&self) -> bool;

    /// Resolves once the mission tracks no processes.
    async fn drained(&self);
}
