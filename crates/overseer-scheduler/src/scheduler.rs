//! The scheduler: owns the mission registry and coordinates global
//! start / graceful stop / forceful destroy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use overseer_runner::{Pid, ProcessRunner};

use crate::clock::{TriggerCallback, TriggerClock, TriggerHandle};
use crate::error::{Result, SchedulerError};
use crate::mission::Mission;

/// How long `destroy` lets missions self-terminate before the batched kill.
const DESTROY_GRACE: Duration = Duration::from_secs(5);

struct Registered {
    mission: Arc<dyn Mission>,
    trigger: TriggerHandle,
}

struct State {
    registry: HashMap<String, Registered>,
    running: bool,
}

/// Coordinates a set of missions against one trigger clock.
///
/// The registry and running flag sit behind a reader/writer lock with short
/// critical sections; the lock is never held across an await, so status
/// queries stay cheap while missions execute.
pub struct Scheduler {
    clock: Arc<dyn TriggerClock>,
    runner: Arc<dyn ProcessRunner>,
    grace: Duration,
    state: RwLock<State>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn TriggerClock>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            clock,
            runner,
            grace: DESTROY_GRACE,
            state: RwLock::new(State {
                registry: HashMap::new(),
                running: false,
            }),
        }
    }

    /// Override the destroy grace period (used by tests; defaults to 5 s).
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Register a mission and bind its cron expression to the clock.
    ///
    /// Fails on a duplicate name or an unparsable expression; in both cases
    /// the registry is left untouched. On an armed scheduler the mission
    /// starts firing immediately.
    pub fn add_mission(&self, mission: Arc<dyn Mission>) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let name = mission.name().to_string();
        if state.registry.contains_key(&name) {
            return Err(SchedulerError::DuplicateMission { name });
        }

        let trigger = self
            .clock
            .register(mission.cron(), Self::trigger_callback(Arc::clone(&mission)))?;

        info!(mission = %name, cron = %mission.cron(), "mission registered");
        state.registry.insert(name, Registered { mission, trigger });
        Ok(())
    }

    /// Unregister `name` and terminate its tracked processes.
    ///
    /// Unknown names are a silent no-op. A failure while stopping the
    /// mission is reported in the returned error, never propagated as a
    /// fault — the mission is out of the registry either way.
    pub async fn remove_mission(&self, name: &str) -> Result<()> {
        let removed = {
            let mut state = self.state.write().unwrap();
            state.registry.remove(name)
        };
        let Some(entry) = removed else {
            debug!(mission = %name, "remove requested for unknown mission; ignoring");
            return Ok(());
        };

        self.clock.unregister(entry.trigger);
        if let Err(e) = entry.mission.stop().await {
            return Err(SchedulerError::Removal {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }
        info!(mission = %name, "mission removed");
        Ok(())
    }

    /// Arm the clock. Idempotent.
    pub fn start(&self) {
        let mut state = self.state.write().unwrap();
        if state.running {
            info!("scheduler already running");
            return;
        }
        state.running = true;
        self.clock.arm();
        info!(missions = state.registry.len(), "scheduler started");
    }

    /// Graceful suspend: no new firings, permanent missions are killed,
    /// everything else drains naturally. Waits — without polling — until
    /// every mission's PID set is empty, then marks the scheduler stopped.
    pub async fn stop(&self) {
        let missions = {
            let state = self.state.write().unwrap();
            if !state.running {
                info!("scheduler is not running");
                return;
            }
            self.clock.disarm();
            Self::snapshot(&state)
        };

        // Permanent missions never exit on their own; kill them up front so
        // the drain below can complete.
        for mission in &missions {
            let pids = mission.pids();
            if !pids.is_empty() {
                info!(mission = %mission.name(), ?pids, "waiting for processes");
            }
            if mission.is_permanent() {
                if let Err(e) = mission.stop().await {
                    warn!(mission = %mission.name(), "terminate failed: {e}");
                }
            }
        }

        for mission in &missions {
            mission.drained().await;
        }

        self.state.write().unwrap().running = false;
        info!("scheduler suspended");
    }

    /// Forceful teardown: no new firings, a bounded grace countdown, then
    /// one batched kill of every PID still tracked anywhere. The scheduler
    /// is marked not-running even when the kill reports an error.
    pub async fn destroy(&self) {
        let missions = {
            let state = self.state.write().unwrap();
            if !state.running {
                info!("scheduler is not running");
                return;
            }
            self.clock.disarm();
            Self::snapshot(&state)
        };

        for mission in &missions {
            let pids = mission.pids();
            if !pids.is_empty() {
                warn!(mission = %mission.name(), ?pids, "processes will be destroyed");
            }
        }

        // Missions may still finish on their own while the countdown runs;
        // whatever survives is killed in one batch.
        let secs = self.grace.as_secs();
        if secs == 0 {
            tokio::time::sleep(self.grace).await;
        } else {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await; // first tick completes immediately
            for remaining in (1..=secs).rev() {
                warn!(remaining, "force-kill countdown");
                ticker.tick().await;
            }
        }

        // Collect after the grace window closes so the kill batch is one
        // consistent snapshot.
        let kill_list: Vec<Pid> = missions.iter().flat_map(|m| m.pids()).collect();
        if kill_list.is_empty() {
            info!("no processes left to kill");
        } else {
            warn!(count = kill_list.len(), "killing remaining processes");
            match self.runner.terminate(&kill_list, true).await {
                Ok(()) => {
                    for mission in &missions {
                        mission.drained().await;
                    }
                }
                Err(e) => error!("batched kill failed: {e}"),
            }
        }

        self.state.write().unwrap().running = false;
        info!("scheduler destroyed");
    }

    pub fn is_running(&self) -> bool {
        self.state.read().unwrap().running
    }

    /// Sorted names of all registered missions.
    pub fn mission_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .read()
            .unwrap()
            .registry
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Shared handle to a registered mission, for read accessors.
    pub fn mission(&self, name: &str) -> Option<Arc<dyn Mission>> {
        self.state
            .read()
            .unwrap()
            .registry
            .get(name)
            .map(|entry| Arc::clone(&entry.mission))
    }

    fn trigger_callback(mission: Arc<dyn Mission>) -> TriggerCallback {
        Arc::new(move || {
            let mission = Arc::clone(&mission);
            Box::pin(async move { mission.run().await })
        })
    }

    fn snapshot(state: &State) -> Vec<Arc<dyn Mission>> {
        state
            .registry
            .values()
            .map(|entry| Arc::clone(&entry.mission))
            .collect()
    }
}
