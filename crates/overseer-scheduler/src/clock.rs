//! Trigger clock: computes cron firing instants and dispatches callbacks.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use cron::Schedule;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Result, SchedulerError};

/// Factory invoked once per firing; each produced future runs on its own
/// Tokio task so firings never block one another.
pub type TriggerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque registration identifier returned by [`TriggerClock::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(pub(crate) u64);

/// Computes firing instants from a cron expression and invokes the bound
/// callback at each occurrence.
pub trait TriggerClock: Send + Sync {
    /// Bind `callback` to `cron_expr`. Registrations made while the clock
    /// is armed start firing immediately.
    fn register(&self, cron_expr: &str, callback: TriggerCallback) -> Result<TriggerHandle>;

    /// Drop a registration. Unknown handles are ignored.
    fn unregister(&self, handle: TriggerHandle);

    /// Start firing all registrations. Idempotent.
    fn arm(&self);

    /// Stop firing. Already-dispatched callbacks keep running. Idempotent.
    fn disarm(&self);
}

struct Registration {
    schedule: Schedule,
    callback: TriggerCallback,
    loop_task: Option<JoinHandle<()>>,
}

struct ClockInner {
    next_id: u64,
    armed: bool,
    regs: HashMap<u64, Registration>,
    shutdown: watch::Sender<bool>,
}

/// Default clock: parses expressions in the seconds-resolution cron dialect
/// and runs one firing-loop task per armed registration.
pub struct CronClock {
    inner: Mutex<ClockInner>,
}

impl CronClock {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Mutex::new(ClockInner {
                next_id: 0,
                armed: false,
                regs: HashMap::new(),
                shutdown,
            }),
        }
    }
}

impl Default for CronClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerClock for CronClock {
    fn register(&self, cron_expr: &str, callback: TriggerCallback) -> Result<TriggerHandle> {
        let schedule =
            Schedule::from_str(cron_expr).map_err(|e| SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                reason: e.to_string(),
            })?;

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let id = inner.next_id;
        inner.next_id += 1;

        let loop_task = inner.armed.then(|| {
            spawn_fire_loop(
                schedule.clone(),
                Arc::clone(&callback),
                inner.shutdown.subscribe(),
            )
        });

        inner.regs.insert(
            id,
            Registration {
                schedule,
                callback,
                loop_task,
            },
        );
        debug!(handle = id, expr = %cron_expr, "trigger registered");
        Ok(TriggerHandle(id))
    }

    fn unregister(&self, handle: TriggerHandle) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reg) = inner.regs.remove(&handle.0) {
            if let Some(task) = reg.loop_task {
                task.abort();
            }
            debug!(handle = handle.0, "trigger unregistered");
        }
    }

    fn arm(&self) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if inner.armed {
            return;
        }
        inner.armed = true;

        // Fresh channel per arm cycle so a previous disarm signal is never
        // observed by the new firing loops.
        let (shutdown, _) = watch::channel(false);
        inner.shutdown = shutdown;

        for reg in inner.regs.values_mut() {
            reg.loop_task = Some(spawn_fire_loop(
                reg.schedule.clone(),
                Arc::clone(&reg.callback),
                inner.shutdown.subscribe(),
            ));
        }
        debug!(registrations = inner.regs.len(), "clock armed");
    }

    fn disarm(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.armed {
            return;
        }
        inner.armed = false;
        let _ = inner.shutdown.send(true);
        for reg in inner.regs.values_mut() {
            // Loops exit on the shutdown signal; dropping the handle detaches.
            reg.loop_task = None;
        }
        debug!("clock disarmed");
    }
}

fn spawn_fire_loop(
    schedule: Schedule,
    callback: TriggerCallback,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                debug!("schedule exhausted; firing loop exiting");
                break;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    // One task per firing: a slow mission body must never
                    // delay the next occurrence.
                    tokio::spawn((callback)());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_callback(counter: Arc<AtomicUsize>) -> TriggerCallback {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let clock = CronClock::new();
        let cb: TriggerCallback = Arc::new(|| Box::pin(async {}));
        let err = clock.register("definitely not cron", cb).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { .. }));
    }

    #[tokio::test]
    async fn armed_clock_fires_and_disarm_stops_it() {
        let clock = CronClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        clock
            .register("* * * * * *", counting_callback(Arc::clone(&fired)))
            .unwrap();

        clock.arm();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        clock.disarm();

        // Let any firing dispatched right at disarm settle before sampling.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let seen = fired.load(Ordering::SeqCst);
        assert!((1..=4).contains(&seen), "expected 1-4 firings, saw {seen}");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), seen, "fired after disarm");
    }

    #[tokio::test]
    async fn unregistered_trigger_never_fires() {
        let clock = CronClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = clock
            .register("* * * * * *", counting_callback(Arc::clone(&fired)))
            .unwrap();

        clock.arm();
        clock.unregister(handle);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        clock.disarm();
    }

    #[tokio::test]
    async fn registration_while_armed_starts_firing() {
        let clock = CronClock::new();
        clock.arm();

        let fired = Arc::new(AtomicUsize::new(0));
        clock
            .register("* * * * * *", counting_callback(Arc::clone(&fired)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(fired.load(Ordering::SeqCst) >= 1);
        clock.disarm();
    }
}
