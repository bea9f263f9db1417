//! `overseer-scheduler` — cron-driven background missions with OS process
//! tracking.
//!
//! # Overview
//!
//! A [`Scheduler`] owns a set of named missions. Each mission is bound to a
//! cron expression on a [`TriggerClock`]; every firing dispatches one
//! execution attempt on its own Tokio task. The built-in [`ShellMission`]
//! spawns a command through a [`ProcessRunner`](overseer_runner::ProcessRunner),
//! tracks the child's PID until exit, and enforces its overlap policy.
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | `start`   | arms the clock; registered missions begin firing          |
//! | `stop`    | disarms, kills permanent missions, waits for PID drain    |
//! | `destroy` | disarms, bounded grace countdown, batched force-kill      |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use overseer_runner::TokioProcessRunner;
//! use overseer_scheduler::{CronClock, Scheduler, ShellMission};
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = Arc::new(TokioProcessRunner::new());
//!     let scheduler = Scheduler::new(Arc::new(CronClock::new()), runner.clone());
//!
//!     let mission = ShellMission::new("heartbeat", "*/5 * * * * *", "curl", runner)
//!         .args(["-fsS", "https://example.com/ping"]);
//!     scheduler.add_mission(Arc::new(mission)).unwrap();
//!
//!     scheduler.start();
//!     tokio::signal::ctrl_c().await.unwrap();
//!     scheduler.stop().await;
//! }
//! ```

pub mod clock;
pub mod error;
pub mod mission;
pub mod scheduler;
pub mod shell;

pub use clock::{CronClock, TriggerCallback, TriggerClock, TriggerHandle};
pub use error::{Result, SchedulerError};
pub use mission::Mission;
pub use scheduler::Scheduler;
pub use shell::{ErrorHook, FinishHook, PrepareHook, RunFailure, ShellMission};
