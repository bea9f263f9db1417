//! `overseer-runner` — spawns, waits on, and signals OS processes.
//!
//! The [`ProcessRunner`] trait is the seam between mission logic and the
//! operating system: missions spawn through it, block on `wait`, and the
//! scheduler delivers its batched kill through `terminate`. The default
//! [`TokioProcessRunner`] is backed by `tokio::process`; tests substitute
//! their own implementations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use overseer_runner::{CommandSpec, ProcessRunner, TokioProcessRunner};
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = TokioProcessRunner::new();
//!
//!     let spec = CommandSpec::new("sleep").arg("2");
//!     let pid = runner.spawn(&spec).await.unwrap();
//!     let status = runner.wait(pid).await.unwrap();
//!     println!("exited: {status}");
//! }
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub use error::{Result, RunnerError};
pub use runner::{ProcessRunner, TokioProcessRunner};
pub use types::{CommandSpec, ExitStatus, Pid};
