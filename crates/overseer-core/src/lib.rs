//! `overseer-core` — shared definitions for the Overseer workspace.
//!
//! Holds everything the other crates agree on: the [`MissionDefinition`]
//! record that describes one recurring job, the [`ScheduleConfig`] loader
//! that reads a set of definitions from a TOML file (with `OVERSEER_*`
//! environment overrides), and the core error type.
//!
//! The definition record is deliberately dumb data — it carries no runtime
//! state. `overseer-scheduler` turns a definition into a live mission.

pub mod config;
pub mod definition;
pub mod error;

pub use config::ScheduleConfig;
pub use definition::MissionDefinition;
pub use error::{CoreError, Result};
