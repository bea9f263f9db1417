use thiserror::Error;

/// Errors that can occur within the scheduling subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A mission with that name is already registered.
    #[error("Mission already registered: {name}")]
    DuplicateMission { name: String },

    /// The cron expression could not be parsed by the trigger clock.
    #[error("Invalid cron expression `{expr}`: {reason}")]
    InvalidCron { expr: String, reason: String },

    /// Tearing a mission down during removal failed; the mission is already
    /// out of the registry when this is returned.
    #[error("Removal of mission `{name}` failed: {reason}")]
    Removal { name: String, reason: String },

    /// Underlying process-runner failure.
    #[error("Process runner error: {0}")]
    Runner(#[from] overseer_runner::RunnerError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
