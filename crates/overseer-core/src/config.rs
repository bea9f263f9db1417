use std::collections::HashSet;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::definition::MissionDefinition;
use crate::error::{CoreError, Result};

/// Top-level definition file (`overseer.toml` + `OVERSEER_*` env overrides).
///
/// ```toml
/// [[mission]]
/// name = "backup"
/// cron = "0 0 3 * * *"
/// command = "pg_dump"
/// args = ["-f", "/backups/db.sql"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default, rename = "mission")]
    pub missions: Vec<MissionDefinition>,
}

impl ScheduleConfig {
    /// Load definitions from a TOML file, applying `OVERSEER_*` env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: ScheduleConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OVERSEER_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        debug!(missions = config.missions.len(), "definitions loaded");
        Ok(config)
    }

    /// Reject duplicate mission names before they ever reach a scheduler.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for def in &self.missions {
            if !seen.insert(def.name.as_str()) {
                return Err(CoreError::DuplicateDefinition {
                    name: def.name.clone(),
                });
            }
        }
        Ok(())
    }
}
