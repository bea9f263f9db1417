use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One recurring job as declared by the host (TOML file, API call, …).
///
/// This is the on-disk shape only; a live, process-tracking mission is built
/// from it by the scheduler crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionDefinition {
    /// Unique key within one scheduler.
    pub name: String,

    /// Cron expression (seconds-resolution dialect, e.g. `*/5 * * * * *`).
    /// Opaque here — parsed by the trigger clock.
    pub cron: String,

    /// Program to execute.
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides merged over the ambient process environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// When `true`, a firing may start a new process even while a previous
    /// instance is still running. When `false`, such a firing is skipped.
    #[serde(default)]
    pub overlapping: bool,

    /// Daemon-style job: expected to be terminated explicitly rather than
    /// exit on its own.
    #[serde(default)]
    pub permanent: bool,

    /// Disabled missions stay registered but spawn nothing on a firing.
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn bool_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_fills_defaults() {
        let json = r#"{"name":"backup","cron":"0 0 * * * *","command":"pg_dump"}"#;
        let def: MissionDefinition = serde_json::from_str(json).unwrap();

        assert_eq!(def.name, "backup");
        assert!(def.args.is_empty());
        assert!(def.env.is_empty());
        assert!(!def.overlapping);
        assert!(!def.permanent);
        // enabled defaults to true, unlike the other flags
        assert!(def.enabled);
    }

    #[test]
    fn explicit_flags_round_trip() {
        let def = MissionDefinition {
            name: "tail".into(),
            cron: "* * * * * *".into(),
            command: "tail".into(),
            args: vec!["-f".into(), "/var/log/syslog".into()],
            env: HashMap::from([("LANG".to_string(), "C".to_string())]),
            overlapping: true,
            permanent: true,
            enabled: false,
        };

        let json = serde_json::to_string(&def).unwrap();
        let back: MissionDefinition = serde_json::from_str(&json).unwrap();

        assert_eq!(back.args, def.args);
        assert_eq!(back.env.get("LANG").map(String::as_str), Some("C"));
        assert!(back.overlapping);
        assert!(back.permanent);
        assert!(!back.enabled);
    }
}
