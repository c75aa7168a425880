//! Configuration for the supervision core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables shared by the supervisor and the ad-hoc runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Seconds `stop()` waits after the termination signal before killing.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Shell used by the ad-hoc runner.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Flag that makes `shell` read the command from its next argument.
    #[serde(default = "default_shell_flag")]
    pub shell_flag: String,
}

fn default_grace_period_secs() -> u64 {
    5
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_shell_flag() -> String {
    "-c".to_string()
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            shell: default_shell(),
            shell_flag: default_shell_flag(),
        }
    }
}

impl SupervisorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SupervisorConfig = serde_json::from_str(r#"{"shell": "bash"}"#).unwrap();
        assert_eq!(config.shell, "bash");
        assert_eq!(config.shell_flag, "-c");
        assert_eq!(config.grace_period(), Duration::from_secs(5));
    }
}
