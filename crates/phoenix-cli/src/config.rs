//! CLI configuration management.
//!
//! Supports loading configuration from a config file, a `.env` file,
//! environment variables and CLI arguments, in increasing precedence.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use phoenix_api::VmDefaults;
use phoenix_supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub host: String,

    /// Port the HTTP server listens on.
    pub port: u16,

    /// QEMU executable launched for every VM start.
    pub qemu_binary: PathBuf,

    /// Grace period and shell settings.
    pub supervisor: SupervisorConfig,

    /// Values used for fields a start request leaves out.
    pub vm: VmDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            qemu_binary: PathBuf::from("qemu-system-x86_64"),
            supervisor: SupervisorConfig::default(),
            vm: VmDefaults::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `PHOENIX_*` variables.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var("PHOENIX_HOST") {
            self.host = host;
        }
        if let Some(port) = var("PHOENIX_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid PHOENIX_PORT: {}", port))?;
        }
        if let Some(binary) = var("PHOENIX_QEMU_BINARY") {
            self.qemu_binary = PathBuf::from(binary);
        }
        if let Some(grace) = var("PHOENIX_GRACE_PERIOD_SECS") {
            self.supervisor.grace_period_secs = grace
                .parse()
                .with_context(|| format!("Invalid PHOENIX_GRACE_PERIOD_SECS: {}", grace))?;
        }
        if let Some(shell) = var("PHOENIX_SHELL") {
            self.supervisor.shell = shell;
        }
        if let Some(disk) = var("PHOENIX_PRIMARY_DISK") {
            self.vm.primary_disk_path = disk;
        }
        if let Some(cdrom) = var("PHOENIX_CDROM") {
            self.vm.cdrom_path = cdrom;
        }
        if let Some(disk) = var("PHOENIX_DATA_DISK") {
            self.vm.data_disk_path = disk;
        }
        Ok(())
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file. `PHOENIX_CONFIG_FILE` overrides the
    /// platform location.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PHOENIX_CONFIG_FILE") {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("dev", "project-phoenix", "phoenix")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "host" => Some(self.host.clone()),
            "port" => Some(self.port.to_string()),
            "qemu-binary" => Some(self.qemu_binary.display().to_string()),
            "grace-period" => Some(self.supervisor.grace_period_secs.to_string()),
            "shell" => Some(self.supervisor.shell.clone()),
            "ram-mb" => Some(self.vm.ram_mb.to_string()),
            "cores" => Some(self.vm.cores.to_string()),
            "primary-disk" => Some(self.vm.primary_disk_path.clone()),
            "cdrom" => Some(self.vm.cdrom_path.clone()),
            "data-disk" => Some(self.vm.data_disk_path.clone()),
            _ => None,
        }
    }

    /// Set a configuration value by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "host" => self.host = value.to_string(),
            "port" => {
                self.port = value
                    .parse()
                    .with_context(|| format!("Invalid port: {}", value))?
            }
            "qemu-binary" => self.qemu_binary = PathBuf::from(value),
            "grace-period" => {
                self.supervisor.grace_period_secs = value
                    .parse()
                    .with_context(|| format!("Invalid number of seconds: {}", value))?
            }
            "shell" => self.supervisor.shell = value.to_string(),
            "ram-mb" => {
                self.vm.ram_mb = value
                    .parse()
                    .with_context(|| format!("Invalid number: {}", value))?
            }
            "cores" => {
                self.vm.cores = value
                    .parse()
                    .with_context(|| format!("Invalid number: {}", value))?
            }
            "primary-disk" => self.vm.primary_disk_path = value.to_string(),
            "cdrom" => self.vm.cdrom_path = value.to_string(),
            "data-disk" => self.vm.data_disk_path = value.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                Self::KEYS.join(", ")
            ),
        }
        Ok(())
    }

    pub const KEYS: &'static [&'static str] = &[
        "host",
        "port",
        "qemu-binary",
        "grace-period",
        "shell",
        "ram-mb",
        "cores",
        "primary-disk",
        "cdrom",
        "data-disk",
    ];
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("PHOENIX_PORT", "8080"),
            ("PHOENIX_QEMU_BINARY", "/usr/local/bin/qemu"),
            ("PHOENIX_GRACE_PERIOD_SECS", "2"),
            ("PHOENIX_PRIMARY_DISK", "/vm/os.qcow2"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.qemu_binary, PathBuf::from("/usr/local/bin/qemu"));
        assert_eq!(config.supervisor.grace_period_secs, 2);
        assert_eq!(config.vm.primary_disk_path, "/vm/os.qcow2");
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn invalid_env_port_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == "PHOENIX_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PHOENIX_PORT"));
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"port": 6000, "vm": {"cores": 2}}"#).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.vm.cores, 2);
        assert_eq!(config.vm.ram_mb, 8192);
        assert_eq!(config.supervisor.grace_period_secs, 5);
    }

    #[test]
    fn get_and_set_round_trip_every_key() {
        let mut config = Config::default();
        for key in Config::KEYS {
            assert!(config.get(key).is_some(), "missing getter for {}", key);
        }

        config.set("cores", "4").unwrap();
        config.set("qemu-binary", "/opt/qemu").unwrap();
        assert_eq!(config.get("cores").as_deref(), Some("4"));
        assert_eq!(config.get("qemu-binary").as_deref(), Some("/opt/qemu"));

        assert!(config.set("port", "99999").is_err());
        assert!(config.set("colour", "blue").is_err());
    }
}
