// Platform configuration - fleet machines, executor choice and timing knobs

use crate::games::config_guard::FallbackPolicy;
use crate::remote::HostSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "SERVERWAVE_FLEET_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    Ssh,
    Docker,
    DryRun,
}

/// Upper bounds for remote commands, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deploy and first start of a server, image pulls included.
    pub install_secs: u64,
    /// Start, stop, restart and firewall commands.
    pub command_secs: u64,
    /// A single health probe.
    pub health_secs: u64,
    /// A task still unfinished after this long belongs to a process that
    /// died; its server is moved to ERROR at the next start.
    pub stale_task_secs: u64,
}

impl TimeoutConfig {
    pub fn install(&self) -> Duration {
        Duration::from_secs(self.install_secs)
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn health(&self) -> Duration {
        Duration::from_secs(self.health_secs)
    }

    pub fn stale_task(&self) -> Duration {
        Duration::from_secs(self.stale_task_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            install_secs: 60,
            command_secs: 30,
            health_secs: 5,
            stale_task_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub machines: Vec<HostSpec>,
    #[serde(default = "default_executor")]
    pub executor: ExecutorKind,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub health: HealthConfig,
    /// Where server records are kept. `None` keeps them in memory.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    /// Rewrite unknown config formats with the generic key search
    /// instead of refusing them.
    #[serde(default)]
    pub guard_generic_fallback: bool,
}

fn default_executor() -> ExecutorKind {
    ExecutorKind::Ssh
}

impl Default for PlatformConfig {
    fn default() -> Self {
        let root = base_dir();
        Self {
            machines: Vec::new(),
            executor: default_executor(),
            timeouts: TimeoutConfig::default(),
            health: HealthConfig::default(),
            state_dir: Some(root.join("servers")),
            audit_log: Some(root.join("audit.log")),
            guard_generic_fallback: false,
        }
    }
}

impl PlatformConfig {
    /// Load the config file, writing the defaults first if it does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PlatformConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for machine in &self.machines {
            if machine.machine_id.trim().is_empty() {
                return Err(ConfigError::Invalid("machine id cannot be empty".to_string()));
            }
            if machine.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "machine {} has no address",
                    machine.machine_id
                )));
            }
            if !seen.insert(machine.machine_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "machine {} is listed twice",
                    machine.machine_id
                )));
            }
        }
        if self.health.attempts == 0 {
            return Err(ConfigError::Invalid("health.attempts must be greater than 0".to_string()));
        }
        if self.timeouts.install_secs == 0
            || self.timeouts.command_secs == 0
            || self.timeouts.health_secs == 0
        {
            return Err(ConfigError::Invalid("timeouts must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn guard_policy(&self) -> FallbackPolicy {
        if self.guard_generic_fallback {
            FallbackPolicy::Generic
        } else {
            FallbackPolicy::Reject
        }
    }
}

/// `~/ServerWaveFleet`
pub fn base_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ServerWaveFleet")
}

/// Config path from the command line, then the environment, then the default.
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| base_dir().join("config.json"))
}
