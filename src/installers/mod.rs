// Game installers - one implementation per game behind a common contract

mod base;
mod compose;
mod factory;
pub mod games;
mod validation;

pub use base::{InstallerBase, InstallerDeps};
pub use compose::{setting, ComposeFile};
pub use factory::{FactoryError, InstallerFactory};
pub use validation::Validator;

use crate::games::{profile, GameProfile, GameType, PortProtocol, PortRole};
use crate::ports::{PortAllocation, PortError, MAX_PORT};
use crate::remote::RemoteError;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Host directory holding one sub-directory per game, then per server.
pub const SERVER_ROOT: &str = "/srv/serverwave";

/// How many port blocks an installer tries when no port was requested.
pub const PORT_SCAN_ATTEMPTS: u32 = 200;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("machine {0} is not part of the fleet")]
    UnknownMachine(String),

    #[error("remote execution failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("{step} failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        step: String,
        exit_code: i64,
        stderr: String,
    },
}

/// Everything needed to provision one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallConfig {
    pub server_id: String,
    pub order_id: String,
    pub machine_id: String,
    pub game_type: GameType,
    pub server_name: String,
    pub max_players: u32,
    /// Requested primary port. Auxiliary ports follow at fixed offsets.
    #[serde(default)]
    pub port: Option<u16>,
    pub ram_mb: u32,
    #[serde(default)]
    pub game_config: Map<String, Value>,
}

impl InstallConfig {
    pub fn server_dir(&self) -> String {
        format!("{}/{}/{}", SERVER_ROOT, self.game_type.slug(), self.server_id)
    }

    pub fn container_name(&self) -> String {
        format!("serverwave-{}-{}", self.game_type.slug(), self.server_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedPort {
    pub role: PortRole,
    pub port: u16,
    pub protocol: PortProtocol,
}

/// The ports granted to one server; `port` is the primary game port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedPorts {
    pub port: u16,
    pub ports: Vec<AllocatedPort>,
}

impl AllocatedPorts {
    pub fn get(&self, role: PortRole) -> Option<u16> {
        self.ports.iter().find(|p| p.role == role).map(|p| p.port)
    }

    /// Ports reachable over TCP, for connectivity probes.
    pub fn tcp_ports(&self) -> Vec<u16> {
        self.ports
            .iter()
            .filter(|p| p.protocol != PortProtocol::Udp)
            .map(|p| p.port)
            .collect()
    }

    /// Registry entries for these ports, used to rehydrate after a restart.
    pub fn to_allocations(
        &self,
        game_type: GameType,
        owner_server_id: &str,
        allocated_at: DateTime<Utc>,
    ) -> Vec<PortAllocation> {
        self.ports
            .iter()
            .map(|p| PortAllocation {
                game_type,
                port: p.port,
                protocol: p.protocol,
                owner_server_id: owner_server_id.to_string(),
                allocated_at,
            })
            .collect()
    }
}

/// Rendered docker-compose manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec(pub String);

impl DeploymentSpec {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-game provisioning behaviour.
///
/// Implementors provide validation and the compose manifest; the remote
/// steps have defaults built on the compose layout under [`SERVER_ROOT`]
/// and may be overridden where a game needs extra work.
#[async_trait]
pub trait GameInstaller: Send + Sync {
    fn base(&self) -> &InstallerBase;

    /// Report every problem with `config`, never only the first.
    fn validate_config(&self, config: &InstallConfig) -> ValidationResult;

    /// Pure: equal inputs render byte-identical manifests.
    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec;

    fn game_type(&self) -> GameType {
        self.base().game_type()
    }

    fn machine_id(&self) -> &str {
        self.base().machine_id()
    }

    fn profile(&self) -> GameProfile {
        profile(self.game_type())
    }

    /// Reserve the game's whole port topology.
    ///
    /// With a requested port the block starts there. Without one, blocks are
    /// tried upwards from the game's default port. A failed block is rolled
    /// back entirely before the next attempt or the error.
    async fn allocate_ports(&self, config: &InstallConfig) -> Result<AllocatedPorts, InstallerError> {
        let profile = self.profile();
        if let Some(port) = config.port {
            return Ok(self.base().allocate_block(&profile, port as u32, &config.server_id)?);
        }

        let span = profile.port_span() as u32;
        let start = profile.default_port as u32;
        for attempt in 0..PORT_SCAN_ATTEMPTS {
            let base_port = start + attempt * span;
            if base_port + span - 1 > MAX_PORT {
                break;
            }
            match self.base().allocate_block(&profile, base_port, &config.server_id) {
                Ok(ports) => return Ok(ports),
                Err(PortError::AlreadyAllocated { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(PortError::Exhausted {
            game_type: profile.game_type,
            start,
        }
        .into())
    }

    fn release_ports(&self, ports: &AllocatedPorts) {
        for p in &ports.ports {
            self.base().registry().release(p.port, p.protocol);
        }
    }

    async fn pre_install(&self, config: &InstallConfig) -> Result<(), InstallerError> {
        let dir = config.server_dir();
        let command = format!("mkdir -p {}", shell_words::quote(&format!("{}/data", dir)));
        self.base()
            .run_checked("pre-install", &command, self.base().timeouts().command())
            .await?;
        Ok(())
    }

    /// Write the manifest next to the server's data.
    async fn deploy(&self, config: &InstallConfig, spec: &DeploymentSpec) -> Result<(), InstallerError> {
        let dir = config.server_dir();
        let encoded = base64::engine::general_purpose::STANDARD.encode(spec.as_str());
        let quoted = shell_words::quote(&dir);
        let command = format!(
            "mkdir -p {dir} && echo '{encoded}' | base64 -d > {dir}/docker-compose.yml",
            dir = quoted,
            encoded = encoded
        );
        self.base()
            .run_checked("deploy", &command, self.base().timeouts().command())
            .await?;
        Ok(())
    }

    async fn start_server(&self, config: &InstallConfig) -> Result<(), InstallerError> {
        let command = format!("cd {} && docker compose up -d", shell_words::quote(&config.server_dir()));
        self.base()
            .run_checked("start", &command, self.base().timeouts().install())
            .await?;
        Ok(())
    }

    async fn stop_server(&self, config: &InstallConfig) -> Result<(), InstallerError> {
        let command = format!("cd {} && docker compose stop", shell_words::quote(&config.server_dir()));
        self.base()
            .run_checked("stop", &command, self.base().timeouts().command())
            .await?;
        Ok(())
    }

    async fn restart_server(&self, config: &InstallConfig) -> Result<(), InstallerError> {
        let command = format!("cd {} && docker compose restart", shell_words::quote(&config.server_dir()));
        self.base()
            .run_checked("restart", &command, self.base().timeouts().command())
            .await?;
        Ok(())
    }

    async fn post_install(&self, _config: &InstallConfig, _ports: &AllocatedPorts) -> Result<(), InstallerError> {
        Ok(())
    }

    /// One probe: the container runs and every TCP port accepts connections.
    /// Failures of any kind read as unhealthy.
    async fn health_check(&self, config: &InstallConfig, ports: &AllocatedPorts) -> bool {
        let mut command = format!(
            "docker inspect -f '{{{{.State.Running}}}}' {} 2>/dev/null | grep -q true",
            shell_words::quote(&config.container_name())
        );
        for port in ports.tcp_ports() {
            command.push_str(&format!(" && nc -z -w 3 127.0.0.1 {}", port));
        }
        match self.base().run(&command, self.base().timeouts().health()).await {
            Ok(output) => output.success(),
            Err(e) => {
                tracing::debug!("Health probe for {} failed: {}", config.server_id, e);
                false
            }
        }
    }

    async fn configure_firewall(&self, ports: &AllocatedPorts) -> Result<(), InstallerError> {
        let rules: Vec<String> = ports
            .ports
            .iter()
            .flat_map(|p| p.protocol.transports().iter().map(move |t| format!("ufw allow {}/{}", p.port, t)))
            .collect();
        if rules.is_empty() {
            return Ok(());
        }
        self.base()
            .run_checked("firewall", &rules.join(" && "), self.base().timeouts().command())
            .await?;
        Ok(())
    }

    /// Remove the containers and the server directory.
    async fn teardown(&self, config: &InstallConfig) -> Result<(), InstallerError> {
        let dir = shell_words::quote(&config.server_dir()).to_string();
        let command = format!(
            "if [ -d {dir} ]; then cd {dir} && docker compose down --remove-orphans; fi; rm -rf {dir}",
            dir = dir
        );
        self.base()
            .run_checked("teardown", &command, self.base().timeouts().command())
            .await?;
        Ok(())
    }

    /// Everything between port allocation and the first health probe.
    async fn provision(&self, config: &InstallConfig, ports: &AllocatedPorts) -> Result<DeploymentSpec, InstallerError> {
        self.pre_install(config).await?;
        let spec = self.build_docker_compose(config, ports);
        tracing::debug!("Deployment spec for {}:\n{}", config.server_id, spec);
        self.deploy(config, &spec).await?;
        self.start_server(config).await?;
        self.post_install(config, ports).await?;
        Ok(spec)
    }
}
