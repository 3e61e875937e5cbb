use super::{AllocatedPort, AllocatedPorts, InstallerError};
use crate::config::TimeoutConfig;
use crate::games::{GameProfile, GameType};
use crate::ports::{PortError, PortRegistry, MAX_PORT};
use crate::remote::{ExecOutput, Fleet, HostSpec, RemoteExecutor};
use std::sync::Arc;
use std::time::Duration;

/// Shared collaborators handed to every installer.
#[derive(Clone)]
pub struct InstallerDeps {
    pub registry: Arc<PortRegistry>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub fleet: Arc<Fleet>,
    pub timeouts: TimeoutConfig,
}

/// State common to all installers: which game, which machine, and the
/// collaborators to reach it.
#[derive(Clone)]
pub struct InstallerBase {
    game_type: GameType,
    machine_id: String,
    deps: InstallerDeps,
}

impl InstallerBase {
    pub fn new(game_type: GameType, machine_id: &str, deps: InstallerDeps) -> Self {
        Self {
            game_type,
            machine_id: machine_id.to_string(),
            deps,
        }
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.deps.registry
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.deps.timeouts
    }

    pub fn host(&self) -> Result<&HostSpec, InstallerError> {
        self.deps
            .fleet
            .get(&self.machine_id)
            .ok_or_else(|| InstallerError::UnknownMachine(self.machine_id.clone()))
    }

    pub async fn run(&self, command: &str, timeout: Duration) -> Result<ExecOutput, InstallerError> {
        let host = self.host()?;
        tracing::debug!("[{}] {}", self.machine_id, command);
        Ok(self.deps.executor.execute(host, command, timeout).await?)
    }

    /// Like [`run`](Self::run), but a non-zero exit is an error naming `step`.
    pub async fn run_checked(
        &self,
        step: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, InstallerError> {
        let output = self.run(command, timeout).await?;
        if !output.success() {
            tracing::warn!(
                "{} on {} exited with {}: {}",
                step,
                self.machine_id,
                output.exit_code,
                output.stderr.trim()
            );
            return Err(InstallerError::CommandFailed {
                step: step.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Allocate every slot of the topology at `base_port + offset`, in order.
    /// On the first failure everything granted so far is released again.
    pub fn allocate_block(
        &self,
        profile: &GameProfile,
        base_port: u32,
        owner: &str,
    ) -> Result<AllocatedPorts, PortError> {
        let last = base_port + profile.port_span() as u32 - 1;
        if last > MAX_PORT {
            return Err(PortError::OutOfRange(last as i64));
        }

        let mut granted: Vec<AllocatedPort> = Vec::with_capacity(profile.topology.len());
        for slot in profile.topology {
            let port = base_port + slot.offset as u32;
            match self
                .deps
                .registry
                .allocate(profile.game_type, port, slot.protocol, owner)
            {
                Ok(allocation) => granted.push(AllocatedPort {
                    role: slot.role,
                    port: allocation.port,
                    protocol: slot.protocol,
                }),
                Err(e) => {
                    for p in &granted {
                        self.deps.registry.release(p.port, p.protocol);
                    }
                    if !granted.is_empty() {
                        tracing::debug!(
                            "Rolled back {} port(s) of {} after: {}",
                            granted.len(),
                            owner,
                            e
                        );
                    }
                    return Err(e);
                }
            }
        }

        Ok(AllocatedPorts {
            port: base_port as u16,
            ports: granted,
        })
    }
}
