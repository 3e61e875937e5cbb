// Remote execution - how commands reach a game host

mod docker;
mod dry_run;
mod ssh;

pub use docker::DockerExecutor;
pub use dry_run::{DryRunExecutor, RecordedCommand};
pub use ssh::SshExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("command on {host} timed out after {after:?}")]
    Timeout { host: String, after: Duration },

    #[error("failed to launch remote command on {host}: {source}")]
    Spawn {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("host {0} is unreachable: {1}")]
    Unreachable(String, String),

    #[error("docker error: {0}")]
    Docker(#[from] crate::docker::DockerError),
}

/// One machine of the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSpec {
    pub machine_id: String,
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Address players connect to, when it differs from `address`.
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Docker daemon TCP port, used by the docker executor.
    #[serde(default)]
    pub docker_port: Option<u16>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

impl HostSpec {
    pub fn new(machine_id: &str, address: &str) -> Self {
        Self {
            machine_id: machine_id.to_string(),
            address: address.to_string(),
            ssh_port: default_ssh_port(),
            user: default_user(),
            key_path: None,
            public_ip: None,
            docker_port: None,
        }
    }

    pub fn public_address(&self) -> &str {
        self.public_ip.as_deref().unwrap_or(&self.address)
    }
}

/// Lookup table of configured machines, keyed by machine id.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    hosts: HashMap<String, HostSpec>,
}

impl Fleet {
    pub fn new(hosts: impl IntoIterator<Item = HostSpec>) -> Self {
        Self {
            hosts: hosts.into_iter().map(|h| (h.machine_id.clone(), h)).collect(),
        }
    }

    pub fn get(&self, machine_id: &str) -> Option<&HostSpec> {
        self.hosts.get(machine_id)
    }

    pub fn contains(&self, machine_id: &str) -> bool {
        self.hosts.contains_key(machine_id)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostSpec> {
        self.hosts.values()
    }
}

/// Result of a finished remote command.
///
/// A non-zero exit code is a normal outcome, not an error: callers decide
/// what a failing command means for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands on fleet machines.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        host: &HostSpec,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError>;

    fn name(&self) -> &'static str;
}
