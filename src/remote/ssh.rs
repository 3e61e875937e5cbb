// SSH executor - runs commands through the system ssh client

use super::{ExecOutput, HostSpec, RemoteError, RemoteExecutor};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub struct SshExecutor {
    connect_timeout_secs: u64,
}

impl SshExecutor {
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self { connect_timeout_secs }
    }

    /// Arguments handed to `ssh`, without the program name.
    fn args(&self, host: &HostSpec, command: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(key) = &host.key_path {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().to_string());
        }
        args.extend([
            "-p".to_string(),
            host.ssh_port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            format!("{}@{}", host.user, host.address),
            command.to_string(),
        ]);
        args
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        host: &HostSpec,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        let args = self.args(host, command);
        tracing::debug!("ssh {}", shell_words::join(&args));

        let child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RemoteError::Spawn {
                host: host.machine_id.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| RemoteError::Spawn {
                host: host.machine_id.clone(),
                source,
            })?,
            Err(_) => {
                tracing::warn!("Command on {} timed out after {:?}", host.machine_id, timeout);
                return Err(RemoteError::Timeout {
                    host: host.machine_id.clone(),
                    after: timeout,
                });
            }
        };

        // ssh reserves 255 for its own connection failures
        let exit_code = output.status.code().map(i64::from).unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if exit_code == 255 {
            return Err(RemoteError::Unreachable(host.machine_id.clone(), stderr.trim().to_string()));
        }

        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}
