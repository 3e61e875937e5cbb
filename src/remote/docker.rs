// Docker executor - reaches hosts through their Docker daemon instead of SSH

use super::{ExecOutput, HostSpec, RemoteError, RemoteExecutor};
use crate::docker::{DockerError, DockerManager};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Keeps one daemon connection per machine, so each daemon pulls the helper
/// image at most once.
#[derive(Default)]
pub struct DockerExecutor {
    managers: Mutex<HashMap<String, Arc<DockerManager>>>,
}

impl DockerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn manager(&self, host: &HostSpec) -> Result<Arc<DockerManager>, DockerError> {
        let mut managers = self.managers.lock();
        if let Some(existing) = managers.get(&host.machine_id) {
            return Ok(existing.clone());
        }
        let manager = Arc::new(DockerManager::connect(host)?);
        managers.insert(host.machine_id.clone(), manager.clone());
        Ok(manager)
    }
}

#[async_trait]
impl RemoteExecutor for DockerExecutor {
    async fn execute(
        &self,
        host: &HostSpec,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        tracing::debug!("docker exec on {}: {}", host.machine_id, command);
        let docker = self.manager(host)?;
        match docker.run_host_command(command, timeout).await {
            Ok(output) => Ok(output),
            Err(DockerError::Timeout(after)) => Err(RemoteError::Timeout {
                host: host.machine_id.clone(),
                after,
            }),
            Err(DockerError::ConnectionError(e)) => {
                Err(RemoteError::Unreachable(host.machine_id.clone(), e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_connection_per_machine() {
        let executor = DockerExecutor::new();
        let mut host = HostSpec::new("m1", "10.0.0.1");
        host.docker_port = Some(2375);
        let first = executor.manager(&host).unwrap();
        let second = executor.manager(&host).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = HostSpec::new("m2", "10.0.0.2");
        assert!(!Arc::ptr_eq(&first, &executor.manager(&other).unwrap()));
    }
}
