// Docker Manager - talks to the Docker daemon of a fleet machine

use crate::commands::docker::DockerInfo;
use crate::remote::{ExecOutput, HostSpec};
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Image of the one-shot helper that enters the host namespaces.
pub const HELPER_IMAGE: &str = "alpine:3.20";

const DEFAULT_DAEMON_PORT: u16 = 2375;

/// Upper bound for removing a helper container after its command.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection error: {0}")]
    ConnectionError(#[from] bollard::errors::Error),

    #[error("Image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
}

pub struct DockerManager {
    docker: Docker,
    helper_ready: OnceCell<()>,
}

impl DockerManager {
    /// Connect to the local daemon
    pub fn local() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::with_client(docker))
    }

    /// Connect to the daemon of a fleet machine.
    /// A `localhost` machine without an explicit daemon port uses the local socket.
    pub fn connect(host: &HostSpec) -> Result<Self, DockerError> {
        if host.docker_port.is_none() && host.address == "localhost" {
            return Self::local();
        }
        let port = host.docker_port.unwrap_or(DEFAULT_DAEMON_PORT);
        let addr = format!("tcp://{}:{}", host.address, port);
        tracing::debug!("Connecting to Docker daemon at {}", addr);
        let docker = Docker::connect_with_http(&addr, 120, bollard::API_DEFAULT_VERSION)?;
        Ok(Self::with_client(docker))
    }

    fn with_client(docker: Docker) -> Self {
        Self {
            docker,
            helper_ready: OnceCell::new(),
        }
    }

    /// Ping Docker to check if it's running
    pub async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await?;
        Ok(())
    }

    /// Get Docker system information
    pub async fn get_info(&self) -> Result<DockerInfo, DockerError> {
        let info = self.docker.info().await?;
        let version = self.docker.version().await?;

        Ok(DockerInfo {
            version: version.version.unwrap_or_default(),
            api_version: version.api_version.unwrap_or_default(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
            containers_running: info.containers_running.unwrap_or(0) as u64,
            containers_total: info.containers.unwrap_or(0) as u64,
            images: info.images.unwrap_or(0) as u64,
        })
    }

    /// Pull a Docker image
    pub async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        tracing::info!("Pulling image: {}", image);
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!("Pulling {}: {}", image, status);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to pull image {}: {}", image, e);
                    return Err(DockerError::ImagePullFailed(e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Run a shell command in the host's namespaces.
    ///
    /// A privileged one-off container sharing the host PID namespace enters
    /// PID 1 with nsenter, so the command sees the host filesystem, network
    /// and Docker CLI exactly like an SSH session would. `timeout` covers the
    /// helper image pull, the container creation and the command itself; the
    /// container is removed afterwards either way.
    pub async fn run_host_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, DockerError> {
        let container_name = format!("serverwave-exec-{}", &Uuid::new_v4().simple().to_string()[..8]);

        let result = tokio::time::timeout(timeout, self.run_helper(&container_name, command)).await;
        self.remove_container(&container_name, timeout.min(CLEANUP_TIMEOUT)).await;

        match result {
            Ok(output) => output,
            Err(_) => Err(DockerError::Timeout(timeout)),
        }
    }

    /// Pull the helper image the first time this daemon needs it.
    async fn ensure_helper(&self) -> Result<(), DockerError> {
        self.helper_ready
            .get_or_try_init(|| self.pull_image(HELPER_IMAGE))
            .await?;
        Ok(())
    }

    async fn run_helper(&self, container_name: &str, command: &str) -> Result<ExecOutput, DockerError> {
        use base64::Engine;

        self.ensure_helper().await?;

        // Encode the command to base64 to avoid shell escaping issues
        let encoded = base64::engine::general_purpose::STANDARD.encode(command);
        let cmd = format!(
            "nsenter -t 1 -m -u -n -i sh -c \"$(echo '{}' | base64 -d)\"",
            encoded
        );

        let host_config = HostConfig {
            privileged: Some(true),
            pid_mode: Some("host".to_string()),
            network_mode: Some("host".to_string()),
            ..Default::default()
        };

        let config = Config {
            image: Some(HELPER_IMAGE.to_string()),
            cmd: Some(vec!["/bin/sh".to_string(), "-c".to_string(), cmd]),
            host_config: Some(host_config),
            tty: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: container_name,
            platform: None,
        });

        let container = self.docker.create_container(options, config).await?;
        tracing::debug!("Created exec container {} ({})", container_name, container.id);
        self.collect_output(&container.id).await
    }

    async fn collect_output(&self, container_id: &str) -> Result<ExecOutput, DockerError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;

        let log_options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            timestamps: false,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut log_stream = self.docker.logs(container_id, Some(log_options));

        loop {
            // Use timeout to periodically check if container is still running
            match tokio::time::timeout(Duration::from_secs(1), log_stream.next()).await {
                Ok(Some(Ok(output))) => match output {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        stdout.push_str(&String::from_utf8_lossy(&message))
                    }
                    LogOutput::StdErr { message } => stderr.push_str(&String::from_utf8_lossy(&message)),
                    _ => {}
                },
                Ok(Some(Err(e))) => {
                    tracing::warn!("Log stream error: {}", e);
                    break;
                }
                Ok(None) => break,
                Err(_) => match self.docker.inspect_container(container_id, None).await {
                    Ok(info) => {
                        if info.state.and_then(|s| s.running) != Some(true) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
            }
        }

        let exit_code = match self.docker.inspect_container(container_id, None).await {
            Ok(info) => info.state.and_then(|s| s.exit_code).unwrap_or(-1),
            Err(e) => {
                tracing::error!("Failed to inspect container for exit code: {}", e);
                -1
            }
        };

        tracing::debug!("Exec container finished with exit code: {}", exit_code);
        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Force-remove a helper container by name. A container that was never
    /// created is not an error.
    async fn remove_container(&self, container_name: &str, timeout: Duration) {
        let removal = self.docker.remove_container(
            container_name,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        );
        match tokio::time::timeout(timeout, removal).await {
            Ok(Ok(())) => {}
            Ok(Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. })) => {}
            Ok(Err(e)) => tracing::warn!("Failed to remove exec container {}: {}", container_name, e),
            Err(_) => tracing::warn!("Removing exec container {} timed out", container_name),
        }
    }
}
