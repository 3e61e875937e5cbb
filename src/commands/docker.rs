// Docker-related commands

use crate::docker::DockerManager;
use crate::remote::HostSpec;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DockerStatus {
    pub machine_id: String,
    pub available: bool,
    pub running: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DockerInfo {
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
    pub containers_running: u64,
    pub containers_total: u64,
    pub images: u64,
}

/// Check if the Docker daemon of a machine is reachable and running
pub async fn check_docker_status(host: &HostSpec) -> Result<DockerStatus, String> {
    let status = |available, running, error| DockerStatus {
        machine_id: host.machine_id.clone(),
        available,
        running,
        error,
    };
    match DockerManager::connect(host) {
        Ok(docker) => match docker.ping().await {
            Ok(_) => Ok(status(true, true, None)),
            Err(e) => Ok(status(true, false, Some(format!("Docker not responding: {}", e)))),
        },
        Err(e) => Ok(status(false, false, Some(format!("Docker not available: {}", e)))),
    }
}

/// Get Docker system information of a machine
pub async fn get_docker_info(host: &HostSpec) -> Result<DockerInfo, String> {
    let docker = DockerManager::connect(host).map_err(|e| e.to_string())?;
    docker.get_info().await.map_err(|e| e.to_string())
}
