use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

/// The Valheim server refuses passwords shorter than this.
pub const MIN_PASSWORD_LEN: usize = 5;

pub struct ValheimInstaller {
    base: InstallerBase,
}

impl ValheimInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for ValheimInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        let password = setting(&config.game_config, "serverPassword", "");
        if !password.is_empty() {
            v.check(
                password.chars().count() >= MIN_PASSWORD_LEN,
                format!("serverPassword must be at least {} characters", MIN_PASSWORD_LEN),
            );
            v.check(
                !config.server_name.contains(&password),
                "serverPassword must not be part of the server name",
            );
        }
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;

        ComposeFile::new("valheim", profile.docker_image, &config.container_name())
            .env("SERVER_NAME", &config.server_name)
            .env("SERVER_PORT", ports.port)
            .env("WORLD_NAME", setting(game, "worldName", "Dedicated"))
            .env("SERVER_PUBLIC", setting(game, "public", "true"))
            .env_if_set("SERVER_PASS", &setting(game, "serverPassword", ""))
            .publish(ports)
            .volume("./config", "/config")
            .volume("./data", "/opt/valheim")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep valheim_server || exit 1", 300)
            .render()
    }
}
