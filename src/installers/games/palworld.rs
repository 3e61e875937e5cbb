use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct PalworldInstaller {
    base: InstallerBase,
}

impl PalworldInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for PalworldInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        let difficulty = setting(&config.game_config, "difficulty", "Normal");
        v.check(
            matches!(difficulty.as_str(), "None" | "Casual" | "Normal" | "Hard"),
            format!("difficulty '{}' is not one of None, Casual, Normal, Hard", difficulty),
        );
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;

        ComposeFile::new("palworld", profile.docker_image, &config.container_name())
            .env("PORT", ports.port)
            .env("PLAYERS", config.max_players)
            .env("SERVER_NAME", &config.server_name)
            .env("DIFFICULTY", setting(game, "difficulty", "Normal"))
            .env("COMMUNITY", setting(game, "community", "false"))
            .env("MULTITHREADING", "true")
            .env_if_set("SERVER_PASSWORD", &setting(game, "serverPassword", ""))
            .publish(ports)
            .volume("./data", "/palworld")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep -f PalServer || exit 1", 300)
            .render()
    }
}
