use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

const GAME_MODES: [&str; 5] = ["casual", "competitive", "wingman", "deathmatch", "armsrace"];

pub struct Cs2Installer {
    base: InstallerBase,
}

impl Cs2Installer {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for Cs2Installer {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        let mode = setting(&config.game_config, "gameMode", "competitive");
        v.check(
            GAME_MODES.contains(&mode.as_str()),
            format!("gameMode '{}' must be one of {}", mode, GAME_MODES.join(", ")),
        );
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;

        ComposeFile::new("cs2", profile.docker_image, &config.container_name())
            .env("CS2_SERVERNAME", &config.server_name)
            .env("CS2_PORT", ports.port)
            .env("CS2_MAXPLAYERS", config.max_players)
            .env("CS2_STARTMAP", setting(game, "map", "de_inferno"))
            .env("CS2_GAMEALIAS", setting(game, "gameMode", "competitive"))
            .env_if_set("CS2_PW", &setting(game, "serverPassword", ""))
            .publish(ports)
            .volume("./data", "/home/steam/cs2-dedicated")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep -f cs2 || exit 1", 600)
            .render()
    }
}
