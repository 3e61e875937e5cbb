use crate::games::PortRole;
use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SevenDaysInstaller {
    base: InstallerBase,
}

impl SevenDaysInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for SevenDaysInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        v.integer_setting(config.game_config.get("gameDifficulty"), "gameDifficulty", 0, 5);
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;

        ComposeFile::new("sdtd", profile.docker_image, &config.container_name())
            .env("START_MODE", "1")
            .env("SERVER_NAME", &config.server_name)
            .env("SERVER_PORT", ports.port)
            .env("SERVER_MAX_PLAYERS", config.max_players)
            .env("GAME_WORLD", setting(game, "gameWorld", "Navezgane"))
            .env("GAME_DIFFICULTY", setting(game, "gameDifficulty", "2"))
            .env("TELNET_PORT", ports.get(PortRole::Telnet).unwrap_or(ports.port + 2))
            .env("WEB_DASHBOARD_PORT", ports.get(PortRole::WebMap).unwrap_or(ports.port + 3))
            .env("WEB_DASHBOARD_ENABLED", setting(game, "webMapEnabled", "true"))
            .publish(ports)
            .volume("./data", "/home/sdtdserver/.local/share/7DaysToDie")
            .volume("./serverfiles", "/home/sdtdserver/serverfiles")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep -f 7DaysToDieServer || exit 1", 600)
            .render()
    }
}
