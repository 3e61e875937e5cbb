use crate::games::{GameType, PortRole};
use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

/// The Forest and Sons of the Forest share a server layout.
pub struct ForestInstaller {
    base: InstallerBase,
}

impl ForestInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }

    fn layout(&self) -> (&'static str, &'static str, &'static str) {
        match self.base.game_type() {
            GameType::SonsOfTheForest => ("sotf", "/sonsoftheforest", "SonsOfTheForestDS"),
            _ => ("theforest", "/theforest", "TheForestDedicatedServer"),
        }
    }
}

#[async_trait]
impl GameInstaller for ForestInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        let difficulty = setting(&config.game_config, "difficulty", "Normal");
        v.check(
            matches!(difficulty.as_str(), "Peaceful" | "Normal" | "Hard" | "HardSurvival"),
            format!("difficulty '{}' is not supported", difficulty),
        );
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;
        let (service, volume, process) = self.layout();

        let mut compose = ComposeFile::new(service, profile.docker_image, &config.container_name())
            .env("SERVER_NAME", &config.server_name)
            .env("SERVER_GAME_PORT", ports.port)
            .env("SERVER_MAX_PLAYERS", config.max_players)
            .env("SERVER_DIFFICULTY", setting(game, "difficulty", "Normal"))
            .env_if_set("SERVER_PASSWORD", &setting(game, "serverPassword", ""));
        if let Some(steam) = ports.get(PortRole::SteamPeer) {
            compose = compose.env("SERVER_STEAM_PORT", steam);
        }

        compose
            .publish(ports)
            .volume("./data", volume)
            .limits(profile.cpus, config.ram_mb)
            .healthcheck(&format!("pgrep -f {} || exit 1", process), 600)
            .render()
    }
}
