use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MinecraftInstaller {
    base: InstallerBase,
}

impl MinecraftInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for MinecraftInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        v.integer_setting(config.game_config.get("viewDistance"), "viewDistance", 3, 32);
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;
        // Leave headroom for the JVM outside the heap
        let heap_mb = config.ram_mb.saturating_sub(512).max(512);

        ComposeFile::new("minecraft", profile.docker_image, &config.container_name())
            .env("EULA", "TRUE")
            .env("TYPE", "PAPER")
            .env("VERSION", setting(game, "version", "LATEST"))
            .env("MEMORY", format!("{}M", heap_mb))
            .env("SERVER_PORT", ports.port)
            .env("MAX_PLAYERS", config.max_players)
            .env("MOTD", &config.server_name)
            .env("DIFFICULTY", setting(game, "difficulty", "normal"))
            .env("MODE", setting(game, "gamemode", "survival"))
            .env("PVP", setting(game, "pvp", "true"))
            .env("VIEW_DISTANCE", setting(game, "viewDistance", "10"))
            .env("ONLINE_MODE", setting(game, "onlineMode", "true"))
            .publish(ports)
            .volume("./data", "/data")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("mc-health", 120)
            .render()
    }
}
