use crate::games::PortRole;
use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SatisfactoryInstaller {
    base: InstallerBase,
}

impl SatisfactoryInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for SatisfactoryInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        v.integer_setting(config.game_config.get("autosaveInterval"), "autosaveInterval", 60, 3600);
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;

        ComposeFile::new("satisfactory", profile.docker_image, &config.container_name())
            .env("MAXPLAYERS", config.max_players)
            .env("SERVERGAMEPORT", ports.port)
            .env("SERVERBEACONPORT", ports.get(PortRole::Beacon).unwrap_or(ports.port + 1))
            .env("SERVERQUERYPORT", ports.get(PortRole::Query).unwrap_or(ports.port + 2))
            .env("AUTOSAVEINTERVAL", setting(game, "autosaveInterval", "900"))
            .env("AUTOPAUSE", setting(game, "autopause", "true"))
            .env("STEAMBETA", setting(game, "experimental", "false"))
            .publish(ports)
            .volume("./config", "/config")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep -f FactoryServer || exit 1", 600)
            .render()
    }
}
