use crate::games::PortRole;
use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, InstallerError, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

pub const MAX_SEED: i64 = 2_147_483_647;
pub const WORLD_SIZE: (i64, i64) = (1000, 6000);

/// Rust servers always ship with the Oxide plugin framework.
pub struct RustInstaller {
    base: InstallerBase,
}

impl RustInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for RustInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        v.integer_setting(config.game_config.get("seed"), "seed", 0, MAX_SEED);
        v.integer_setting(config.game_config.get("worldSize"), "worldSize", WORLD_SIZE.0, WORLD_SIZE.1);
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;
        let query = ports.get(PortRole::Query).unwrap_or(ports.port + 1);
        let rcon = ports.get(PortRole::Rcon).unwrap_or(ports.port + 2);

        ComposeFile::new("rust", profile.docker_image, &config.container_name())
            .env("RUST_SERVER_IDENTITY", &config.server_id)
            .env("RUST_SERVER_NAME", &config.server_name)
            .env("RUST_SERVER_DESCRIPTION", setting(game, "description", ""))
            .env("RUST_SERVER_PORT", ports.port)
            .env("RUST_SERVER_QUERYPORT", query)
            .env("RUST_RCON_PORT", rcon)
            .env("RUST_SERVER_MAXPLAYERS", config.max_players)
            .env("RUST_SERVER_SEED", setting(game, "seed", "0"))
            .env("RUST_SERVER_WORLDSIZE", setting(game, "worldSize", "3000"))
            .env("RUST_SERVER_BRANCH", setting(game, "branch", "public"))
            .env("RUST_OXIDE_ENABLED", "1")
            .env("RUST_OXIDE_UPDATE_ON_BOOT", "1")
            .env_if_set("RUST_RCON_PASSWORD", &setting(game, "rconPassword", ""))
            .publish(ports)
            .volume("./data", "/steamcmd/rust")
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep RustDedicated || exit 1", 600)
            .render()
    }

    async fn post_install(&self, config: &InstallConfig, _ports: &AllocatedPorts) -> Result<(), InstallerError> {
        let oxide = format!("{}/data/oxide", config.server_dir());
        let command = format!(
            "mkdir -p {} {}",
            shell_words::quote(&format!("{}/plugins", oxide)),
            shell_words::quote(&format!("{}/config", oxide))
        );
        self.base
            .run_checked("post-install", &command, self.base.timeouts().command())
            .await?;
        Ok(())
    }
}
