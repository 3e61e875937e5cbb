use crate::games::{GameType, PortRole};
use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArkEdition {
    Ascended,
    /// The pre-Unreal 5 release, still sold and hosted.
    Evolved,
}

impl ArkEdition {
    fn for_game(game_type: GameType) -> Self {
        match game_type {
            GameType::ArkEvolved => ArkEdition::Evolved,
            _ => ArkEdition::Ascended,
        }
    }
}

/// Serves both ARK editions; they differ in image, ports and install path.
pub struct ArkInstaller {
    base: InstallerBase,
    edition: ArkEdition,
}

impl ArkInstaller {
    pub fn new(base: InstallerBase) -> Self {
        let edition = ArkEdition::for_game(base.game_type());
        Self { base, edition }
    }

    pub fn edition(&self) -> ArkEdition {
        self.edition
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for ArkInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        let mut v = Validator::common(&self.profile(), config);
        let map = setting(&config.game_config, "map", "TheIsland_WP");
        v.check(
            !map.is_empty() && map.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "map must be a plain map identifier",
        );
        v.finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;
        let (service, volume) = match self.edition {
            ArkEdition::Ascended => ("ark-ascended", "/home/steam/ark-ascended"),
            ArkEdition::Evolved => ("ark-evolved", "/home/steam/ark"),
        };

        let mut compose = ComposeFile::new(service, profile.docker_image, &config.container_name())
            .env("SESSION_NAME", &config.server_name)
            .env("SERVER_MAP", setting(game, "map", "TheIsland_WP"))
            .env("MAX_PLAYERS", config.max_players)
            .env("GAME_PORT", ports.port)
            .env("QUERY_PORT", ports.get(PortRole::Query).unwrap_or(ports.port + 1))
            .env("RCON_PORT", ports.get(PortRole::Rcon).unwrap_or(ports.port + 3))
            .env("BATTLEYE", setting(game, "battleye", "true"))
            .env_if_set("SERVER_PASSWORD", &setting(game, "serverPassword", ""))
            .env_if_set("CLUSTER_ID", &setting(game, "clusterId", ""));
        if let Some(peer) = ports.get(PortRole::SteamPeer) {
            compose = compose.env("STEAM_PEER_PORT", peer);
        }
        if let Some(raw) = ports.get(PortRole::RawSocket) {
            compose = compose.env("RAW_SOCKET_PORT", raw);
        }

        compose
            .publish(ports)
            .volume("./data", volume)
            .limits(profile.cpus, config.ram_mb)
            .healthcheck("pgrep -f ShooterGameServer || exit 1", 900)
            .render()
    }
}
