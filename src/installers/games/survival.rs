use crate::games::GameType;
use crate::installers::{
    setting, AllocatedPorts, ComposeFile, DeploymentSpec, GameInstaller, InstallConfig,
    InstallerBase, ValidationResult, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Container layout of a single-port survival game.
struct Layout {
    service: &'static str,
    port_var: &'static str,
    players_var: &'static str,
    name_var: &'static str,
    password_var: &'static str,
    volume: &'static str,
    process: &'static str,
}

fn layout(game_type: GameType) -> Layout {
    match game_type {
        GameType::ConanExiles => Layout {
            service: "conan",
            port_var: "CONANEXILES_Game_Port",
            players_var: "CONANEXILES_Game_MaxPlayers",
            name_var: "CONANEXILES_ServerSettings_ServerName",
            password_var: "CONANEXILES_ServerSettings_ServerPassword",
            volume: "/conanexiles",
            process: "ConanSandboxServer",
        },
        GameType::Dayz => Layout {
            service: "dayz",
            port_var: "DAYZ_PORT",
            players_var: "DAYZ_MAX_PLAYERS",
            name_var: "DAYZ_HOSTNAME",
            password_var: "DAYZ_PASSWORD",
            volume: "/serverfiles",
            process: "DayZServer",
        },
        GameType::ProjectZomboid => Layout {
            service: "zomboid",
            port_var: "DEFAULT_PORT",
            players_var: "MAX_PLAYERS",
            name_var: "SERVER_NAME",
            password_var: "SERVER_PASSWORD",
            volume: "/home/steam/ZomboidDedicatedServer",
            process: "ProjectZomboid64",
        },
        _ => Layout {
            service: "enshrouded",
            port_var: "PORT",
            players_var: "SERVER_SLOTS",
            name_var: "SERVER_NAME",
            password_var: "SERVER_PASSWORD",
            volume: "/home/steam/enshrouded/savegame",
            process: "enshrouded_server",
        },
    }
}

/// Conan Exiles, DayZ, Project Zomboid and Enshrouded: one game port and a
/// handful of settings passed through the environment.
pub struct SurvivalInstaller {
    base: InstallerBase,
}

impl SurvivalInstaller {
    pub fn new(base: InstallerBase) -> Self {
        Self { base }
    }

    pub(crate) fn build(base: InstallerBase) -> Arc<dyn GameInstaller> {
        Arc::new(Self::new(base))
    }
}

#[async_trait]
impl GameInstaller for SurvivalInstaller {
    fn base(&self) -> &InstallerBase {
        &self.base
    }

    fn validate_config(&self, config: &InstallConfig) -> ValidationResult {
        Validator::common(&self.profile(), config).finish()
    }

    fn build_docker_compose(&self, config: &InstallConfig, ports: &AllocatedPorts) -> DeploymentSpec {
        let profile = self.profile();
        let game = &config.game_config;
        let layout = layout(self.game_type());

        let mut compose = ComposeFile::new(layout.service, profile.docker_image, &config.container_name())
            .env(layout.name_var, &config.server_name)
            .env(layout.port_var, ports.port)
            .env(layout.players_var, config.max_players)
            .env_if_set(layout.password_var, &setting(game, "serverPassword", ""));
        compose = match self.game_type() {
            GameType::ConanExiles => compose.env("CONANEXILES_ServerSettings_PVPEnabled", setting(game, "pvp", "false")),
            GameType::Dayz => compose.env("DAYZ_MISSION", setting(game, "mission", "dayzOffline.chernarusplus")),
            GameType::ProjectZomboid => compose
                .env("PVP", setting(game, "pvp", "true"))
                .env_if_set("MOD_NAMES", &setting(game, "mods", "")),
            _ => compose,
        };

        compose
            .publish(ports)
            .volume("./data", layout.volume)
            .limits(profile.cpus, config.ram_mb)
            .healthcheck(&format!("pgrep -f {} || exit 1", layout.process), 600)
            .render()
    }
}
