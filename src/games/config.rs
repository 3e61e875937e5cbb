use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every game the platform knows how to provision.
///
/// The set is closed: adding a value requires a matching installer
/// registration in the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    Minecraft,
    Rust,
    ArkAscended,
    ArkEvolved,
    Satisfactory,
    SevenDaysToDie,
    Valheim,
    TheForest,
    SonsOfTheForest,
    ConanExiles,
    Dayz,
    ProjectZomboid,
    Palworld,
    Enshrouded,
    Cs2,
}

impl GameType {
    pub const ALL: [GameType; 15] = [
        GameType::Minecraft,
        GameType::Rust,
        GameType::ArkAscended,
        GameType::ArkEvolved,
        GameType::Satisfactory,
        GameType::SevenDaysToDie,
        GameType::Valheim,
        GameType::TheForest,
        GameType::SonsOfTheForest,
        GameType::ConanExiles,
        GameType::Dayz,
        GameType::ProjectZomboid,
        GameType::Palworld,
        GameType::Enshrouded,
        GameType::Cs2,
    ];

    /// Canonical identifier, e.g. `SEVEN_DAYS_TO_DIE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Minecraft => "MINECRAFT",
            GameType::Rust => "RUST",
            GameType::ArkAscended => "ARK_ASCENDED",
            GameType::ArkEvolved => "ARK_EVOLVED",
            GameType::Satisfactory => "SATISFACTORY",
            GameType::SevenDaysToDie => "SEVEN_DAYS_TO_DIE",
            GameType::Valheim => "VALHEIM",
            GameType::TheForest => "THE_FOREST",
            GameType::SonsOfTheForest => "SONS_OF_THE_FOREST",
            GameType::ConanExiles => "CONAN_EXILES",
            GameType::Dayz => "DAYZ",
            GameType::ProjectZomboid => "PROJECT_ZOMBOID",
            GameType::Palworld => "PALWORLD",
            GameType::Enshrouded => "ENSHROUDED",
            GameType::Cs2 => "CS2",
        }
    }

    /// Lowercase slug used for container names and host directories.
    pub fn slug(&self) -> String {
        self.as_str().to_ascii_lowercase().replace('_', "-")
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game type '{0}'")]
pub struct ParseGameTypeError(pub String);

impl FromStr for GameType {
    type Err = ParseGameTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        GameType::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == normalized)
            .ok_or_else(|| ParseGameTypeError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
    Both,
}

impl PortProtocol {
    /// The concrete transport keys this protocol occupies in the registry.
    pub fn transports(&self) -> &'static [PortProtocol] {
        match self {
            PortProtocol::Tcp => &[PortProtocol::Tcp],
            PortProtocol::Udp => &[PortProtocol::Udp],
            PortProtocol::Both => &[PortProtocol::Tcp, PortProtocol::Udp],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
            PortProtocol::Both => "both",
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(PortProtocol::Tcp),
            "udp" => Ok(PortProtocol::Udp),
            "both" => Ok(PortProtocol::Both),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}

/// What a port is used for inside a game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortRole {
    Game,
    Query,
    Rcon,
    Beacon,
    SteamPeer,
    RawSocket,
    Telnet,
    WebMap,
}

/// One port of a game's topology, relative to the primary port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSlot {
    pub role: PortRole,
    pub offset: u16,
    pub protocol: PortProtocol,
}

const fn slot(role: PortRole, offset: u16, protocol: PortProtocol) -> PortSlot {
    PortSlot { role, offset, protocol }
}

/// Static facts about a game: image, port topology and resource envelope.
#[derive(Debug, Clone)]
pub struct GameProfile {
    pub game_type: GameType,
    pub name: &'static str,
    pub docker_image: &'static str,
    pub default_port: u16,
    pub topology: &'static [PortSlot],
    pub max_players: (u32, u32),
    pub ram_mb: (u32, u32),
    pub recommended_ram_mb: u32,
    pub cpus: f32,
    /// Path of the main config file, relative to the server directory.
    pub config_path: &'static str,
}

impl GameProfile {
    /// Distance between the lowest and highest port of the topology.
    pub fn port_span(&self) -> u16 {
        self.topology.iter().map(|s| s.offset).max().unwrap_or(0) + 1
    }
}

use PortProtocol::{Both, Tcp, Udp};
use PortRole::*;

static MINECRAFT_PORTS: [PortSlot; 1] = [slot(Game, 0, Both)];
static RUST_PORTS: [PortSlot; 3] = [slot(Game, 0, Udp), slot(Query, 1, Udp), slot(Rcon, 2, Tcp)];
static ARK_ASCENDED_PORTS: [PortSlot; 6] = [
    slot(Game, 0, Udp),
    slot(Query, 1, Udp),
    slot(Beacon, 2, Udp),
    slot(SteamPeer, 3, Udp),
    slot(Rcon, 4, Tcp),
    slot(RawSocket, 5, Udp),
];
static ARK_EVOLVED_PORTS: [PortSlot; 4] = [
    slot(Game, 0, Udp),
    slot(Query, 1, Udp),
    slot(Beacon, 2, Udp),
    slot(Rcon, 3, Tcp),
];
static SATISFACTORY_PORTS: [PortSlot; 3] =
    [slot(Game, 0, Both), slot(Beacon, 1, Tcp), slot(Query, 2, Udp)];
static SEVEN_DAYS_PORTS: [PortSlot; 4] = [
    slot(Game, 0, Both),
    slot(Query, 1, Udp),
    slot(Telnet, 2, Tcp),
    slot(WebMap, 3, Tcp),
];
static VALHEIM_PORTS: [PortSlot; 2] = [slot(Game, 0, Udp), slot(Query, 1, Udp)];
static THE_FOREST_PORTS: [PortSlot; 2] = [slot(Game, 0, Udp), slot(SteamPeer, 1, Udp)];
static SINGLE_UDP: [PortSlot; 1] = [slot(Game, 0, Udp)];
static SINGLE_BOTH: [PortSlot; 1] = [slot(Game, 0, Both)];

/// Look up the static profile of a game.
pub fn profile(game_type: GameType) -> GameProfile {
    match game_type {
        GameType::Minecraft => GameProfile {
            game_type,
            name: "Minecraft",
            docker_image: "itzg/minecraft-server:latest",
            default_port: 25565,
            topology: &MINECRAFT_PORTS,
            max_players: (1, 100),
            ram_mb: (512, 32768),
            recommended_ram_mb: 4096,
            cpus: 4.0,
            config_path: "data/server.properties",
        },
        GameType::Rust => GameProfile {
            game_type,
            name: "Rust",
            docker_image: "didstopia/rust-server:latest",
            default_port: 28015,
            topology: &RUST_PORTS,
            max_players: (10, 1000),
            ram_mb: (2048, 32768),
            recommended_ram_mb: 8000,
            cpus: 8.0,
            config_path: "data/server/rust/cfg/server.cfg",
        },
        GameType::ArkAscended => GameProfile {
            game_type,
            name: "ARK: Survival Ascended",
            docker_image: "serverwave/ark-ascended:latest",
            default_port: 27015,
            topology: &ARK_ASCENDED_PORTS,
            max_players: (1, 255),
            ram_mb: (8192, 65536),
            recommended_ram_mb: 16384,
            cpus: 8.0,
            config_path: "data/ShooterGame/Saved/Config/WindowsServer/GameUserSettings.ini",
        },
        GameType::ArkEvolved => GameProfile {
            game_type,
            name: "ARK: Survival Evolved",
            docker_image: "serverwave/ark-evolved:latest",
            default_port: 27015,
            topology: &ARK_EVOLVED_PORTS,
            max_players: (1, 255),
            ram_mb: (8192, 65536),
            recommended_ram_mb: 12288,
            cpus: 6.0,
            config_path: "data/ShooterGame/Saved/Config/LinuxServer/GameUserSettings.ini",
        },
        GameType::Satisfactory => GameProfile {
            game_type,
            name: "Satisfactory",
            docker_image: "wolveix/satisfactory-server:latest",
            default_port: 17777,
            topology: &SATISFACTORY_PORTS,
            max_players: (1, 16),
            ram_mb: (8192, 32768),
            recommended_ram_mb: 12288,
            cpus: 4.0,
            config_path: "config/gamefiles/FactoryGame/Saved/Config/LinuxServer/Game.ini",
        },
        GameType::SevenDaysToDie => GameProfile {
            game_type,
            name: "7 Days to Die",
            docker_image: "vinanrra/7dtd-server:latest",
            default_port: 26900,
            topology: &SEVEN_DAYS_PORTS,
            max_players: (1, 64),
            ram_mb: (4096, 32768),
            recommended_ram_mb: 8192,
            cpus: 4.0,
            config_path: "data/serverconfig.xml",
        },
        GameType::Valheim => GameProfile {
            game_type,
            name: "Valheim",
            docker_image: "lloesche/valheim-server:latest",
            default_port: 12456,
            topology: &VALHEIM_PORTS,
            max_players: (1, 64),
            ram_mb: (2048, 16384),
            recommended_ram_mb: 4096,
            cpus: 2.0,
            config_path: "config/start_server.sh",
        },
        GameType::TheForest => GameProfile {
            game_type,
            name: "The Forest",
            docker_image: "jammsen/the-forest-dedicated-server:latest",
            default_port: 18766,
            topology: &THE_FOREST_PORTS,
            max_players: (1, 8),
            ram_mb: (4096, 16384),
            recommended_ram_mb: 4096,
            cpus: 2.0,
            config_path: "data/config/config.cfg",
        },
        GameType::SonsOfTheForest => GameProfile {
            game_type,
            name: "Sons of the Forest",
            docker_image: "jammsen/sons-of-the-forest-dedicated-server:latest",
            default_port: 18766,
            topology: &SINGLE_UDP,
            max_players: (1, 8),
            ram_mb: (4096, 16384),
            recommended_ram_mb: 8192,
            cpus: 4.0,
            config_path: "data/userdata/dedicatedserver.cfg",
        },
        GameType::ConanExiles => GameProfile {
            game_type,
            name: "Conan Exiles",
            docker_image: "alinmear/docker-conanexiles:latest",
            default_port: 17777,
            topology: &SINGLE_UDP,
            max_players: (1, 70),
            ram_mb: (4096, 32768),
            recommended_ram_mb: 8192,
            cpus: 4.0,
            config_path: "data/ConanSandbox/Saved/Config/WindowsServer/Engine.ini",
        },
        GameType::Dayz => GameProfile {
            game_type,
            name: "DayZ",
            docker_image: "serverwave/dayz-server:latest",
            default_port: 12302,
            topology: &SINGLE_UDP,
            max_players: (1, 127),
            ram_mb: (4096, 32768),
            recommended_ram_mb: 8192,
            cpus: 4.0,
            config_path: "data/serverDZ.cfg",
        },
        GameType::ProjectZomboid => GameProfile {
            game_type,
            name: "Project Zomboid",
            docker_image: "renegademaster/zomboid-dedicated-server:latest",
            default_port: 16261,
            topology: &SINGLE_UDP,
            max_players: (1, 100),
            ram_mb: (2048, 32768),
            recommended_ram_mb: 4096,
            cpus: 2.0,
            config_path: "data/Zomboid/Server/servertest.ini",
        },
        GameType::Palworld => GameProfile {
            game_type,
            name: "Palworld",
            docker_image: "thijsvanloef/palworld-server-docker:latest",
            default_port: 18211,
            topology: &SINGLE_UDP,
            max_players: (1, 32),
            ram_mb: (8192, 32768),
            recommended_ram_mb: 16384,
            cpus: 4.0,
            config_path: "data/Pal/Saved/Config/LinuxServer/PalWorldSettings.ini",
        },
        GameType::Enshrouded => GameProfile {
            game_type,
            name: "Enshrouded",
            docker_image: "sknnr/enshrouded-dedicated-server:latest",
            default_port: 15636,
            topology: &SINGLE_UDP,
            max_players: (1, 16),
            ram_mb: (4096, 32768),
            recommended_ram_mb: 8192,
            cpus: 4.0,
            config_path: "data/enshrouded_server.json",
        },
        GameType::Cs2 => GameProfile {
            game_type,
            name: "Counter-Strike 2",
            docker_image: "joedwards32/cs2:latest",
            default_port: 27015,
            topology: &SINGLE_BOTH,
            max_players: (1, 64),
            ram_mb: (2048, 16384),
            recommended_ram_mb: 4096,
            cpus: 4.0,
            config_path: "data/game/csgo/cfg/server.cfg",
        },
    }
}
