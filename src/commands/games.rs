// Game-related commands

use crate::games::config_guard::{protect_config_fields, FallbackPolicy, ProtectedFields};
use crate::games::defaults::{game_variables, Variable};
use crate::games::{profile, GameType, PortProtocol, PortRole};
use crate::installers::InstallerFactory;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct GameSummary {
    pub game_type: GameType,
    pub name: &'static str,
    pub docker_image: &'static str,
    pub default_port: u16,
    pub ports: Vec<PortSummary>,
    pub max_players: (u32, u32),
    pub ram_mb: (u32, u32),
    pub recommended_ram_mb: u32,
}

#[derive(Debug, Serialize)]
pub struct PortSummary {
    pub role: PortRole,
    pub offset: u16,
    pub protocol: PortProtocol,
}

#[derive(Debug, Serialize)]
pub struct GameDetails {
    #[serde(flatten)]
    pub summary: GameSummary,
    pub config_path: &'static str,
    pub variables: Vec<Variable>,
}

fn summarize(game_type: GameType) -> GameSummary {
    let p = profile(game_type);
    GameSummary {
        game_type,
        name: p.name,
        docker_image: p.docker_image,
        default_port: p.default_port,
        ports: p
            .topology
            .iter()
            .map(|slot| PortSummary {
                role: slot.role,
                offset: slot.offset,
                protocol: slot.protocol,
            })
            .collect(),
        max_players: p.max_players,
        ram_mb: p.ram_mb,
        recommended_ram_mb: p.recommended_ram_mb,
    }
}

/// List every game the platform can install
pub fn list_available_games() -> Vec<GameSummary> {
    InstallerFactory::supported_game_types()
        .into_iter()
        .map(summarize)
        .collect()
}

/// Get the profile and default settings of a game
pub fn get_game_config(game_type: &str) -> Result<GameDetails, String> {
    let game_type = game_type.parse::<GameType>().map_err(|e| e.to_string())?;
    Ok(GameDetails {
        summary: summarize(game_type),
        config_path: profile(game_type).config_path,
        variables: game_variables(game_type),
    })
}

/// Rewrite the protected fields of a config file for a game type
/// that may not be installed anywhere yet. With `write` the file is
/// updated in place.
pub fn protect_config_file(
    path: &Path,
    game_type: &str,
    fields: &ProtectedFields,
    policy: FallbackPolicy,
    write: bool,
) -> Result<String, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let protected = protect_config_fields(&content, game_type, fields, policy).map_err(|e| e.to_string())?;
    if write && protected != content {
        std::fs::write(path, &protected).map_err(|e| format!("{}: {}", path.display(), e))?;
        tracing::info!("Rewrote protected fields in {}", path.display());
    }
    Ok(protected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_game_is_listed() {
        let games = list_available_games();
        assert_eq!(games.len(), GameType::ALL.len());
        let rust = games.iter().find(|g| g.game_type == GameType::Rust).unwrap();
        assert_eq!(rust.ports.len(), 3);
        assert_eq!(rust.ports[2].role, PortRole::Rcon);
    }

    #[test]
    fn test_game_details() {
        let details = get_game_config("minecraft").unwrap();
        assert_eq!(details.summary.default_port, 25565);
        assert!(details.variables.iter().any(|v| v.key == "gamemode"));
        assert!(get_game_config("tetris").is_err());
    }

    #[test]
    fn test_protect_file_honours_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.cfg");
        std::fs::write(&path, "hostname=x\nport=1\n").unwrap();
        let fields = ProtectedFields {
            ip_address: None,
            port: Some(27100),
            max_players: 8,
        };

        assert!(protect_config_file(&path, "homebrew", &fields, FallbackPolicy::Reject, false).is_err());
        let out = protect_config_file(&path, "homebrew", &fields, FallbackPolicy::Generic, false).unwrap();
        assert_eq!(out, "hostname=x\nport=27100\n");
        // Printing leaves the file alone
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hostname=x\nport=1\n");
        assert!(protect_config_file(&dir.path().join("missing"), "minecraft", &fields, FallbackPolicy::Reject, false).is_err());
    }

    #[test]
    fn test_protect_file_writes_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.properties");
        std::fs::write(&path, "motd=hi\nserver-port=1\nmax-players=500\n").unwrap();
        let fields = ProtectedFields {
            ip_address: None,
            port: Some(25565),
            max_players: 20,
        };

        let out = protect_config_file(&path, "minecraft", &fields, FallbackPolicy::Reject, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), out);
        assert_eq!(out, "motd=hi\nserver-port=25565\nmax-players=20\n");
    }
}
