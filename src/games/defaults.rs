// Default game settings used to seed a server's first configuration.
// Never consulted when rewriting protected fields.

use crate::games::GameType;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// A user-tunable setting and its default.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub key: &'static str,
    pub name: &'static str,
    pub default: Value,
    pub user_editable: bool,
}

fn var(key: &'static str, name: &'static str, default: Value) -> Variable {
    Variable { key, name, default, user_editable: true }
}

fn fixed(key: &'static str, name: &'static str, default: Value) -> Variable {
    Variable { key, name, default, user_editable: false }
}

/// The settings a game exposes, with their defaults.
pub fn game_variables(game_type: GameType) -> Vec<Variable> {
    match game_type {
        GameType::Minecraft => vec![
            var("difficulty", "Difficulty", json!("normal")),
            var("gamemode", "Game Mode", json!("survival")),
            var("pvp", "PvP", json!(true)),
            var("viewDistance", "View Distance", json!(10)),
            var("onlineMode", "Online Mode", json!(true)),
            fixed("version", "Minecraft Version", json!("LATEST")),
        ],
        GameType::Rust => vec![
            var("seed", "World Seed", json!(0)),
            var("worldSize", "World Size", json!(3000)),
            var("description", "Server Description", json!("Hosted on Serverwave")),
            fixed("branch", "Server Branch", json!("public")),
            fixed("oxide", "Oxide Framework", json!(true)),
        ],
        GameType::ArkAscended | GameType::ArkEvolved => vec![
            var("map", "Map", json!("TheIsland_WP")),
            var("serverPassword", "Server Password", json!("")),
            var("clusterId", "Cluster ID", json!("")),
            var("battleye", "BattlEye", json!(true)),
        ],
        GameType::Satisfactory => vec![
            var("autosaveInterval", "Autosave Interval (s)", json!(900)),
            var("autopause", "Pause When Empty", json!(true)),
            fixed("experimental", "Experimental Branch", json!(false)),
        ],
        GameType::SevenDaysToDie => vec![
            var("gameWorld", "World", json!("Navezgane")),
            var("gameDifficulty", "Difficulty", json!(2)),
            var("webMapEnabled", "Web Map", json!(true)),
        ],
        GameType::Valheim => vec![
            var("worldName", "World Name", json!("Dedicated")),
            var("serverPassword", "Server Password", json!("")),
            var("public", "Listed Publicly", json!(true)),
        ],
        GameType::TheForest | GameType::SonsOfTheForest => vec![
            var("difficulty", "Difficulty", json!("Normal")),
            var("serverPassword", "Server Password", json!("")),
        ],
        GameType::ConanExiles => vec![
            var("pvp", "PvP", json!(false)),
            var("serverPassword", "Server Password", json!("")),
        ],
        GameType::Dayz => vec![
            var("mission", "Mission", json!("dayzOffline.chernarusplus")),
            var("serverPassword", "Server Password", json!("")),
        ],
        GameType::ProjectZomboid => vec![
            var("pvp", "PvP", json!(true)),
            var("serverPassword", "Server Password", json!("")),
            var("mods", "Workshop Mods", json!("")),
        ],
        GameType::Palworld => vec![
            var("difficulty", "Difficulty", json!("Normal")),
            var("serverPassword", "Server Password", json!("")),
            var("community", "Community Server", json!(false)),
        ],
        GameType::Enshrouded => vec![var("serverPassword", "Server Password", json!(""))],
        GameType::Cs2 => vec![
            var("map", "Start Map", json!("de_inferno")),
            var("gameMode", "Game Mode", json!("competitive")),
            var("serverPassword", "Server Password", json!("")),
        ],
    }
}

/// Default key/value map for a game's first configuration.
pub fn default_game_config(game_type: GameType) -> Map<String, Value> {
    game_variables(game_type)
        .into_iter()
        .map(|v| (v.key.to_string(), v.default))
        .collect()
}

/// Fill keys missing from `config` with the game's defaults.
/// Values the user already supplied win.
pub fn seed_defaults(game_type: GameType, config: &mut Map<String, Value>) {
    for (key, value) in default_game_config(game_type) {
        config.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_game_has_defaults() {
        for game in GameType::ALL {
            assert!(!default_game_config(game).is_empty(), "{} has no defaults", game);
        }
    }

    #[test]
    fn test_seed_keeps_user_values() {
        let mut config = Map::new();
        config.insert("seed".to_string(), json!(1234));
        seed_defaults(GameType::Rust, &mut config);
        assert_eq!(config["seed"], json!(1234));
        assert_eq!(config["worldSize"], json!(3000));
    }
}
