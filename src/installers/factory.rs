// Installer factory - maps a game type to its installer

use super::games::{
    ArkInstaller, Cs2Installer, ForestInstaller, MinecraftInstaller, PalworldInstaller,
    RustInstaller, SatisfactoryInstaller, SevenDaysInstaller, SurvivalInstaller, ValheimInstaller,
};
use super::{GameInstaller, InstallerBase, InstallerDeps};
use crate::games::GameType;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("unsupported game type '{0}'")]
    UnsupportedGameType(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

type Constructor = fn(InstallerBase) -> Arc<dyn GameInstaller>;

/// Fixed at compile time; nothing registers at runtime.
static REGISTRATIONS: [(GameType, Constructor); 15] = [
    (GameType::Minecraft, MinecraftInstaller::build),
    (GameType::Rust, RustInstaller::build),
    (GameType::ArkAscended, ArkInstaller::build),
    (GameType::ArkEvolved, ArkInstaller::build),
    (GameType::Satisfactory, SatisfactoryInstaller::build),
    (GameType::SevenDaysToDie, SevenDaysInstaller::build),
    (GameType::Valheim, ValheimInstaller::build),
    (GameType::TheForest, ForestInstaller::build),
    (GameType::SonsOfTheForest, ForestInstaller::build),
    (GameType::ConanExiles, SurvivalInstaller::build),
    (GameType::Dayz, SurvivalInstaller::build),
    (GameType::ProjectZomboid, SurvivalInstaller::build),
    (GameType::Palworld, PalworldInstaller::build),
    (GameType::Enshrouded, SurvivalInstaller::build),
    (GameType::Cs2, Cs2Installer::build),
];

pub struct InstallerFactory {
    deps: InstallerDeps,
}

impl InstallerFactory {
    pub fn new(deps: InstallerDeps) -> Self {
        Self { deps }
    }

    /// Build a fresh installer bound to `machine_id`.
    pub fn create(&self, game_type: &str, machine_id: &str) -> Result<Arc<dyn GameInstaller>, FactoryError> {
        if game_type.trim().is_empty() {
            return Err(FactoryError::UnsupportedGameType(game_type.to_string()));
        }
        let game = game_type
            .parse::<GameType>()
            .map_err(|_| FactoryError::UnsupportedGameType(game_type.to_string()))?;
        self.create_for(game, machine_id)
    }

    pub fn create_for(&self, game_type: GameType, machine_id: &str) -> Result<Arc<dyn GameInstaller>, FactoryError> {
        if machine_id.trim().is_empty() {
            return Err(FactoryError::InvalidArgument("machine id is empty".to_string()));
        }
        let constructor = REGISTRATIONS
            .iter()
            .find(|(g, _)| *g == game_type)
            .map(|(_, c)| *c)
            .ok_or_else(|| FactoryError::UnsupportedGameType(game_type.to_string()))?;
        tracing::debug!("Creating {} installer for machine {}", game_type, machine_id);
        Ok(constructor(InstallerBase::new(game_type, machine_id, self.deps.clone())))
    }

    pub fn is_supported(game_type: &str) -> bool {
        game_type
            .parse::<GameType>()
            .map(|g| REGISTRATIONS.iter().any(|(r, _)| *r == g))
            .unwrap_or(false)
    }

    pub fn supported_game_types() -> Vec<GameType> {
        REGISTRATIONS.iter().map(|(g, _)| *g).collect()
    }
}
