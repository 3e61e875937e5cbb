mod ark;
mod cs2;
mod forest;
mod minecraft;
mod palworld;
mod rust;
mod satisfactory;
mod seven_days;
mod survival;
mod valheim;

pub use ark::{ArkEdition, ArkInstaller};
pub use cs2::Cs2Installer;
pub use forest::ForestInstaller;
pub use minecraft::MinecraftInstaller;
pub use palworld::PalworldInstaller;
pub use rust::RustInstaller;
pub use satisfactory::SatisfactoryInstaller;
pub use seven_days::SevenDaysInstaller;
pub use survival::SurvivalInstaller;
pub use valheim::ValheimInstaller;
