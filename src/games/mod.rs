mod config;
pub mod config_guard;
pub mod defaults;

pub use config::{
    profile, GameProfile, GameType, ParseGameTypeError, PortProtocol, PortRole, PortSlot,
};
