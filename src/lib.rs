// Serverwave Fleet - provisioning and lifecycle engine for game servers

pub mod commands;
pub mod config;
pub mod docker;
pub mod games;
pub mod installers;
pub mod lifecycle;
pub mod platform;
pub mod ports;
pub mod remote;
