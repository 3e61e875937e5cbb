// Command handlers behind the CLI

pub mod docker;
pub mod games;
pub mod server;
