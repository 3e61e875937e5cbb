// Serverwave Fleet - Main entry point
// Provision and run game servers across a fleet of machines

use clap::{Parser, Subcommand};
use serde::Serialize;
use serverwave_fleet::commands::{self, server::CreateServerRequest, server::TaskResponse};
use serverwave_fleet::config::{resolve_config_path, PlatformConfig};
use serverwave_fleet::games::config_guard::ProtectedFields;
use serverwave_fleet::platform::Platform;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to $SERVERWAVE_FLEET_CONFIG, then ~/ServerWaveFleet/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Return as soon as a lifecycle task is accepted
    #[arg(short, long, global = true)]
    detach: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installable games, or show one game's profile and settings
    Games { game: Option<String> },

    /// Install a new server, or reinstall a stopped or failed one
    Install {
        #[arg(long)]
        machine: String,
        #[arg(long)]
        game: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        server_id: Option<String>,
        #[arg(long)]
        order_id: Option<String>,
        /// First port of the block; scanned from the game default when omitted
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        max_players: Option<u32>,
        #[arg(long)]
        memory_mb: Option<u32>,
        /// Game setting as key=value, repeatable
        #[arg(long = "set", value_parser = parse_setting)]
        settings: Vec<(String, String)>,
    },

    Start { server_id: String },
    Stop { server_id: String },
    Restart { server_id: String },

    /// Open the server's ports in the machine firewall
    Firewall { server_id: String },

    Status { server_id: String },
    List,

    /// Probe servers and correct states that no longer match their machine
    Sync { server_id: Option<String> },

    /// Remove a stopped or failed server and free its ports
    Decommission { server_id: String },

    /// Rewrite the protected fields (IP, port, max players) of a config file
    Protect {
        file: PathBuf,
        /// Use the values of an installed server
        #[arg(long, conflicts_with = "game")]
        server: Option<String>,
        /// Use explicit values for a game type
        #[arg(long, requires = "max_players")]
        game: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        max_players: Option<u32>,
        /// Write the result back instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Check the Docker daemon of a machine
    CheckHost { machine: String },
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

fn report(response: TaskResponse) -> Result<(), String> {
    print_json(&response)?;
    match response.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    // Read-only game listings need no configuration
    if let Command::Games { game } = &cli.command {
        return match game {
            Some(game) => print_json(&commands::games::get_game_config(game)?),
            None => {
                for g in commands::games::list_available_games() {
                    println!(
                        "{:<20} {:<30} port {:<6} {} port(s), {}-{} players",
                        g.game_type.to_string(),
                        g.name,
                        g.default_port,
                        g.ports.len(),
                        g.max_players.0,
                        g.max_players.1
                    );
                }
                Ok(())
            }
        };
    }

    let config_path = resolve_config_path(cli.config.clone());
    let config = PlatformConfig::load_or_init(&config_path).map_err(|e| e.to_string())?;
    tracing::debug!("Using configuration {}", config_path.display());

    let command = match cli.command {
        Command::CheckHost { machine } => {
            let host = config
                .machines
                .iter()
                .find(|h| h.machine_id == machine)
                .ok_or_else(|| format!("machine {} is not part of the fleet", machine))?;
            let status = commands::docker::check_docker_status(host).await?;
            print_json(&status)?;
            if status.running {
                print_json(&commands::docker::get_docker_info(host).await?)?;
            }
            return Ok(());
        }
        Command::Protect {
            file,
            game: Some(game),
            ip,
            port,
            max_players,
            write,
            ..
        } => {
            let fields = ProtectedFields {
                ip_address: ip,
                port,
                max_players: max_players.unwrap_or_default(),
            };
            let out =
                commands::games::protect_config_file(&file, &game, &fields, config.guard_policy(), write)?;
            if !write {
                print!("{}", out);
            }
            return Ok(());
        }
        other => other,
    };

    let platform = Platform::start(config).await.map_err(|e| e.to_string())?;
    let result = dispatch(&platform, command, cli.detach).await;
    platform.shutdown().await;
    result
}

async fn dispatch(platform: &Platform, command: Command, detach: bool) -> Result<(), String> {
    let orchestrator = &platform.orchestrator;
    match command {
        Command::Install {
            machine,
            game,
            name,
            server_id,
            order_id,
            port,
            max_players,
            memory_mb,
            settings,
        } => {
            let request = CreateServerRequest {
                server_id,
                order_id,
                machine_id: machine,
                game_type: game,
                name,
                port,
                max_players,
                memory_mb,
                config: Some(settings.into_iter().collect::<HashMap<_, _>>()),
            };
            report(commands::server::create_server(orchestrator, request, detach).await?)
        }
        Command::Start { server_id } => {
            report(commands::server::start_server(orchestrator, &server_id, detach).await?)
        }
        Command::Stop { server_id } => {
            report(commands::server::stop_server(orchestrator, &server_id, detach).await?)
        }
        Command::Restart { server_id } => {
            report(commands::server::restart_server(orchestrator, &server_id, detach).await?)
        }
        Command::Firewall { server_id } => {
            report(commands::server::configure_firewall(orchestrator, &server_id, detach).await?)
        }
        Command::Status { server_id } => {
            print_json(&commands::server::get_server_status(orchestrator, &server_id).await?)
        }
        Command::List => {
            for server in commands::server::list_servers(orchestrator).await? {
                println!("{}", server);
            }
            Ok(())
        }
        Command::Decommission { server_id } => {
            print_json(&commands::server::delete_server(orchestrator, &server_id).await?)
        }
        Command::Sync { server_id } => {
            print_json(&commands::server::sync_servers(orchestrator, server_id.as_deref()).await?)
        }
        Command::Protect {
            file,
            server: Some(server_id),
            write,
            ..
        } => {
            let out = commands::server::protect_server_config(orchestrator, &server_id, &file, write).await?;
            if !write {
                print!("{}", out);
            }
            Ok(())
        }
        Command::Protect { .. } => Err("protect needs either --server or --game".to_string()),
        Command::Games { .. } | Command::CheckHost { .. } => Ok(()),
    }
}
