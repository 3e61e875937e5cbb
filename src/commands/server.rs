// Server lifecycle commands

use crate::games::{profile, GameType};
use crate::installers::{FactoryError, InstallConfig};
use crate::lifecycle::{
    DecommissionReport, LifecycleAction, Orchestrator, ServerLifecycleState, ServerRecord,
    SyncReport, TaskTicket,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServerRequest {
    pub server_id: Option<String>,
    pub order_id: Option<String>,
    pub machine_id: String,
    pub game_type: String,
    pub name: String,
    pub port: Option<u16>,
    pub max_players: Option<u32>,
    pub memory_mb: Option<u32>,
    pub config: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub server_id: String,
    pub task_id: Uuid,
    pub action: LifecycleAction,
    pub state: ServerLifecycleState,
    pub error: Option<String>,
}

/// Settings arrive as text; integers and booleans are stored typed.
fn typed_settings(config: HashMap<String, String>) -> Map<String, Value> {
    config
        .into_iter()
        .map(|(key, raw)| {
            let value = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Bool(b)) => Value::Bool(b),
                Ok(Value::Number(n)) if n.is_i64() || n.is_u64() => Value::Number(n),
                _ => Value::String(raw),
            };
            (key, value)
        })
        .collect()
}

pub fn build_install_config(request: CreateServerRequest) -> Result<InstallConfig, String> {
    let game_type = request
        .game_type
        .parse::<GameType>()
        .map_err(|_| FactoryError::UnsupportedGameType(request.game_type.clone()).to_string())?;
    let game = profile(game_type);
    let server_id = request
        .server_id
        .unwrap_or_else(|| format!("{}-{}", game_type.slug(), &Uuid::new_v4().to_string()[..8]));

    Ok(InstallConfig {
        order_id: request.order_id.unwrap_or_else(|| server_id.clone()),
        server_id,
        machine_id: request.machine_id,
        game_type,
        server_name: request.name,
        max_players: request
            .max_players
            .unwrap_or_else(|| 10u32.clamp(game.max_players.0, game.max_players.1)),
        port: request.port,
        ram_mb: request.memory_mb.unwrap_or(game.recommended_ram_mb),
        game_config: typed_settings(request.config.unwrap_or_default()),
    })
}

/// Report a ticket right away, or wait for its task to finish.
async fn settle(ticket: TaskTicket, detach: bool) -> Result<TaskResponse, String> {
    if detach {
        return Ok(TaskResponse {
            success: true,
            server_id: ticket.server_id.clone(),
            task_id: ticket.task_id,
            action: ticket.action,
            state: ticket.intended,
            error: None,
        });
    }
    let server_id = ticket.server_id.clone();
    let action = ticket.action;
    let outcome = ticket.wait().await.map_err(|e| e.to_string())?;
    Ok(TaskResponse {
        success: outcome.task.error.is_none(),
        server_id,
        task_id: outcome.task.id,
        action,
        state: outcome.state,
        error: outcome.task.error,
    })
}

pub async fn create_server(
    orchestrator: &Orchestrator,
    request: CreateServerRequest,
    detach: bool,
) -> Result<TaskResponse, String> {
    tracing::info!("Creating server: {:?}", request.name);
    let config = build_install_config(request)?;
    let ticket = orchestrator.install(config).await.map_err(|e| e.to_string())?;
    settle(ticket, detach).await
}

pub async fn start_server(orchestrator: &Orchestrator, server_id: &str, detach: bool) -> Result<TaskResponse, String> {
    let ticket = orchestrator.start(server_id).await.map_err(|e| e.to_string())?;
    settle(ticket, detach).await
}

pub async fn stop_server(orchestrator: &Orchestrator, server_id: &str, detach: bool) -> Result<TaskResponse, String> {
    let ticket = orchestrator.stop(server_id).await.map_err(|e| e.to_string())?;
    settle(ticket, detach).await
}

pub async fn restart_server(orchestrator: &Orchestrator, server_id: &str, detach: bool) -> Result<TaskResponse, String> {
    let ticket = orchestrator.restart(server_id).await.map_err(|e| e.to_string())?;
    settle(ticket, detach).await
}

pub async fn configure_firewall(orchestrator: &Orchestrator, server_id: &str, detach: bool) -> Result<TaskResponse, String> {
    let ticket = orchestrator
        .configure_firewall(server_id)
        .await
        .map_err(|e| e.to_string())?;
    settle(ticket, detach).await
}

pub async fn get_server_status(orchestrator: &Orchestrator, server_id: &str) -> Result<ServerRecord, String> {
    orchestrator.status(server_id).await.map_err(|e| e.to_string())
}

pub async fn list_servers(orchestrator: &Orchestrator) -> Result<Vec<ServerRecord>, String> {
    let mut servers = orchestrator.list().await.map_err(|e| e.to_string())?;
    servers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(servers)
}

pub async fn delete_server(orchestrator: &Orchestrator, server_id: &str) -> Result<DecommissionReport, String> {
    orchestrator.decommission(server_id).await.map_err(|e| e.to_string())
}

/// Probe one server, or every server, and correct drifted states.
pub async fn sync_servers(orchestrator: &Orchestrator, server_id: Option<&str>) -> Result<Vec<SyncReport>, String> {
    match server_id {
        Some(id) => orchestrator
            .sync_status(id)
            .await
            .map(|report| vec![report])
            .map_err(|e| e.to_string()),
        None => orchestrator.sync_all().await.map_err(|e| e.to_string()),
    }
}

/// Rewrite a server's config file in place and return the new content.
pub async fn protect_server_config(
    orchestrator: &Orchestrator,
    server_id: &str,
    path: &Path,
    write: bool,
) -> Result<String, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    let protected = orchestrator
        .protect_config(server_id, &content)
        .await
        .map_err(|e| e.to_string())?;
    if write && protected != content {
        tokio::fs::write(path, &protected)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        tracing::info!("Rewrote protected fields in {}", path.display());
    }
    Ok(protected)
}
