// End-to-end provisioning against the dry-run executor

use base64::Engine;
use serde_json::Map;
use serverwave_fleet::config::{ExecutorKind, HealthConfig, PlatformConfig};
use serverwave_fleet::games::{GameType, PortProtocol, PortRole};
use serverwave_fleet::installers::InstallConfig;
use serverwave_fleet::lifecycle::{
    JsonStore, LifecycleAction, LifecycleError, ServerLifecycleState, StateChange, StateStore,
    TaskRecord, TaskStatus, INTERRUPTED,
};
use serverwave_fleet::platform::Platform;
use serverwave_fleet::ports::PortError;
use serverwave_fleet::remote::{DryRunExecutor, HostSpec};
use std::sync::Arc;

fn platform_config(dir: &std::path::Path) -> PlatformConfig {
    PlatformConfig {
        machines: vec![HostSpec::new("eu-1", "10.1.0.4")],
        executor: ExecutorKind::DryRun,
        state_dir: Some(dir.join("servers")),
        audit_log: Some(dir.join("audit.log")),
        health: HealthConfig {
            attempts: 2,
            interval_ms: 1,
        },
        ..PlatformConfig::default()
    }
}

fn install(server_id: &str, game_type: GameType, port: Option<u16>, max_players: u32, ram_mb: u32) -> InstallConfig {
    InstallConfig {
        server_id: server_id.to_string(),
        order_id: format!("order-{}", server_id),
        machine_id: "eu-1".to_string(),
        game_type,
        server_name: format!("{} test", game_type),
        max_players,
        port,
        ram_mb,
        game_config: Map::new(),
    }
}

/// The compose file shipped by the deploy step, decoded.
fn deployed_compose(executor: &DryRunExecutor, server_id: &str) -> String {
    let command = executor
        .commands_matching("docker-compose.yml")
        .into_iter()
        .find(|c| c.contains(server_id))
        .expect("no deploy command recorded");
    let encoded = command
        .split('\'')
        .nth(1)
        .expect("deploy command carries a quoted payload");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .expect("payload is base64");
    String::from_utf8(bytes).expect("compose file is utf-8")
}

#[tokio::test]
async fn test_rust_server_next_to_minecraft() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(DryRunExecutor::new());
    let platform = Platform::with_executor(platform_config(dir.path()), executor.clone())
        .await
        .unwrap();
    let orchestrator = &platform.orchestrator;

    let minecraft = orchestrator
        .install(install("mc-1", GameType::Minecraft, Some(25565), 20, 4096))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(minecraft.state, ServerLifecycleState::Online);

    let ticket = orchestrator
        .install(install("rust-1", GameType::Rust, Some(28015), 100, 8000))
        .await
        .unwrap();
    assert_eq!(ticket.action, LifecycleAction::Install);
    assert_eq!(ticket.intended, ServerLifecycleState::Starting);
    let rust = ticket.wait().await.unwrap();
    assert_eq!(rust.state, ServerLifecycleState::Online);

    // Game, query and RCON ports are consecutive
    let record = orchestrator.status("rust-1").await.unwrap();
    let ports = record.ports.unwrap();
    assert_eq!(ports.get(PortRole::Game), Some(28015));
    assert_eq!(ports.get(PortRole::Query), Some(28016));
    assert_eq!(ports.get(PortRole::Rcon), Some(28017));

    let registry = orchestrator.registry();
    assert!(registry.is_allocated(28015, PortProtocol::Udp));
    assert!(registry.is_allocated(28016, PortProtocol::Udp));
    assert!(registry.is_allocated(28017, PortProtocol::Tcp));
    assert!(registry.is_allocated(25565, PortProtocol::Both));
    let owners: Vec<String> = registry
        .allocations_for("rust-1")
        .into_iter()
        .map(|a| a.port.to_string())
        .collect();
    assert_eq!(owners, vec!["28015", "28016", "28017"]);

    let compose = deployed_compose(&executor, "rust-1");
    assert!(compose.contains("RUST_OXIDE_ENABLED: \"1\""));
    assert!(compose.contains("\"28015:28015/udp\""));
    assert!(compose.contains("\"28017:28017/tcp\""));
    assert!(executor
        .commands_matching("oxide/plugins")
        .iter()
        .any(|c| c.contains("rust-1")));

    // The Minecraft server was never touched by the Rust install
    let mc = orchestrator.status("mc-1").await.unwrap();
    assert_eq!(mc.state, ServerLifecycleState::Online);
    assert_eq!(mc.tasks.len(), 1);

    platform.shutdown().await;
}

#[tokio::test]
async fn test_overlapping_block_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(DryRunExecutor::new());
    let platform = Platform::with_executor(platform_config(dir.path()), executor.clone())
        .await
        .unwrap();
    let orchestrator = &platform.orchestrator;

    orchestrator
        .install(install("rust-1", GameType::Rust, Some(28015), 100, 8000))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    let commands_before = executor.commands().len();

    // 28016 is the first server's query port
    let err = orchestrator
        .install(install("rust-2", GameType::Rust, Some(28016), 100, 8000))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Port(PortError::AlreadyAllocated { port: 28016, .. })));
    assert_eq!(executor.commands().len(), commands_before);
    assert!(orchestrator.registry().allocations_for("rust-2").is_empty());

    // Without a requested port the installer scans for a free block
    let scanned = orchestrator
        .install(install("rust-2", GameType::Rust, None, 100, 8000))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(scanned.state, ServerLifecycleState::Online);
    let ports = orchestrator.status("rust-2").await.unwrap().ports.unwrap();
    assert!(ports.port >= 28018);

    platform.shutdown().await;
}

#[tokio::test]
async fn test_lifecycle_through_failure_and_decommission() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(DryRunExecutor::new());
    let platform = Platform::with_executor(platform_config(dir.path()), executor.clone())
        .await
        .unwrap();
    let orchestrator = &platform.orchestrator;

    orchestrator
        .install(install("vh-1", GameType::Valheim, Some(24560), 10, 4096))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    // Container never comes back after a restart
    executor.fail_when("docker inspect", 1, "");
    let restarted = orchestrator.restart("vh-1").await.unwrap().wait().await.unwrap();
    assert_eq!(restarted.state, ServerLifecycleState::Error);
    assert!(restarted.task.error.is_some());
    executor.clear_rules();

    let stopped = orchestrator.stop("vh-1").await.unwrap().wait().await.unwrap();
    assert_eq!(stopped.state, ServerLifecycleState::Offline);

    let report = orchestrator.decommission("vh-1").await.unwrap();
    assert_eq!(report.released_ports, 2);
    assert!(orchestrator.list().await.unwrap().is_empty());
    assert!(!dir.path().join("servers").join("vh-1.json").exists());

    platform.shutdown().await;

    let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
    let events: Vec<serde_json::Value> = audit
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        vec![
            "task_dispatched",
            "task_completed",
            "task_dispatched",
            "task_failed",
            "task_dispatched",
            "task_completed",
            "server_decommissioned"
        ]
    );
}

#[tokio::test]
async fn test_task_cut_off_by_dead_process_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(DryRunExecutor::new());
    let platform = Platform::with_executor(platform_config(dir.path()), executor.clone())
        .await
        .unwrap();
    platform
        .orchestrator
        .install(install("vh-1", GameType::Valheim, Some(24560), 10, 4096))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    platform.shutdown().await;

    // What a restart leaves on disk when its process is killed mid-task
    let mut task = TaskRecord::new("vh-1", LifecycleAction::Restart).running();
    task.started_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));
    JsonStore::new(dir.path().join("servers"))
        .transition(
            "vh-1",
            ServerLifecycleState::Online,
            StateChange::new(ServerLifecycleState::Restarting, task.clone()),
        )
        .await
        .unwrap();

    let platform = Platform::with_executor(platform_config(dir.path()), executor.clone())
        .await
        .unwrap();
    let orchestrator = &platform.orchestrator;
    let record = orchestrator.status("vh-1").await.unwrap();
    assert_eq!(record.state, ServerLifecycleState::Error);
    let interrupted = record.task(task.id).unwrap();
    assert_eq!(interrupted.status, TaskStatus::Failed);
    assert_eq!(interrupted.error.as_deref(), Some(INTERRUPTED));
    assert!(orchestrator.registry().is_allocated(24560, PortProtocol::Udp));

    // ERROR accepts a retry
    let started = orchestrator.start("vh-1").await.unwrap().wait().await.unwrap();
    assert_eq!(started.state, ServerLifecycleState::Online);
    let reports = orchestrator.sync_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].changed());

    platform.shutdown().await;
}
