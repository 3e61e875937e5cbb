// Lifecycle orchestrator - turns intents into dispatched remote tasks

use super::events::{EventBus, LifecycleEvent};
use super::records::{ServerRecord, TaskRecord};
use super::state::{plan, LifecycleAction, ServerLifecycleState, Transition};
use super::store::{StateChange, StateStore, StoreError};
use crate::config::{HealthConfig, TimeoutConfig};
use crate::games::config_guard::{protect_for_game, ProtectedFields};
use crate::games::defaults::seed_defaults;
use crate::installers::{
    AllocatedPorts, FactoryError, GameInstaller, InstallConfig, InstallerError, InstallerFactory,
};
use crate::ports::{PortError, PortRegistry};
use crate::remote::Fleet;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("remote execution failed: {0}")]
    RemoteExecutionFailure(String),

    #[error("server did not become healthy after {attempts} attempt(s)")]
    HealthCheckTimeout { attempts: u32 },

    #[error(
        "cannot {action} server {server_id} while it is {}",
        .state.map(|s| s.as_str()).unwrap_or("not installed")
    )]
    InvalidStateTransition {
        server_id: String,
        state: Option<ServerLifecycleState>,
        action: LifecycleAction,
    },

    #[error("server {server_id} must be OFFLINE or ERROR to be decommissioned, it is {state}")]
    NotDecommissionable {
        server_id: String,
        state: ServerLifecycleState,
    },

    #[error("server {0} not found")]
    ServerNotFound(String),

    #[error("server {0} has no machine assigned")]
    NoMachineAssigned(String),

    #[error("machine {0} is not part of the fleet")]
    MachineUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("task {0} ended without reporting an outcome")]
    TaskAbandoned(Uuid),
}

impl From<InstallerError> for LifecycleError {
    fn from(e: InstallerError) -> Self {
        match e {
            InstallerError::Validation(errors) => LifecycleError::Validation(errors),
            InstallerError::Port(e) => LifecycleError::Port(e),
            InstallerError::UnknownMachine(machine) => LifecycleError::MachineUnavailable(machine),
            InstallerError::Remote(e) => LifecycleError::RemoteExecutionFailure(e.to_string()),
            other => LifecycleError::RemoteExecutionFailure(other.to_string()),
        }
    }
}

/// Health probes after a start: how many, and how far apart.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            interval: config.interval(),
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: TaskRecord,
    pub state: ServerLifecycleState,
}

/// Handed back as soon as a task is accepted.
///
/// Dropping the ticket only stops waiting; the task still runs to the end
/// and records its outcome.
#[derive(Debug)]
pub struct TaskTicket {
    pub task_id: Uuid,
    pub server_id: String,
    pub action: LifecycleAction,
    pub intended: ServerLifecycleState,
    completion: oneshot::Receiver<TaskOutcome>,
}

impl TaskTicket {
    pub async fn wait(self) -> Result<TaskOutcome, LifecycleError> {
        self.completion
            .await
            .map_err(|_| LifecycleError::TaskAbandoned(self.task_id))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecommissionReport {
    pub server_id: String,
    pub released_ports: usize,
    /// Set when the remote cleanup failed; the record and ports are gone regardless.
    pub teardown_error: Option<String>,
}

/// Error recorded on a task whose process died before it finished.
pub const INTERRUPTED: &str = "interrupted before completion";

/// Recorded state next to what the machine reported.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub server_id: String,
    pub previous: ServerLifecycleState,
    pub current: ServerLifecycleState,
    /// Probe result; `None` when the server was not probed.
    pub healthy: Option<bool>,
}

impl SyncReport {
    fn unchanged(record: &ServerRecord, healthy: Option<bool>) -> Self {
        Self {
            server_id: record.id.clone(),
            previous: record.state,
            current: record.state,
            healthy,
        }
    }

    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    factory: Arc<InstallerFactory>,
    registry: Arc<PortRegistry>,
    store: Arc<dyn StateStore>,
    fleet: Arc<Fleet>,
    events: EventBus,
    health: HealthPolicy,
    stale_after: Duration,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<InstallerFactory>,
        registry: Arc<PortRegistry>,
        store: Arc<dyn StateStore>,
        fleet: Arc<Fleet>,
        events: EventBus,
        health: HealthPolicy,
    ) -> Self {
        Self {
            factory,
            registry,
            store,
            fleet,
            events,
            health,
            stale_after: TimeoutConfig::default().stale_task(),
        }
    }

    /// Age after which an unfinished task is treated as abandoned.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// Provision a new server, or reinstall one that is OFFLINE or ERROR.
    ///
    /// Validation and port allocation finish before anything is persisted or
    /// sent to the machine; a rejected request leaves no trace.
    pub async fn install(&self, mut config: InstallConfig) -> Result<TaskTicket, LifecycleError> {
        let installer = self.factory.create_for(config.game_type, &config.machine_id)?;
        if !self.fleet.contains(&config.machine_id) {
            return Err(LifecycleError::MachineUnavailable(config.machine_id));
        }

        let existing = self.store.load(&config.server_id).await?;
        let current = existing.as_ref().map(|r| r.state);
        let transition = plan(current, LifecycleAction::Install).ok_or_else(|| {
            LifecycleError::InvalidStateTransition {
                server_id: config.server_id.clone(),
                state: current,
                action: LifecycleAction::Install,
            }
        })?;

        if existing.is_none() {
            seed_defaults(config.game_type, &mut config.game_config);
        }
        let validation = installer.validate_config(&config);
        if !validation.valid {
            return Err(LifecycleError::Validation(validation.errors));
        }

        let task = TaskRecord::new(&config.server_id, LifecycleAction::Install);
        let ports = match existing {
            None => {
                let ports = installer.allocate_ports(&config).await?;
                let mut record = ServerRecord::new(config.clone(), ports.clone(), transition.intended);
                record.upsert_task(task.clone());
                if let Err(e) = self.store.insert_new(record).await {
                    installer.release_ports(&ports);
                    return Err(e.into());
                }
                ports
            }
            Some(record) => {
                let ports = reinstall_ports(&record, &config)?;
                let change = StateChange::new(transition.intended, task.clone())
                    .with_install(config.clone(), ports.clone());
                self.store
                    .transition(&record.id, record.state, change)
                    .await
                    .map_err(|e| store_rejection(e, LifecycleAction::Install))?;
                ports
            }
        };

        tracing::info!(
            "Installing {} server {} on {} (port {})",
            config.game_type,
            config.server_id,
            config.machine_id,
            ports.port
        );
        Ok(self.dispatch(installer, transition, config, ports, task))
    }

    pub async fn start(&self, server_id: &str) -> Result<TaskTicket, LifecycleError> {
        self.request(server_id, LifecycleAction::Start).await
    }

    pub async fn stop(&self, server_id: &str) -> Result<TaskTicket, LifecycleError> {
        self.request(server_id, LifecycleAction::Stop).await
    }

    pub async fn restart(&self, server_id: &str) -> Result<TaskTicket, LifecycleError> {
        self.request(server_id, LifecycleAction::Restart).await
    }

    pub async fn configure_firewall(&self, server_id: &str) -> Result<TaskTicket, LifecycleError> {
        self.request(server_id, LifecycleAction::ConfigureFirewall).await
    }

    pub async fn status(&self, server_id: &str) -> Result<ServerRecord, LifecycleError> {
        self.store
            .load(server_id)
            .await?
            .ok_or_else(|| LifecycleError::ServerNotFound(server_id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<ServerRecord>, LifecycleError> {
        Ok(self.store.list().await?)
    }

    /// Remove a stopped or failed server: record, ports, and best effort
    /// the containers and files on its machine.
    pub async fn decommission(&self, server_id: &str) -> Result<DecommissionReport, LifecycleError> {
        let record = self.status(server_id).await?;
        if !matches!(
            record.state,
            ServerLifecycleState::Offline | ServerLifecycleState::Error
        ) {
            return Err(LifecycleError::NotDecommissionable {
                server_id: server_id.to_string(),
                state: record.state,
            });
        }

        let record = self
            .store
            .remove(server_id, record.state)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { actual, .. } => LifecycleError::NotDecommissionable {
                    server_id: server_id.to_string(),
                    state: actual,
                },
                StoreError::NotFound(id) => LifecycleError::ServerNotFound(id),
                other => other.into(),
            })?;
        let released_ports = self.registry.release_owner(server_id);

        let mut teardown_error = None;
        match record.machine_id.as_deref().filter(|m| self.fleet.contains(m)) {
            Some(machine_id) => {
                let result = match self.factory.create_for(record.game_type, machine_id) {
                    Ok(installer) => installer.teardown(&record.install).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                if let Err(e) = result {
                    tracing::warn!("Teardown of {} on {} failed: {}", server_id, machine_id, e);
                    teardown_error = Some(e);
                }
            }
            None => tracing::warn!("Server {} has no reachable machine, skipping teardown", server_id),
        }

        self.events.publish(LifecycleEvent::ServerDecommissioned {
            server_id: server_id.to_string(),
            released_ports,
        });
        tracing::info!("Decommissioned {}", server_id);
        Ok(DecommissionReport {
            server_id: server_id.to_string(),
            released_ports,
            teardown_error,
        })
    }

    /// Rewrite the identity fields of a config file to this server's values.
    pub async fn protect_config(&self, server_id: &str, content: &str) -> Result<String, LifecycleError> {
        let record = self.status(server_id).await?;
        let ip_address = record
            .machine_id
            .as_deref()
            .and_then(|m| self.fleet.get(m))
            .map(|h| h.public_address().to_string());
        let fields = ProtectedFields {
            ip_address,
            port: record.ports.as_ref().map(|p| p.port),
            max_players: record.install.max_players,
        };
        Ok(protect_for_game(content, record.game_type, &fields))
    }

    /// Re-register the ports of every persisted server.
    /// Returns how many allocations were restored.
    pub async fn restore_ports(&self) -> Result<usize, LifecycleError> {
        let mut restored = 0;
        for record in self.store.list().await? {
            let Some(ports) = &record.ports else { continue };
            let allocations = ports.to_allocations(record.game_type, &record.id, record.created_at);
            let total = allocations.len();
            let conflicts = self.registry.restore(allocations);
            restored += total - conflicts.len();
        }
        if restored > 0 {
            tracing::info!("Restored {} port allocation(s) from the state store", restored);
        }
        Ok(restored)
    }

    /// Move servers whose task was cut off by a dead process to ERROR.
    /// Returns how many were recovered.
    pub async fn recover_interrupted(&self) -> Result<usize, LifecycleError> {
        let mut recovered = 0;
        for record in self.store.list().await? {
            if !record.state.is_transitional() {
                continue;
            }
            let server_id = record.id.clone();
            match self.recover(record).await {
                Ok(report) if report.changed() => recovered += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!("Could not recover {}: {}", server_id, e),
            }
        }
        if recovered > 0 {
            tracing::warn!("Moved {} interrupted server(s) to ERROR", recovered);
        }
        Ok(recovered)
    }

    /// Compare one server's recorded state with its machine and correct it.
    ///
    /// ONLINE servers failing the probe become ERROR, ERROR servers passing it
    /// become ONLINE. Servers with an abandoned task are recovered; anything
    /// else is left alone.
    pub async fn sync_status(&self, server_id: &str) -> Result<SyncReport, LifecycleError> {
        let record = self.status(server_id).await?;
        self.sync_record(record).await
    }

    /// [`Orchestrator::sync_status`] for every server; failures are logged and skipped.
    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, LifecycleError> {
        let mut reports = Vec::new();
        for record in self.store.list().await? {
            let server_id = record.id.clone();
            match self.sync_record(record).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!("Status sync of {} failed: {}", server_id, e),
            }
        }
        Ok(reports)
    }

    async fn sync_record(&self, record: ServerRecord) -> Result<SyncReport, LifecycleError> {
        if record.state.is_transitional() {
            return self.recover(record).await;
        }
        if !matches!(
            record.state,
            ServerLifecycleState::Online | ServerLifecycleState::Error
        ) {
            return Ok(SyncReport::unchanged(&record, None));
        }
        let (Some(machine_id), Some(ports)) = (record.machine_id.as_deref(), record.ports.as_ref()) else {
            return Ok(SyncReport::unchanged(&record, None));
        };
        if !self.fleet.contains(machine_id) {
            return Err(LifecycleError::MachineUnavailable(machine_id.to_string()));
        }
        let installer = self.factory.create_for(record.game_type, machine_id)?;

        let healthy = installer.health_check(&record.install, ports).await;
        let observed = match (record.state, healthy) {
            (ServerLifecycleState::Online, false) => ServerLifecycleState::Error,
            (ServerLifecycleState::Error, true) => ServerLifecycleState::Online,
            (state, _) => state,
        };
        if observed == record.state {
            return Ok(SyncReport::unchanged(&record, Some(healthy)));
        }

        match self
            .store
            .transition(&record.id, record.state, StateChange::observed(observed))
            .await
        {
            Ok(_) => {}
            // A request moved the server while it was probed; its task decides
            Err(StoreError::Conflict { .. }) => return Ok(SyncReport::unchanged(&record, Some(healthy))),
            Err(e) => return Err(e.into()),
        }
        self.events.publish(LifecycleEvent::StateReconciled {
            server_id: record.id.clone(),
            from: record.state,
            to: observed,
        });
        Ok(SyncReport {
            server_id: record.id,
            previous: record.state,
            current: observed,
            healthy: Some(healthy),
        })
    }

    /// Fail the unfinished task of a transitional server once it is stale.
    async fn recover(&self, record: ServerRecord) -> Result<SyncReport, LifecycleError> {
        let pending = record.tasks.iter().rev().find(|t| !t.is_finished()).cloned();
        let since = pending
            .as_ref()
            .map(|t| t.started_at.unwrap_or(t.created_at))
            .unwrap_or(record.updated_at);
        let stale = Utc::now()
            .signed_duration_since(since)
            .to_std()
            .map(|age| age >= self.stale_after)
            .unwrap_or(false);
        if !stale {
            return Ok(SyncReport::unchanged(&record, None));
        }

        let task = match pending {
            Some(task) => task.failed(INTERRUPTED),
            None => TaskRecord::new(&record.id, interrupted_action(record.state)).failed(INTERRUPTED),
        };
        self.store
            .transition(
                &record.id,
                record.state,
                StateChange::new(ServerLifecycleState::Error, task.clone()),
            )
            .await
            .map_err(|e| store_rejection(e, task.kind))?;

        tracing::warn!(
            "{} {} was interrupted while {}, server moved to ERROR",
            record.id,
            task.kind,
            record.state
        );
        self.events.publish(LifecycleEvent::TaskFailed {
            server_id: record.id.clone(),
            task_id: task.id,
            action: task.kind,
            state: ServerLifecycleState::Error,
            error: INTERRUPTED.to_string(),
        });
        Ok(SyncReport {
            server_id: record.id,
            previous: record.state,
            current: ServerLifecycleState::Error,
            healthy: None,
        })
    }

    async fn request(&self, server_id: &str, action: LifecycleAction) -> Result<TaskTicket, LifecycleError> {
        let record = self.status(server_id).await?;
        let transition = plan(Some(record.state), action).ok_or_else(|| {
            LifecycleError::InvalidStateTransition {
                server_id: server_id.to_string(),
                state: Some(record.state),
                action,
            }
        })?;

        let machine_id = record
            .machine_id
            .clone()
            .ok_or_else(|| LifecycleError::NoMachineAssigned(server_id.to_string()))?;
        if !self.fleet.contains(&machine_id) {
            return Err(LifecycleError::MachineUnavailable(machine_id));
        }
        let installer = self.factory.create_for(record.game_type, &machine_id)?;
        let ports = record.ports.clone().ok_or_else(|| {
            LifecycleError::Validation(vec![format!("server {} has no allocated ports", server_id)])
        })?;

        let task = TaskRecord::new(server_id, action);
        self.store
            .transition(
                server_id,
                record.state,
                StateChange::new(transition.intended, task.clone()),
            )
            .await
            .map_err(|e| store_rejection(e, action))?;

        Ok(self.dispatch(installer, transition, record.install, ports, task))
    }

    fn dispatch(
        &self,
        installer: Arc<dyn GameInstaller>,
        transition: Transition,
        install: InstallConfig,
        ports: AllocatedPorts,
        task: TaskRecord,
    ) -> TaskTicket {
        self.events.publish(LifecycleEvent::TaskDispatched {
            server_id: task.server_id.clone(),
            task_id: task.id,
            action: transition.action,
            state: transition.intended,
        });

        let (tx, rx) = oneshot::channel();
        let ticket = TaskTicket {
            task_id: task.id,
            server_id: task.server_id.clone(),
            action: transition.action,
            intended: transition.intended,
            completion: rx,
        };

        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.run_task(installer, transition, install, ports, task).await;
            // Nobody may be waiting any more
            let _ = tx.send(outcome);
        });
        ticket
    }

    async fn run_task(
        &self,
        installer: Arc<dyn GameInstaller>,
        transition: Transition,
        install: InstallConfig,
        ports: AllocatedPorts,
        task: TaskRecord,
    ) -> TaskOutcome {
        let server_id = task.server_id.clone();
        let running = task.running();
        if let Err(e) = self.store.record_task(&server_id, running.clone()).await {
            tracing::warn!("Could not mark task {} running: {}", running.id, e);
        }

        let result = self
            .perform(installer.as_ref(), transition.action, &install, &ports)
            .await;
        let (state, finished) = match &result {
            Ok(()) => (transition.on_success, running.completed()),
            Err(e) => (transition.on_failure, running.failed(e.to_string())),
        };

        let committed = if transition.action == LifecycleAction::ConfigureFirewall {
            self.store.record_task(&server_id, finished.clone()).await
        } else {
            self.store
                .transition(&server_id, transition.intended, StateChange::new(state, finished.clone()))
                .await
                .map(|_| ())
        };
        if let Err(e) = committed {
            tracing::warn!("Could not record outcome of task {} for {}: {}", finished.id, server_id, e);
        }

        match result {
            Ok(()) => {
                tracing::info!("{} {} finished, server is {}", server_id, transition.action, state);
                self.events.publish(LifecycleEvent::TaskCompleted {
                    server_id,
                    task_id: finished.id,
                    action: transition.action,
                    state,
                });
            }
            Err(e) => {
                tracing::error!("{} {} failed: {}", server_id, transition.action, e);
                self.events.publish(LifecycleEvent::TaskFailed {
                    server_id,
                    task_id: finished.id,
                    action: transition.action,
                    state,
                    error: e.to_string(),
                });
            }
        }

        TaskOutcome { task: finished, state }
    }

    async fn perform(
        &self,
        installer: &dyn GameInstaller,
        action: LifecycleAction,
        install: &InstallConfig,
        ports: &AllocatedPorts,
    ) -> Result<(), LifecycleError> {
        match action {
            LifecycleAction::Install => {
                installer.provision(install, ports).await?;
            }
            LifecycleAction::Start => installer.start_server(install).await?,
            LifecycleAction::Stop => installer.stop_server(install).await?,
            LifecycleAction::Restart => installer.restart_server(install).await?,
            LifecycleAction::ConfigureFirewall => installer.configure_firewall(ports).await?,
        }
        if action.needs_health_check() {
            self.await_healthy(installer, install, ports).await?;
        }
        Ok(())
    }

    async fn await_healthy(
        &self,
        installer: &dyn GameInstaller,
        install: &InstallConfig,
        ports: &AllocatedPorts,
    ) -> Result<(), LifecycleError> {
        for attempt in 1..=self.health.attempts {
            if installer.health_check(install, ports).await {
                tracing::debug!("{} healthy after {} probe(s)", install.server_id, attempt);
                return Ok(());
            }
            if attempt < self.health.attempts {
                tokio::time::sleep(self.health.interval).await;
            }
        }
        Err(LifecycleError::HealthCheckTimeout {
            attempts: self.health.attempts,
        })
    }
}

/// Ports for a reinstall: the ones the server already holds.
fn reinstall_ports(record: &ServerRecord, config: &InstallConfig) -> Result<AllocatedPorts, LifecycleError> {
    let mut errors = Vec::new();
    if record.game_type != config.game_type {
        errors.push(format!(
            "server {} is a {} server and cannot be reinstalled as {}",
            record.id, record.game_type, config.game_type
        ));
    }
    let ports = record.ports.clone();
    if let (Some(requested), Some(held)) = (config.port, ports.as_ref()) {
        if requested != held.port {
            errors.push(format!(
                "server {} holds port {}; decommission it to move to {}",
                record.id, held.port, requested
            ));
        }
    }
    if !errors.is_empty() {
        return Err(LifecycleError::Validation(errors));
    }
    ports.ok_or_else(|| {
        LifecycleError::Validation(vec![format!("server {} has no allocated ports", record.id)])
    })
}

/// The action a transitional state was entered for.
fn interrupted_action(state: ServerLifecycleState) -> LifecycleAction {
    match state {
        ServerLifecycleState::Stopping => LifecycleAction::Stop,
        ServerLifecycleState::Restarting => LifecycleAction::Restart,
        _ => LifecycleAction::Start,
    }
}

/// A lost compare-and-set means another request moved the server first.
fn store_rejection(e: StoreError, action: LifecycleAction) -> LifecycleError {
    match e {
        StoreError::Conflict { server_id, actual, .. } => LifecycleError::InvalidStateTransition {
            server_id,
            state: Some(actual),
            action,
        },
        StoreError::NotFound(id) => LifecycleError::ServerNotFound(id),
        other => LifecycleError::Store(other),
    }
}
