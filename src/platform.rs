// Platform wiring - builds the orchestrator and its collaborators from the config

use crate::config::{ConfigError, ExecutorKind, PlatformConfig};
use crate::installers::{InstallerDeps, InstallerFactory};
use crate::lifecycle::{
    AuditLogSink, EventBus, EventSink, HealthPolicy, JsonStore, LifecycleError, MemoryStore,
    Orchestrator, StateStore, TracingNotifier,
};
use crate::ports::PortRegistry;
use crate::remote::{DockerExecutor, DryRunExecutor, Fleet, RemoteExecutor, SshExecutor};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

pub struct Platform {
    pub config: PlatformConfig,
    pub fleet: Arc<Fleet>,
    pub factory: Arc<InstallerFactory>,
    pub orchestrator: Orchestrator,
    events_worker: JoinHandle<()>,
}

impl Platform {
    /// Build everything, re-register the ports of persisted servers and
    /// move servers left mid-task by a dead process to ERROR.
    pub async fn start(config: PlatformConfig) -> Result<Self, PlatformError> {
        config.validate()?;
        let executor = build_executor(&config);
        Self::with_executor(config, executor).await
    }

    pub async fn with_executor(
        config: PlatformConfig,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Result<Self, PlatformError> {
        let fleet = Arc::new(Fleet::new(config.machines.clone()));
        let registry = Arc::new(PortRegistry::new(InstallerFactory::supported_game_types()));
        let factory = Arc::new(InstallerFactory::new(InstallerDeps {
            registry: registry.clone(),
            executor: executor.clone(),
            fleet: fleet.clone(),
            timeouts: config.timeouts.clone(),
        }));

        let store: Arc<dyn StateStore> = match &config.state_dir {
            Some(dir) => Arc::new(JsonStore::new(dir)),
            None => {
                tracing::warn!("No state_dir configured, server records will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingNotifier)];
        if let Some(path) = &config.audit_log {
            sinks.push(Arc::new(AuditLogSink::new(path)));
        }
        let (events, events_worker) = EventBus::start(sinks);

        let orchestrator = Orchestrator::new(
            factory.clone(),
            registry,
            store,
            fleet.clone(),
            events,
            HealthPolicy::from(&config.health),
        )
        .with_stale_after(config.timeouts.stale_task());
        orchestrator.restore_ports().await?;
        orchestrator.recover_interrupted().await?;

        tracing::info!(
            "Platform ready: {} machine(s), {} executor",
            fleet.hosts().count(),
            executor.name()
        );
        Ok(Self {
            config,
            fleet,
            factory,
            orchestrator,
            events_worker,
        })
    }

    /// Drop the orchestrator and wait for the event worker to drain.
    ///
    /// Every dispatched task holds a handle on the event bus, so this also
    /// waits for detached tasks to record their outcome. Those are bounded by
    /// the configured remote timeouts.
    pub async fn shutdown(self) {
        let Platform {
            orchestrator,
            factory,
            events_worker,
            ..
        } = self;
        drop(orchestrator);
        drop(factory);
        if let Err(e) = events_worker.await {
            tracing::warn!("Event worker ended abnormally: {}", e);
        }
    }
}

fn build_executor(config: &PlatformConfig) -> Arc<dyn RemoteExecutor> {
    match config.executor {
        ExecutorKind::Ssh => Arc::new(SshExecutor::default()),
        ExecutorKind::Docker => Arc::new(DockerExecutor::new()),
        ExecutorKind::DryRun => Arc::new(DryRunExecutor::new()),
    }
}
