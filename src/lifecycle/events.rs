// Lifecycle events - audit and notification side effects after each commit

use super::state::{LifecycleAction, ServerLifecycleState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    TaskDispatched {
        server_id: String,
        task_id: Uuid,
        action: LifecycleAction,
        state: ServerLifecycleState,
    },
    TaskCompleted {
        server_id: String,
        task_id: Uuid,
        action: LifecycleAction,
        state: ServerLifecycleState,
    },
    TaskFailed {
        server_id: String,
        task_id: Uuid,
        action: LifecycleAction,
        state: ServerLifecycleState,
        error: String,
    },
    ServerDecommissioned {
        server_id: String,
        released_ports: usize,
    },
    /// The recorded state was corrected to what the machine reports.
    StateReconciled {
        server_id: String,
        from: ServerLifecycleState,
        to: ServerLifecycleState,
    },
}

impl LifecycleEvent {
    pub fn server_id(&self) -> &str {
        match self {
            LifecycleEvent::TaskDispatched { server_id, .. }
            | LifecycleEvent::TaskCompleted { server_id, .. }
            | LifecycleEvent::TaskFailed { server_id, .. }
            | LifecycleEvent::ServerDecommissioned { server_id, .. }
            | LifecycleEvent::StateReconciled { server_id, .. } => server_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

/// Receives events after the state they describe has been persisted.
/// Errors are logged by the bus and never reach the lifecycle caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), String>;
}

/// Fire-and-forget fan-out to the configured sinks.
///
/// Publishing only enqueues; a single worker task delivers envelopes to each
/// sink in order.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl EventBus {
    pub fn start(sinks: Vec<Arc<dyn EventSink>>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<EventEnvelope>();
        let worker = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                for sink in &sinks {
                    if let Err(e) = sink.handle(&envelope).await {
                        tracing::warn!(
                            "Event sink {} failed for {}: {}",
                            sink.name(),
                            envelope.event.server_id(),
                            e
                        );
                    }
                }
            }
            tracing::debug!("Event bus drained");
        });
        (Self { tx }, worker)
    }

    pub fn publish(&self, event: LifecycleEvent) {
        let envelope = EventEnvelope { at: Utc::now(), event };
        if self.tx.send(envelope).is_err() {
            tracing::warn!("Event bus closed, dropping event");
        }
    }
}

/// Appends one JSON object per line.
pub struct AuditLogSink {
    path: PathBuf,
}

impl AuditLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventSink for AuditLogSink {
    fn name(&self) -> &'static str {
        "audit-log"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), String> {
        let mut line = serde_json::to_string(envelope).map_err(|e| e.to_string())?;
        line.push('\n');
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| format!("{}: {}", self.path.display(), e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| e.to_string())?;
        file.flush().await.map_err(|e| e.to_string())
    }
}

/// Operator notifications through the log.
pub struct TracingNotifier;

#[async_trait]
impl EventSink for TracingNotifier {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), String> {
        match &envelope.event {
            LifecycleEvent::TaskDispatched { server_id, action, state, .. } => {
                tracing::info!("{} {} dispatched ({})", server_id, action, state)
            }
            LifecycleEvent::TaskCompleted { server_id, action, state, .. } => {
                tracing::info!("{} {} completed, now {}", server_id, action, state)
            }
            LifecycleEvent::TaskFailed { server_id, action, error, .. } => {
                tracing::error!("{} {} failed: {}", server_id, action, error)
            }
            LifecycleEvent::ServerDecommissioned { server_id, released_ports } => {
                tracing::info!("{} decommissioned, {} port key(s) released", server_id, released_ports)
            }
            LifecycleEvent::StateReconciled { server_id, from, to } => {
                tracing::warn!("{} was recorded {} but is {}", server_id, from, to)
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Keeps every envelope it sees.
    #[derive(Default)]
    pub(crate) struct CollectingSink {
        pub events: Mutex<Vec<LifecycleEvent>>,
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        fn name(&self) -> &'static str {
            "collect"
        }

        async fn handle(&self, envelope: &EventEnvelope) -> Result<(), String> {
            self.events.lock().push(envelope.event.clone());
            Ok(())
        }
    }

    impl CollectingSink {
        /// Wait until at least `n` events arrived.
        pub async fn wait_for(&self, n: usize) -> Vec<LifecycleEvent> {
            for _ in 0..200 {
                if self.events.lock().len() >= n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.events.lock().clone()
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _envelope: &EventEnvelope) -> Result<(), String> {
            Err("webhook unreachable".to_string())
        }
    }

    fn decommissioned(id: &str) -> LifecycleEvent {
        LifecycleEvent::ServerDecommissioned {
            server_id: id.to_string(),
            released_ports: 2,
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let collect = Arc::new(CollectingSink::default());
        let (bus, _worker) = EventBus::start(vec![Arc::new(FailingSink), collect.clone()]);
        bus.publish(decommissioned("a"));
        bus.publish(decommissioned("b"));

        let events = collect.wait_for(2).await;
        assert_eq!(events, vec![decommissioned("a"), decommissioned("b")]);
    }

    #[tokio::test]
    async fn test_audit_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.log");
        let (bus, worker) = EventBus::start(vec![Arc::new(AuditLogSink::new(&path))]);
        bus.publish(decommissioned("a"));
        bus.publish(decommissioned("b"));
        drop(bus);
        worker.await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "server_decommissioned");
        assert_eq!(first["server_id"], "a");
        assert!(first["at"].is_string());
    }
}
