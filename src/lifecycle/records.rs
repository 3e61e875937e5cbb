use super::state::{LifecycleAction, ServerLifecycleState};
use crate::installers::{AllocatedPorts, InstallConfig};
use crate::games::GameType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tasks kept per server; older ones are dropped.
pub const TASK_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One dispatched remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub server_id: String,
    pub kind: LifecycleAction,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(server_id: &str, kind: LifecycleAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id: server_id.to_string(),
            kind,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn running(mut self) -> Self {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self
    }

    pub fn completed(mut self) -> Self {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
        self
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A provisioned server as persisted by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub game_type: GameType,
    /// `None` once the server has lost its machine.
    pub machine_id: Option<String>,
    pub install: InstallConfig,
    pub ports: Option<AllocatedPorts>,
    pub state: ServerLifecycleState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

impl ServerRecord {
    pub fn new(install: InstallConfig, ports: AllocatedPorts, state: ServerLifecycleState) -> Self {
        let now = Utc::now();
        Self {
            id: install.server_id.clone(),
            name: install.server_name.clone(),
            game_type: install.game_type,
            machine_id: Some(install.machine_id.clone()),
            install,
            ports: Some(ports),
            state,
            created_at: now,
            updated_at: now,
            tasks: Vec::new(),
        }
    }

    /// Insert or replace a task by id, keeping the newest [`TASK_HISTORY`].
    pub fn upsert_task(&mut self, task: TaskRecord) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
        if self.tasks.len() > TASK_HISTORY {
            let excess = self.tasks.len() - TASK_HISTORY;
            self.tasks.drain(..excess);
        }
    }

    pub fn task(&self, id: Uuid) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn last_task(&self) -> Option<&TaskRecord> {
        self.tasks.last()
    }
}

/// Summary line for listings.
impl std::fmt::Display for ServerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<20} {:<20} {:<11} {:<12} {}",
            self.id,
            self.game_type,
            self.state,
            self.machine_id.as_deref().unwrap_or("-"),
            self.ports.as_ref().map(|p| p.port.to_string()).unwrap_or_else(|| "-".to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record() -> ServerRecord {
        let install = InstallConfig {
            server_id: "s1".to_string(),
            order_id: "o1".to_string(),
            machine_id: "m1".to_string(),
            game_type: GameType::Valheim,
            server_name: "Vikings".to_string(),
            max_players: 10,
            port: None,
            ram_mb: 4096,
            game_config: Map::new(),
        };
        ServerRecord::new(
            install,
            AllocatedPorts { port: 12456, ports: Vec::new() },
            ServerLifecycleState::Offline,
        )
    }

    #[test]
    fn test_task_progression() {
        let task = TaskRecord::new("s1", LifecycleAction::Start);
        assert_eq!(task.status, TaskStatus::Pending);
        let running = task.clone().running();
        assert!(running.started_at.is_some());
        assert!(!running.is_finished());
        let failed = running.failed("boom");
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.id, task.id);
    }

    #[test]
    fn test_upsert_replaces_and_bounds_history() {
        let mut r = record();
        let task = TaskRecord::new("s1", LifecycleAction::Start);
        r.upsert_task(task.clone());
        r.upsert_task(task.clone().completed());
        assert_eq!(r.tasks.len(), 1);
        assert_eq!(r.task(task.id).map(|t| t.status), Some(TaskStatus::Completed));

        for _ in 0..TASK_HISTORY + 5 {
            r.upsert_task(TaskRecord::new("s1", LifecycleAction::Stop));
        }
        assert_eq!(r.tasks.len(), TASK_HISTORY);
        assert!(r.task(task.id).is_none());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let r = record();
        let json = serde_json::to_string_pretty(&r).unwrap();
        assert!(json.contains("\"state\": \"OFFLINE\""));
        let back: ServerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
