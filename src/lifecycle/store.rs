// State store - persisted server records with compare-and-set transitions

use super::records::{ServerRecord, TaskRecord};
use super::state::ServerLifecycleState;
use crate::installers::{AllocatedPorts, InstallConfig};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("server {0} not found")]
    NotFound(String),

    #[error("server {0} already exists")]
    AlreadyExists(String),

    #[error("server {server_id} is {actual}, expected {expected}")]
    Conflict {
        server_id: String,
        expected: ServerLifecycleState,
        actual: ServerLifecycleState,
    },

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt server record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a transition writes besides the new state.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub next: ServerLifecycleState,
    /// `None` when the state is corrected without a task behind it.
    pub task: Option<TaskRecord>,
    pub install: Option<InstallConfig>,
    pub ports: Option<AllocatedPorts>,
}

impl StateChange {
    pub fn new(next: ServerLifecycleState, task: TaskRecord) -> Self {
        Self {
            next,
            task: Some(task),
            install: None,
            ports: None,
        }
    }

    /// Correct the recorded state after the machine was observed to disagree.
    pub fn observed(next: ServerLifecycleState) -> Self {
        Self {
            next,
            task: None,
            install: None,
            ports: None,
        }
    }

    pub fn with_install(mut self, install: InstallConfig, ports: AllocatedPorts) -> Self {
        self.install = Some(install);
        self.ports = Some(ports);
        self
    }
}

/// Check `expected` against the record and apply `change` if it matches.
fn apply_change(
    record: &mut ServerRecord,
    expected: ServerLifecycleState,
    change: StateChange,
) -> Result<(), StoreError> {
    if record.state != expected {
        return Err(StoreError::Conflict {
            server_id: record.id.clone(),
            expected,
            actual: record.state,
        });
    }
    record.state = change.next;
    if let Some(install) = change.install {
        record.name = install.server_name.clone();
        record.machine_id = Some(install.machine_id.clone());
        record.install = install;
    }
    if let Some(ports) = change.ports {
        record.ports = Some(ports);
    }
    if let Some(task) = change.task {
        record.upsert_task(task);
    }
    record.updated_at = Utc::now();
    Ok(())
}

/// Persistence of server records.
///
/// `transition` and `remove` are compare-and-set on the lifecycle state: two
/// callers racing from the same state cannot both win.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, server_id: &str) -> Result<Option<ServerRecord>, StoreError>;

    async fn insert_new(&self, record: ServerRecord) -> Result<(), StoreError>;

    async fn transition(
        &self,
        server_id: &str,
        expected: ServerLifecycleState,
        change: StateChange,
    ) -> Result<ServerRecord, StoreError>;

    /// Update a task without touching the state.
    async fn record_task(&self, server_id: &str, task: TaskRecord) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<ServerRecord>, StoreError>;

    async fn remove(
        &self,
        server_id: &str,
        expected: ServerLifecycleState,
    ) -> Result<ServerRecord, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ServerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, server_id: &str) -> Result<Option<ServerRecord>, StoreError> {
        Ok(self.records.lock().get(server_id).cloned())
    }

    async fn insert_new(&self, record: ServerRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn transition(
        &self,
        server_id: &str,
        expected: ServerLifecycleState,
        change: StateChange,
    ) -> Result<ServerRecord, StoreError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(server_id)
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))?;
        apply_change(record, expected, change)?;
        Ok(record.clone())
    }

    async fn record_task(&self, server_id: &str, task: TaskRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(server_id)
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))?;
        record.upsert_task(task);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let mut all: Vec<ServerRecord> = self.records.lock().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn remove(
        &self,
        server_id: &str,
        expected: ServerLifecycleState,
    ) -> Result<ServerRecord, StoreError> {
        let mut records = self.records.lock();
        let actual = records
            .get(server_id)
            .map(|r| r.state)
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))?;
        if actual != expected {
            return Err(StoreError::Conflict {
                server_id: server_id.to_string(),
                expected,
                actual,
            });
        }
        records
            .remove(server_id)
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))
    }
}

/// One pretty-printed JSON file per server in a directory.
///
/// Read-modify-write cycles are serialized by an async lock; files are
/// replaced through a rename so a crash never leaves half a record.
pub struct JsonStore {
    dir: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, server_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", server_id))
    }

    async fn read(&self, server_id: &str) -> Result<Option<ServerRecord>, StoreError> {
        let path = self.record_path(server_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, record: &ServerRecord) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(&record.id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonStore {
    async fn load(&self, server_id: &str) -> Result<Option<ServerRecord>, StoreError> {
        self.read(server_id).await
    }

    async fn insert_new(&self, record: ServerRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        if self.read(&record.id).await?.is_some() {
            return Err(StoreError::AlreadyExists(record.id));
        }
        self.write(&record).await
    }

    async fn transition(
        &self,
        server_id: &str,
        expected: ServerLifecycleState,
        change: StateChange,
    ) -> Result<ServerRecord, StoreError> {
        let _guard = self.lock.lock().await;
        let mut record = self
            .read(server_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))?;
        apply_change(&mut record, expected, change)?;
        self.write(&record).await?;
        Ok(record)
    }

    async fn record_task(&self, server_id: &str, task: TaskRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut record = self
            .read(server_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))?;
        record.upsert_task(task);
        record.updated_at = Utc::now();
        self.write(&record).await
    }

    async fn list(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let mut servers = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(servers),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<ServerRecord>(&content) {
                Ok(record) => servers.push(record),
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(servers)
    }

    async fn remove(
        &self,
        server_id: &str,
        expected: ServerLifecycleState,
    ) -> Result<ServerRecord, StoreError> {
        let _guard = self.lock.lock().await;
        let record = self
            .read(server_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(server_id.to_string()))?;
        if record.state != expected {
            return Err(StoreError::Conflict {
                server_id: server_id.to_string(),
                expected,
                actual: record.state,
            });
        }
        tokio::fs::remove_file(self.record_path(server_id)).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameType;
    use crate::lifecycle::state::LifecycleAction;
    use serde_json::Map;
    use std::sync::Arc;

    fn record(id: &str) -> ServerRecord {
        let install = InstallConfig {
            server_id: id.to_string(),
            order_id: "o1".to_string(),
            machine_id: "m1".to_string(),
            game_type: GameType::Minecraft,
            server_name: "Blocks".to_string(),
            max_players: 20,
            port: Some(25565),
            ram_mb: 4096,
            game_config: Map::new(),
        };
        ServerRecord::new(
            install,
            AllocatedPorts { port: 25565, ports: Vec::new() },
            ServerLifecycleState::Offline,
        )
    }

    async fn exercise(store: Arc<dyn StateStore>) {
        store.insert_new(record("a")).await.unwrap();
        assert!(matches!(
            store.insert_new(record("a")).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let task = TaskRecord::new("a", LifecycleAction::Start);
        let updated = store
            .transition(
                "a",
                ServerLifecycleState::Offline,
                StateChange::new(ServerLifecycleState::Starting, task.clone()),
            )
            .await
            .unwrap();
        assert_eq!(updated.state, ServerLifecycleState::Starting);
        assert_eq!(updated.tasks.len(), 1);

        // Second writer from the stale state loses
        let err = store
            .transition(
                "a",
                ServerLifecycleState::Offline,
                StateChange::new(ServerLifecycleState::Starting, TaskRecord::new("a", LifecycleAction::Start)),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict { actual: ServerLifecycleState::Starting, .. }
        ));

        store.record_task("a", task.clone().completed()).await.unwrap();
        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert!(loaded.tasks[0].is_finished());
        assert_eq!(loaded.state, ServerLifecycleState::Starting);

        store.insert_new(record("b")).await.unwrap();
        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        assert!(matches!(
            store.remove("a", ServerLifecycleState::Offline).await,
            Err(StoreError::Conflict { .. })
        ));
        store.remove("b", ServerLifecycleState::Offline).await.unwrap();
        assert!(store.load("b").await.unwrap().is_none());
        assert!(matches!(
            store.remove("b", ServerLifecycleState::Offline).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        exercise(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn test_json_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(Arc::new(JsonStore::new(dir.path().join("servers")))).await;
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.insert_new(record("persisted")).await.unwrap();
        std::fs::write(dir.path().join("garbage.json"), "{not json").unwrap();

        let reopened = JsonStore::new(dir.path());
        let all = reopened.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "persisted");
    }

    #[tokio::test]
    async fn test_json_store_missing_dir_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nope"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.load("x").await.unwrap().is_none());
    }
}
