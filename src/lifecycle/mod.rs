// Server lifecycle - state machine, persistence, events and orchestration

pub mod events;
mod orchestrator;
mod records;
mod state;
mod store;

pub use events::{AuditLogSink, EventBus, EventEnvelope, EventSink, LifecycleEvent, TracingNotifier};
pub use orchestrator::{
    DecommissionReport, HealthPolicy, LifecycleError, Orchestrator, SyncReport, TaskOutcome,
    TaskTicket, INTERRUPTED,
};
pub use records::{ServerRecord, TaskRecord, TaskStatus, TASK_HISTORY};
pub use state::{plan, LifecycleAction, ServerLifecycleState, Transition};
pub use store::{JsonStore, MemoryStore, StateChange, StateStore, StoreError};
