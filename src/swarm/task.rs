//! Swarm task descriptors as reported by the Docker API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Task is new
    #[default]
    New,
    /// Task resources are allocated
    Allocated,
    /// Task is pending
    Pending,
    /// Task is assigned
    Assigned,
    /// Task is accepted
    Accepted,
    /// Task is preparing
    Preparing,
    /// Task is ready
    Ready,
    /// Task is starting
    Starting,
    /// Task is running
    Running,
    /// Task completed
    Complete,
    /// Task shutdown
    Shutdown,
    /// Task failed
    Failed,
    /// Task rejected
    Rejected,
    /// Task removed
    Remove,
    /// Task is orphaned
    Orphaned,
}

impl TaskState {
    /// Check if the state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Complete
                | TaskState::Shutdown
                | TaskState::Failed
                | TaskState::Rejected
                | TaskState::Remove
                | TaskState::Orphaned
        )
    }

    /// Lowercase name as used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::New => "new",
            TaskState::Allocated => "allocated",
            TaskState::Pending => "pending",
            TaskState::Assigned => "assigned",
            TaskState::Accepted => "accepted",
            TaskState::Preparing => "preparing",
            TaskState::Ready => "ready",
            TaskState::Starting => "starting",
            TaskState::Running => "running",
            TaskState::Complete => "complete",
            TaskState::Shutdown => "shutdown",
            TaskState::Failed => "failed",
            TaskState::Rejected => "rejected",
            TaskState::Remove => "remove",
            TaskState::Orphaned => "orphaned",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempted instance of a service.
///
/// `service_id` is a back-reference only; tasks are fetched per service and
/// never own the service they belong to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDescriptor {
    /// Task ID
    #[serde(rename = "ID")]
    pub id: String,
    /// Service ID
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
    /// Slot (for replicated services)
    #[serde(default)]
    pub slot: Option<u64>,
    /// Node ID
    #[serde(rename = "NodeID", default)]
    pub node_id: Option<String>,
    /// Task status
    #[serde(default)]
    pub status: TaskStatus,
    /// Desired state
    #[serde(default)]
    pub desired_state: TaskState,
    /// Created timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Updated timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskDescriptor {
    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.status.state
    }

    /// Check if task is running
    pub fn is_running(&self) -> bool {
        self.status.state == TaskState::Running
    }

    /// Check if task is terminal
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Status message, if the control plane reported a non-empty one
    pub fn message(&self) -> Option<&str> {
        self.status.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Error string, if any
    pub fn error(&self) -> Option<&str> {
        self.status.err.as_deref().filter(|e| !e.is_empty())
    }

    /// Container ID backing this task
    pub fn container_id(&self) -> Option<&str> {
        self.status
            .container_status
            .as_ref()
            .map(|cs| cs.container_id.as_str())
            .filter(|id| !id.is_empty())
    }

    fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.status.timestamp.or(self.updated_at).or(self.created_at)
    }
}

/// Order tasks newest first
pub fn sort_newest_first(tasks: &mut [TaskDescriptor]) {
    tasks.sort_by(|a, b| b.last_seen().cmp(&a.last_seen()));
}

/// Task status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskStatus {
    /// Timestamp
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// State
    #[serde(default)]
    pub state: TaskState,
    /// Message
    #[serde(default)]
    pub message: Option<String>,
    /// Error
    #[serde(default)]
    pub err: Option<String>,
    /// Container status
    #[serde(default)]
    pub container_status: Option<ContainerStatus>,
}

/// Container status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerStatus {
    /// Container ID
    #[serde(rename = "ContainerID", default)]
    pub container_id: String,
    /// PID
    #[serde(rename = "PID", default)]
    pub pid: Option<i64>,
    /// Exit code
    #[serde(default)]
    pub exit_code: Option<i64>,
}
