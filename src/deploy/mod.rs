//! Deployment readiness tracking
//!
//! After a stack update is accepted, the control plane needs time to roll the
//! new service objects out. This module polls service and task state until
//! every monitored service reaches its replica target or the wait budget runs
//! out.

pub mod policy;
pub mod poller;
pub mod sink;

pub use policy::{ExcludeByName, MonitorPolicy};
pub use poller::{
    PollConfig, PollRequest, ReadinessPoller, ReadinessSnapshot, ServiceReadiness, Verdict,
};
pub use sink::{RecordingSink, StatusSink, TerminalSink};

use crate::error::Result;
use crate::swarm::{ServiceDescriptor, TaskDescriptor};
use async_trait::async_trait;

/// Service and task queries the poller runs against the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List services whose stack namespace label equals `stack_name`.
    ///
    /// Returns an empty list, not an error, when none are visible yet.
    async fn list_services(&self, stack_name: &str) -> Result<Vec<ServiceDescriptor>>;

    /// List every task ever created for a service, terminal ones included
    async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskDescriptor>>;
}
