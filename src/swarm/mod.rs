//! Docker Swarm service and task views
//!
//! This module holds the read-only Swarm objects the control plane reports
//! for a deployed stack.

pub mod service;
pub mod task;

pub use service::{Service, ServiceDescriptor, ServiceMode, STACK_NAMESPACE_LABEL};
pub use task::{TaskDescriptor, TaskState};
