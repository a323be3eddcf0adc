//! Swarm service descriptors as reported by the Docker API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label Docker attaches to every service deployed as part of a stack
pub const STACK_NAMESPACE_LABEL: &str = "com.docker.stack.namespace";

/// Swarm service as returned by `GET /services`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    /// Service ID
    #[serde(rename = "ID")]
    pub id: String,
    /// Service specification
    pub spec: ServiceSpec,
}

/// Service specification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSpec {
    /// Service name
    pub name: String,
    /// Labels
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Task template
    #[serde(default)]
    pub task_template: TaskTemplate,
    /// Service mode
    #[serde(default)]
    pub mode: Option<ServiceMode>,
}

/// Task template, trimmed to what the deploy client reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskTemplate {
    /// Container spec
    #[serde(default)]
    pub container_spec: Option<ContainerSpec>,
}

/// Container specification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSpec {
    /// Image
    #[serde(default)]
    pub image: String,
}

/// Service mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceMode {
    /// Replicated service
    Replicated {
        #[serde(rename = "Replicas", default)]
        replicas: Option<u64>,
    },
    /// Global service (one per node)
    Global {},
    /// Replicated job
    ReplicatedJob {
        #[serde(rename = "MaxConcurrent", default)]
        max_concurrent: Option<u64>,
        #[serde(rename = "TotalCompletions", default)]
        total_completions: Option<u64>,
    },
    /// Global job
    GlobalJob {},
}

/// Read-only snapshot of one service, fetched fresh each poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service ID
    pub id: String,
    /// Service name (`<stack>_<service>` for stack services)
    pub name: String,
    /// Declared replica count, `None` when the mode does not state one
    pub desired_replicas: Option<u64>,
    /// Owning stack, from the namespace label
    pub stack: Option<String>,
    /// Image the service runs
    pub image: Option<String>,
}

impl ServiceDescriptor {
    /// Create a replicated service descriptor
    pub fn new(id: &str, name: &str, desired_replicas: Option<u64>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            desired_replicas,
            stack: None,
            image: None,
        }
    }

    /// Replica target used for readiness; unknown counts as one
    pub fn desired(&self) -> u64 {
        self.desired_replicas.unwrap_or(1)
    }

    /// Check whether the service belongs to the given stack
    pub fn in_stack(&self, stack_name: &str) -> bool {
        self.stack.as_deref() == Some(stack_name)
    }
}

impl From<Service> for ServiceDescriptor {
    fn from(service: Service) -> Self {
        let desired_replicas = match service.spec.mode {
            Some(ServiceMode::Replicated { replicas }) => replicas,
            Some(ServiceMode::ReplicatedJob {
                total_completions, ..
            }) => total_completions,
            Some(ServiceMode::Global {}) | Some(ServiceMode::GlobalJob {}) | None => None,
        };

        let image = service
            .spec
            .task_template
            .container_spec
            .map(|cs| cs.image)
            .filter(|image| !image.is_empty());

        Self {
            id: service.id,
            stack: service.spec.labels.get(STACK_NAMESPACE_LABEL).cloned(),
            name: service.spec.name,
            desired_replicas,
            image,
        }
    }
}
