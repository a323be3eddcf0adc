//! Which services count toward readiness

use crate::swarm::ServiceDescriptor;

/// Decides whether a service is monitored for readiness.
///
/// The control plane has no notion of a run-once service, so any rule here
/// is a heuristic over what the service descriptor exposes.
pub trait MonitorPolicy: Send + Sync {
    /// Whether the service must reach its replica target
    fn is_monitored(&self, service: &ServiceDescriptor) -> bool;
}

impl<F> MonitorPolicy for F
where
    F: Fn(&ServiceDescriptor) -> bool + Send + Sync,
{
    fn is_monitored(&self, service: &ServiceDescriptor) -> bool {
        self(service)
    }
}

/// Excludes services whose name contains a marker, case-insensitively
#[derive(Debug, Clone)]
pub struct ExcludeByName {
    marker: String,
}

impl ExcludeByName {
    /// Create a policy excluding names containing `marker`
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_lowercase(),
        }
    }
}

impl Default for ExcludeByName {
    /// One-shot init services are named `*init*` by convention
    fn default() -> Self {
        Self::new("init")
    }
}

impl MonitorPolicy for ExcludeByName {
    fn is_monitored(&self, service: &ServiceDescriptor) -> bool {
        !service.name.to_lowercase().contains(&self.marker)
    }
}
