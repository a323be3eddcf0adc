//! Portainer control-plane client
//!
//! Wraps the Portainer REST API (stacks, secrets) and the Docker API it
//! proxies per endpoint (swarm, services, tasks).

pub mod client;
pub mod secret;
pub mod stack;

#[cfg(test)]
pub(crate) mod stub;

pub use client::{Auth, PortainerClient, PortainerConfig};
pub use secret::SecretCreateRequest;
pub use stack::{merge_env, EnvVar, Stack, StackStatus};
