//! Berth - Docker Swarm stack deployment through Portainer
//!
//! Berth drives the Portainer API to create, update and remove the Swarm
//! stacks of a project, with support for:
//!
//! - Per-environment stacks, manifests and secrets
//! - Env var merging on update
//! - Waiting for services to reach their replica targets after a deploy

pub mod commands;
pub mod config;
pub mod deploy;
pub mod error;
pub mod manifest;
pub mod portainer;
pub mod swarm;

pub use error::{BerthError, Result};
