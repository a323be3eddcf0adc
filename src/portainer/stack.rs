//! Portainer stack objects and request payloads

use serde::{Deserialize, Serialize};

/// Environment variable attached to a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Merge env var layers in order; a later layer replaces earlier values by
/// name while the first position of each name is kept.
pub fn merge_env(layers: &[&[EnvVar]]) -> Vec<EnvVar> {
    let mut merged: Vec<EnvVar> = Vec::new();
    for layer in layers {
        for var in layer.iter() {
            match merged.iter_mut().find(|v| v.name == var.name) {
                Some(existing) => existing.value = var.value.clone(),
                None => merged.push(var.clone()),
            }
        }
    }
    merged
}

/// Stack state as reported by Portainer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStatus {
    Active,
    Inactive,
    Unknown,
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackStatus::Active => write!(f, "active"),
            StackStatus::Inactive => write!(f, "inactive"),
            StackStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Portainer stack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    /// Stack ID
    pub id: u64,
    /// Stack name
    pub name: String,
    /// Stack type (1 = swarm, 2 = compose)
    #[serde(rename = "Type", default)]
    pub stack_type: Option<u8>,
    /// Endpoint the stack is deployed on
    #[serde(default)]
    pub endpoint_id: Option<u64>,
    /// Swarm cluster ID
    #[serde(rename = "SwarmId", default)]
    pub swarm_id: Option<String>,
    /// Stack environment
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Raw status code (1 = active, 2 = inactive)
    #[serde(default)]
    pub status: Option<u8>,
    /// Creation time (unix seconds)
    #[serde(default)]
    pub creation_date: Option<i64>,
    /// Last update time (unix seconds)
    #[serde(default)]
    pub update_date: Option<i64>,
}

impl Stack {
    /// Decoded stack status
    pub fn status(&self) -> StackStatus {
        match self.status {
            Some(1) => StackStatus::Active,
            Some(2) => StackStatus::Inactive,
            _ => StackStatus::Unknown,
        }
    }

    /// Value of a stack env var
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Tag of the image in the `IMAGE` env var
    pub fn image_tag(&self) -> Option<&str> {
        self.env_value("IMAGE").map(image_tag)
    }

    /// Last update, falling back to creation time
    pub fn updated_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.update_date
            .filter(|t| *t > 0)
            .or(self.creation_date)
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
    }
}

/// Tag part of an image reference; the whole reference when untagged
pub fn image_tag(image: &str) -> &str {
    let image = image.split('@').next().unwrap_or(image);
    match image.rsplit_once(':') {
        // A colon before the last slash belongs to a registry port
        Some((_, tag)) if !tag.contains('/') => tag,
        _ => image,
    }
}

/// Body of `POST /api/stacks/create/swarm/string`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStackRequest<'a> {
    pub name: &'a str,
    pub stack_file_content: &'a str,
    pub env: &'a [EnvVar],
    #[serde(rename = "swarmID", skip_serializing_if = "Option::is_none")]
    pub swarm_id: Option<&'a str>,
}

/// Body of `PUT /api/stacks/{id}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateStackRequest<'a> {
    pub stack_file_content: &'a str,
    pub env: &'a [EnvVar],
    pub prune: bool,
}
