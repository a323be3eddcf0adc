//! Docker secrets created through the Portainer proxy

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Secret create request for the Docker API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretCreateRequest {
    /// Secret name
    pub name: String,
    /// Labels
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Base64-encoded secret data
    pub data: String,
}

impl SecretCreateRequest {
    /// Build a request from plain secret data
    pub fn new(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            labels: HashMap::new(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    /// Add a label
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

/// Create response for the Docker API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretCreateResponse {
    /// Secret ID
    #[serde(rename = "ID")]
    pub id: String,
}
