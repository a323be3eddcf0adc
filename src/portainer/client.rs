//! Portainer REST client

use super::secret::{SecretCreateRequest, SecretCreateResponse};
use super::stack::{CreateStackRequest, EnvVar, Stack, UpdateStackRequest};
use crate::deploy::ControlPlane;
use crate::error::{BerthError, Result};
use crate::swarm::{Service, ServiceDescriptor, TaskDescriptor, STACK_NAMESPACE_LABEL};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// How requests are authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// `X-API-Key` access token
    ApiKey(String),
    /// Username and password exchanged for a JWT on first use
    Credentials { username: String, password: String },
}

/// Connection settings for one Portainer instance
#[derive(Debug, Clone)]
pub struct PortainerConfig {
    /// Base URL, e.g. `https://portainer.example.com:9443`
    pub host: String,
    /// Authentication
    pub auth: Auth,
    /// Environment (endpoint) the Swarm stacks live on
    pub endpoint_id: u64,
    /// Accept self-signed certificates
    pub insecure: bool,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Error body returned by Portainer and the proxied Docker API
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwarmInfo {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    jwt: String,
}

/// Portainer API client
pub struct PortainerClient {
    /// Connection settings
    config: PortainerConfig,
    /// HTTP client
    client: reqwest::Client,
    /// JWT obtained with credential auth
    token: OnceCell<String>,
}

impl PortainerClient {
    /// Create a new client
    pub fn new(mut config: PortainerConfig) -> Result<Self> {
        config.host = config.host.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            token: OnceCell::new(),
        })
    }

    /// Base URL of the control plane
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Endpoint the client targets
    pub fn endpoint_id(&self) -> u64 {
        self.config.endpoint_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host, path)
    }

    fn docker_path(&self, path: &str) -> String {
        format!("/api/endpoints/{}/docker{}", self.config.endpoint_id, path)
    }

    async fn jwt(&self, username: &str, password: &str) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                debug!("Authenticating to {} as {}", self.config.host, username);
                let response = self
                    .client
                    .post(self.url("/api/auth"))
                    .json(&serde_json::json!({ "username": username, "password": password }))
                    .send()
                    .await?;
                let auth: AuthResponse = expect_success(response).await?.json().await?;
                Ok::<_, BerthError>(auth.jwt)
            })
            .await?;
        Ok(token.as_str())
    }

    /// Start an authenticated request
    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        Ok(match &self.config.auth {
            Auth::ApiKey(key) => request.header("X-API-Key", key),
            Auth::Credentials { username, password } => {
                request.bearer_auth(self.jwt(username, password).await?)
            }
        })
    }

    /// Check if the API is reachable and the credentials are accepted
    pub async fn test_connection(&self) -> Result<()> {
        let response = self.request(Method::GET, "/api/status").await?.send().await?;
        expect_success(response).await?;
        Ok(())
    }

    /// Get all stacks
    pub async fn list_stacks(&self) -> Result<Vec<Stack>> {
        let response = self.request(Method::GET, "/api/stacks").await?.send().await?;
        Ok(expect_success(response).await?.json().await?)
    }

    /// Find a stack by name
    pub async fn find_stack(&self, name: &str) -> Result<Option<Stack>> {
        Ok(self
            .list_stacks()
            .await?
            .into_iter()
            .find(|s| s.name == name))
    }

    /// Swarm cluster ID of the endpoint, if it is a Swarm manager
    pub async fn swarm_id(&self) -> Result<Option<String>> {
        let path = self.docker_path("/swarm");
        let response = self.request(Method::GET, &path).await?.send().await?;
        if !response.status().is_success() {
            debug!("No swarm info for endpoint {}: {}", self.config.endpoint_id, response.status());
            return Ok(None);
        }
        let info: SwarmInfo = response.json().await?;
        Ok(Some(info.id))
    }

    /// Create a Swarm stack from manifest text
    pub async fn create_stack(&self, name: &str, content: &str, env: &[EnvVar]) -> Result<Stack> {
        let swarm_id = match self.swarm_id().await {
            Ok(id) => id,
            Err(e) => {
                debug!("Swarm ID lookup failed, creating without it: {}", e);
                None
            }
        };

        let body = CreateStackRequest {
            name,
            stack_file_content: content,
            env,
            swarm_id: swarm_id.as_deref(),
        };
        debug!(
            "Creating stack {} (swarm {:?}, {} env vars, {} bytes)",
            name,
            swarm_id,
            env.len(),
            content.len()
        );

        let response = self
            .request(Method::POST, "/api/stacks/create/swarm/string")
            .await?
            .query(&[("endpointId", self.config.endpoint_id)])
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(BerthError::StackExists(name.to_string()));
        }
        Ok(expect_success(response).await?.json().await?)
    }

    /// Replace a stack's manifest and environment
    pub async fn update_stack(&self, stack_id: u64, content: &str, env: &[EnvVar]) -> Result<Stack> {
        let body = UpdateStackRequest {
            stack_file_content: content,
            env,
            prune: false,
        };
        debug!(
            "Updating stack {} ({} env vars, {} bytes)",
            stack_id,
            env.len(),
            content.len()
        );

        let response = self
            .request(Method::PUT, &format!("/api/stacks/{}", stack_id))
            .await?
            .query(&[("endpointId", self.config.endpoint_id)])
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BerthError::StackNotFound(stack_id.to_string()));
        }
        Ok(expect_success(response).await?.json().await?)
    }

    /// Delete a stack
    pub async fn delete_stack(&self, stack_id: u64) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/api/stacks/{}", stack_id))
            .await?
            .query(&[("endpointId", self.config.endpoint_id)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BerthError::StackNotFound(stack_id.to_string()));
        }
        expect_success(response).await?;
        Ok(())
    }

    /// Create a Docker secret on the endpoint
    pub async fn create_secret(&self, request: &SecretCreateRequest) -> Result<String> {
        let path = self.docker_path("/secrets/create");
        let response = self
            .request(Method::POST, &path)
            .await?
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(BerthError::SecretExists(request.name.clone()));
        }
        let created: SecretCreateResponse = expect_success(response).await?.json().await?;
        Ok(created.id)
    }

    /// Services carrying the stack's namespace label
    pub async fn stack_services(&self, stack_name: &str) -> Result<Vec<ServiceDescriptor>> {
        let filters = serde_json::json!({
            "label": [format!("{}={}", STACK_NAMESPACE_LABEL, stack_name)]
        });
        let path = self.docker_path("/services");
        let response = self
            .request(Method::GET, &path)
            .await?
            .query(&[("filters", filters.to_string())])
            .send()
            .await?;

        let services: Vec<Service> = expect_success(response).await?.json().await?;
        // Older Portainer proxies drop the filter, so recheck the label here
        Ok(services
            .into_iter()
            .map(ServiceDescriptor::from)
            .filter(|s| s.in_stack(stack_name))
            .collect())
    }

    /// All tasks for a service
    pub async fn service_tasks(&self, service_id: &str) -> Result<Vec<TaskDescriptor>> {
        let filters = serde_json::json!({ "service": [service_id] });
        let path = self.docker_path("/tasks");
        let response = self
            .request(Method::GET, &path)
            .await?
            .query(&[("filters", filters.to_string())])
            .send()
            .await?;

        let tasks: Vec<TaskDescriptor> = expect_success(response).await?.json().await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.service_id.is_empty() || t.service_id == service_id)
            .collect())
    }
}

#[async_trait]
impl ControlPlane for PortainerClient {
    async fn list_services(&self, stack_name: &str) -> Result<Vec<ServiceDescriptor>> {
        self.stack_services(stack_name).await
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskDescriptor>> {
        self.service_tasks(service_id).await
    }
}

/// Turn a non-2xx response into a transport error carrying the parsed body
async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ApiError>(&body) {
        Ok(ApiError {
            message: Some(message),
            details: Some(details),
        }) if !details.is_empty() && details != message => format!("{} ({})", message, details),
        Ok(ApiError {
            message: Some(message),
            ..
        }) => message,
        Ok(ApiError {
            details: Some(details),
            ..
        }) => details,
        _ => body.trim().to_string(),
    };

    Err(BerthError::Transport {
        status: status.as_u16(),
        message: format!(
            "{}{}",
            status.canonical_reason().unwrap_or("Unknown"),
            if detail.is_empty() {
                String::new()
            } else {
                format!(": {}", detail)
            }
        ),
    })
}
