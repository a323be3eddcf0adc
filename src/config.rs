//! Berth configuration
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `PORTAINER_*` environment variables, then command-line flags (applied by
//! the caller).

use crate::deploy::PollConfig;
use crate::error::{BerthError, Result};
use crate::portainer::{Auth, EnvVar, PortainerConfig};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "berth.toml";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Environment {
    /// Short-lived review stack
    Preview,
    /// Production stack
    Prod,
}

impl Environment {
    /// Name used in stack, manifest and secret names
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Preview => "preview",
            Environment::Prod => "prod",
        }
    }

    /// Production changes need an explicit confirmation
    pub fn is_production(self) -> bool {
        self == Environment::Prod
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-environment additions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// Extra stack env vars
    pub env: BTreeMap<String, String>,
    /// Extra secret suffixes
    pub secrets: Vec<String>,
}

/// Readiness wait timing, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub empty_retry_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let defaults = PollConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            interval_secs: defaults.poll_interval.as_secs(),
            initial_delay_secs: defaults.initial_delay.as_secs(),
            empty_retry_secs: defaults.empty_retry_delay.as_secs(),
        }
    }
}

impl PollSettings {
    pub fn to_poll_config(&self) -> PollConfig {
        PollConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_secs(self.interval_secs),
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            empty_retry_delay: Duration::from_secs(self.empty_retry_secs),
        }
    }
}

/// Berth settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Portainer base URL
    pub host: Option<String>,
    /// Portainer access token
    pub api_key: Option<String>,
    /// Username, used when no API key is set
    pub username: Option<String>,
    /// Password, used when no API key is set
    pub password: Option<String>,
    /// Portainer environment (endpoint) ID
    pub endpoint_id: u64,
    /// Accept self-signed certificates
    pub insecure: bool,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Project name, prefix of every stack and secret
    pub project: String,
    /// Image repository the tag is appended to
    pub image_repository: Option<String>,
    /// Directory holding `docker-stack.<env>.yml`
    pub manifest_dir: PathBuf,
    /// Secret suffixes every environment needs
    pub secrets: Vec<String>,
    /// Per-environment additions, keyed by environment name
    pub environments: BTreeMap<String, EnvironmentSettings>,
    /// Readiness wait timing
    pub poll: PollSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            username: None,
            password: None,
            endpoint_id: 1,
            insecure: true,
            request_timeout_secs: 15,
            project: "app".to_string(),
            image_repository: None,
            manifest_dir: PathBuf::from("."),
            secrets: Vec::new(),
            environments: BTreeMap::new(),
            poll: PollSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from the first config file found, then apply
    /// the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(),
        };

        let mut settings = match file {
            Some(ref p) => {
                tracing::debug!("Loading config from {}", p.display());
                Self::from_file(p)?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BerthError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| BerthError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("berth").join("config.toml"))
            .filter(|p| p.is_file())
    }

    /// Override settings from `PORTAINER_*` variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = lookup("PORTAINER_HOST").or_else(|| lookup("PORTAINER_URL")) {
            self.host = Some(host);
        }
        if let Some(key) = lookup("PORTAINER_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(user) = lookup("PORTAINER_USER") {
            self.username = Some(user);
        }
        if let Some(pass) = lookup("PORTAINER_PASS") {
            self.password = Some(pass);
        }
        if let Some(id) = lookup("PORTAINER_ENDPOINT_ID") {
            match id.trim().parse() {
                Ok(id) => self.endpoint_id = id,
                Err(_) => tracing::warn!("Ignoring invalid PORTAINER_ENDPOINT_ID: {}", id),
            }
        }
    }

    /// Check connection settings and readiness timing before any request
    pub fn validate(&self) -> Result<()> {
        self.portainer_config()?;
        self.poll_config().validate()
    }

    /// Connection settings for the client
    pub fn portainer_config(&self) -> Result<PortainerConfig> {
        let host = self.host.clone().ok_or_else(|| {
            BerthError::Config(
                "Missing Portainer host; set PORTAINER_HOST or `host` in berth.toml".to_string(),
            )
        })?;

        let auth = match (&self.api_key, &self.username, &self.password) {
            (Some(key), _, _) => Auth::ApiKey(key.clone()),
            (None, Some(user), Some(pass)) => Auth::Credentials {
                username: user.clone(),
                password: pass.clone(),
            },
            _ => {
                return Err(BerthError::Config(
                    "Missing Portainer credentials; set PORTAINER_API_KEY (or PORTAINER_USER and PORTAINER_PASS)"
                        .to_string(),
                ))
            }
        };

        Ok(PortainerConfig {
            host,
            auth,
            endpoint_id: self.endpoint_id,
            insecure: self.insecure,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    /// Readiness wait timing
    pub fn poll_config(&self) -> PollConfig {
        self.poll.to_poll_config()
    }

    /// Stack name for an environment
    pub fn stack_name(&self, env: Environment) -> String {
        format!("{}-{}", self.project, env)
    }

    /// Prefix shared by every stack of the project
    pub fn stack_prefix(&self) -> String {
        format!("{}-", self.project)
    }

    /// Manifest file for an environment
    pub fn manifest_path(&self, env: Environment) -> PathBuf {
        self.manifest_dir.join(format!("docker-stack.{}.yml", env))
    }

    /// Full image reference for a tag
    pub fn image(&self, tag: &str) -> Result<String> {
        let repository = self.image_repository.as_deref().ok_or_else(|| {
            BerthError::Config("Missing `image_repository` in berth.toml".to_string())
        })?;
        Ok(format!("{}:{}", repository, tag))
    }

    /// Secret names an environment's stack expects
    pub fn secret_names(&self, env: Environment) -> Vec<String> {
        let extra = self
            .environments
            .get(env.as_str())
            .map(|e| e.secrets.as_slice())
            .unwrap_or_default();

        let mut names: Vec<String> = Vec::new();
        for suffix in self.secrets.iter().chain(extra) {
            let name = format!("{}_{}_{}", self.project, env, suffix);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Configured stack env vars for an environment, without `IMAGE`
    pub fn environment_vars(&self, env: Environment) -> Vec<EnvVar> {
        self.environments
            .get(env.as_str())
            .map(|e| e.env.iter().map(|(k, v)| EnvVar::new(k, v)).collect())
            .unwrap_or_default()
    }

    /// Env vars for a freshly created stack
    pub fn default_env_vars(&self, env: Environment, tag: &str) -> Result<Vec<EnvVar>> {
        let mut vars = vec![EnvVar::new("IMAGE", &self.image(tag)?)];
        vars.extend(self.environment_vars(env));
        Ok(vars)
    }
}
