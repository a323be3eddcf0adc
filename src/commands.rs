//! Command handlers behind the `berth` CLI

use crate::config::{Environment, Settings};
use crate::deploy::{PollRequest, ReadinessPoller, StatusSink, Verdict};
use crate::error::{BerthError, Result};
use crate::manifest::load_manifest;
use crate::portainer::{merge_env, EnvVar, PortainerClient, SecretCreateRequest, Stack};
use crate::swarm::task::sort_newest_first;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Tasks shown per service by `status`
const TASKS_SHOWN: usize = 3;

/// Label put on secrets created by `bootstrap`
const ENVIRONMENT_LABEL: &str = "berth.environment";

/// Flags shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Skip confirmation prompts
    pub force: bool,
    /// Return right after the update is accepted
    pub no_wait: bool,
}

/// How a command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything the command set out to do is done
    Success,
    /// Completed, but the stack did not reach its target
    NotReady,
}

impl Outcome {
    /// Process exit status for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::NotReady => 1,
        }
    }
}

type SecretSource<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;

/// Runs commands against one control plane
pub struct Dispatcher<'a> {
    settings: &'a Settings,
    client: &'a PortainerClient,
    options: Options,
    out: &'a mut dyn Write,
    input: &'a mut dyn BufRead,
    sink: &'a mut dyn StatusSink,
    secrets: SecretSource<'a>,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher reading secrets from the process environment
    pub fn new(
        settings: &'a Settings,
        client: &'a PortainerClient,
        options: Options,
        out: &'a mut dyn Write,
        input: &'a mut dyn BufRead,
        sink: &'a mut dyn StatusSink,
    ) -> Self {
        Self {
            settings,
            client,
            options,
            out,
            input,
            sink,
            secrets: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace where secret values are read from
    pub fn with_secret_source(mut self, source: impl Fn(&str) -> Option<String> + 'a) -> Self {
        self.secrets = Box::new(source);
        self
    }

    /// Check the control plane is reachable and list its stacks
    pub async fn test(&mut self) -> Result<Outcome> {
        self.client.test_connection().await?;
        writeln!(self.out, "Connected to {}", self.client.host())?;

        let stacks = self.client.list_stacks().await?;
        if stacks.is_empty() {
            writeln!(self.out, "No stacks")?;
        }
        for stack in stacks {
            writeln!(self.out, "  {} (ID: {})", stack.name, stack.id)?;
        }
        Ok(Outcome::Success)
    }

    /// Create the stack and its secrets for the first time
    pub async fn bootstrap(&mut self, env: Environment, tag: &str) -> Result<Outcome> {
        let name = self.settings.stack_name(env);
        let vars = self.settings.default_env_vars(env, tag)?;
        if self.client.find_stack(&name).await?.is_some() {
            return Err(BerthError::StackExists(format!(
                "{} (use `berth deploy {}` to update it)",
                name, env
            )));
        }

        if env.is_production() {
            self.confirm(
                &format!("Creating production stack {}", name),
                "create-production",
            )?;
        }

        let manifest = load_manifest(&self.settings.manifest_path(env))?;
        let secrets = self.settings.secret_names(env);
        self.create_secrets(env, &secrets).await?;

        info!("Creating stack {} with image tag {}", name, tag);
        let stack = self.client.create_stack(&name, &manifest, &vars).await?;

        writeln!(self.out, "Created stack {} (ID: {})", stack.name, stack.id)?;
        if !secrets.is_empty() {
            writeln!(self.out, "The stack expects these secrets:")?;
            for secret in &secrets {
                writeln!(self.out, "  {}", secret)?;
            }
        }
        writeln!(
            self.out,
            "Manage it at {}/#!/{}/docker/stacks",
            self.client.host(),
            self.client.endpoint_id()
        )?;
        Ok(Outcome::Success)
    }

    async fn create_secrets(&mut self, env: Environment, names: &[String]) -> Result<()> {
        for name in names {
            let variable = name.to_uppercase();
            let Some(value) = (self.secrets)(&variable) else {
                writeln!(self.out, "Secret {} not provided ({} is unset)", name, variable)?;
                continue;
            };

            let request =
                SecretCreateRequest::new(name, value.as_bytes()).label(ENVIRONMENT_LABEL, env.as_str());
            match self.client.create_secret(&request).await {
                Ok(id) => writeln!(self.out, "Created secret {} ({})", name, id)?,
                Err(BerthError::SecretExists(_)) => {
                    writeln!(self.out, "Secret {} already exists", name)?
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Roll a new image tag out to an existing stack
    pub async fn deploy(&mut self, env: Environment, tag: &str) -> Result<Outcome> {
        let name = self.settings.stack_name(env);
        let image = self.settings.image(tag)?;
        let poll = self.settings.poll_config();
        if !self.options.no_wait {
            poll.validate()?;
        }

        let stack = self.client.find_stack(&name).await?.ok_or_else(|| {
            BerthError::StackNotFound(format!("{} (run `berth bootstrap {}` first)", name, env))
        })?;

        if env.is_production() {
            self.confirm(
                &format!("Deploying {} to production stack {}", tag, name),
                "deploy",
            )?;
        }

        let manifest = load_manifest(&self.settings.manifest_path(env))?;
        let vars = deploy_env(&stack, &self.settings.environment_vars(env), &image);

        info!(
            "Updating stack {} (ID: {}) from {} to {}",
            name,
            stack.id,
            stack.image_tag().unwrap_or("unknown"),
            tag
        );
        self.client.update_stack(stack.id, &manifest, &vars).await?;
        writeln!(self.out, "Stack {} updated to {}", name, tag)?;

        if self.options.no_wait {
            writeln!(
                self.out,
                "Not waiting for rollout; run `berth status {}` to check it",
                env
            )?;
            return Ok(Outcome::Success);
        }

        self.wait_for_ready(PollRequest::new(&name, poll)).await
    }

    async fn wait_for_ready(&mut self, request: PollRequest) -> Result<Outcome> {
        let stack = request.stack_name.as_str();
        let cancel = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let verdict = ReadinessPoller::new(self.client, &mut *self.sink)
            .wait_for_ready_until(&request, cancel)
            .await?;

        match verdict {
            Verdict::Ready { elapsed, .. } => {
                writeln!(self.out, "Stack {} is ready ({}s)", stack, elapsed.as_secs())?;
                Ok(Outcome::Success)
            }
            Verdict::TimedOut { elapsed, pending, .. } => {
                warn!("Stack {} not ready after {:?}", stack, elapsed);
                writeln!(
                    self.out,
                    "Stack {} not ready after {}s; check it in Portainer at {}",
                    stack,
                    elapsed.as_secs(),
                    self.client.host()
                )?;
                for service in pending {
                    writeln!(self.out, "  {}", service.status_line(service.name.len()))?;
                }
                Ok(Outcome::NotReady)
            }
            Verdict::Cancelled { .. } => {
                writeln!(
                    self.out,
                    "Stopped waiting; the update continues on {}",
                    self.client.host()
                )?;
                Ok(Outcome::NotReady)
            }
        }
    }

    /// Show the project's stacks, or one environment in detail
    pub async fn status(&mut self, env: Option<Environment>) -> Result<Outcome> {
        let stacks = self.client.list_stacks().await?;
        let Some(env) = env else {
            let prefix = self.settings.stack_prefix();
            let ours: Vec<&Stack> = stacks.iter().filter(|s| s.name.starts_with(&prefix)).collect();
            if ours.is_empty() {
                writeln!(self.out, "No stacks for project {}", self.settings.project)?;
            }
            for stack in ours {
                self.stack_line(stack)?;
            }
            return Ok(Outcome::Success);
        };

        let name = self.settings.stack_name(env);
        let stack = stacks
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BerthError::StackNotFound(name.clone()))?;
        self.stack_line(stack)?;

        let services = self.client.stack_services(&name).await?;
        if services.is_empty() {
            writeln!(self.out, "  No services running")?;
        }
        for service in services {
            let mut tasks = self.client.service_tasks(&service.id).await?;
            sort_newest_first(&mut tasks);
            let running = tasks.iter().filter(|t| t.is_running()).count();
            writeln!(
                self.out,
                "  {} {}/{}",
                service.name,
                running,
                service.desired()
            )?;

            for task in tasks.iter().take(TASKS_SHOWN) {
                let mut line = format!("    {}", task.state());
                if let Some(message) = task.message() {
                    line.push_str(&format!("  {}", message));
                }
                if let Some(err) = task.error() {
                    line.push_str(&format!("  error: {}", err));
                }
                writeln!(self.out, "{}", line)?;
            }
        }
        Ok(Outcome::Success)
    }

    fn stack_line(&mut self, stack: &Stack) -> Result<()> {
        let mut line = format!(
            "{} (ID: {}) {} image {}",
            stack.name,
            stack.id,
            stack.status(),
            stack.image_tag().unwrap_or("unknown")
        );
        if let Some(updated) = stack.updated_at() {
            line.push_str(&format!(" updated {}", updated.format("%Y-%m-%d %H:%M UTC")));
        }
        writeln!(self.out, "{}", line)?;
        Ok(())
    }

    /// Remove an environment's stack
    pub async fn delete(&mut self, env: Environment) -> Result<Outcome> {
        let name = self.settings.stack_name(env);
        let Some(stack) = self.client.find_stack(&name).await? else {
            writeln!(self.out, "Stack {} does not exist", name)?;
            return Ok(Outcome::Success);
        };

        self.confirm(&format!("Deleting stack {} (ID: {})", name, stack.id), "delete")?;
        self.client.delete_stack(stack.id).await?;
        writeln!(self.out, "Deleted stack {}", name)?;
        Ok(Outcome::Success)
    }

    /// Ask the user to type `word`, unless `--force` was given
    fn confirm(&mut self, action: &str, word: &str) -> Result<()> {
        if self.options.force {
            return Ok(());
        }

        write!(self.out, "{}. Type '{}' to continue: ", action, word)?;
        self.out.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        if answer.trim() == word {
            Ok(())
        } else {
            Err(BerthError::Cancelled(action.to_string()))
        }
    }
}

/// Env vars for an update: the stack's current ones, then configured ones,
/// then the new image
fn deploy_env(stack: &Stack, configured: &[EnvVar], image: &str) -> Vec<EnvVar> {
    let image = [EnvVar::new("IMAGE", image)];
    merge_env(&[&stack.env, configured, &image])
}
