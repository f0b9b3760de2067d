//! Compose sub-command integration
//!
//! Thin wrapper around `<runtime> compose` for multi-service workspaces:
//! build/up/stop/restart/down, container discovery through compose labels,
//! service status listing, and per-service metadata extraction via
//! `compose config --format json`. Callers never hard-code compose naming;
//! the built-image separator differs between providers.

use crate::config::ComposeServiceDefaults;
use crate::docker::{CliRuntime, ContainerDetails, PortBinding};
use crate::errors::{ComposeError, CribError, Result};
use crate::redaction::render_args;
use crate::runtime::RuntimeKind;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Compose label carrying the project name
pub const LABEL_COMPOSE_PROJECT: &str = "com.docker.compose.project";

/// Compose label carrying the service name
pub const LABEL_COMPOSE_SERVICE: &str = "com.docker.compose.service";

/// Environment variable overriding the derived project name
pub const COMPOSE_PROJECT_ENV: &str = "COMPOSE_PROJECT_NAME";

/// Derive the compose project name for a workspace.
pub fn project_name(workspace_id: &str) -> String {
    match std::env::var(COMPOSE_PROJECT_ENV) {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => format!("crib-{}", workspace_id),
    }
}

/// One container reported by `compose ps`
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeContainer {
    pub id: String,
    pub name: String,
    pub service: String,
    pub state: String,
    /// Published ports; entries with a zero published port are filtered out
    pub publishers: Vec<PortBinding>,
}

/// Status of one compose service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub service: String,
    pub state: String,
    pub container_id: Option<String>,
}

/// Helper over the runtime's `compose` sub-command for one project
#[derive(Debug, Clone)]
pub struct ComposeHelper {
    cli: CliRuntime,
    project: String,
    base_path: PathBuf,
    files: Vec<PathBuf>,
    env_files: Vec<PathBuf>,
    extra_env: IndexMap<String, String>,
}

impl ComposeHelper {
    /// Create a helper for a compose project. `files` are resolved relative
    /// to `base_path` by the compose CLI itself.
    pub fn new(
        cli: CliRuntime,
        project: impl Into<String>,
        base_path: impl Into<PathBuf>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            cli,
            project: project.into(),
            base_path: base_path.into(),
            files,
            env_files: Vec::new(),
            extra_env: IndexMap::new(),
        }
    }

    /// Add `--env-file` arguments.
    pub fn with_env_files(mut self, env_files: Vec<PathBuf>) -> Self {
        self.env_files = env_files;
        self
    }

    /// Append variables to the child process environment; this is how
    /// `containerEnv` values reach compose variable substitution.
    pub fn with_extra_env(mut self, extra_env: IndexMap<String, String>) -> Self {
        self.extra_env = extra_env;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Name of the image compose builds for a service. Docker Compose joins
    /// with `-`, podman-compose with `_`.
    pub fn built_image_name(&self, service: &str) -> String {
        let separator = match self.cli.kind() {
            RuntimeKind::Docker => '-',
            RuntimeKind::Podman => '_',
        };
        format!("{}{}{}", self.project, separator, service)
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["compose".to_string()];
        for file in &self.files {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        for file in &self.env_files {
            args.push("--env-file".to_string());
            args.push(file.display().to_string());
        }
        args.push("-p".to_string());
        args.push(self.project.clone());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(self.cli.program());
        cmd.args(args)
            .current_dir(&self.base_path)
            .envs(self.extra_env.clone())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn execute(&self, tail: &[String], cancel: &CancellationToken) -> Result<String> {
        let mut args = self.base_args();
        args.extend(tail.iter().cloned());
        debug!("executing: {} {}", self.cli.program(), render_args(&args));

        let mut command = self.command(&args);
        let output = tokio::select! {
            output = command.output() => output.map_err(|e| ComposeError::CommandFailed {
                action: format!("{} {}", self.cli.program(), render_args(&args)),
                stderr: e.to_string(),
            })?,
            _ = cancel.cancelled() => return Err(CribError::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ComposeError::CommandFailed {
                action: format!("{} {}", self.cli.program(), render_args(&args)),
                stderr,
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Build images for the given services (all when empty).
    #[instrument(skip(self, cancel))]
    pub async fn build(&self, services: &[String], cancel: &CancellationToken) -> Result<()> {
        let mut args = vec!["build".to_string()];
        args.extend(services.iter().cloned());
        self.execute(&args, cancel).await?;
        Ok(())
    }

    /// Start services detached.
    #[instrument(skip(self, cancel))]
    pub async fn up(&self, services: &[String], cancel: &CancellationToken) -> Result<()> {
        let mut args = vec!["up".to_string(), "-d".to_string()];
        args.extend(services.iter().cloned());
        self.execute(&args, cancel).await?;
        Ok(())
    }

    /// Stop services without removing them.
    #[instrument(skip(self, cancel))]
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<()> {
        self.execute(&["stop".to_string()], cancel).await?;
        Ok(())
    }

    /// Restart services in place.
    #[instrument(skip(self, cancel))]
    pub async fn restart(&self, cancel: &CancellationToken) -> Result<()> {
        self.execute(&["restart".to_string()], cancel).await?;
        Ok(())
    }

    /// Tear the project down, removing containers.
    #[instrument(skip(self, cancel))]
    pub async fn down(&self, cancel: &CancellationToken) -> Result<()> {
        self.execute(&["down".to_string()], cancel).await?;
        Ok(())
    }

    /// List project containers via `compose ps --format json`.
    pub async fn list_containers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ComposeContainer>> {
        let stdout = self
            .execute(
                &[
                    "ps".to_string(),
                    "-a".to_string(),
                    "--format".to_string(),
                    "json".to_string(),
                ],
                cancel,
            )
            .await?;
        parse_ps_output(&stdout)
    }

    /// Per-service status summary.
    pub async fn list_service_statuses(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceStatus>> {
        let containers = self.list_containers(cancel).await?;
        Ok(containers
            .into_iter()
            .map(|c| ServiceStatus {
                service: c.service,
                state: c.state,
                container_id: Some(c.id),
            })
            .collect())
    }

    /// Find the container backing a service, discovered through the compose
    /// project label so naming stays the provider's concern.
    pub async fn find_service_container(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ContainerDetails>> {
        let ids = self
            .cli
            .ps_ids_by_label(
                &format!("{}={}", LABEL_COMPOSE_PROJECT, self.project),
                cancel,
            )
            .await?;
        let details = self.cli.inspect_containers(&ids, cancel).await?;

        Ok(details.into_iter().find(|c| {
            c.state.status != "removing"
                && c.config.labels.get(LABEL_COMPOSE_SERVICE).map(String::as_str) == Some(service)
        }))
    }

    /// The merged project model from `compose config --format json`.
    pub async fn config_json(&self, cancel: &CancellationToken) -> Result<Value> {
        let stdout = self
            .execute(
                &[
                    "config".to_string(),
                    "--format".to_string(),
                    "json".to_string(),
                ],
                cancel,
            )
            .await?;

        serde_json::from_str(&stdout).map_err(|e| {
            ComposeError::Malformed {
                message: format!("compose config JSON: {}", e),
            }
            .into()
        })
    }

    /// Extract the defaults a dev container configuration inherits from its
    /// compose service: image, user, and build section.
    pub async fn service_defaults(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<ComposeServiceDefaults> {
        let config = self.config_json(cancel).await?;
        parse_service_defaults(&config, service)
    }
}

/// Parse `compose ps --format json` output.
///
/// Docker Compose emits newline-delimited JSON objects; some versions emit a
/// single array. Publishers with a zero published port are exposed-only and
/// filtered out.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<ComposeContainer>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> = if stdout.trim_start().starts_with('[') {
        serde_json::from_str(stdout).map_err(|e| ComposeError::Malformed {
            message: format!("compose ps JSON: {}", e),
        })?
    } else {
        stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ComposeError::Malformed {
                message: format!("compose ps JSON: {}", e),
            })?
    };

    let mut containers = Vec::new();
    for value in &values {
        let id = value
            .get("ID")
            .or_else(|| value.get("Id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let name = value
            .get("Name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let service = value
            .get("Service")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let state = value
            .get("State")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        let mut publishers = Vec::new();
        if let Some(entries) = value.get("Publishers").and_then(|p| p.as_array()) {
            for entry in entries {
                let published = entry
                    .get("PublishedPort")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                if published == 0 {
                    continue;
                }
                let target = entry
                    .get("TargetPort")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                publishers.push(PortBinding {
                    container_port: target as u16,
                    protocol: entry
                        .get("Protocol")
                        .and_then(|v| v.as_str())
                        .unwrap_or("tcp")
                        .to_string(),
                    host_ip: entry
                        .get("URL")
                        .and_then(|v| v.as_str())
                        .filter(|url| !url.is_empty())
                        .map(str::to_string),
                    host_port: Some(published as u16),
                });
            }
        }

        containers.push(ComposeContainer {
            id,
            name,
            service,
            state,
            publishers,
        });
    }

    Ok(containers)
}

/// Extract per-service defaults from a merged compose project model.
pub fn parse_service_defaults(config: &Value, service: &str) -> Result<ComposeServiceDefaults> {
    let service_value = config
        .get("services")
        .and_then(|s| s.get(service))
        .ok_or_else(|| ComposeError::ServiceNotFound {
            service: service.to_string(),
        })?;

    let mut defaults = ComposeServiceDefaults {
        image: service_value
            .get("image")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        user: service_value
            .get("user")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        ..Default::default()
    };

    match service_value.get("build") {
        Some(Value::String(context)) => {
            defaults.has_build = true;
            defaults.build_context = Some(context.clone());
        }
        Some(Value::Object(build)) => {
            defaults.has_build = true;
            defaults.build_context = build
                .get("context")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            defaults.dockerfile = build
                .get("dockerfile")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        _ => {}
    }

    Ok(defaults)
}
