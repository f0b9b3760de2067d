//! Container runtime CLI adapter
//!
//! [`CliRuntime`] drives a single OCI-style runtime binary (docker or podman)
//! through its command line: run/start/stop/restart/remove/exec/logs, image
//! build and inspect, and the label-filtered container discovery the engine
//! treats as the source of truth. Raw inspect JSON is translated into the
//! domain types here; argument vectors are constructed in a canonical,
//! deterministic order.

use crate::errors::{CribError, Result, RuntimeError};
use crate::redaction::render_args;
use crate::runtime::RuntimeKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Label carrying the owning workspace ID; mandatory on every workspace
/// container the engine creates.
pub const LABEL_WORKSPACE: &str = "crib.workspace";

/// Label carrying the build fingerprint the container was created from.
pub const LABEL_FINGERPRINT: &str = "crib.fingerprint";

/// Container state reported by inspect while the runtime is tearing a
/// container down; such containers are skipped during discovery.
const STATE_REMOVING: &str = "removing";

/// Canonical container name for a workspace.
pub fn container_name(workspace_id: &str) -> String {
    format!("crib-{}", workspace_id)
}

/// Canonical image name for a workspace-owned build.
pub fn image_name(workspace_id: &str, tag: &str) -> String {
    format!("crib-{}:{}", workspace_id, tag)
}

/// One observed port binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
}

/// Observed container state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

/// Subset of the container's static configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfigInfo {
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Observed container details translated from inspect JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDetails {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub state: ContainerState,
    pub config: ContainerConfigInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,
}

impl ContainerDetails {
    pub fn is_running(&self) -> bool {
        self.state.status == "running"
    }

    /// Translate one element of `inspect --type container` output.
    pub fn from_inspect_json(value: &serde_json::Value) -> Result<Self> {
        let id = value
            .get("Id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RuntimeError::Malformed {
                message: "inspect entry without Id".to_string(),
            })?
            .to_string();

        let name = value
            .get("Name")
            .and_then(|v| v.as_str())
            .map(|n| n.trim_start_matches('/').to_string());

        let created = value
            .get("Created")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let state = ContainerState {
            status: value
                .get("State")
                .and_then(|s| s.get("Status"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            started_at: value
                .get("State")
                .and_then(|s| s.get("StartedAt"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        };

        let mut labels = IndexMap::new();
        if let Some(obj) = value
            .get("Config")
            .and_then(|c| c.get("Labels"))
            .and_then(|l| l.as_object())
        {
            for (k, v) in obj {
                if let Some(s) = v.as_str() {
                    labels.insert(k.clone(), s.to_string());
                }
            }
        }

        let user = value
            .get("Config")
            .and_then(|c| c.get("User"))
            .and_then(|v| v.as_str())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self {
            id,
            name,
            created,
            state,
            config: ContainerConfigInfo { labels, user },
            ports: parse_port_bindings(value),
        })
    }
}

/// Parse `NetworkSettings.Ports` into port bindings.
///
/// Keys look like `"8080/tcp"`; a missing protocol defaults to `tcp`. Keys
/// with a null binding list are exposed-but-unpublished and yield an entry
/// without host information.
pub fn parse_port_bindings(container: &serde_json::Value) -> Vec<PortBinding> {
    let mut bindings = Vec::new();

    let Some(ports) = container
        .get("NetworkSettings")
        .and_then(|ns| ns.get("Ports"))
        .and_then(|p| p.as_object())
    else {
        return bindings;
    };

    for (spec, value) in ports {
        let (port_str, protocol) = match spec.split_once('/') {
            Some((p, proto)) => (p, proto),
            None => (spec.as_str(), "tcp"),
        };
        let Ok(container_port) = port_str.parse::<u16>() else {
            continue;
        };

        match value.as_array() {
            Some(host_bindings) if !host_bindings.is_empty() => {
                for binding in host_bindings {
                    let host_ip = binding
                        .get("HostIp")
                        .and_then(|v| v.as_str())
                        .filter(|ip| !ip.is_empty())
                        .map(str::to_string);
                    let host_port = binding
                        .get("HostPort")
                        .and_then(|v| v.as_str())
                        .and_then(|p| p.parse::<u16>().ok());
                    bindings.push(PortBinding {
                        container_port,
                        protocol: protocol.to_string(),
                        host_ip,
                        host_port,
                    });
                }
            }
            _ => bindings.push(PortBinding {
                container_port,
                protocol: protocol.to_string(),
                host_ip: None,
                host_port: None,
            }),
        }
    }

    bindings
}

/// Subset of image inspect output the engine consumes
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDetails {
    pub id: String,
    pub architecture: Option<String>,
    pub env: Vec<String>,
    pub user: Option<String>,
}

impl ImageDetails {
    fn from_inspect_json(value: &serde_json::Value) -> Result<Self> {
        let id = value
            .get("Id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RuntimeError::Malformed {
                message: "image inspect entry without Id".to_string(),
            })?
            .to_string();

        let architecture = value
            .get("Architecture")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let env = value
            .get("Config")
            .and_then(|c| c.get("Env"))
            .and_then(|e| e.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let user = value
            .get("Config")
            .and_then(|c| c.get("User"))
            .and_then(|v| v.as_str())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self {
            id,
            architecture,
            env,
            user,
        })
    }

    /// Image environment as a key → value map.
    pub fn env_map(&self) -> IndexMap<String, String> {
        self.env
            .iter()
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Options for creating and starting a workspace container
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub name: String,
    pub workspace_id: String,
    /// Extra labels beyond the workspace label, emitted in sorted key order
    pub labels: BTreeMap<String, String>,
    pub user: Option<String>,
    /// Container environment, emitted in sorted key order
    pub env: BTreeMap<String, String>,
    pub init: bool,
    pub privileged: bool,
    pub cap_add: Vec<String>,
    pub security_opt: Vec<String>,
    /// Pre-formatted `--mount` specifications, in declaration order
    pub mounts: Vec<String>,
    /// Pre-formatted `--publish` specifications, in declaration order
    pub publish: Vec<String>,
    pub entrypoint: Option<String>,
    /// Opaque pass-through tokens; always placed right before the image
    pub extra_args: Vec<String>,
    pub image: String,
    pub command: Vec<String>,
}

/// Options for executing a command inside a container
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub user: Option<String>,
    pub workdir: Option<String>,
    /// Environment injected as `-e` flags, emitted in sorted key order
    pub env: BTreeMap<String, String>,
    pub interactive: bool,
    pub tty: bool,
    pub privileged: bool,
}

/// Captured output of a container exec
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Options for building a workspace image
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub tag: String,
    /// Build arguments, emitted in sorted key order
    pub build_args: BTreeMap<String, String>,
    pub target: Option<String>,
    /// Image labels, emitted in sorted key order
    pub labels: BTreeMap<String, String>,
}

/// CLI adapter over one container runtime binary
#[derive(Debug, Clone)]
pub struct CliRuntime {
    kind: RuntimeKind,
    program: String,
}

impl CliRuntime {
    /// Adapter using the runtime's default binary name.
    pub fn new(kind: RuntimeKind) -> Self {
        Self {
            kind,
            program: kind.as_str().to_string(),
        }
    }

    /// Adapter with an explicit binary path.
    pub fn with_program(kind: RuntimeKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
        }
    }

    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run the runtime with `args`, capturing output. Cancellation kills the
    /// child and returns `Cancelled`.
    async fn output(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<std::process::Output> {
        debug!("executing: {} {}", self.program, render_args(args));

        let mut command = self.command();
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tokio::select! {
            output = command.output() => output.map_err(|e| {
                RuntimeError::CommandFailed {
                    action: format!("{} {}", self.program, render_args(args)),
                    stderr: e.to_string(),
                }
                .into()
            }),
            _ = cancel.cancelled() => Err(CribError::Cancelled),
        }
    }

    /// Run the runtime with `args` and return trimmed stdout, failing with a
    /// scrubbed `CommandFailed` on non-zero exit.
    async fn capture(&self, args: Vec<String>, cancel: &CancellationToken) -> Result<String> {
        let output = self.output(&args, cancel).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RuntimeError::CommandFailed {
                action: format!("{} {}", self.program, render_args(&args)),
                stderr,
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Probe runtime responsiveness via `<rt> version`.
    #[instrument(skip(self, cancel))]
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        self.capture(vec!["version".to_string()], cancel).await?;
        Ok(())
    }

    /// Human-readable version line for diagnostics.
    pub async fn version_string(&self, cancel: &CancellationToken) -> Result<String> {
        let out = self.capture(vec!["--version".to_string()], cancel).await?;
        Ok(out.lines().next().unwrap_or_default().to_string())
    }

    /// List container IDs carrying a `key=value` label.
    pub async fn ps_ids_by_label(
        &self,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let stdout = self
            .capture(
                vec![
                    "ps".to_string(),
                    "-q".to_string(),
                    "-a".to_string(),
                    "--filter".to_string(),
                    format!("label={}", label),
                ],
                cancel,
            )
            .await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Inspect containers by ID. Containers that vanished between listing and
    /// inspection yield an empty result rather than an error.
    pub async fn inspect_containers(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerDetails>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
        ];
        args.extend(ids.iter().cloned());

        let stdout = match self.capture(args, cancel).await {
            Ok(out) => out,
            Err(CribError::Runtime(RuntimeError::CommandFailed { stderr, .. }))
                if stderr.to_lowercase().contains("no such") =>
            {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e),
        };

        let values: Vec<serde_json::Value> =
            serde_json::from_str(&stdout).map_err(|e| RuntimeError::Malformed {
                message: format!("container inspect JSON: {}", e),
            })?;

        values.iter().map(ContainerDetails::from_inspect_json).collect()
    }

    /// Find the workspace's container via the workspace label.
    ///
    /// Containers in the ephemeral `removing` state are skipped; the first
    /// remaining candidate wins.
    #[instrument(skip(self, cancel))]
    pub async fn find_container(
        &self,
        workspace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ContainerDetails>> {
        let ids = self
            .ps_ids_by_label(&format!("{}={}", LABEL_WORKSPACE, workspace_id), cancel)
            .await?;
        let details = self.inspect_containers(&ids, cancel).await?;

        Ok(details
            .into_iter()
            .find(|c| c.state.status != STATE_REMOVING))
    }

    /// Construct the canonical `run` argument vector.
    ///
    /// Labels, environment, and build arguments are emitted in sorted key
    /// order; the image and command are always last.
    pub fn run_args(opts: &RunOptions, inject_keep_id: bool) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            opts.name.clone(),
            "--label".to_string(),
            format!("{}={}", LABEL_WORKSPACE, opts.workspace_id),
        ];

        for (key, value) in &opts.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }

        if let Some(ref user) = opts.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }

        for (key, value) in &opts.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        if opts.init {
            args.push("--init".to_string());
        }
        if opts.privileged {
            args.push("--privileged".to_string());
        }
        for cap in &opts.cap_add {
            args.push("--cap-add".to_string());
            args.push(cap.clone());
        }
        for opt in &opts.security_opt {
            args.push("--security-opt".to_string());
            args.push(opt.clone());
        }
        for mount in &opts.mounts {
            args.push("--mount".to_string());
            args.push(mount.clone());
        }
        for publish in &opts.publish {
            args.push("--publish".to_string());
            args.push(publish.clone());
        }
        if let Some(ref entrypoint) = opts.entrypoint {
            args.push("--entrypoint".to_string());
            args.push(entrypoint.clone());
        }
        if inject_keep_id {
            args.push("--userns=keep-id".to_string());
        }

        args.extend(opts.extra_args.iter().cloned());
        args.push(opts.image.clone());
        args.extend(opts.command.iter().cloned());

        args
    }

    /// Whether the rootless Podman user-namespace flag must be injected for
    /// this invocation.
    fn should_inject_keep_id(&self, opts: &RunOptions) -> bool {
        self.kind == RuntimeKind::Podman
            && !effective_uid_is_root()
            && !opts.extra_args.iter().any(|a| a.starts_with("--userns"))
    }

    /// Create and start a container; returns the new container ID.
    #[instrument(skip(self, opts, cancel), fields(name = %opts.name))]
    pub async fn run_container(
        &self,
        opts: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let args = Self::run_args(opts, self.should_inject_keep_id(opts));
        let stdout = self.capture(args, cancel).await?;
        // Last line of stdout is the container ID (pull progress may precede it)
        Ok(stdout.lines().last().unwrap_or_default().trim().to_string())
    }

    pub async fn start_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.capture(vec!["start".to_string(), id.to_string()], cancel)
            .await?;
        Ok(())
    }

    pub async fn stop_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.capture(vec!["stop".to_string(), id.to_string()], cancel)
            .await?;
        Ok(())
    }

    pub async fn restart_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.capture(vec!["restart".to_string(), id.to_string()], cancel)
            .await?;
        Ok(())
    }

    pub async fn remove_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.capture(
            vec!["rm".to_string(), "-f".to_string(), id.to_string()],
            cancel,
        )
        .await?;
        Ok(())
    }

    fn exec_args(id: &str, command: &[String], opts: &ExecOptions) -> Vec<String> {
        let mut args = vec!["exec".to_string()];

        if opts.interactive {
            args.push("-i".to_string());
        }
        if opts.tty {
            args.push("-t".to_string());
        }
        if opts.privileged {
            args.push("--privileged".to_string());
        }
        if let Some(ref user) = opts.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }
        if let Some(ref workdir) = opts.workdir {
            args.push("-w".to_string());
            args.push(workdir.clone());
        }
        for (key, value) in &opts.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(id.to_string());
        args.extend(command.iter().cloned());
        args
    }

    /// Execute a command inside a container, capturing output.
    #[instrument(skip(self, command, opts, cancel))]
    pub async fn exec_capture(
        &self,
        id: &str,
        command: &[String],
        opts: &ExecOptions,
        cancel: &CancellationToken,
    ) -> Result<ExecOutput> {
        let args = Self::exec_args(id, command, opts);
        let output = self.output(&args, cancel).await?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Execute a command inside a container with inherited stdio, returning
    /// the exit code. Used for interactive `exec`/`shell`.
    pub async fn exec_streamed(
        &self,
        id: &str,
        command: &[String],
        opts: &ExecOptions,
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let args = Self::exec_args(id, command, opts);
        debug!("executing: {} {}", self.program, render_args(&args));

        let mut child = self
            .command()
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RuntimeError::CommandFailed {
                action: format!("{} {}", self.program, render_args(&args)),
                stderr: e.to_string(),
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| RuntimeError::CommandFailed {
                    action: format!("{} exec", self.program),
                    stderr: e.to_string(),
                })?;
                Ok(status.code().unwrap_or(-1))
            }
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                Err(CribError::Cancelled)
            }
        }
    }

    /// Fetch container logs.
    pub async fn container_logs(&self, id: &str, cancel: &CancellationToken) -> Result<String> {
        self.capture(vec!["logs".to_string(), id.to_string()], cancel)
            .await
    }

    /// Pull an image.
    #[instrument(skip(self, cancel))]
    pub async fn pull_image(&self, image: &str, cancel: &CancellationToken) -> Result<()> {
        self.capture(vec!["pull".to_string(), image.to_string()], cancel)
            .await?;
        Ok(())
    }

    /// Inspect an image, returning `None` when it does not exist locally.
    #[instrument(skip(self, cancel))]
    pub async fn inspect_image(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ImageDetails>> {
        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            image.to_string(),
        ];

        let stdout = match self.capture(args, cancel).await {
            Ok(out) => out,
            Err(CribError::Runtime(RuntimeError::CommandFailed { stderr, .. })) => {
                let lower = stderr.to_lowercase();
                if lower.contains("no such") || lower.contains("not known") {
                    return Ok(None);
                }
                return Err(RuntimeError::CommandFailed {
                    action: format!("{} image inspect", self.program),
                    stderr,
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        let values: Vec<serde_json::Value> =
            serde_json::from_str(&stdout).map_err(|e| RuntimeError::Malformed {
                message: format!("image inspect JSON: {}", e),
            })?;

        match values.first() {
            Some(value) => Ok(Some(ImageDetails::from_inspect_json(value)?)),
            None => Ok(None),
        }
    }

    fn build_arg_vec(opts: &BuildOptions, prefix: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();

        if let Some(ref dockerfile) = opts.dockerfile {
            args.push("-f".to_string());
            args.push(dockerfile.display().to_string());
        }
        args.push("-t".to_string());
        args.push(opts.tag.clone());

        for (key, value) in &opts.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(ref target) = opts.target {
            args.push("--target".to_string());
            args.push(target.clone());
        }
        for (key, value) in &opts.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(opts.context.display().to_string());
        args
    }

    /// Build an image. Docker first tries `buildx build --load` and falls
    /// back to plain `build`; Podman always uses plain `build`.
    #[instrument(skip(self, opts, cancel), fields(tag = %opts.tag))]
    pub async fn build_image(&self, opts: &BuildOptions, cancel: &CancellationToken) -> Result<()> {
        if self.kind == RuntimeKind::Docker {
            let args = Self::build_arg_vec(opts, &["buildx", "build", "--load"]);
            match self.capture(args, cancel).await {
                Ok(_) => return Ok(()),
                Err(CribError::Cancelled) => return Err(CribError::Cancelled),
                Err(e) => {
                    debug!("buildx build failed, falling back to plain build: {}", e);
                }
            }
        }

        let args = Self::build_arg_vec(opts, &["build"]);
        match self.capture(args, cancel).await {
            Ok(_) => Ok(()),
            Err(CribError::Runtime(RuntimeError::CommandFailed { stderr, .. })) => {
                Err(RuntimeError::BuildFailed { stderr }.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Probe the runtime host's architecture.
    pub async fn arch_probe(&self, cancel: &CancellationToken) -> Result<String> {
        let args = match self.kind {
            RuntimeKind::Docker => vec![
                "version".to_string(),
                "--format".to_string(),
                "{{.Server.Arch}}".to_string(),
            ],
            RuntimeKind::Podman => vec![
                "info".to_string(),
                "--format".to_string(),
                "{{.Host.Arch}}".to_string(),
            ],
        };
        self.capture(args, cancel).await
    }
}

#[cfg(unix)]
fn effective_uid_is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn effective_uid_is_root() -> bool {
    true
}
