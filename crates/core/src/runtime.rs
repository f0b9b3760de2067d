//! Container runtime selection and polymorphism
//!
//! The engine drives exactly one runtime per invocation. [`RuntimeKind`]
//! names the variant, [`ContainerRuntimeImpl`] dispatches the capability set
//! over it, and [`select_runtime`] implements the selection contract:
//! explicit choice first, then the `CRIB_RUNTIME` environment override, then
//! probing podman and docker for responsiveness.

use crate::docker::{
    BuildOptions, CliRuntime, ContainerDetails, ExecOptions, ExecOutput, ImageDetails, RunOptions,
};
use crate::errors::{CribError, Result, RuntimeError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Environment variable forcing the runtime choice
pub const RUNTIME_ENV: &str = "CRIB_RUNTIME";

/// Supported container runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = CribError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(RuntimeError::Malformed {
                message: format!("unknown runtime '{}'; supported: docker, podman", s),
            }
            .into()),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Concrete runtime implementation, dispatching on the variant tag
#[derive(Debug, Clone)]
pub enum ContainerRuntimeImpl {
    Docker(CliRuntime),
    Podman(CliRuntime),
}

impl ContainerRuntimeImpl {
    /// Construct the implementation for a runtime kind.
    pub fn new(kind: RuntimeKind) -> Self {
        match kind {
            RuntimeKind::Docker => Self::Docker(CliRuntime::new(RuntimeKind::Docker)),
            RuntimeKind::Podman => Self::Podman(CliRuntime::new(RuntimeKind::Podman)),
        }
    }

    pub fn runtime_name(&self) -> &'static str {
        match self {
            Self::Docker(_) => "docker",
            Self::Podman(_) => "podman",
        }
    }

    pub fn kind(&self) -> RuntimeKind {
        match self {
            Self::Docker(_) => RuntimeKind::Docker,
            Self::Podman(_) => RuntimeKind::Podman,
        }
    }

    /// The underlying CLI adapter; also used by the compose helper so both
    /// layers invoke the same binary.
    pub fn cli(&self) -> &CliRuntime {
        match self {
            Self::Docker(cli) => cli,
            Self::Podman(cli) => cli,
        }
    }

    pub async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        self.cli().ping(cancel).await
    }

    pub async fn version_string(&self, cancel: &CancellationToken) -> Result<String> {
        self.cli().version_string(cancel).await
    }

    pub async fn find_container(
        &self,
        workspace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ContainerDetails>> {
        self.cli().find_container(workspace_id, cancel).await
    }

    pub async fn inspect_containers(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerDetails>> {
        self.cli().inspect_containers(ids, cancel).await
    }

    pub async fn run_container(
        &self,
        opts: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.cli().run_container(opts, cancel).await
    }

    pub async fn start_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.cli().start_container(id, cancel).await
    }

    pub async fn stop_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.cli().stop_container(id, cancel).await
    }

    pub async fn restart_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.cli().restart_container(id, cancel).await
    }

    pub async fn remove_container(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.cli().remove_container(id, cancel).await
    }

    pub async fn exec_capture(
        &self,
        id: &str,
        command: &[String],
        opts: &ExecOptions,
        cancel: &CancellationToken,
    ) -> Result<ExecOutput> {
        self.cli().exec_capture(id, command, opts, cancel).await
    }

    pub async fn exec_streamed(
        &self,
        id: &str,
        command: &[String],
        opts: &ExecOptions,
        cancel: &CancellationToken,
    ) -> Result<i32> {
        self.cli().exec_streamed(id, command, opts, cancel).await
    }

    pub async fn container_logs(&self, id: &str, cancel: &CancellationToken) -> Result<String> {
        self.cli().container_logs(id, cancel).await
    }

    pub async fn pull_image(&self, image: &str, cancel: &CancellationToken) -> Result<()> {
        self.cli().pull_image(image, cancel).await
    }

    pub async fn inspect_image(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ImageDetails>> {
        self.cli().inspect_image(image, cancel).await
    }

    pub async fn build_image(&self, opts: &BuildOptions, cancel: &CancellationToken) -> Result<()> {
        self.cli().build_image(opts, cancel).await
    }

    pub async fn arch_probe(&self, cancel: &CancellationToken) -> Result<String> {
        self.cli().arch_probe(cancel).await
    }
}

/// Resolve the requested runtime kind without probing.
///
/// Precedence: explicit choice > `CRIB_RUNTIME` environment variable. Returns
/// `None` when neither is set and probing should decide.
pub fn requested_runtime_kind(explicit: Option<RuntimeKind>) -> Result<Option<RuntimeKind>> {
    if let Some(kind) = explicit {
        return Ok(Some(kind));
    }

    match std::env::var(RUNTIME_ENV) {
        Ok(value) if !value.trim().is_empty() => value.trim().parse().map(Some),
        _ => Ok(None),
    }
}

/// Select and verify a runtime.
///
/// A forced runtime (explicit or via `CRIB_RUNTIME`) must answer a `version`
/// probe or selection fails. Otherwise podman is probed first, then docker;
/// `NoRuntime` is returned when neither responds.
pub async fn select_runtime(
    explicit: Option<RuntimeKind>,
    cancel: &CancellationToken,
) -> Result<ContainerRuntimeImpl> {
    if let Some(kind) = requested_runtime_kind(explicit)? {
        let runtime = ContainerRuntimeImpl::new(kind);
        runtime.ping(cancel).await?;
        debug!("using forced runtime {}", kind);
        return Ok(runtime);
    }

    for kind in [RuntimeKind::Podman, RuntimeKind::Docker] {
        let runtime = ContainerRuntimeImpl::new(kind);
        match runtime.ping(cancel).await {
            Ok(()) => {
                debug!("probed runtime {}", kind);
                return Ok(runtime);
            }
            Err(CribError::Cancelled) => return Err(CribError::Cancelled),
            Err(e) => debug!("runtime {} not responsive: {}", kind, e),
        }
    }

    Err(RuntimeError::NoRuntime.into())
}
