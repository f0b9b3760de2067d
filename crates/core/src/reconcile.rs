//! Reconciliation engine
//!
//! Brings the observed container state into agreement with the declared
//! configuration, choosing the least-disruptive transition: start an existing
//! container, restart in place, recreate without rebuilding, or refuse and
//! demand a full rebuild. Runs staged lifecycle hooks and persists the
//! outcome so later invocations can re-attach without re-reading
//! configuration.

use crate::compose::{self, ComposeHelper};
use crate::config::{ConfigLoader, ConfigVariant, DevContainerConfig};
use crate::docker::{self, BuildOptions, ContainerDetails, ExecOptions, RunOptions};
use crate::dockerfile::Dockerfile;
use crate::envfile;
use crate::errors::{ComposeError, CribError, Result};
use crate::fingerprint::{classify, runtime_profile_digest, FingerprintInputs, ReconcileAction};
use crate::lifecycle::{self, HookContext, UpFlow};
use crate::plugins::{PluginContext, PluginManager};
use crate::runtime::ContainerRuntimeImpl;
use crate::state::{ReconcileResult, ServiceSummary, WorkspaceStore};
use crate::workspace::Workspace;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Options for the `up` operation
#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// Delete any existing container and create a fresh one
    pub recreate: bool,
}

/// Observed workspace state
#[derive(Debug, Clone)]
pub struct WorkspaceStatus {
    pub container: Option<ContainerDetails>,
    pub services: Vec<compose::ServiceStatus>,
}

/// An `exec` request against the workspace container
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub env: Vec<(String, String)>,
    pub env_files: Vec<PathBuf>,
    pub privileged: bool,
    pub interactive: bool,
    pub tty: bool,
    pub command: Vec<String>,
}

/// The workspace lifecycle engine
pub struct Engine {
    runtime: ContainerRuntimeImpl,
    store: WorkspaceStore,
    plugins: PluginManager,
}

impl Engine {
    pub fn new(runtime: ContainerRuntimeImpl, store: WorkspaceStore) -> Self {
        Self {
            runtime,
            store,
            plugins: PluginManager::new(),
        }
    }

    pub fn plugins_mut(&mut self) -> &mut PluginManager {
        &mut self.plugins
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn runtime(&self) -> &ContainerRuntimeImpl {
        &self.runtime
    }

    fn plugin_context(workspace: &Workspace) -> PluginContext {
        PluginContext {
            workspace_id: workspace.id.clone(),
            project_root: workspace.source.clone(),
        }
    }

    /// Load the workspace's configuration with substitutions and, for
    /// compose-backed workspaces, service-metadata inheritance applied.
    async fn load_config(
        &self,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> Result<(DevContainerConfig, Option<ComposeHelper>)> {
        let (mut config, _report) = ConfigLoader::load_resolved(
            &workspace.source,
            &workspace.config_rel_path,
            &workspace.id,
        )?;

        if !config.uses_compose() {
            return Ok((config, None));
        }

        let helper = self.compose_helper(workspace, &config);
        let service = config
            .service
            .clone()
            .expect("validated: compose configs name a service");
        match helper.service_defaults(&service, cancel).await {
            Ok(defaults) => ConfigLoader::apply_compose_service_defaults(&mut config, &defaults),
            Err(CribError::Compose(ComposeError::ServiceNotFound { service })) => {
                return Err(ComposeError::ServiceNotFound { service }.into())
            }
            // Metadata extraction is best-effort; the compose CLI will
            // surface real project errors during build/up
            Err(e) => warn!("could not read compose service metadata: {}", e),
        }

        Ok((config, Some(helper)))
    }

    fn compose_helper(&self, workspace: &Workspace, config: &DevContainerConfig) -> ComposeHelper {
        let files = config
            .compose_files()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        ComposeHelper::new(
            self.runtime.cli().clone(),
            compose::project_name(&workspace.id),
            workspace.config_dir(),
            files,
        )
        .with_extra_env(config.container_env.clone())
    }

    /// The observed container backing a workspace; label-filtered discovery
    /// is the only authoritative read.
    async fn observed_container(
        &self,
        workspace: &Workspace,
        config: &DevContainerConfig,
        helper: Option<&ComposeHelper>,
        cancel: &CancellationToken,
    ) -> Result<Option<ContainerDetails>> {
        match (helper, config.service.as_deref()) {
            (Some(helper), Some(service)) => {
                helper.find_service_container(service, cancel).await
            }
            _ => self.runtime.find_container(&workspace.id, cancel).await,
        }
    }

    /// Make sure the image for an image- or build-backed workspace exists,
    /// returning its reference.
    async fn ensure_image(
        &self,
        workspace: &Workspace,
        config: &DevContainerConfig,
        inputs: &FingerprintInputs,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match config.variant() {
            Some(ConfigVariant::Image) => {
                let image = config.image.clone().expect("image variant");
                if self.runtime.inspect_image(&image, cancel).await?.is_none() {
                    info!("pulling image {}", image);
                    self.runtime.pull_image(&image, cancel).await?;
                }
                Ok(image)
            }
            Some(ConfigVariant::Build) => {
                let tag = docker::image_name(&workspace.id, &inputs.tag());
                if self.runtime.inspect_image(&tag, cancel).await?.is_some() {
                    debug!("image {} already built", tag);
                    return Ok(tag);
                }

                let build = config.build.as_ref().expect("build variant");
                let config_dir = workspace.config_dir();
                let context = build_context_path(&workspace.source, &config_dir, build.context.as_deref());
                let dockerfile =
                    config_dir.join(build.dockerfile.as_deref().unwrap_or("Dockerfile"));

                let mut build_args = BTreeMap::new();
                for (key, value) in &build.args {
                    build_args.insert(key.clone(), value.clone());
                }
                let mut labels = BTreeMap::new();
                labels.insert(docker::LABEL_WORKSPACE.to_string(), workspace.id.clone());

                info!("building image {}", tag);
                self.runtime
                    .build_image(
                        &BuildOptions {
                            context,
                            dockerfile: Some(dockerfile),
                            tag: tag.clone(),
                            build_args,
                            target: build.target.clone(),
                            labels,
                        },
                        cancel,
                    )
                    .await?;
                Ok(tag)
            }
            _ => Err(CribError::Internal {
                message: "ensure_image called for a compose workspace".to_string(),
            }),
        }
    }

    /// For build-backed workspaces without an explicit user, fall back to the
    /// last `USER` directive of the target stage chain.
    async fn dockerfile_user(
        &self,
        workspace: &Workspace,
        config: &DevContainerConfig,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let build = config.build.as_ref()?;
        let dockerfile_path = workspace
            .config_dir()
            .join(build.dockerfile.as_deref().unwrap_or("Dockerfile"));
        let content = std::fs::read_to_string(&dockerfile_path).ok()?;
        let parsed = Dockerfile::parse(&content);

        let base_env = match parsed.find_base_image(&build.args, build.target.as_deref()) {
            Some(base) => match self.runtime.inspect_image(&base, cancel).await {
                Ok(Some(image)) => image.env_map(),
                _ => Default::default(),
            },
            None => Default::default(),
        };

        parsed.find_user_statement(&build.args, &base_env, build.target.as_deref())
    }

    /// Construct the canonical run options for a workspace container.
    fn run_options(
        workspace: &Workspace,
        config: &DevContainerConfig,
        image: &str,
        fingerprint: &str,
    ) -> RunOptions {
        let mut labels = BTreeMap::new();
        labels.insert(docker::LABEL_FINGERPRINT.to_string(), fingerprint.to_string());

        let env: BTreeMap<String, String> = config
            .container_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // Keep the container alive unless the image's own command is wanted
        let command = if config.override_command.unwrap_or(true) {
            vec!["sleep".to_string(), "infinity".to_string()]
        } else {
            Vec::new()
        };

        RunOptions {
            name: docker::container_name(&workspace.id),
            workspace_id: workspace.id.clone(),
            labels,
            user: config.container_user.clone(),
            env,
            init: config.init.unwrap_or(false),
            privileged: config.privileged.unwrap_or(false),
            cap_add: config.cap_add.clone(),
            security_opt: config.security_opt.clone(),
            mounts: config.mount_specs(),
            publish: config.publish_specs(),
            entrypoint: None,
            extra_args: config.run_args.clone(),
            image: image.to_string(),
            command,
        }
    }

    fn hook_context(config: &DevContainerConfig) -> HookContext {
        HookContext {
            workspace_folder: config
                .workspace_folder
                .clone()
                .unwrap_or_else(|| "/".to_string()),
            user: config.effective_remote_user().map(str::to_string),
            env: config
                .remote_env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    async fn run_hooks(
        &self,
        container_id: &str,
        config: &DevContainerConfig,
        flow: UpFlow,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let ctx = Self::hook_context(config);
        for phase in flow.phases() {
            if let Some(value) = config.hook(*phase) {
                lifecycle::run_phase(&self.runtime, container_id, *phase, value, &ctx, cancel)
                    .await?;
            }
        }
        Ok(())
    }

    async fn service_summaries(
        &self,
        helper: Option<&ComposeHelper>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceSummary>> {
        let Some(helper) = helper else {
            return Ok(Vec::new());
        };
        Ok(helper
            .list_service_statuses(cancel)
            .await?
            .into_iter()
            .map(|s| ServiceSummary {
                name: s.service,
                state: s.state,
            })
            .collect())
    }

    /// Assemble and persist the reconcile outcome. Only called after every
    /// abort-capable step has succeeded, so a failure earlier leaves the
    /// previous result intact.
    #[allow(clippy::too_many_arguments)]
    async fn persist_result(
        &self,
        workspace: &Workspace,
        config: &DevContainerConfig,
        helper: Option<&ComposeHelper>,
        container: &ContainerDetails,
        recreated: bool,
        fingerprint: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileResult> {
        let result = ReconcileResult {
            container_id: container.id.clone(),
            workspace_folder: config.workspace_folder.clone().unwrap_or_default(),
            remote_user: config.effective_remote_user().map(str::to_string),
            remote_env: config.remote_env.clone(),
            ports: container.ports.clone(),
            recreated,
            services: self.service_summaries(helper, cancel).await?,
            fingerprint,
            runtime_profile: Some(runtime_profile_digest(config)),
        };
        self.store.save_result(&workspace.id, &result)?;

        let mut record = workspace.clone();
        record.last_used_at = Utc::now();
        self.store.save(&record)?;

        Ok(result)
    }

    /// Bring the workspace up: reuse, resume, or create its container, run
    /// the staged lifecycle hooks, and persist the outcome.
    #[instrument(skip(self, options, cancel), fields(workspace = %workspace.id))]
    pub async fn up(
        &self,
        workspace: &Workspace,
        options: &UpOptions,
        cancel: &CancellationToken,
    ) -> Result<ReconcileResult> {
        let pctx = Self::plugin_context(workspace);
        self.plugins.run_before_up(&pctx)?;

        let (config, helper) = self.load_config(workspace, cancel).await?;
        let existing = self
            .observed_container(workspace, &config, helper.as_ref(), cancel)
            .await?;

        // Compose projects fingerprint through their own provider; only
        // image- and build-backed workspaces are digested here
        let inputs = match helper {
            Some(_) => None,
            None => Some(FingerprintInputs::from_config(
                &config,
                &workspace.source,
                &workspace.config_dir(),
            )?),
        };
        let fingerprint = inputs.as_ref().map(|i| i.digest());

        let mut recreated = false;
        let (container_id, flow) = match existing {
            Some(container) if !options.recreate && container.is_running() => {
                debug!("container {} already running", container.id);
                (container.id, UpFlow::Attach)
            }
            Some(container) if !options.recreate => {
                info!("starting existing container {}", container.id);
                self.runtime.start_container(&container.id, cancel).await?;
                (container.id, UpFlow::Resume)
            }
            existing => {
                if let Some(container) = existing {
                    info!("removing container {} for recreation", container.id);
                    self.runtime.remove_container(&container.id, cancel).await?;
                    recreated = true;
                }

                let id = if let Some(ref helper) = helper {
                    let services = config.all_services();
                    helper.build(&services, cancel).await?;
                    helper.up(&services, cancel).await?;
                    let service = config.service.as_deref().expect("validated");
                    helper
                        .find_service_container(service, cancel)
                        .await?
                        .ok_or_else(|| CribError::NoContainer {
                            workspace: workspace.id.clone(),
                        })?
                        .id
                } else {
                    let inputs = inputs.as_ref().expect("non-compose workspaces are digested");
                    let digest = fingerprint.as_deref().expect("digest follows inputs");
                    let image = self
                        .ensure_image(workspace, &config, inputs, cancel)
                        .await?;
                    let mut run_opts = Self::run_options(workspace, &config, &image, digest);
                    if run_opts.user.is_none() {
                        run_opts.user = self.dockerfile_user(workspace, &config, cancel).await;
                    }
                    self.runtime.run_container(&run_opts, cancel).await?
                };
                (id, UpFlow::Create)
            }
        };

        // A fatal hook failure aborts here: the container stays for
        // inspection and no result is written
        self.run_hooks(&container_id, &config, flow, cancel).await?;

        let container = self
            .observed_container(workspace, &config, helper.as_ref(), cancel)
            .await?
            .ok_or_else(|| CribError::NoContainer {
                workspace: workspace.id.clone(),
            })?;

        let result = self
            .persist_result(
                workspace,
                &config,
                helper.as_ref(),
                &container,
                recreated,
                fingerprint,
                cancel,
            )
            .await?;

        self.plugins.run_after_up(&pctx, &result);
        Ok(result)
    }

    /// Observed state of the workspace.
    #[instrument(skip(self, cancel), fields(workspace = %workspace.id))]
    pub async fn status(
        &self,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> Result<WorkspaceStatus> {
        let (config, helper) = self.load_config(workspace, cancel).await?;
        let container = self
            .observed_container(workspace, &config, helper.as_ref(), cancel)
            .await?;
        let services = match helper {
            Some(ref helper) => helper.list_service_statuses(cancel).await?,
            None => Vec::new(),
        };
        Ok(WorkspaceStatus {
            container,
            services,
        })
    }

    /// Stop the workspace container without removing it.
    #[instrument(skip(self, cancel), fields(workspace = %workspace.id))]
    pub async fn down(&self, workspace: &Workspace, cancel: &CancellationToken) -> Result<()> {
        let pctx = Self::plugin_context(workspace);
        self.plugins.run_before_down(&pctx);

        let (config, helper) = self.load_config(workspace, cancel).await?;
        if let Some(helper) = helper {
            helper.stop(cancel).await?;
            return Ok(());
        }

        match self.runtime.find_container(&workspace.id, cancel).await? {
            Some(container) => {
                info!("stopping container {}", container.id);
                self.runtime.stop_container(&container.id, cancel).await
            }
            None => {
                debug!("no container for workspace {}, nothing to stop", config.name.as_deref().unwrap_or(&workspace.id));
                Ok(())
            }
        }
    }

    /// Stop and remove the workspace container and clear the stored result.
    /// The workspace record itself stays until explicitly deleted.
    #[instrument(skip(self, cancel), fields(workspace = %workspace.id))]
    pub async fn remove(&self, workspace: &Workspace, cancel: &CancellationToken) -> Result<()> {
        let pctx = Self::plugin_context(workspace);
        self.plugins.run_before_down(&pctx);

        let (config, helper) = self.load_config(workspace, cancel).await?;
        if let Some(helper) = helper {
            helper.down(cancel).await?;
        } else if let Some(container) =
            self.runtime.find_container(&workspace.id, cancel).await?
        {
            info!("removing container {}", container.id);
            self.runtime.remove_container(&container.id, cancel).await?;
        } else {
            debug!(
                "no container to remove for workspace {}",
                config.name.as_deref().unwrap_or(&workspace.id)
            );
        }

        self.store.delete_result(&workspace.id)
    }

    /// Restart the workspace, choosing restart-in-place, recreate, or
    /// refusing with `NeedsRebuild` based on the declared-vs-observed diff.
    #[instrument(skip(self, cancel), fields(workspace = %workspace.id))]
    pub async fn restart(
        &self,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> Result<ReconcileResult> {
        let (config, helper) = self.load_config(workspace, cancel).await?;
        let observed = self
            .observed_container(workspace, &config, helper.as_ref(), cancel)
            .await?
            .ok_or_else(|| CribError::NoContainer {
                workspace: workspace.id.clone(),
            })?;

        // Compose projects restart through the compose CLI; image diffs are
        // the compose provider's concern
        if let Some(ref helper) = helper {
            helper.restart(cancel).await?;
            self.run_hooks(&observed.id, &config, UpFlow::Resume, cancel)
                .await?;
            let container = self
                .observed_container(workspace, &config, Some(helper), cancel)
                .await?
                .unwrap_or(observed);
            return self
                .persist_result(workspace, &config, Some(helper), &container, false, None, cancel)
                .await;
        }

        let inputs = FingerprintInputs::from_config(
            &config,
            &workspace.source,
            &workspace.config_dir(),
        )?;
        let declared_fingerprint = inputs.digest();
        let observed_fingerprint = observed
            .config
            .labels
            .get(docker::LABEL_FINGERPRINT)
            .cloned();
        let fingerprint_changed =
            observed_fingerprint.as_deref() != Some(declared_fingerprint.as_str());

        let declared_profile = runtime_profile_digest(&config);
        let observed_profile = self
            .store
            .load_result(&workspace.id)
            .ok()
            .and_then(|r| r.runtime_profile);
        let runtime_changed = observed_profile.as_deref() != Some(declared_profile.as_str());

        let recreated = match classify(fingerprint_changed, runtime_changed) {
            ReconcileAction::Rebuild => {
                debug!(
                    "declared fingerprint {} != observed {:?}",
                    declared_fingerprint, observed_fingerprint
                );
                return Err(CribError::NeedsRebuild);
            }
            ReconcileAction::Recreate => {
                info!("runtime configuration changed, recreating {}", observed.id);
                self.runtime.stop_container(&observed.id, cancel).await?;
                self.runtime.remove_container(&observed.id, cancel).await?;

                let image = self
                    .ensure_image(workspace, &config, &inputs, cancel)
                    .await?;
                let mut run_opts =
                    Self::run_options(workspace, &config, &image, &declared_fingerprint);
                if run_opts.user.is_none() {
                    run_opts.user = self.dockerfile_user(workspace, &config, cancel).await;
                }
                self.runtime.run_container(&run_opts, cancel).await?;
                true
            }
            ReconcileAction::Restart => {
                info!("restarting container {} in place", observed.id);
                self.runtime.restart_container(&observed.id, cancel).await?;
                false
            }
        };

        let container = self
            .runtime
            .find_container(&workspace.id, cancel)
            .await?
            .ok_or_else(|| CribError::NoContainer {
                workspace: workspace.id.clone(),
            })?;

        // Resume-flow hooks only; creation hooks never re-run here
        self.run_hooks(&container.id, &config, UpFlow::Resume, cancel)
            .await?;

        self.persist_result(
            workspace,
            &config,
            None,
            &container,
            recreated,
            Some(declared_fingerprint),
            cancel,
        )
        .await
    }

    /// Remove the workspace container and bring it up from scratch.
    #[instrument(skip(self, cancel), fields(workspace = %workspace.id))]
    pub async fn rebuild(
        &self,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> Result<ReconcileResult> {
        self.remove(workspace, cancel).await?;
        self.up(workspace, &UpOptions::default(), cancel).await
    }

    /// Execute a command inside the workspace container.
    #[instrument(skip(self, request, cancel), fields(workspace = %workspace.id))]
    pub async fn exec(
        &self,
        workspace: &Workspace,
        request: &ExecRequest,
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let (config, helper) = self.load_config(workspace, cancel).await?;
        let container = self
            .observed_container(workspace, &config, helper.as_ref(), cancel)
            .await?
            .ok_or_else(|| CribError::NoContainer {
                workspace: workspace.id.clone(),
            })?;

        if !container.is_running() {
            self.runtime.start_container(&container.id, cancel).await?;
        }

        let mut env: BTreeMap<String, String> = config
            .remote_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for file in &request.env_files {
            for (key, value) in envfile::parse_env_file(file)? {
                env.insert(key, value);
            }
        }
        for (key, value) in &request.env {
            env.insert(key.clone(), value.clone());
        }

        let opts = ExecOptions {
            user: request
                .user
                .clone()
                .or_else(|| config.effective_remote_user().map(str::to_string)),
            workdir: request
                .workdir
                .clone()
                .or_else(|| config.workspace_folder.clone()),
            env,
            interactive: request.interactive,
            tty: request.tty,
            privileged: request.privileged,
        };

        self.runtime
            .exec_streamed(&container.id, &request.command, &opts, cancel)
            .await
    }

    /// Fetch the workspace container's log output.
    #[instrument(skip(self, cancel), fields(workspace = %workspace.id))]
    pub async fn logs(&self, workspace: &Workspace, cancel: &CancellationToken) -> Result<String> {
        let (config, helper) = self.load_config(workspace, cancel).await?;
        let container = self
            .observed_container(workspace, &config, helper.as_ref(), cancel)
            .await?
            .ok_or_else(|| CribError::NoContainer {
                workspace: workspace.id.clone(),
            })?;

        self.runtime.container_logs(&container.id, cancel).await
    }

    /// Open an interactive login shell inside the workspace container.
    pub async fn shell(&self, workspace: &Workspace, cancel: &CancellationToken) -> Result<i32> {
        let request = ExecRequest {
            interactive: true,
            tty: true,
            command: vec!["/bin/sh".to_string(), "-l".to_string()],
            ..Default::default()
        };
        self.exec(workspace, &request, cancel).await
    }
}

fn build_context_path(project_root: &Path, config_dir: &Path, context: Option<&str>) -> PathBuf {
    match context {
        Some(context) => {
            let path = Path::new(context);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                config_dir.join(path)
            }
        }
        None => project_root.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::ResolveResult;

    fn sample_workspace() -> Workspace {
        Workspace::from_resolve(&ResolveResult {
            workspace_id: "proj".to_string(),
            project_root: PathBuf::from("/t/proj"),
            relative_config_path: PathBuf::from(".devcontainer/devcontainer.json"),
        })
    }

    fn minimal_config() -> DevContainerConfig {
        DevContainerConfig {
            image: Some("alpine:3.20".to_string()),
            workspace_folder: Some("/w".to_string()),
            workspace_mount: Some(serde_json::json!(
                "type=bind,source=/t/proj,target=/w,consistency=cached"
            )),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_options_shape() {
        let workspace = sample_workspace();
        let config = minimal_config();
        let opts = Engine::run_options(&workspace, &config, "alpine:3.20", "beef");

        assert_eq!(opts.name, "crib-proj");
        assert_eq!(opts.workspace_id, "proj");
        assert_eq!(opts.image, "alpine:3.20");
        assert_eq!(opts.labels.get("crib.fingerprint"), Some(&"beef".to_string()));
        assert_eq!(opts.command, vec!["sleep", "infinity"]);
        assert_eq!(
            opts.mounts,
            vec!["type=bind,source=/t/proj,target=/w,consistency=cached"]
        );
    }

    #[test]
    fn test_run_options_honours_override_command_false() {
        let workspace = sample_workspace();
        let mut config = minimal_config();
        config.override_command = Some(false);

        let opts = Engine::run_options(&workspace, &config, "alpine:3.20", "beef");
        assert!(opts.command.is_empty());
    }

    #[test]
    fn test_run_options_ports_and_env() {
        let workspace = sample_workspace();
        let mut config = minimal_config();
        config.forward_ports = vec![serde_json::json!(8080), serde_json::json!("9090:9091")];
        config
            .container_env
            .insert("B".to_string(), "2".to_string());
        config
            .container_env
            .insert("A".to_string(), "1".to_string());

        let opts = Engine::run_options(&workspace, &config, "alpine:3.20", "beef");
        assert_eq!(opts.publish, vec!["8080:8080", "9090:9091"]);
        // BTreeMap iteration is sorted regardless of declaration order
        let env: Vec<(String, String)> =
            opts.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(env[0].0, "A");
        assert_eq!(env[1].0, "B");
    }

    #[test]
    fn test_hook_context_user_fallback() {
        let mut config = minimal_config();
        config.container_user = Some("node".to_string());
        let ctx = Engine::hook_context(&config);
        assert_eq!(ctx.user.as_deref(), Some("node"));
        assert_eq!(ctx.workspace_folder, "/w");

        config.remote_user = Some("dev".to_string());
        let ctx = Engine::hook_context(&config);
        assert_eq!(ctx.user.as_deref(), Some("dev"));
    }

    #[test]
    fn test_build_context_path() {
        let root = Path::new("/t/proj");
        let config_dir = Path::new("/t/proj/.devcontainer");

        assert_eq!(build_context_path(root, config_dir, None), root);
        assert_eq!(
            build_context_path(root, config_dir, Some("..")),
            config_dir.join("..")
        );
        assert_eq!(
            build_context_path(root, config_dir, Some("/abs/ctx")),
            Path::new("/abs/ctx")
        );
    }
}
