//! Dev container configuration loading and normalization
//!
//! Parses `devcontainer.json` (JSON with comments and trailing commas via
//! json5), validates that exactly one primary (`image`, `build`, or
//! `dockerComposeFile`) is declared, applies variable substitution, and
//! fills the defaulted workspace folder and mount. Unknown top-level keys are
//! preserved through round trips but otherwise ignored.

use crate::errors::{ConfigError, Result};
use crate::lifecycle::LifecyclePhase;
use crate::variable::{SubstitutionContext, SubstitutionReport, VariableSubstitution};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Build section of a dev container configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Which primary drives the workspace's container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigVariant {
    Image,
    Build,
    Compose,
}

/// Parsed, normalized dev container configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevContainerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Legacy top-level Dockerfile path; folded into `build` during
    /// normalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    /// Single path or array of paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_compose_file: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_services: Vec<String>,

    /// Feature ID → option map, declaration order preserved
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub features: IndexMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_folder: Option<String>,

    /// Mount string or `{type, source, target, …}` object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_mount: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Value>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub container_env: IndexMap<String, String>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub remote_env: IndexMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_user: Option<String>,

    /// Integers or `"host:container"` strings, declaration order preserved
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forward_ports: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_port: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_args: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_command: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_create_command: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_content_command: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_create_command: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_start_command: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_attach_command: Option<Value>,

    /// Unknown top-level keys, preserved but ignored
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for DevContainerConfig {
    fn default() -> Self {
        Self {
            name: None,
            image: None,
            docker_file: None,
            build: None,
            docker_compose_file: None,
            service: None,
            run_services: Vec::new(),
            features: IndexMap::new(),
            workspace_folder: None,
            workspace_mount: None,
            mounts: Vec::new(),
            container_env: IndexMap::new(),
            remote_env: IndexMap::new(),
            remote_user: None,
            container_user: None,
            forward_ports: Vec::new(),
            app_port: None,
            run_args: Vec::new(),
            init: None,
            privileged: None,
            cap_add: Vec::new(),
            security_opt: Vec::new(),
            override_command: None,
            shutdown_action: None,
            on_create_command: None,
            update_content_command: None,
            post_create_command: None,
            post_start_command: None,
            post_attach_command: None,
            extra: IndexMap::new(),
        }
    }
}

impl DevContainerConfig {
    /// The authoritative primary, by precedence image > build > compose.
    pub fn variant(&self) -> Option<ConfigVariant> {
        if self.image.is_some() {
            Some(ConfigVariant::Image)
        } else if self.build.is_some() {
            Some(ConfigVariant::Build)
        } else if self.docker_compose_file.is_some() {
            Some(ConfigVariant::Compose)
        } else {
            None
        }
    }

    /// Whether the workspace is compose-backed.
    pub fn uses_compose(&self) -> bool {
        self.docker_compose_file.is_some()
    }

    /// Compose files in declaration order.
    pub fn compose_files(&self) -> Vec<String> {
        match &self.docker_compose_file {
            Some(Value::String(file)) => vec![file.clone()],
            Some(Value::Array(files)) => files
                .iter()
                .filter_map(|f| f.as_str())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Primary service followed by the additional run services.
    pub fn all_services(&self) -> Vec<String> {
        let mut services = Vec::new();
        if let Some(ref service) = self.service {
            services.push(service.clone());
        }
        services.extend(self.run_services.iter().cloned());
        services
    }

    /// The hook value declared for a lifecycle phase, if any.
    pub fn hook(&self, phase: LifecyclePhase) -> Option<&Value> {
        match phase {
            LifecyclePhase::OnCreate => self.on_create_command.as_ref(),
            LifecyclePhase::UpdateContent => self.update_content_command.as_ref(),
            LifecyclePhase::PostCreate => self.post_create_command.as_ref(),
            LifecyclePhase::PostStart => self.post_start_command.as_ref(),
            LifecyclePhase::PostAttach => self.post_attach_command.as_ref(),
        }
    }

    /// User hooks run as: `remoteUser`, falling back to `containerUser`.
    pub fn effective_remote_user(&self) -> Option<&str> {
        self.remote_user
            .as_deref()
            .or(self.container_user.as_deref())
    }

    /// `--publish` specifications derived from `forwardPorts` and `appPort`,
    /// declaration order preserved.
    pub fn publish_specs(&self) -> Vec<String> {
        let mut specs: Vec<String> = self
            .forward_ports
            .iter()
            .filter_map(port_value_to_publish)
            .collect();
        if let Some(ref app_port) = self.app_port {
            specs.extend(port_value_to_publish(app_port));
        }
        specs
    }

    /// `--mount` specifications: the workspace mount first, then declared
    /// mounts in order.
    pub fn mount_specs(&self) -> Vec<String> {
        let mut specs = Vec::new();
        if let Some(ref ws_mount) = self.workspace_mount {
            specs.extend(mount_value_to_spec(ws_mount));
        }
        for mount in &self.mounts {
            specs.extend(mount_value_to_spec(mount));
        }
        specs
    }

    /// Apply variable substitution across all substitutable fields.
    pub fn apply_variable_substitution(
        &self,
        context: &SubstitutionContext,
    ) -> (Self, SubstitutionReport) {
        let mut report = SubstitutionReport::new();
        let mut config = self.clone();

        let sub =
            |s: &str, report: &mut SubstitutionReport| -> String {
                VariableSubstitution::substitute_string(s, context, report)
            };

        if let Some(ref image) = config.image {
            config.image = Some(sub(image, &mut report));
        }
        if let Some(ref mut build) = config.build {
            if let Some(ref dockerfile) = build.dockerfile {
                build.dockerfile = Some(VariableSubstitution::substitute_string(
                    dockerfile,
                    context,
                    &mut report,
                ));
            }
            if let Some(ref bctx) = build.context {
                build.context = Some(VariableSubstitution::substitute_string(
                    bctx,
                    context,
                    &mut report,
                ));
            }
            build.args = build
                .args
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        VariableSubstitution::substitute_string(v, context, &mut report),
                    )
                })
                .collect();
        }
        if let Some(ref folder) = config.workspace_folder {
            config.workspace_folder = Some(sub(folder, &mut report));
        }
        if let Some(ref mount) = config.workspace_mount {
            config.workspace_mount = Some(VariableSubstitution::substitute_json_value(
                mount,
                context,
                &mut report,
            ));
        }
        config.mounts = config
            .mounts
            .iter()
            .map(|m| VariableSubstitution::substitute_json_value(m, context, &mut report))
            .collect();
        config.run_args = config
            .run_args
            .iter()
            .map(|a| sub(a, &mut report))
            .collect();
        config.container_env = config
            .container_env
            .iter()
            .map(|(k, v)| (k.clone(), sub(v, &mut report)))
            .collect();
        config.remote_env = config
            .remote_env
            .iter()
            .map(|(k, v)| (k.clone(), sub(v, &mut report)))
            .collect();
        config.forward_ports = config
            .forward_ports
            .iter()
            .map(|p| VariableSubstitution::substitute_json_value(p, context, &mut report))
            .collect();

        for cmd in [
            &mut config.on_create_command,
            &mut config.update_content_command,
            &mut config.post_create_command,
            &mut config.post_start_command,
            &mut config.post_attach_command,
        ] {
            if let Some(value) = cmd {
                *cmd = Some(VariableSubstitution::substitute_json_value(
                    value,
                    context,
                    &mut report,
                ));
            }
        }

        (config, report)
    }
}

/// Translate a `forwardPorts`/`appPort` entry to a publish specification.
fn port_value_to_publish(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            let port = n.as_u64()?;
            Some(format!("{}:{}", port, port))
        }
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Translate a mount entry to a `--mount` specification.
///
/// Strings pass through verbatim; objects are rendered with the keys the
/// runtime understands (`type`, `source`, `target`, `consistency`,
/// `readonly`).
pub fn mount_value_to_spec(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => {
            let target = obj.get("target").and_then(|v| v.as_str())?;
            if target.is_empty() {
                return None;
            }

            let mount_type = obj
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("bind");
            let mut spec = format!("type={}", mount_type);
            if let Some(source) = obj.get("source").and_then(|v| v.as_str()) {
                spec.push_str(&format!(",source={}", source));
            }
            spec.push_str(&format!(",target={}", target));
            if let Some(consistency) = obj.get("consistency").and_then(|v| v.as_str()) {
                spec.push_str(&format!(",consistency={}", consistency));
            }
            if obj.get("readonly").and_then(|v| v.as_bool()).unwrap_or(false) {
                spec.push_str(",readonly");
            }
            Some(spec)
        }
        _ => None,
    }
}

/// Per-service metadata extracted from a compose project, used as defaults
/// for compose-backed configurations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeServiceDefaults {
    pub image: Option<String>,
    pub user: Option<String>,
    pub has_build: bool,
    pub build_context: Option<String>,
    pub dockerfile: Option<String>,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a configuration file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_from_path(path: &Path) -> Result<DevContainerConfig> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // json5 tolerates //, /* */ comments and trailing commas
        let raw: Value = json5::from_str(&content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;

        let mut config: DevContainerConfig =
            serde_json::from_value(raw).map_err(|e| ConfigError::Parse {
                message: e.to_string(),
            })?;

        for key in config.extra.keys() {
            debug!("unknown configuration key '{}' ignored", key);
        }

        // Fold the legacy top-level Dockerfile path into the build section
        if let Some(dockerfile) = config.docker_file.take() {
            if config.build.is_none() {
                config.build = Some(BuildSection {
                    dockerfile: Some(dockerfile),
                    ..Default::default()
                });
            }
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load, substitute variables, and apply defaults for a workspace.
    ///
    /// Unresolved variables are non-fatal: tokens stay verbatim and a warning
    /// is emitted.
    #[instrument(skip_all, fields(root = %project_root.display()))]
    pub fn load_resolved(
        project_root: &Path,
        config_rel_path: &Path,
        workspace_id: &str,
    ) -> Result<(DevContainerConfig, SubstitutionReport)> {
        let config = Self::load_from_path(&project_root.join(config_rel_path))?;

        let basename = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "workspace".to_string());
        let default_folder = format!("/workspaces/{}", basename);

        // Resolve the workspace folder first so ${containerWorkspaceFolder}
        // is available to every other field
        let context = SubstitutionContext::new(project_root, workspace_id);
        let mut folder_report = SubstitutionReport::new();
        let workspace_folder = VariableSubstitution::substitute_string(
            config.workspace_folder.as_deref().unwrap_or(&default_folder),
            &context,
            &mut folder_report,
        );
        let context = context.with_container_workspace_folder(workspace_folder.clone());

        let (mut config, report) = config.apply_variable_substitution(&context);
        config.workspace_folder = Some(workspace_folder.clone());

        if config.workspace_mount.is_none() && !config.uses_compose() {
            config.workspace_mount = Some(Value::String(format!(
                "type=bind,source={},target={},consistency=cached",
                context.local_workspace_folder, workspace_folder
            )));
        }

        for unknown in &report.unknown_variables {
            warn!("unresolved variable '${{{}}}' left verbatim", unknown);
        }

        Ok((config, report))
    }

    /// Apply compose-service metadata as defaults: the service's image, user,
    /// and build section back the configuration unless it overrides them.
    pub fn apply_compose_service_defaults(
        config: &mut DevContainerConfig,
        defaults: &ComposeServiceDefaults,
    ) {
        if config.image.is_none() {
            config.image = defaults.image.clone();
        }
        if config.container_user.is_none() {
            config.container_user = defaults.user.clone();
        }
        if config.build.is_none() && defaults.has_build {
            config.build = Some(BuildSection {
                dockerfile: defaults.dockerfile.clone(),
                context: defaults.build_context.clone(),
                ..Default::default()
            });
        }
    }

    fn validate(config: &DevContainerConfig) -> Result<()> {
        let primaries = [
            config.image.is_some(),
            config.build.is_some(),
            config.docker_compose_file.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if primaries > 1 {
            return Err(ConfigError::Semantic {
                message:
                    "only one of 'image', 'build', or 'dockerComposeFile' may be set".to_string(),
            }
            .into());
        }
        if primaries == 0 {
            return Err(ConfigError::Semantic {
                message: "one of 'image', 'build', or 'dockerComposeFile' is required".to_string(),
            }
            .into());
        }

        if config.docker_compose_file.is_some() && config.service.is_none() {
            return Err(ConfigError::Semantic {
                message: "'service' is required when 'dockerComposeFile' is set".to_string(),
            }
            .into());
        }

        if let Some(ref folder) = config.workspace_folder {
            if !folder.starts_with('/') {
                return Err(ConfigError::Semantic {
                    message: format!("'workspaceFolder' must be an absolute path: {}", folder),
                }
                .into());
            }
        }

        for port in &config.forward_ports {
            match port {
                Value::Number(n) if n.as_u64().is_some() => {}
                Value::String(s) if !s.is_empty() => {}
                other => {
                    return Err(ConfigError::Semantic {
                        message: format!(
                            "'forwardPorts' entries must be integers or \"host:container\" strings, got {}",
                            other
                        ),
                    }
                    .into())
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CribError;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let config_dir = dir.path().join(".devcontainer");
        fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("devcontainer.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_with_comments_and_trailing_commas() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                // image to use
                "name": "Test",
                "image": "alpine:3.20",
                /* block comment */
                "forwardPorts": [3000, "127.0.0.1:9000:9000"],
                "containerEnv": {"ENVIRONMENT": "dev"},
                "runArgs": ["--init"], // trailing comma next
            }"#,
        );

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.name.as_deref(), Some("Test"));
        assert_eq!(config.image.as_deref(), Some("alpine:3.20"));
        assert_eq!(config.forward_ports.len(), 2);
        assert_eq!(config.run_args, vec!["--init"]);
    }

    #[test]
    fn test_two_primaries_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"image": "alpine", "build": {"dockerfile": "Dockerfile"}}"#,
        );
        let result = ConfigLoader::load_from_path(&path);
        assert!(matches!(
            result,
            Err(CribError::Config(ConfigError::Semantic { .. }))
        ));
    }

    #[test]
    fn test_no_primary_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"name": "empty"}"#);
        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    fn test_compose_requires_service() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"dockerComposeFile": "docker-compose.yml"}"#);
        assert!(ConfigLoader::load_from_path(&path).is_err());

        let path = write_config(
            &dir,
            r#"{"dockerComposeFile": "docker-compose.yml", "service": "app"}"#,
        );
        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.variant(), Some(ConfigVariant::Compose));
    }

    #[test]
    fn test_legacy_docker_file_folds_into_build() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"dockerFile": "Dockerfile.dev"}"#);
        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.variant(), Some(ConfigVariant::Build));
        assert_eq!(
            config.build.unwrap().dockerfile.as_deref(),
            Some("Dockerfile.dev")
        );
    }

    #[test]
    fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"image": "#);
        assert!(matches!(
            ConfigLoader::load_from_path(&path),
            Err(CribError::Config(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn test_unknown_keys_preserved_through_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"image": "alpine", "futureKnob": {"a": 1}, "remoteUser": "dev"}"#,
        );
        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert!(config.extra.contains_key("futureKnob"));

        let serialized = serde_json::to_string(&config).unwrap();
        let back: DevContainerConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, config);
        assert!(back.extra.contains_key("futureKnob"));
    }

    #[test]
    fn test_load_resolved_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, r#"{"image": "alpine:3.20"}"#);

        let (config, _) = ConfigLoader::load_resolved(
            dir.path(),
            Path::new(".devcontainer/devcontainer.json"),
            "proj",
        )
        .unwrap();

        let basename = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(
            config.workspace_folder.as_deref(),
            Some(format!("/workspaces/{}", basename).as_str())
        );

        let mount = config.workspace_mount.unwrap();
        let mount = mount.as_str().unwrap();
        assert!(mount.starts_with("type=bind,source="));
        assert!(mount.contains(&format!("target=/workspaces/{}", basename)));
        assert!(mount.ends_with("consistency=cached"));
    }

    #[test]
    fn test_load_resolved_substitutes_container_workspace_folder() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"{
                "image": "alpine",
                "workspaceFolder": "/w",
                "postCreateCommand": "ls ${containerWorkspaceFolder}"
            }"#,
        );

        let (config, _) = ConfigLoader::load_resolved(
            dir.path(),
            Path::new(".devcontainer/devcontainer.json"),
            "proj",
        )
        .unwrap();

        assert_eq!(
            config.post_create_command.unwrap().as_str().unwrap(),
            "ls /w"
        );
    }

    #[test]
    fn test_unresolved_variable_is_non_fatal() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"{"image": "alpine", "containerEnv": {"X": "${bogusThing}"}}"#,
        );

        let (config, report) = ConfigLoader::load_resolved(
            dir.path(),
            Path::new(".devcontainer/devcontainer.json"),
            "proj",
        )
        .unwrap();

        assert_eq!(
            config.container_env.get("X"),
            Some(&"${bogusThing}".to_string())
        );
        assert!(report.unknown_variables.contains(&"bogusThing".to_string()));
    }

    #[test]
    fn test_publish_specs() {
        let config = DevContainerConfig {
            image: Some("alpine".to_string()),
            forward_ports: vec![
                serde_json::json!(8080),
                serde_json::json!("127.0.0.1:9090:9090"),
            ],
            app_port: Some(serde_json::json!(3000)),
            ..Default::default()
        };
        assert_eq!(
            config.publish_specs(),
            vec!["8080:8080", "127.0.0.1:9090:9090", "3000:3000"]
        );
    }

    #[test]
    fn test_mount_value_to_spec() {
        let spec = mount_value_to_spec(&serde_json::json!({
            "type": "bind",
            "source": "/t/proj",
            "target": "/w",
            "consistency": "cached"
        }))
        .unwrap();
        assert_eq!(spec, "type=bind,source=/t/proj,target=/w,consistency=cached");

        // Mounts without a target are dropped
        assert!(mount_value_to_spec(&serde_json::json!({"source": "/x"})).is_none());

        // Strings pass through
        assert_eq!(
            mount_value_to_spec(&serde_json::json!("type=volume,source=v,target=/data")).unwrap(),
            "type=volume,source=v,target=/data"
        );
    }

    #[test]
    fn test_compose_service_defaults_applied() {
        let mut config = DevContainerConfig {
            docker_compose_file: Some(serde_json::json!("docker-compose.yml")),
            service: Some("app".to_string()),
            ..Default::default()
        };

        let defaults = ComposeServiceDefaults {
            image: Some("node:20".to_string()),
            user: Some("node".to_string()),
            has_build: false,
            build_context: None,
            dockerfile: None,
        };
        ConfigLoader::apply_compose_service_defaults(&mut config, &defaults);

        assert_eq!(config.image.as_deref(), Some("node:20"));
        assert_eq!(config.container_user.as_deref(), Some("node"));

        // Explicit fields win
        let mut config = DevContainerConfig {
            docker_compose_file: Some(serde_json::json!("docker-compose.yml")),
            service: Some("app".to_string()),
            container_user: Some("dev".to_string()),
            ..Default::default()
        };
        ConfigLoader::apply_compose_service_defaults(&mut config, &defaults);
        assert_eq!(config.container_user.as_deref(), Some("dev"));
    }

    #[test]
    fn test_effective_remote_user_fallback() {
        let mut config = DevContainerConfig {
            image: Some("alpine".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_remote_user(), None);

        config.container_user = Some("node".to_string());
        assert_eq!(config.effective_remote_user(), Some("node"));

        config.remote_user = Some("dev".to_string());
        assert_eq!(config.effective_remote_user(), Some("dev"));
    }

    #[test]
    fn test_all_services() {
        let config = DevContainerConfig {
            docker_compose_file: Some(serde_json::json!("docker-compose.yml")),
            service: Some("app".to_string()),
            run_services: vec!["db".to_string(), "cache".to_string()],
            ..Default::default()
        };
        assert_eq!(config.all_services(), vec!["app", "db", "cache"]);
    }
}
