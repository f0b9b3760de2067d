//! Build fingerprinting and configuration diff classification
//!
//! The fingerprint is a deterministic digest over every image-affecting
//! input. Equal fingerprints mean a rebuild is unnecessary; any other
//! configuration difference at most recreates the container. Canonical
//! serialization (sorted keys, sorted lists where order is not semantic)
//! keeps the digest stable across invocations.

use crate::config::{ConfigVariant, DevContainerConfig};
use crate::dockerfile::{remove_syntax_version, Dockerfile};
use crate::errors::{ConfigError, Result};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// SHA-256 of a byte slice, hex-encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Canonical fingerprint inputs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FingerprintInputs {
    /// Image reference, for image-backed and compose-backed workspaces
    pub image: Option<String>,
    /// Digest of the Dockerfile bytes with `# syntax=` stripped
    pub dockerfile_sha256: Option<String>,
    /// Build target stage, empty when unset
    pub target: String,
    /// Build arguments, sorted by key
    pub build_args: Vec<(String, String)>,
    /// Features with their options, configuration order preserved
    pub features: Vec<(String, Value)>,
    /// Local build-context files and their digests, sorted by path
    pub context_files: Vec<(String, String)>,
}

impl FingerprintInputs {
    /// Gather fingerprint inputs from a resolved configuration.
    ///
    /// For build-backed workspaces the Dockerfile is read relative to the
    /// configuration directory and its local `COPY`/`ADD` sources are
    /// digested from the build context.
    pub fn from_config(
        config: &DevContainerConfig,
        project_root: &Path,
        config_dir: &Path,
    ) -> Result<Self> {
        let mut inputs = Self {
            image: config.image.clone(),
            features: config
                .features
                .iter()
                .map(|(id, opts)| (id.clone(), opts.clone()))
                .collect(),
            ..Default::default()
        };

        let Some(ConfigVariant::Build) = config.variant() else {
            return Ok(inputs);
        };
        let build = config.build.as_ref().expect("build variant has a section");

        let dockerfile_path = config_dir.join(build.dockerfile.as_deref().unwrap_or("Dockerfile"));
        let content = std::fs::read_to_string(&dockerfile_path).map_err(ConfigError::Io)?;
        let canonical = remove_syntax_version(&content);
        inputs.dockerfile_sha256 = Some(sha256_hex(canonical.as_bytes()));

        inputs.target = build.target.clone().unwrap_or_default();

        inputs.build_args = build
            .args
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        inputs.build_args.sort();

        let context_root = match build.context.as_deref() {
            Some(context) => {
                let path = Path::new(context);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    config_dir.join(path)
                }
            }
            None => project_root.to_path_buf(),
        };

        let dockerfile = Dockerfile::parse(&canonical);
        for source in dockerfile.build_context_files() {
            // Globs and directories are not digested; the Dockerfile digest
            // already covers the instruction text
            if source.contains('*') || source.contains('?') {
                continue;
            }
            let path = context_root.join(&source);
            if !path.is_file() {
                continue;
            }
            match std::fs::read(&path) {
                Ok(bytes) => inputs.context_files.push((source, sha256_hex(&bytes))),
                Err(e) => debug!("skipping unreadable context file {}: {}", source, e),
            }
        }
        inputs.context_files.sort();

        Ok(inputs)
    }

    /// Canonical JSON form: object keys sorted, `\n` line endings implicit in
    /// compact encoding.
    fn canonical_json(&self) -> Value {
        let build_args: Vec<Value> = self
            .build_args
            .iter()
            .map(|(k, v)| json!([k, v]))
            .collect();
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|(id, opts)| {
                let mut opts = opts.clone();
                canonicalize_json(&mut opts);
                json!([id, opts])
            })
            .collect();
        let context_files: Vec<Value> = self
            .context_files
            .iter()
            .map(|(path, digest)| json!([path, digest]))
            .collect();

        // Keys inserted in sorted order; preserve_order keeps them that way
        json!({
            "build_args": build_args,
            "context_files": context_files,
            "dockerfile_sha256": self.dockerfile_sha256,
            "features": features,
            "image": self.image,
            "target": self.target,
        })
    }

    /// The fingerprint digest.
    pub fn digest(&self) -> String {
        let canonical = self.canonical_json().to_string();
        sha256_hex(canonical.as_bytes())
    }

    /// Short form used as the workspace image tag.
    pub fn tag(&self) -> String {
        self.digest()[..12].to_string()
    }
}

/// Sort object keys recursively so serialization is deterministic.
fn canonicalize_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .iter_mut()
                .map(|(k, v)| (k.clone(), std::mem::take(v)))
                .collect();
            map.clear();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, mut val) in entries {
                canonicalize_json(&mut val);
                map.insert(key, val);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                canonicalize_json(item);
            }
        }
        _ => {}
    }
}

/// Digest over the runtime-only configuration: everything that shapes the
/// container but not its image. A change here recreates the container in
/// place rather than rebuilding.
pub fn runtime_profile_digest(config: &DevContainerConfig) -> String {
    let mut profile = json!({
        "app_port": config.app_port,
        "cap_add": config.cap_add,
        "container_env": config.container_env,
        "container_user": config.container_user,
        "forward_ports": config.forward_ports,
        "init": config.init,
        "mounts": config.mounts,
        "override_command": config.override_command,
        "privileged": config.privileged,
        "remote_env": config.remote_env,
        "remote_user": config.remote_user,
        "run_args": config.run_args,
        "security_opt": config.security_opt,
        "workspace_folder": config.workspace_folder,
        "workspace_mount": config.workspace_mount,
    });
    canonicalize_json(&mut profile);
    sha256_hex(profile.to_string().as_bytes())
}

/// Least-disruptive transition for a restart request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No material change: restart the container in place
    Restart,
    /// Runtime-only change: stop, remove, and re-run without rebuilding
    Recreate,
    /// Image-affecting change: refuse and require a rebuild
    Rebuild,
}

/// Classify a declared-vs-observed diff.
///
/// Any fingerprint change forces a rebuild; runtime-only changes recreate; an
/// empty diff restarts.
pub fn classify(fingerprint_changed: bool, runtime_changed: bool) -> ReconcileAction {
    if fingerprint_changed {
        ReconcileAction::Rebuild
    } else if runtime_changed {
        ReconcileAction::Recreate
    } else {
        ReconcileAction::Restart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSection;
    use std::fs;
    use tempfile::TempDir;

    fn build_config(dockerfile: &str) -> DevContainerConfig {
        DevContainerConfig {
            build: Some(BuildSection {
                dockerfile: Some(dockerfile.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_digest_deterministic() {
        let inputs = FingerprintInputs {
            image: Some("alpine:3.20".to_string()),
            ..Default::default()
        };
        assert_eq!(inputs.digest(), inputs.digest());
        assert_eq!(inputs.tag().len(), 12);
    }

    #[test]
    fn test_digest_changes_with_inputs() {
        let a = FingerprintInputs {
            image: Some("alpine:3.20".to_string()),
            ..Default::default()
        };
        let b = FingerprintInputs {
            image: Some("alpine:3.21".to_string()),
            ..Default::default()
        };
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_build_args_order_insensitive() {
        let mut a = FingerprintInputs::default();
        a.build_args = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ];
        a.build_args.sort();

        let mut b = FingerprintInputs::default();
        b.build_args = vec![
            ("B".to_string(), "2".to_string()),
            ("A".to_string(), "1".to_string()),
        ];
        b.build_args.sort();

        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_from_config_hashes_dockerfile_without_syntax_line() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".devcontainer");
        fs::create_dir_all(&config_dir).unwrap();

        fs::write(
            config_dir.join("Dockerfile"),
            "# syntax=docker/dockerfile:1\nFROM alpine:3.20\n",
        )
        .unwrap();
        let with_syntax =
            FingerprintInputs::from_config(&build_config("Dockerfile"), dir.path(), &config_dir)
                .unwrap();

        fs::write(config_dir.join("Dockerfile"), "FROM alpine:3.20\n").unwrap();
        let without_syntax =
            FingerprintInputs::from_config(&build_config("Dockerfile"), dir.path(), &config_dir)
                .unwrap();

        assert_eq!(with_syntax.digest(), without_syntax.digest());
    }

    #[test]
    fn test_from_config_dockerfile_edit_changes_digest() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".devcontainer");
        fs::create_dir_all(&config_dir).unwrap();
        let config = build_config("Dockerfile");

        fs::write(config_dir.join("Dockerfile"), "FROM alpine:3.20\n").unwrap();
        let before = FingerprintInputs::from_config(&config, dir.path(), &config_dir).unwrap();

        fs::write(
            config_dir.join("Dockerfile"),
            "FROM alpine:3.20\nRUN apk add git\n",
        )
        .unwrap();
        let after = FingerprintInputs::from_config(&config, dir.path(), &config_dir).unwrap();

        assert_ne!(before.digest(), after.digest());
    }

    #[test]
    fn test_from_config_digests_context_files() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(".devcontainer");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("Dockerfile"),
            "FROM alpine\nCOPY setup.sh /usr/local/bin/\n",
        )
        .unwrap();
        fs::write(dir.path().join("setup.sh"), "#!/bin/sh\n").unwrap();

        let config = build_config("Dockerfile");
        let before = FingerprintInputs::from_config(&config, dir.path(), &config_dir).unwrap();
        assert_eq!(before.context_files.len(), 1);

        fs::write(dir.path().join("setup.sh"), "#!/bin/sh\necho changed\n").unwrap();
        let after = FingerprintInputs::from_config(&config, dir.path(), &config_dir).unwrap();
        assert_ne!(before.digest(), after.digest());
    }

    #[test]
    fn test_image_variant_fingerprint() {
        let dir = TempDir::new().unwrap();
        let config = DevContainerConfig {
            image: Some("alpine:3.20".to_string()),
            ..Default::default()
        };
        let inputs = FingerprintInputs::from_config(&config, dir.path(), dir.path()).unwrap();
        assert_eq!(inputs.image.as_deref(), Some("alpine:3.20"));
        assert_eq!(inputs.dockerfile_sha256, None);
    }

    #[test]
    fn test_runtime_profile_ignores_image_inputs() {
        let base = DevContainerConfig {
            image: Some("alpine:3.20".to_string()),
            forward_ports: vec![serde_json::json!(8080)],
            ..Default::default()
        };

        // Image change does not move the runtime profile
        let mut image_changed = base.clone();
        image_changed.image = Some("alpine:3.21".to_string());
        assert_eq!(
            runtime_profile_digest(&base),
            runtime_profile_digest(&image_changed)
        );

        // Port change does
        let mut ports_changed = base.clone();
        ports_changed.forward_ports = vec![serde_json::json!(8080), serde_json::json!(9090)];
        assert_ne!(
            runtime_profile_digest(&base),
            runtime_profile_digest(&ports_changed)
        );
    }

    #[test]
    fn test_remote_env_key_order_insensitive() {
        let mut a = DevContainerConfig {
            image: Some("alpine".to_string()),
            ..Default::default()
        };
        a.remote_env.insert("A".to_string(), "1".to_string());
        a.remote_env.insert("B".to_string(), "2".to_string());

        let mut b = DevContainerConfig {
            image: Some("alpine".to_string()),
            ..Default::default()
        };
        b.remote_env.insert("B".to_string(), "2".to_string());
        b.remote_env.insert("A".to_string(), "1".to_string());

        assert_eq!(runtime_profile_digest(&a), runtime_profile_digest(&b));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(true, false), ReconcileAction::Rebuild);
        assert_eq!(classify(true, true), ReconcileAction::Rebuild);
        assert_eq!(classify(false, true), ReconcileAction::Recreate);
        assert_eq!(classify(false, false), ReconcileAction::Restart);
    }
}
