//! Workspace identity and resolution
//!
//! Maps a project directory to a stable workspace: canonicalizes the path,
//! walks upward to the nearest dev container configuration, and derives the
//! deterministic workspace ID used for container and image naming.

use crate::errors::{ConfigError, CribError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration directory name searched during resolution
pub const CONFIG_DIR_NAME: &str = ".devcontainer";

/// Configuration file name inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "devcontainer.json";

/// Persisted workspace record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Stable identifier derived from the project root
    pub id: String,
    /// Absolute canonical path to the project root
    pub source: PathBuf,
    /// Path from `source` to the configuration file
    pub config_rel_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Workspace {
    /// Create a fresh record from a resolution result.
    pub fn from_resolve(resolved: &ResolveResult) -> Self {
        let now = Utc::now();
        Self {
            id: resolved.workspace_id.clone(),
            source: resolved.project_root.clone(),
            config_rel_path: resolved.relative_config_path.clone(),
            created_at: now,
            last_used_at: now,
        }
    }

    /// Absolute path to the configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.source.join(&self.config_rel_path)
    }

    /// Directory containing the configuration file.
    pub fn config_dir(&self) -> PathBuf {
        self.config_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.source.clone())
    }
}

/// Transient result of mapping a directory to a workspace
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveResult {
    pub workspace_id: String,
    pub project_root: PathBuf,
    pub relative_config_path: PathBuf,
}

/// Derive the stable workspace ID for a project root.
///
/// The ID is the lowercased basename with runs of non-alphanumeric characters
/// collapsed to `-`. Identical project roots always yield identical IDs; a
/// short hash of the canonical path stands in when the basename slugs away to
/// nothing.
pub fn workspace_id(project_root: &Path) -> String {
    let basename = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut slug = String::with_capacity(basename.len());
    let mut last_dash = true;
    for c in basename.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_matches('-').to_string();

    if slug.is_empty() {
        format!("ws-{}", short_path_hash(project_root))
    } else {
        slug
    }
}

fn short_path_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..8].to_string()
}

/// Resolve a directory to a workspace by walking upward to the nearest
/// configuration.
///
/// At each level both `.devcontainer/devcontainer.json` and
/// `.devcontainer.json` are considered, in that order. Fails with
/// `ConfigError::NotFound` when nothing exists at or above `dir`.
pub fn resolve(dir: &Path) -> Result<ResolveResult> {
    let canonical = dir.canonicalize().map_err(|_| {
        CribError::Config(ConfigError::NotFound {
            path: dir.display().to_string(),
        })
    })?;

    let mut current = canonical.as_path();
    loop {
        let candidates = [
            current.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            current.join(".devcontainer.json"),
        ];

        for candidate in &candidates {
            if candidate.is_file() {
                let relative = candidate
                    .strip_prefix(current)
                    .expect("candidate is under current")
                    .to_path_buf();
                debug!(
                    "resolved workspace at {} via {}",
                    current.display(),
                    relative.display()
                );
                return Ok(ResolveResult {
                    workspace_id: workspace_id(current),
                    project_root: current.to_path_buf(),
                    relative_config_path: relative,
                });
            }
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(CribError::Config(ConfigError::NotFound {
                    path: dir.display().to_string(),
                }))
            }
        }
    }
}

/// Resolve from an explicit configuration directory.
///
/// The caller is trusted: the parent of `config_dir` is the project root and
/// `config_dir/devcontainer.json` is the configuration file.
pub fn resolve_config_dir(config_dir: &Path) -> Result<ResolveResult> {
    let canonical = config_dir.canonicalize().map_err(|_| {
        CribError::Config(ConfigError::NotFound {
            path: config_dir.display().to_string(),
        })
    })?;

    let project_root = canonical
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| CribError::Config(ConfigError::Semantic {
            message: format!(
                "configuration directory {} has no parent to use as project root",
                canonical.display()
            ),
        }))?;

    let config_path = canonical.join(CONFIG_FILE_NAME);
    let relative = config_path
        .strip_prefix(&project_root)
        .expect("config path is under project root")
        .to_path_buf();

    Ok(ResolveResult {
        workspace_id: workspace_id(&project_root),
        project_root,
        relative_config_path: relative,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_id_slug() {
        assert_eq!(workspace_id(Path::new("/t/proj")), "proj");
        assert_eq!(workspace_id(Path::new("/t/My Project")), "my-project");
        assert_eq!(workspace_id(Path::new("/t/api_v2.0")), "api-v2-0");
        assert_eq!(workspace_id(Path::new("/t/--weird--")), "weird");
    }

    #[test]
    fn test_workspace_id_casing_stable() {
        assert_eq!(
            workspace_id(Path::new("/t/Proj")),
            workspace_id(Path::new("/t/proj"))
        );
    }

    #[test]
    fn test_workspace_id_falls_back_to_hash() {
        let id = workspace_id(Path::new("/t/---"));
        assert!(id.starts_with("ws-"));
        assert_eq!(id.len(), 3 + 8);
        // Deterministic across calls
        assert_eq!(id, workspace_id(Path::new("/t/---")));
    }

    #[test]
    fn test_resolve_finds_config_dir() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config_dir = temp.path().join(CONFIG_DIR_NAME);
        fs::create_dir(&config_dir)?;
        fs::write(config_dir.join(CONFIG_FILE_NAME), "{}")?;

        let resolved = resolve(temp.path())?;
        assert_eq!(resolved.project_root, temp.path().canonicalize()?);
        assert_eq!(
            resolved.relative_config_path,
            PathBuf::from(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
        );
        Ok(())
    }

    #[test]
    fn test_resolve_finds_dotfile_variant() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        fs::write(temp.path().join(".devcontainer.json"), "{}")?;

        let resolved = resolve(temp.path())?;
        assert_eq!(
            resolved.relative_config_path,
            PathBuf::from(".devcontainer.json")
        );
        Ok(())
    }

    #[test]
    fn test_resolve_walks_upward() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config_dir = temp.path().join(CONFIG_DIR_NAME);
        fs::create_dir(&config_dir)?;
        fs::write(config_dir.join(CONFIG_FILE_NAME), "{}")?;

        let nested = temp.path().join("src").join("deep");
        fs::create_dir_all(&nested)?;

        let resolved = resolve(&nested)?;
        assert_eq!(resolved.project_root, temp.path().canonicalize()?);
        Ok(())
    }

    #[test]
    fn test_resolve_fails_without_config() {
        let temp = TempDir::new().unwrap();
        let result = resolve(temp.path());
        assert!(matches!(
            result,
            Err(CribError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_resolve_config_dir_trusts_caller() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config_dir = temp.path().join("env").join("dev");
        fs::create_dir_all(&config_dir)?;

        let resolved = resolve_config_dir(&config_dir)?;
        assert_eq!(
            resolved.project_root,
            temp.path().join("env").canonicalize()?
        );
        assert_eq!(
            resolved.relative_config_path,
            PathBuf::from("dev").join(CONFIG_FILE_NAME)
        );
        Ok(())
    }

    #[test]
    fn test_workspace_record_paths() {
        let resolved = ResolveResult {
            workspace_id: "proj".to_string(),
            project_root: PathBuf::from("/t/proj"),
            relative_config_path: PathBuf::from(".devcontainer/devcontainer.json"),
        };
        let ws = Workspace::from_resolve(&resolved);
        assert_eq!(
            ws.config_path(),
            PathBuf::from("/t/proj/.devcontainer/devcontainer.json")
        );
        assert_eq!(ws.config_dir(), PathBuf::from("/t/proj/.devcontainer"));
    }
}
