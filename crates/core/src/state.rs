//! Persistent workspace store
//!
//! A content-addressable directory under the user's state directory:
//! `<state>/workspaces/<id>/workspace.json` holds the workspace record and
//! `<state>/workspaces/<id>/result.json` the last reconcile outcome. All
//! writes are temp-file + rename within the same directory; concurrent
//! processes are not coordinated and last-writer-wins.

use crate::docker::PortBinding;
use crate::errors::{CribError, Result, StateError};
use crate::workspace::Workspace;
use directories_next::ProjectDirs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const WORKSPACE_FILE: &str = "workspace.json";
const RESULT_FILE: &str = "result.json";

/// One compose service line in a persisted result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub name: String,
    pub state: String,
}

/// Persisted outcome of the last successful reconcile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// Container backing the workspace at the time of the reconcile
    pub container_id: String,
    /// Resolved in-container workspace path
    pub workspace_folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    /// Flattened, fully resolved remote environment
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub remote_env: IndexMap<String, String>,
    /// Observed port bindings after the reconcile
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,
    /// Whether the container was recreated by this reconcile
    pub recreated: bool,
    /// Compose services, when the workspace is compose-backed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSummary>,
    /// Build fingerprint the container was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Digest over the runtime-only configuration used for restart diffing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_profile: Option<String>,
}

/// Persistent map from workspace ID to workspace record and last result
#[derive(Debug)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Open the store under the OS-appropriate user state directory.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "crib").ok_or_else(|| CribError::Internal {
            message: "could not determine a user state directory".to_string(),
        })?;
        Self::with_root(dirs.data_local_dir().join("workspaces"))
    }

    /// Open the store rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(StateError::Io)?;
        Ok(Self { root })
    }

    /// The directory holding all workspace records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn workspace_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Load a workspace record.
    #[instrument(skip(self))]
    pub fn load(&self, id: &str) -> Result<Workspace> {
        let path = self.workspace_dir(id).join(WORKSPACE_FILE);
        read_record(&path, "workspace", id)
    }

    /// Save a workspace record atomically.
    #[instrument(skip(self, workspace))]
    pub fn save(&self, workspace: &Workspace) -> Result<()> {
        let dir = self.workspace_dir(&workspace.id);
        fs::create_dir_all(&dir).map_err(StateError::Io)?;
        write_record(&dir.join(WORKSPACE_FILE), workspace)?;
        debug!(id = %workspace.id, "saved workspace record");
        Ok(())
    }

    /// Load the last reconcile result for a workspace.
    #[instrument(skip(self))]
    pub fn load_result(&self, id: &str) -> Result<ReconcileResult> {
        let path = self.workspace_dir(id).join(RESULT_FILE);
        read_record(&path, "result", id)
    }

    /// Save a reconcile result atomically.
    #[instrument(skip(self, result))]
    pub fn save_result(&self, id: &str, result: &ReconcileResult) -> Result<()> {
        let dir = self.workspace_dir(id);
        fs::create_dir_all(&dir).map_err(StateError::Io)?;
        write_record(&dir.join(RESULT_FILE), result)?;
        debug!(id = %id, container = %result.container_id, "saved reconcile result");
        Ok(())
    }

    /// Delete the stored result, leaving the workspace record in place.
    pub fn delete_result(&self, id: &str) -> Result<()> {
        let path = self.workspace_dir(id).join(RESULT_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::Io(e).into()),
        }
    }

    /// List all stored workspaces, sorted by ID. Unreadable entries are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<Workspace>> {
        let mut workspaces = Vec::new();

        for entry in fs::read_dir(&self.root).map_err(StateError::Io)? {
            let entry = entry.map_err(StateError::Io)?;
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.load(&id) {
                Ok(ws) => workspaces.push(ws),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping unreadable workspace record")
                }
            }
        }

        workspaces.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workspaces)
    }

    /// Delete a workspace record and everything stored with it.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<()> {
        let dir = self.workspace_dir(id);
        if !dir.exists() {
            return Err(StateError::NotFound {
                kind: "workspace",
                id: id.to_string(),
            }
            .into());
        }
        fs::remove_dir_all(&dir).map_err(StateError::Io)?;
        Ok(())
    }
}

fn read_record<T: serde::de::DeserializeOwned>(
    path: &Path,
    kind: &'static str,
    id: &str,
) -> Result<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StateError::NotFound {
                kind,
                id: id.to_string(),
            }
            .into())
        }
        Err(e) => return Err(StateError::Io(e).into()),
    };

    serde_json::from_str(&content).map_err(|e| {
        StateError::Corrupt {
            kind,
            id: id.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Write-rename within the same directory so readers never observe a partial
/// record.
fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CribError::Internal {
        message: format!("failed to encode record: {}", e),
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).map_err(StateError::Io)?;
    fs::rename(&tmp, path).map_err(StateError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::ResolveResult;
    use tempfile::TempDir;

    fn sample_workspace(id: &str) -> Workspace {
        Workspace::from_resolve(&ResolveResult {
            workspace_id: id.to_string(),
            project_root: PathBuf::from("/t").join(id),
            relative_config_path: PathBuf::from(".devcontainer/devcontainer.json"),
        })
    }

    fn sample_result() -> ReconcileResult {
        ReconcileResult {
            container_id: "abc123".to_string(),
            workspace_folder: "/w".to_string(),
            remote_user: Some("dev".to_string()),
            remote_env: IndexMap::new(),
            ports: vec![PortBinding {
                container_port: 8080,
                protocol: "tcp".to_string(),
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(8080),
            }],
            recreated: false,
            services: Vec::new(),
            fingerprint: Some("deadbeef".to_string()),
            runtime_profile: Some("cafe".to_string()),
        }
    }

    #[test]
    fn test_workspace_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        let ws = sample_workspace("proj");
        store.save(&ws).unwrap();
        assert_eq!(store.load("proj").unwrap(), ws);
    }

    #[test]
    fn test_result_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        let result = sample_result();
        store.save_result("proj", &result).unwrap();
        assert_eq!(store.load_result("proj").unwrap(), result);
    }

    #[test]
    fn test_missing_records_are_not_found() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        assert!(matches!(
            store.load("ghost"),
            Err(CribError::State(StateError::NotFound { kind: "workspace", .. }))
        ));
        assert!(matches!(
            store.load_result("ghost"),
            Err(CribError::State(StateError::NotFound { kind: "result", .. }))
        ));
    }

    #[test]
    fn test_delete_result_keeps_workspace() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        let ws = sample_workspace("proj");
        store.save(&ws).unwrap();
        store.save_result("proj", &sample_result()).unwrap();

        store.delete_result("proj").unwrap();
        assert!(store.load_result("proj").is_err());
        assert!(store.load("proj").is_ok());

        // Deleting again is a no-op
        store.delete_result("proj").unwrap();
    }

    #[test]
    fn test_list_sorted() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        store.save(&sample_workspace("zeta")).unwrap();
        store.save(&sample_workspace("alpha")).unwrap();

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_delete_workspace() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        store.save(&sample_workspace("proj")).unwrap();
        store.delete("proj").unwrap();
        assert!(store.load("proj").is_err());

        assert!(matches!(
            store.delete("proj"),
            Err(CribError::State(StateError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_no_partial_writes_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();
        store.save(&sample_workspace("proj")).unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path().join("proj"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec![WORKSPACE_FILE.to_string()]);
    }

    #[test]
    fn test_unknown_result_fields_ignored() {
        let temp = TempDir::new().unwrap();
        let store = WorkspaceStore::with_root(temp.path()).unwrap();

        let dir = temp.path().join("proj");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(RESULT_FILE),
            r#"{"containerId":"abc","workspaceFolder":"/w","recreated":false,"someFutureField":1}"#,
        )
        .unwrap();

        let result = store.load_result("proj").unwrap();
        assert_eq!(result.container_id, "abc");
    }
}
