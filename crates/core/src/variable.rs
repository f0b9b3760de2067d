//! Variable substitution for dev container configurations
//!
//! Supported tokens:
//!
//! - `${localWorkspaceFolder}`: canonical project root path
//! - `${localWorkspaceFolderBasename}`: final component of the project root
//! - `${containerWorkspaceFolder}`: resolved in-container workspace path
//! - `${localEnv:NAME}`: host environment variable (empty when unset)
//! - `${devcontainerId}`: the stable workspace ID
//!
//! Unknown tokens are left verbatim and recorded in the report; callers warn
//! but never fail on them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use tracing::debug;

static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"));

/// Substitution context containing values for variable resolution
#[derive(Debug, Clone)]
pub struct SubstitutionContext {
    /// Canonical project root path
    pub local_workspace_folder: String,
    /// Final path component of the project root
    pub local_workspace_folder_basename: String,
    /// In-container workspace path, once known
    pub container_workspace_folder: Option<String>,
    /// Host environment variables
    pub local_env: HashMap<String, String>,
    /// Stable workspace ID
    pub devcontainer_id: String,
}

impl SubstitutionContext {
    /// Create a context from a project root and its workspace ID.
    ///
    /// The path is canonicalized when possible; the current process
    /// environment is captured for `${localEnv:NAME}` lookups.
    pub fn new(project_root: &Path, workspace_id: &str) -> Self {
        let canonical = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.to_path_buf());
        let local_workspace_folder = canonical.to_string_lossy().to_string();
        let local_workspace_folder_basename = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            local_workspace_folder,
            local_workspace_folder_basename,
            container_workspace_folder: None,
            local_env: env::vars().collect(),
            devcontainer_id: workspace_id.to_string(),
        }
    }

    /// Set the resolved in-container workspace folder.
    pub fn with_container_workspace_folder(mut self, folder: String) -> Self {
        self.container_workspace_folder = Some(folder);
        self
    }
}

/// Report of substitutions performed over one configuration
#[derive(Debug, Clone, Default)]
pub struct SubstitutionReport {
    /// Token expression → resolved value
    pub replacements: HashMap<String, String>,
    /// Tokens left verbatim because they could not be resolved
    pub unknown_variables: Vec<String>,
}

impl SubstitutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_replacement(&mut self, variable: String, value: String) {
        self.replacements.insert(variable, value);
    }

    pub fn add_unknown_variable(&mut self, variable: String) {
        if !self.unknown_variables.contains(&variable) {
            self.unknown_variables.push(variable);
        }
    }
}

/// Variable substitution engine
pub struct VariableSubstitution;

impl VariableSubstitution {
    /// Replace all known tokens in a string, leaving unknown tokens verbatim.
    pub fn substitute_string(
        input: &str,
        context: &SubstitutionContext,
        report: &mut SubstitutionReport,
    ) -> String {
        VARIABLE_PATTERN
            .replace_all(input, |caps: &regex::Captures| {
                let expr = &caps[1];
                match Self::resolve_variable(expr, context) {
                    Some(value) => {
                        report.add_replacement(expr.to_string(), value.clone());
                        value
                    }
                    None => {
                        debug!("unresolved variable '{}' left verbatim", expr);
                        report.add_unknown_variable(expr.to_string());
                        format!("${{{}}}", expr)
                    }
                }
            })
            .to_string()
    }

    /// Apply substitution recursively to a JSON value.
    pub fn substitute_json_value(
        value: &Value,
        context: &SubstitutionContext,
        report: &mut SubstitutionReport,
    ) -> Value {
        match value {
            Value::String(s) => Value::String(Self::substitute_string(s, context, report)),
            Value::Array(arr) => Value::Array(
                arr.iter()
                    .map(|v| Self::substitute_json_value(v, context, report))
                    .collect(),
            ),
            Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Self::substitute_json_value(v, context, report)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    fn resolve_variable(expr: &str, context: &SubstitutionContext) -> Option<String> {
        match expr {
            "localWorkspaceFolder" => Some(context.local_workspace_folder.clone()),
            "localWorkspaceFolderBasename" => {
                Some(context.local_workspace_folder_basename.clone())
            }
            "containerWorkspaceFolder" => context.container_workspace_folder.clone(),
            "devcontainerId" => Some(context.devcontainer_id.clone()),
            expr => {
                let name = expr.strip_prefix("localEnv:")?;
                Some(context.local_env.get(name).cloned().unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> SubstitutionContext {
        SubstitutionContext::new(dir.path(), "proj")
    }

    #[test]
    fn test_local_workspace_folder() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut report = SubstitutionReport::new();

        let result = VariableSubstitution::substitute_string(
            "${localWorkspaceFolder}/src",
            &ctx,
            &mut report,
        );

        assert!(result.starts_with(&ctx.local_workspace_folder));
        assert!(result.ends_with("/src"));
        assert!(report.replacements.contains_key("localWorkspaceFolder"));
    }

    #[test]
    fn test_basename_and_id() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut report = SubstitutionReport::new();

        let result = VariableSubstitution::substitute_string(
            "${localWorkspaceFolderBasename}-${devcontainerId}",
            &ctx,
            &mut report,
        );

        assert_eq!(
            result,
            format!("{}-proj", ctx.local_workspace_folder_basename)
        );
    }

    #[test]
    fn test_container_workspace_folder_requires_resolution() {
        let dir = TempDir::new().unwrap();
        let mut report = SubstitutionReport::new();

        // Unset: the token stays verbatim
        let ctx = context(&dir);
        let result =
            VariableSubstitution::substitute_string("${containerWorkspaceFolder}", &ctx, &mut report);
        assert_eq!(result, "${containerWorkspaceFolder}");
        assert!(report
            .unknown_variables
            .contains(&"containerWorkspaceFolder".to_string()));

        // Set: resolved
        let ctx = context(&dir).with_container_workspace_folder("/w".to_string());
        let result =
            VariableSubstitution::substitute_string("${containerWorkspaceFolder}", &ctx, &mut report);
        assert_eq!(result, "/w");
    }

    #[test]
    fn test_local_env() {
        const VAR: &str = "CRIB_TEST_LOCAL_ENV_SUBST";
        std::env::set_var(VAR, "hello");

        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut report = SubstitutionReport::new();

        let input = format!("v=${{localEnv:{VAR}}}");
        let result = VariableSubstitution::substitute_string(&input, &ctx, &mut report);
        assert_eq!(result, "v=hello");

        std::env::remove_var(VAR);
    }

    #[test]
    fn test_missing_env_becomes_empty() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut report = SubstitutionReport::new();

        let result = VariableSubstitution::substitute_string(
            "v=${localEnv:CRIB_TEST_DOES_NOT_EXIST}",
            &ctx,
            &mut report,
        );
        assert_eq!(result, "v=");
    }

    #[test]
    fn test_unknown_variable_left_verbatim() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut report = SubstitutionReport::new();

        let result =
            VariableSubstitution::substitute_string("v=${bogusVariable}", &ctx, &mut report);
        assert_eq!(result, "v=${bogusVariable}");
        assert!(report
            .unknown_variables
            .contains(&"bogusVariable".to_string()));
    }

    #[test]
    fn test_json_value_substitution() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut report = SubstitutionReport::new();

        let value = json!({
            "mounts": ["${localWorkspaceFolder}/.cache:/cache"],
            "count": 3
        });
        let result = VariableSubstitution::substitute_json_value(&value, &ctx, &mut report);

        let mount = result["mounts"][0].as_str().unwrap();
        assert!(mount.starts_with(&ctx.local_workspace_folder));
        assert_eq!(result["count"], 3);
    }
}
