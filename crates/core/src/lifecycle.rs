//! Staged lifecycle hook execution
//!
//! Each lifecycle phase carries an ordered list of user-declared commands that
//! run inside the workspace container. Creation-flow phases abort the whole
//! operation on first failure; resume-flow phases (`postStart`, `postAttach`)
//! warn and continue.

use crate::docker::{ExecOptions, ExecOutput};
use crate::errors::{LifecycleError, Result};
use crate::runtime::ContainerRuntimeImpl;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Lifecycle phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    OnCreate,
    UpdateContent,
    PostCreate,
    PostStart,
    PostAttach,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnCreate => "onCreate",
            Self::UpdateContent => "updateContent",
            Self::PostCreate => "postCreate",
            Self::PostStart => "postStart",
            Self::PostAttach => "postAttach",
        }
    }

    /// Whether a failure in this phase aborts the operation. Resume-flow
    /// hooks only warn.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PostStart | Self::PostAttach)
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the container was brought up, which determines the hook phases to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpFlow {
    /// Freshly created container
    Create,
    /// Existing container restarted or recreated
    Resume,
    /// Already-running container re-attached
    Attach,
}

impl UpFlow {
    /// The lifecycle phases this flow runs, in order.
    pub fn phases(&self) -> &'static [LifecyclePhase] {
        match self {
            Self::Create => &[
                LifecyclePhase::OnCreate,
                LifecyclePhase::UpdateContent,
                LifecyclePhase::PostCreate,
                LifecyclePhase::PostStart,
                LifecyclePhase::PostAttach,
            ],
            Self::Resume => &[LifecyclePhase::PostStart, LifecyclePhase::PostAttach],
            Self::Attach => &[LifecyclePhase::PostAttach],
        }
    }
}

/// A parsed hook value preserving its declared shape
#[derive(Debug, Clone, PartialEq)]
pub enum HookCommand {
    /// Shell-interpreted string, run via `/bin/sh -c`
    Shell(String),
    /// Exec-style argv, passed to the runtime verbatim
    Exec(Vec<String>),
    /// Label → command map; members run sequentially in lexicographic label
    /// order
    Grouped(IndexMap<String, HookCommand>),
}

impl HookCommand {
    /// Parse a hook value from its JSON form.
    ///
    /// Returns `Ok(None)` for null or empty values. Grouped members may only
    /// be strings or string arrays.
    pub fn from_json(phase: LifecyclePhase, value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => Ok(Some(Self::Shell(s.clone()))),
            Value::Array(arr) => Ok(Self::exec_from_array(phase, arr)?.map(Self::from)),
            Value::Object(map) => {
                let mut group = IndexMap::new();
                for (label, member) in map {
                    match member {
                        Value::Null => continue,
                        Value::String(s) if s.is_empty() => continue,
                        Value::String(s) => {
                            group.insert(label.clone(), Self::Shell(s.clone()));
                        }
                        Value::Array(arr) => {
                            if let Some(exec) = Self::exec_from_array(phase, arr)? {
                                group.insert(label.clone(), Self::from(exec));
                            }
                        }
                        other => {
                            return Err(LifecycleError::InvalidCommand {
                                phase: phase.to_string(),
                                message: format!(
                                    "group entry '{}' must be a string or string array, got {}",
                                    label,
                                    json_type_name(other)
                                ),
                            }
                            .into())
                        }
                    }
                }
                if group.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Self::Grouped(group)))
                }
            }
            other => Err(LifecycleError::InvalidCommand {
                phase: phase.to_string(),
                message: format!(
                    "command must be a string, array, or object, got {}",
                    json_type_name(other)
                ),
            }
            .into()),
        }
    }

    fn exec_from_array(phase: LifecyclePhase, arr: &[Value]) -> Result<Option<Vec<String>>> {
        let mut argv = Vec::with_capacity(arr.len());
        for (i, elem) in arr.iter().enumerate() {
            match elem {
                Value::String(s) => argv.push(s.clone()),
                other => {
                    return Err(LifecycleError::InvalidCommand {
                        phase: phase.to_string(),
                        message: format!(
                            "array element {} must be a string, got {}",
                            i,
                            json_type_name(other)
                        ),
                    }
                    .into())
                }
            }
        }
        if argv.is_empty() {
            Ok(None)
        } else {
            Ok(Some(argv))
        }
    }

    /// Flatten into the argv list to execute, in order. Grouped members run
    /// in lexicographic label order.
    pub fn to_argv_list(&self) -> Vec<Vec<String>> {
        match self {
            Self::Shell(s) => vec![shell_argv(s)],
            Self::Exec(argv) => vec![argv.clone()],
            Self::Grouped(map) => {
                let mut labels: Vec<&String> = map.keys().collect();
                labels.sort();
                labels
                    .into_iter()
                    .flat_map(|label| map[label].to_argv_list())
                    .collect()
            }
        }
    }
}

impl From<Vec<String>> for HookCommand {
    fn from(argv: Vec<String>) -> Self {
        Self::Exec(argv)
    }
}

fn shell_argv(command: &str) -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        command.to_string(),
    ]
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Execution context shared by all hook commands of an operation
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// Working directory inside the container
    pub workspace_folder: String,
    /// User to run as: `remoteUser` falling back to `containerUser`
    pub user: Option<String>,
    /// Resolved remote environment injected as `-e` flags
    pub env: BTreeMap<String, String>,
}

/// Run one lifecycle phase against the workspace container.
///
/// Fatal phases return `HookFailed` on the first non-zero exit, leaving the
/// container in place for inspection. Non-fatal phases log and continue.
#[instrument(skip(runtime, value, ctx, cancel), fields(phase = %phase, container = %container_id))]
pub async fn run_phase(
    runtime: &ContainerRuntimeImpl,
    container_id: &str,
    phase: LifecyclePhase,
    value: &Value,
    ctx: &HookContext,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(command) = HookCommand::from_json(phase, value)? else {
        return Ok(());
    };

    let exec_opts = ExecOptions {
        user: ctx.user.clone(),
        workdir: Some(ctx.workspace_folder.clone()),
        env: ctx.env.clone(),
        ..Default::default()
    };

    for (index, argv) in command.to_argv_list().into_iter().enumerate() {
        debug!("running {} command {}: {:?}", phase, index, argv);
        let output: ExecOutput = runtime
            .exec_capture(container_id, &argv, &exec_opts, cancel)
            .await?;

        if !output.success() {
            if phase.is_fatal() {
                return Err(LifecycleError::HookFailed {
                    phase: phase.to_string(),
                    index,
                    stderr: output.stderr.trim().to_string(),
                }
                .into());
            }
            warn!(
                "{} command {} exited with {}; continuing: {}",
                phase,
                index,
                output.exit_code,
                output.stderr.trim()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_fatality() {
        assert!(LifecyclePhase::OnCreate.is_fatal());
        assert!(LifecyclePhase::UpdateContent.is_fatal());
        assert!(LifecyclePhase::PostCreate.is_fatal());
        assert!(!LifecyclePhase::PostStart.is_fatal());
        assert!(!LifecyclePhase::PostAttach.is_fatal());
    }

    #[test]
    fn test_flow_phases() {
        assert_eq!(UpFlow::Create.phases().len(), 5);
        assert_eq!(
            UpFlow::Resume.phases(),
            &[LifecyclePhase::PostStart, LifecyclePhase::PostAttach]
        );
        assert_eq!(UpFlow::Attach.phases(), &[LifecyclePhase::PostAttach]);
    }

    #[test]
    fn test_from_json_shapes() {
        let phase = LifecyclePhase::PostCreate;

        assert_eq!(HookCommand::from_json(phase, &json!(null)).unwrap(), None);
        assert_eq!(HookCommand::from_json(phase, &json!("")).unwrap(), None);

        assert_eq!(
            HookCommand::from_json(phase, &json!("npm install")).unwrap(),
            Some(HookCommand::Shell("npm install".to_string()))
        );

        assert_eq!(
            HookCommand::from_json(phase, &json!(["npm", "install"])).unwrap(),
            Some(HookCommand::Exec(vec![
                "npm".to_string(),
                "install".to_string()
            ]))
        );

        assert!(HookCommand::from_json(phase, &json!(42)).is_err());
        assert!(HookCommand::from_json(phase, &json!(["npm", 1])).is_err());
    }

    #[test]
    fn test_shell_argv() {
        let cmd = HookCommand::Shell("echo hi && echo bye".to_string());
        assert_eq!(
            cmd.to_argv_list(),
            vec![vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "echo hi && echo bye".to_string()
            ]]
        );
    }

    #[test]
    fn test_grouped_runs_in_lexicographic_order() {
        let value = json!({
            "zeta": "echo z",
            "alpha": ["echo", "a"],
            "mid": "echo m"
        });
        let cmd = HookCommand::from_json(LifecyclePhase::PostCreate, &value)
            .unwrap()
            .unwrap();

        let argvs = cmd.to_argv_list();
        assert_eq!(argvs.len(), 3);
        // alpha, mid, zeta regardless of declaration order
        assert_eq!(argvs[0], vec!["echo", "a"]);
        assert_eq!(argvs[1], vec!["/bin/sh", "-c", "echo m"]);
        assert_eq!(argvs[2], vec!["/bin/sh", "-c", "echo z"]);
    }

    #[test]
    fn test_grouped_skips_empty_members() {
        let value = json!({"a": "", "b": null, "c": []});
        assert_eq!(
            HookCommand::from_json(LifecyclePhase::PostCreate, &value).unwrap(),
            None
        );
    }

    #[test]
    fn test_grouped_rejects_nested_objects() {
        let value = json!({"a": {"nested": "echo"}});
        assert!(HookCommand::from_json(LifecyclePhase::PostCreate, &value).is_err());
    }
}
