//! Error types for the workspace engine
//!
//! Every failure the engine can report is a variant of [`CribError`] or one of
//! the per-subsystem enums it wraps. The excluded CLI layer maps these onto
//! process exit codes via [`CribError::exit_code`].

use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No dev container configuration at or above the queried directory
    #[error("no dev container configuration found at or above {path}")]
    NotFound { path: String },

    /// Syntax or shape error in the configuration file
    #[error("failed to parse configuration: {message}")]
    Parse { message: String },

    /// Structurally valid configuration with conflicting or missing fields
    #[error("invalid configuration: {message}")]
    Semantic { message: String },

    /// I/O error while reading configuration inputs
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Container runtime (docker/podman CLI) errors
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Neither podman nor docker answered a `version` probe
    #[error("no responsive container runtime found (tried podman, docker)")]
    NoRuntime,

    /// A runtime invocation exited non-zero; argv and stderr are scrubbed
    #[error("{action} failed: {stderr}")]
    CommandFailed { action: String, stderr: String },

    /// An image build exited non-zero
    #[error("image build failed: {stderr}")]
    BuildFailed { stderr: String },

    /// The runtime produced output the driver could not interpret
    #[error("unexpected runtime output: {message}")]
    Malformed { message: String },
}

/// Compose sub-command errors
#[derive(Error, Debug)]
pub enum ComposeError {
    /// A compose invocation exited non-zero
    #[error("{action} failed: {stderr}")]
    CommandFailed { action: String, stderr: String },

    /// `compose config`/`compose ps` output could not be interpreted
    #[error("unexpected compose output: {message}")]
    Malformed { message: String },

    /// The named service does not exist in the compose project
    #[error("service {service} not found in compose project")]
    ServiceNotFound { service: String },
}

/// Workspace store errors
#[derive(Error, Debug)]
pub enum StateError {
    /// A record the caller asked for does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// I/O error while reading or writing the store
    #[error("workspace store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded
    #[error("corrupt {kind} record for {id}: {message}")]
    Corrupt {
        kind: &'static str,
        id: String,
        message: String,
    },
}

/// Lifecycle hook errors
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A hook command in an abort-capable phase exited non-zero
    #[error("{phase} command {index} failed: {stderr}")]
    HookFailed {
        phase: String,
        index: usize,
        stderr: String,
    },

    /// A hook value had an unsupported JSON shape
    #[error("invalid {phase} command: {message}")]
    InvalidCommand { phase: String, message: String },
}

/// Top-level error type for the crib engine
#[derive(Error, Debug)]
pub enum CribError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// The workspace has no container to operate on
    #[error("no container exists for workspace {workspace}")]
    NoContainer { workspace: String },

    /// Declared build inputs differ from the running container's
    #[error("configuration changes affect the image; run `rebuild` instead of `restart`")]
    NeedsRebuild,

    /// A plugin aborted the operation
    #[error("plugin {name} failed: {message}")]
    Plugin { name: String, message: String },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// A bug or impossible state inside the engine
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CribError {
    /// Process exit code the CLI collaborator should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CribError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Convenience type alias for Results with CribError
pub type Result<T> = std::result::Result<T, CribError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CribError::Cancelled.exit_code(), 130);
        assert_eq!(CribError::NeedsRebuild.exit_code(), 1);
        assert_eq!(
            CribError::Config(ConfigError::NotFound {
                path: "/tmp".to_string()
            })
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_error_messages() {
        let err = CribError::Runtime(RuntimeError::CommandFailed {
            action: "docker run".to_string(),
            stderr: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "runtime error: docker run failed: boom");

        let err = CribError::Lifecycle(LifecycleError::HookFailed {
            phase: "onCreate".to_string(),
            index: 0,
            stderr: "exit 1".to_string(),
        });
        assert!(err.to_string().contains("onCreate command 0 failed"));
    }

    #[test]
    fn test_not_found_is_distinguished() {
        let err = StateError::NotFound {
            kind: "workspace",
            id: "proj".to_string(),
        };
        assert_eq!(err.to_string(), "workspace proj not found");
    }
}
