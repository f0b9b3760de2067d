//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dev container workspaces from your terminal
#[derive(Parser, Debug)]
#[command(name = "crib", version, about, long_about = None)]
pub struct Cli {
    /// Force the container runtime (docker or podman)
    #[arg(long, global = true, value_name = "RUNTIME")]
    pub runtime: Option<String>,

    /// Use an explicit configuration directory instead of searching upward
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable engine debug logging (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or re-attach the workspace container
    Up {
        /// Delete any existing container and create a fresh one
        #[arg(long)]
        recreate: bool,

        /// Project directory
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Stop the workspace container without removing it
    Down {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Show the observed workspace state
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,

        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Restart the workspace, recreating the container when the
    /// configuration changed
    Restart {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Remove the workspace container and bring it up from scratch
    Rebuild {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Stop and remove the workspace container
    Remove {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Run a command inside the workspace container
    Exec {
        /// User to run as
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Working directory inside the container
        #[arg(short = 'w', long)]
        workdir: Option<String>,

        /// Environment variables (KEY=VALUE)
        #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Files with additional KEY=VALUE environment entries
        #[arg(long = "env-file", value_name = "FILE")]
        env_file: Vec<PathBuf>,

        /// Run the command with extended privileges
        #[arg(long)]
        privileged: bool,

        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Open an interactive login shell inside the workspace container
    Shell {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// Print the workspace container's logs
    Logs {
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },

    /// List known workspaces
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version information
    Version,
}
