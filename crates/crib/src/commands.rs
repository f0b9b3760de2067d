//! Verb implementations mapping CLI commands onto the engine

use crate::cli::{Cli, Commands};
use anyhow::{bail, Context, Result};
use crib_core::reconcile::{Engine, ExecRequest, UpOptions};
use crib_core::runtime::{self, RuntimeKind};
use crib_core::state::WorkspaceStore;
use crib_core::workspace::{self, Workspace};
use serde_json::json;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Dispatch a parsed invocation; returns the process exit code.
pub async fn run(cli: Cli, cancel: &CancellationToken) -> Result<i32> {
    let runtime_kind: Option<RuntimeKind> = match cli.runtime.as_deref() {
        Some(value) => Some(value.parse()?),
        None => None,
    };

    match cli.command {
        Commands::Up { recreate, path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            let result = engine.up(&ws, &UpOptions { recreate }, cancel).await?;
            println!(
                "workspace {} is up (container {})",
                ws.id,
                short_id(&result.container_id)
            );
            Ok(0)
        }

        Commands::Down { path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            engine.down(&ws, cancel).await?;
            println!("workspace {} stopped", ws.id);
            Ok(0)
        }

        Commands::Status { json, path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            let status = engine.status(&ws, cancel).await?;

            if json {
                let services: Vec<_> = status
                    .services
                    .iter()
                    .map(|s| {
                        json!({
                            "service": s.service,
                            "state": s.state,
                            "containerId": s.container_id,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "workspace": ws.id,
                        "container": status.container,
                        "services": services,
                    }))
                    .expect("status serializes")
                );
            } else {
                match &status.container {
                    Some(container) => println!(
                        "{}: {} ({})",
                        ws.id,
                        container.state.status,
                        short_id(&container.id)
                    ),
                    None => println!("{}: no container", ws.id),
                }
                for service in &status.services {
                    println!("  {}: {}", service.service, service.state);
                }
            }
            Ok(0)
        }

        Commands::Restart { path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            let result = engine.restart(&ws, cancel).await?;
            if result.recreated {
                println!(
                    "workspace {} recreated (container {})",
                    ws.id,
                    short_id(&result.container_id)
                );
            } else {
                println!("workspace {} restarted", ws.id);
            }
            Ok(0)
        }

        Commands::Rebuild { path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            let result = engine.rebuild(&ws, cancel).await?;
            println!(
                "workspace {} rebuilt (container {})",
                ws.id,
                short_id(&result.container_id)
            );
            Ok(0)
        }

        Commands::Remove { path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            engine.remove(&ws, cancel).await?;
            println!("workspace {} removed", ws.id);
            Ok(0)
        }

        Commands::Exec {
            user,
            workdir,
            env,
            env_file,
            privileged,
            command,
        } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, Path::new("."), cli.config_dir.as_deref())?;
            let request = ExecRequest {
                user,
                workdir,
                env: parse_env_pairs(&env)?,
                env_files: env_file,
                privileged,
                interactive: true,
                tty: false,
                command,
            };
            Ok(engine.exec(&ws, &request, cancel).await?)
        }

        Commands::Shell { path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            Ok(engine.shell(&ws, cancel).await?)
        }

        Commands::Logs { path } => {
            let engine = build_engine(runtime_kind, cancel).await?;
            let ws = resolve_workspace(&engine, &path, cli.config_dir.as_deref())?;
            let logs = engine.logs(&ws, cancel).await?;
            if !logs.is_empty() {
                println!("{}", logs);
            }
            Ok(0)
        }

        Commands::List { json } => {
            let store = WorkspaceStore::new().context("opening the workspace store")?;
            let workspaces = store.list()?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&workspaces).expect("workspaces serialize")
                );
            } else if workspaces.is_empty() {
                println!("no workspaces");
            } else {
                for ws in &workspaces {
                    println!(
                        "{}\t{}\t{}",
                        ws.id,
                        ws.source.display(),
                        ws.last_used_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            Ok(0)
        }

        Commands::Version => {
            println!("crib {}", env!("CARGO_PKG_VERSION"));
            match runtime::select_runtime(runtime_kind, cancel).await {
                Ok(rt) => {
                    let version = rt.version_string(cancel).await.unwrap_or_default();
                    println!("runtime: {}", version);
                    if let Ok(arch) = rt.arch_probe(cancel).await {
                        println!("architecture: {}", arch);
                    }
                }
                Err(e) => debug!("no runtime for version probe: {}", e),
            }
            Ok(0)
        }
    }
}

async fn build_engine(
    runtime_kind: Option<RuntimeKind>,
    cancel: &CancellationToken,
) -> Result<Engine> {
    let rt = runtime::select_runtime(runtime_kind, cancel).await?;
    debug!("selected runtime: {}", rt.runtime_name());
    let store = WorkspaceStore::new().context("opening the workspace store")?;
    Ok(Engine::new(rt, store))
}

/// Map a directory to its workspace, preferring the stored record when one
/// exists.
fn resolve_workspace(
    engine: &Engine,
    path: &Path,
    config_dir: Option<&Path>,
) -> Result<Workspace> {
    let resolved = match config_dir {
        Some(dir) => workspace::resolve_config_dir(dir)?,
        None => workspace::resolve(path)?,
    };

    match engine.store().load(&resolved.workspace_id) {
        Ok(mut ws) => {
            // The project may have moved since the record was written
            ws.source = resolved.project_root.clone();
            ws.config_rel_path = resolved.relative_config_path.clone();
            Ok(ws)
        }
        Err(_) => Ok(Workspace::from_resolve(&resolved)),
    }
}

fn parse_env_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => Ok((key.to_string(), value.to_string())),
            None => bail!("invalid environment entry '{}'; expected KEY=VALUE", pair),
        })
        .collect()
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pairs() {
        let pairs = parse_env_pairs(&["A=1".to_string(), "B=x=y".to_string()]).unwrap();
        assert_eq!(pairs[0], ("A".to_string(), "1".to_string()));
        assert_eq!(pairs[1], ("B".to_string(), "x=y".to_string()));

        assert!(parse_env_pairs(&["NOEQUALS".to_string()]).is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }
}
