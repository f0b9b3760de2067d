//! crib: dev container workspaces from your terminal

mod cli;
mod commands;

use clap::Parser;
use crib_core::errors::CribError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    crib_core::logging::init(cli.verbose)?;

    // A SIGINT cancels the in-flight operation; every child process the
    // engine spawns is a cancellation point
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    match commands::run(cli, &cancel).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("crib: {:#}", e);
            let code = e
                .downcast_ref::<CribError>()
                .map_or(1, CribError::exit_code);
            std::process::exit(code);
        }
    }
}
