//! Logging and observability
//!
//! Structured logging via tracing, written to stderr so verb output on
//! stdout stays machine-readable. The CLI front-end calls [`init`] once at
//! process start; `RUST_LOG` always wins, otherwise the verbose flag raises
//! the crib crates to debug.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "crib=debug,crib_core=debug,info"
    } else {
        "info"
    }
}

/// Initialize the logging system
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose),
        )
        .with(filter)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("crib_core=debug"));
        // The verbose directive still caps third-party crates at info
        assert!(default_directive(true).ends_with("info"));
    }
}
