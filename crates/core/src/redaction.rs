//! Scrubbing of sensitive values from reported argument vectors
//!
//! When a runtime invocation fails, the error message embeds the argv that was
//! executed. Any `-e KEY=VALUE` pair whose key looks secret-bearing has its
//! value replaced before the text can reach logs or the terminal.

/// Placeholder substituted for scrubbed values
pub const SCRUB_PLACEHOLDER: &str = "***";

/// Case-insensitive markers that flag an environment key as sensitive
const SENSITIVE_KEY_MARKERS: &[&str] = &[
    "TOKEN",
    "SECRET",
    "KEY",
    "PASSWORD",
    "PASSPHRASE",
    "CREDENTIAL",
    "AUTH_SOCK",
];

/// Check whether an environment variable key should have its value scrubbed.
pub fn is_sensitive_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    SENSITIVE_KEY_MARKERS
        .iter()
        .any(|marker| upper.contains(marker))
}

/// Scrub a single `KEY=VALUE` pair, leaving non-sensitive pairs untouched.
pub fn scrub_env_pair(pair: &str) -> String {
    match pair.split_once('=') {
        Some((key, _)) if is_sensitive_key(key) => format!("{}={}", key, SCRUB_PLACEHOLDER),
        _ => pair.to_string(),
    }
}

/// Scrub an argument vector before it is rendered into an error message.
///
/// Values following `-e` / `--env` are treated as `KEY=VALUE` pairs, as are
/// inline `--env=KEY=VALUE` tokens. All other arguments pass through.
pub fn scrub_args(args: &[String]) -> Vec<String> {
    let mut scrubbed = Vec::with_capacity(args.len());
    let mut next_is_env = false;

    for arg in args {
        if next_is_env {
            scrubbed.push(scrub_env_pair(arg));
            next_is_env = false;
            continue;
        }

        if arg == "-e" || arg == "--env" {
            next_is_env = true;
            scrubbed.push(arg.clone());
        } else if let Some(pair) = arg.strip_prefix("--env=") {
            scrubbed.push(format!("--env={}", scrub_env_pair(pair)));
        } else {
            scrubbed.push(arg.clone());
        }
    }

    scrubbed
}

/// Render an argument vector for inclusion in an error message, scrubbed.
pub fn render_args(args: &[String]) -> String {
    scrub_args(args).join(" ")
}
