//! `.env` sidecar file parsing
//!
//! One `KEY=VALUE` per line, `#` starts a comment line, whitespace is trimmed
//! around both key and value. Used by `exec --env-file` and compose env
//! passthrough.

use crate::errors::{ConfigError, Result};
use indexmap::IndexMap;
use std::path::Path;

/// Parse a `.env` file from disk.
pub fn parse_env_file(path: &Path) -> Result<IndexMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    Ok(parse_env_str(&content))
}

/// Parse `.env` content. Malformed lines (no `=`) are skipped.
pub fn parse_env_str(content: &str) -> IndexMap<String, String> {
    let mut vars = IndexMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = trimmed.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            vars.insert(key.to_string(), value.trim().to_string());
        }
    }

    vars
}
