//! Plugin manager
//!
//! Named side-effect hooks that run at fixed lifecycle points. Plugins run in
//! registration order; a `before_up` failure aborts the operation, while
//! `after_up` and `before_down` failures are logged and ignored.

use crate::errors::{CribError, Result};
use crate::state::ReconcileResult;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Context handed to every plugin hook
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub workspace_id: String,
    pub project_root: PathBuf,
}

/// A named side-effect hook
pub trait Plugin: Send + Sync {
    /// Unique plugin name, used for ordering diagnostics and error reports.
    fn name(&self) -> &str;

    /// Runs before any reconcile work; an error aborts the `up`.
    fn before_up(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the result has been persisted; errors are logged.
    fn after_up(&self, _ctx: &PluginContext, _result: &ReconcileResult) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs before the workspace is stopped or removed; errors are logged.
    fn before_down(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Registry of plugins, invoked in registration order
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Duplicate names are allowed but warned about.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            warn!("plugin '{}' registered more than once", plugin.name());
        }
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run all `before_up` hooks; the first failure aborts.
    pub fn run_before_up(&self, ctx: &PluginContext) -> Result<()> {
        for plugin in &self.plugins {
            debug!("running before_up for plugin '{}'", plugin.name());
            plugin.before_up(ctx).map_err(|e| CribError::Plugin {
                name: plugin.name().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Run all `after_up` hooks; failures are logged and ignored.
    pub fn run_after_up(&self, ctx: &PluginContext, result: &ReconcileResult) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.after_up(ctx, result) {
                warn!("plugin '{}' after_up failed: {}", plugin.name(), e);
            }
        }
    }

    /// Run all `before_down` hooks; failures are logged and ignored.
    pub fn run_before_down(&self, ctx: &PluginContext) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.before_down(ctx) {
                warn!("plugin '{}' before_down failed: {}", plugin.name(), e);
            }
        }
    }
}
