pub mod apply;
pub mod config;
pub mod policy;
pub mod serve;

use anyhow::Context;
use sensitivity_core::config::{Config, WarnLevel};
use sensitivity_core::notify::Notifier;
use sensitivity_core::policy::PolicyTable;
use sensitivity_core::Orchestrator;
use std::path::Path;
use std::sync::Arc;

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config from {}", path.display()))
}

/// Wire the orchestrator to the production adapters. Secrets come from the
/// environment; configuration errors stop startup, warnings are logged.
pub fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let warnings = config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => tracing::error!("config: {}", w.message),
        }
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config has errors; run `sensitivity config validate`");
    }

    let policies = PolicyTable::from_config(config)?;
    let secrets = graph_client::Secrets::from_env()?;
    let adapters = graph_client::Adapters::from_config(config, &secrets)?;
    let notifier = Notifier::new(adapters.queue, config.queues.clone());

    Ok(Orchestrator::new(
        Arc::new(policies),
        adapters.identity,
        adapters.site,
        notifier,
        config.site.clone(),
    ))
}
