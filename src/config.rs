//! Engine configuration: sane defaults, optionally overridden from a
//! file and `STEPPILOT_*` environment variables.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use run_orchestrator::OrchestratorConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of finished executions kept in history.
    pub history_cap: usize,
    /// Directory for screenshot artifacts; in-memory storage when unset.
    pub artifact_dir: Option<String>,
    pub orchestrator: OrchestratorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_cap: run_history::DEFAULT_HISTORY_CAP,
            artifact_dir: None,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Layered load: defaults, then an optional TOML/JSON/YAML file, then
    /// environment variables (`STEPPILOT_HISTORY_CAP=50`, nested keys
    /// with `__`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("STEPPILOT")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_one_hundred_executions() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.history_cap, 100);
        assert!(cfg.artifact_dir.is_none());
    }

    #[test]
    fn load_without_a_file_yields_defaults() {
        let cfg = EngineConfig::load(None).unwrap();
        assert_eq!(cfg.history_cap, EngineConfig::default().history_cap);
    }
}
