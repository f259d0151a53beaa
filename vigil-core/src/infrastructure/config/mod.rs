// vigil-core/src/infrastructure/config/mod.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::infrastructure::error::InfrastructureError;

/// Names of the five warehouse tables the engine reads and writes.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct WarehouseLayout {
    #[validate(length(min = 1))]
    pub rule_definitions: String,
    #[validate(length(min = 1))]
    pub rule_results: String,
    #[validate(length(min = 1))]
    pub execution_status: String,
    #[validate(length(min = 1))]
    pub data_element_health: String,
    #[validate(length(min = 1))]
    pub table_health: String,
}

impl Default for WarehouseLayout {
    fn default() -> Self {
        Self {
            rule_definitions: "dq_rule_definition".to_string(),
            rule_results: "dq_rule_results".to_string(),
            execution_status: "dq_execution_status".to_string(),
            data_element_health: "dq_data_element_health".to_string(),
            table_health: "dq_table_health".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NotificationConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[validate(length(min = 1))]
    pub recipients: Vec<String>,
}

fn default_subject() -> String {
    "Data Quality -- Processed Tables".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EngineConfig {
    /// DuckDB database file used by the bundled warehouse adapter.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    #[validate(nested)]
    pub warehouse: WarehouseLayout,

    /// Bounded worker pool size for concurrent rule evaluation.
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,

    #[serde(default)]
    #[validate(nested)]
    pub notifications: Option<NotificationConfig>,
}

fn default_db_path() -> String {
    "vigil_db.duckdb".to_string()
}

fn default_max_workers() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            warehouse: WarehouseLayout::default(),
            max_workers: default_max_workers(),
            notifications: None,
        }
    }
}

/// Loads the engine configuration from `<dir>/vigil.yaml` (or
/// `vigil_engine_conf.yaml`), applies env overrides, then validates.
pub fn load_engine_config(config_dir: &Path) -> Result<EngineConfig, InfrastructureError> {
    let config_path = find_main_config(config_dir)?;
    info!(path = ?config_path, "Loading engine configuration");

    let content = fs::read_to_string(&config_path)?;
    let mut config: EngineConfig = serde_yaml::from_str(&content)?;

    // Override via environment variables (layering pattern):
    // VIGIL_DB_PATH=/tmp/test.duckdb vigil run ...
    apply_env_overrides(&mut config);

    config
        .validate()
        .map_err(|e| InfrastructureError::ConfigError(e.to_string()))?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    let candidates = ["vigil.yaml", "vigil_engine_conf.yaml"];
    for filename in candidates {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, candidates
    )))
}

fn apply_env_overrides(config: &mut EngineConfig) {
    if let Ok(val) = std::env::var("VIGIL_DB_PATH") {
        info!(old = ?config.db_path, new = ?val, "Overriding db path via ENV");
        config.db_path = val;
    }
    if let Ok(val) = std::env::var("VIGIL_MAX_WORKERS")
        && let Ok(parsed) = val.parse::<usize>()
    {
        info!(old = config.max_workers, new = parsed, "Overriding max workers via ENV");
        config.max_workers = parsed;
    }
}
