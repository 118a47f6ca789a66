use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SiftConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub classification: ClassificationWeights,
    pub retrieval: RetrievalConfig,
    pub retry: RetryConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Deadline for a single embedding call, before retries.
    pub timeout_secs: u64,
}

/// Relative strategy weights and the ensemble confidence floor.
///
/// Weights are multipliers, not probabilities; they need not sum to 1.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClassificationWeights {
    pub semantic: f64,
    pub structural: f64,
    pub context: f64,
    pub minimum_confidence: f64,
    pub ensemble_enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    /// Optional cosine distance cutoff applied to searches that don't pass one.
    pub distance_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    pub matcher_timeout_secs: u64,
    pub matcher_max_attempts: u32,
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 7410,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_sift_dir()
            .join("knowledge.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_sift_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            timeout_secs: 30,
        }
    }
}

impl Default for ClassificationWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            structural: 0.3,
            context: 0.2,
            minimum_confidence: 0.1,
            ensemble_enabled: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            distance_threshold: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            factor: 2.0,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            matcher_timeout_secs: 15,
            matcher_max_attempts: 2,
            history_limit: 20,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            factor: self.factor,
        }
    }
}

/// Returns `~/.sift/`, or `./.sift` when no home directory can be resolved.
pub fn default_sift_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sift")
}

/// Returns the default config file path: `~/.sift/config.toml`
pub fn default_config_path() -> PathBuf {
    default_sift_dir().join("config.toml")
}

impl SiftConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SiftConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (SIFT_DB, SIFT_LOG_LEVEL, SIFT_TRANSPORT).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SIFT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SIFT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SIFT_TRANSPORT") {
            self.server.transport = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SiftConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert!(config.storage.db_path.ends_with("knowledge.db"));
        assert!(config.classification.ensemble_enabled);
        assert_eq!(config.classification.semantic, 0.5);
        assert_eq!(config.classification.structural, 0.3);
        assert_eq!(config.classification.context, 0.2);
        assert_eq!(config.classification.minimum_confidence, 0.1);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[storage]
db_path = "/tmp/test.db"

[classification]
semantic = 1.0
ensemble_enabled = false

[retry]
max_attempts = 5
"#;
        let config: SiftConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.classification.semantic, 1.0);
        assert!(!config.classification.ensemble_enabled);
        assert_eq!(config.retry.max_attempts, 5);
        // defaults still apply for unset fields
        assert_eq!(config.classification.structural, 0.3);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }

    #[test]
    fn retry_config_builds_policy() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.factor, 2.0);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = SiftConfig::default();
        std::env::set_var("SIFT_DB", "/tmp/override.db");
        std::env::set_var("SIFT_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");

        std::env::remove_var("SIFT_DB");
        std::env::remove_var("SIFT_LOG_LEVEL");
    }
}
