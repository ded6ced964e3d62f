use palm2_llm::http::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_LOCATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::distance::DistanceMetric;

/// Adapter construction parameters. Read once, never mutated afterwards.
///
/// `role`, `context_depth`, `max_tokens` and `key_path` are required; the
/// rest fall back to the PaLM 2 defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Default system prompt when the persona supplies none.
    pub role: String,
    /// Max trailing history turns per request. Zero or negative keeps none.
    pub context_depth: i64,
    /// Generation length cap passed to the chat model.
    pub max_tokens: u32,
    /// Service account key file.
    pub key_path: PathBuf,

    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_location")]
    pub location: String,
    /// Overrides the project id from the key file.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Endpoint override, e.g. a proxy.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub distance_metric: DistanceMetric,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn default_model() -> String {
    DEFAULT_CHAT_MODEL.to_owned()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_owned()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_owned()
}

impl AdapterConfig {
    /// Required keys only; everything else at its default.
    pub fn new(role: impl Into<String>, context_depth: i64, max_tokens: u32, key_path: impl Into<PathBuf>) -> Self {
        Self {
            role: role.into(),
            context_depth,
            max_tokens,
            key_path: key_path.into(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            location: default_location(),
            project_id: None,
            base_url: None,
            distance_metric: DistanceMetric::default(),
        }
    }

    /// Build from an already-parsed config section (e.g. the host's `Palm2` block).
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_value(value)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid { key: "max_tokens", reason: "must be positive".into() });
        }
        if self.key_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { key: "key_path", reason: "must not be empty".into() });
        }
        if self.model.is_empty() {
            return Err(ConfigError::Invalid { key: "model", reason: "must not be empty".into() });
        }
        Ok(())
    }
}
