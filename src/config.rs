//! Engine configuration
//!
//! TOML file with environment-variable overrides, ENV > TOML > default.

use crate::error::{Error, Result};
use crate::source::RetryPolicy;
use crate::taxonomy::TagCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const ENV_CACHE_FILE: &str = "BOORU_TAGS_CACHE_FILE";
const ENV_DEFAULT_CATEGORY: &str = "BOORU_TAGS_DEFAULT_CATEGORY";

const DEFAULT_CACHE_FILE: &str = "gelbooru_tags.jsonl";
const DEFAULT_BASE_URL: &str = "https://gelbooru.com/index.php?page=dapi&s=tag&q=index&json=1";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Durable tag cache (JSONL)
    pub cache_file: PathBuf,
    /// Upstream tag index endpoint
    pub base_url: String,
    /// Run without an upstream source; unresolved tokens then depend
    /// entirely on `default_category`
    pub offline: bool,
    /// Taxonomy label assigned to tokens the source cannot resolve
    pub default_category: Option<String>,
    /// Retry bound per bulk lookup
    pub max_retries: u32,
    /// Base backoff delay between attempts; 0 disables pacing
    pub retry_base_delay_ms: u64,
    /// Backoff cap
    pub retry_max_delay_ms: u64,
    /// Per-request transport timeout
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            base_url: DEFAULT_BASE_URL.to_string(),
            offline: false,
            default_category: None,
            max_retries: 10,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 5000,
            request_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;
        let mut config: EngineConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    /// (with environment overrides still applied).
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = EngineConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(cache_file) = std::env::var(ENV_CACHE_FILE) {
            if self.cache_file != Path::new(DEFAULT_CACHE_FILE) {
                warn!(
                    "cache file set in both {} and TOML; using the environment value",
                    ENV_CACHE_FILE
                );
            }
            self.cache_file = PathBuf::from(cache_file);
        }
        if let Ok(label) = std::env::var(ENV_DEFAULT_CATEGORY) {
            if self.default_category.is_some() {
                warn!(
                    "default category set in both {} and TOML; using the environment value",
                    ENV_DEFAULT_CATEGORY
                );
            }
            self.default_category = Some(label);
        }
    }

    /// Parsed default-fallback category, if configured.
    pub fn default_category(&self) -> Result<Option<TagCategory>> {
        match &self.default_category {
            None => Ok(None),
            Some(label) => TagCategory::from_label(label).map(Some).ok_or_else(|| {
                Error::Config(format!("unknown default category label {label:?}"))
            }),
        }
    }

    /// Retry schedule for the upstream client.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}
